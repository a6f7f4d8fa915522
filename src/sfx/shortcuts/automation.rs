//! Shell automation object (`WScript.Shell`) driven through `IDispatch`

use super::{ShortcutDescriptor, ShortcutStrategy};
use crate::exceptions::Result;

/// Second tier: `CreateShortcut`, set properties, `Save`
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomationStrategy;

impl ShortcutStrategy for AutomationStrategy {
    fn name(&self) -> &'static str {
        "shell-automation"
    }

    fn create(&self, descriptor: &ShortcutDescriptor) -> Result<()> {
        platform::create(descriptor)?;
        // Some automation hosts report success from Save without writing the file
        if !descriptor.link_path.exists() {
            return Err(crate::exceptions::SfxError::PlatformIntegration(
                "Save returned success but the link file is missing".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use log::trace;
    use windows::Win32::System::Com::{
        CLSCTX_INPROC_SERVER, CLSCTX_LOCAL_SERVER, CLSIDFromProgID, CoCreateInstance,
        DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYPUT, DISPPARAMS, IDispatch,
    };
    use windows::Win32::System::Ole::DISPID_PROPERTYPUT;
    use windows::core::{BSTR, GUID, IUnknown, Interface, PCWSTR, VARIANT, w};

    use super::super::ShortcutDescriptor;
    use super::super::shell_link::{ComApartment, to_wide};
    use crate::exceptions::{Result, SfxError};
    use crate::sfx::defaults::SHORTCUT_SHOW_NORMAL;

    const LOCALE_USER_DEFAULT: u32 = 0x0400;

    fn fail(step: &str, e: windows::core::Error) -> SfxError {
        SfxError::PlatformIntegration(format!("{step}: {e}"))
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    fn dispid(object: &IDispatch, name: &str) -> Result<i32> {
        let wide = to_wide(std::ffi::OsStr::new(name));
        let names = [PCWSTR(wide.as_ptr())];
        let mut id = 0i32;
        unsafe {
            object
                .GetIDsOfNames(&GUID::zeroed(), names.as_ptr(), 1, LOCALE_USER_DEFAULT, &mut id)
                .map_err(|e| fail(&format!("GetIDsOfNames({name})"), e))?;
        }
        Ok(id)
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    fn invoke(
        object: &IDispatch,
        name: &str,
        flags: DISPATCH_FLAGS,
        mut args: Vec<VARIANT>,
    ) -> Result<VARIANT> {
        let id = dispid(object, name)?;
        let mut named = DISPID_PROPERTYPUT;
        let is_put = flags == DISPATCH_PROPERTYPUT;
        let params = DISPPARAMS {
            rgvarg: args.as_mut_ptr(),
            rgdispidNamedArgs: if is_put {
                &mut named
            } else {
                std::ptr::null_mut()
            },
            cArgs: args.len() as u32,
            cNamedArgs: u32::from(is_put),
        };
        let mut result = VARIANT::default();
        unsafe {
            object
                .Invoke(
                    id,
                    &GUID::zeroed(),
                    LOCALE_USER_DEFAULT,
                    flags,
                    &params,
                    Some(&mut result),
                    None,
                    None,
                )
                .map_err(|e| fail(name, e))?;
        }
        Ok(result)
    }

    fn put(object: &IDispatch, name: &str, value: VARIANT) -> Result<()> {
        invoke(object, name, DISPATCH_PROPERTYPUT, vec![value]).map(|_| ())
    }

    fn bstr(path: &std::path::Path) -> VARIANT {
        VARIANT::from(BSTR::from(path.to_string_lossy().as_ref()))
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    pub(super) fn create(d: &ShortcutDescriptor) -> Result<()> {
        let _apartment = ComApartment::enter()?;

        let shell: IDispatch = unsafe {
            let clsid =
                CLSIDFromProgID(w!("WScript.Shell")).map_err(|e| fail("CLSIDFromProgID", e))?;
            CoCreateInstance(&clsid, None, CLSCTX_INPROC_SERVER | CLSCTX_LOCAL_SERVER)
                .map_err(|e| fail("CreateObject(WScript.Shell)", e))?
        };

        let created = invoke(&shell, "CreateShortcut", DISPATCH_METHOD, vec![bstr(&d.link_path)])?;
        let shortcut: IDispatch = IUnknown::try_from(&created)
            .and_then(|unknown| unknown.cast())
            .map_err(|e| fail("CreateShortcut result", e))?;

        put(&shortcut, "TargetPath", bstr(&d.target))?;
        put(&shortcut, "WorkingDirectory", bstr(&d.working_dir))?;
        put(&shortcut, "IconLocation", bstr(&d.icon))?;
        put(&shortcut, "WindowStyle", VARIANT::from(SHORTCUT_SHOW_NORMAL))?;
        invoke(&shortcut, "Save", DISPATCH_METHOD, Vec::new())?;

        trace!("🔗 WScript.Shell saved {:?}", d.link_path);
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::super::ShortcutDescriptor;
    use crate::exceptions::{Result, SfxError};

    pub(super) fn create(_d: &ShortcutDescriptor) -> Result<()> {
        Err(SfxError::PlatformIntegration(
            "shell automation objects are only available on Windows".to_string(),
        ))
    }
}
