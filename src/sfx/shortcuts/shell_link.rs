//! Native shell link object (`IShellLinkW` saved through `IPersistFile`)

use super::{ShortcutDescriptor, ShortcutStrategy};
use crate::exceptions::Result;

/// First tier: build the link in-process, no external host involved
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLinkStrategy;

impl ShortcutStrategy for ShellLinkStrategy {
    fn name(&self) -> &'static str {
        "shell-link"
    }

    fn create(&self, descriptor: &ShortcutDescriptor) -> Result<()> {
        platform::create(descriptor)
    }
}

#[cfg(target_os = "windows")]
pub(crate) use platform::{ComApartment, to_wide};

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;

    use log::trace;
    use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
    use windows::Win32::System::Com::{
        CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
        CoUninitialize, IPersistFile,
    };
    use windows::Win32::UI::Shell::{IShellLinkW, ShellLink};
    use windows::Win32::UI::WindowsAndMessaging::SHOW_WINDOW_CMD;
    use windows::core::{Interface, PCWSTR};

    use super::super::ShortcutDescriptor;
    use crate::exceptions::{Result, SfxError};
    use crate::sfx::defaults::SHORTCUT_SHOW_NORMAL;

    /// Null-terminated UTF-16 copy of an OS string
    pub(crate) fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    /// COM apartment held for the lifetime of the guard
    ///
    /// If the thread already runs a different apartment model the existing one
    /// is used and nothing is uninitialized on drop.
    #[derive(Debug)]
    pub(crate) struct ComApartment {
        owned: bool,
    }

    impl ComApartment {
        #[allow(unsafe_code)] // Required for Windows API FFI calls
        pub(crate) fn enter() -> Result<Self> {
            let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            if hr.is_ok() {
                trace!("🧵 COM apartment entered");
                Ok(Self { owned: true })
            } else if hr == RPC_E_CHANGED_MODE {
                trace!("🧵 COM already initialized with another model");
                Ok(Self { owned: false })
            } else {
                Err(SfxError::PlatformIntegration(format!(
                    "CoInitializeEx failed: {hr:?}"
                )))
            }
        }
    }

    impl Drop for ComApartment {
        #[allow(unsafe_code)] // Required for Windows API FFI calls
        fn drop(&mut self) {
            if self.owned {
                unsafe { CoUninitialize() };
            }
        }
    }

    fn com_err(step: &str) -> impl Fn(windows::core::Error) -> SfxError + '_ {
        move |e| SfxError::PlatformIntegration(format!("{step}: {e}"))
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    pub(super) fn create(d: &ShortcutDescriptor) -> Result<()> {
        let _apartment = ComApartment::enter()?;

        let target = to_wide(d.target.as_os_str());
        let working_dir = to_wide(d.working_dir.as_os_str());
        let icon = to_wide(d.icon.as_os_str());
        let link_path = to_wide(d.link_path.as_os_str());

        // Interfaces are released when they drop, before the apartment guard
        unsafe {
            let link: IShellLinkW = CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER)
                .map_err(com_err("CoCreateInstance(ShellLink)"))?;
            link.SetPath(PCWSTR(target.as_ptr()))
                .map_err(com_err("SetPath"))?;
            link.SetWorkingDirectory(PCWSTR(working_dir.as_ptr()))
                .map_err(com_err("SetWorkingDirectory"))?;
            link.SetShowCmd(SHOW_WINDOW_CMD(SHORTCUT_SHOW_NORMAL))
                .map_err(com_err("SetShowCmd"))?;
            if let Err(e) = link.SetIconLocation(PCWSTR(icon.as_ptr()), 0) {
                trace!("SetIconLocation failed, continuing: {e}");
            }

            let persist: IPersistFile = link.cast().map_err(com_err("QueryInterface(IPersistFile)"))?;
            persist
                .Save(PCWSTR(link_path.as_ptr()), true)
                .map_err(com_err("IPersistFile::Save"))?;
        }

        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::super::ShortcutDescriptor;
    use crate::exceptions::{Result, SfxError};

    pub(super) fn create(_d: &ShortcutDescriptor) -> Result<()> {
        Err(SfxError::PlatformIntegration(
            "shell link objects are only available on Windows".to_string(),
        ))
    }
}
