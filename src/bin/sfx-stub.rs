//! Self-extracting installer stub
//!
//! Runs the install pipeline, or the uninstall pipeline when the binary's file
//! name contains "uninstall". Takes no arguments.

use log::LevelFilter;
use sfxkit::exit_codes::{EXIT_ERROR, EXIT_PANIC, EXIT_SUCCESS};
use sfxkit::sfx::defaults::ENV_NO_PAUSE;
use sfxkit::utils::is_env_true;
use sfxkit::{StubOutcome, run_stub};
use std::io::{self, BufRead, IsTerminal, Write};
use std::{env, panic, process};

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok((exit_code, paused)) => {
            if !paused {
                pause();
            }
            process::exit(exit_code)
        }
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in installer");
            process::exit(EXIT_PANIC);
        }
    }
}

/// Exit code, and whether the uninstaller already paused before its handoff
fn run() -> (i32, bool) {
    sfxkit::logger::JsonLogger::init(LevelFilter::Warn);
    log::debug!("🚀 Stub started, version {}", sfxkit::version::full_version());

    let exe_path = match env::current_exe() {
        Ok(path) => {
            log::debug!("📍 Executable path: {:?}", path);
            path
        }
        Err(e) => {
            log::error!("❌ Failed to get executable path: {}", e);
            println!("Error: cannot determine own location: {e}");
            return (EXIT_ERROR, false);
        }
    };

    match run_stub(&exe_path, pause) {
        Ok(StubOutcome::Installed(report)) => {
            if let Some(exe) = &report.exe_path {
                println!("Installed {} to {}", report.metadata.product_name, exe.display());
            } else {
                println!(
                    "Installed {} to {}",
                    report.metadata.product_name,
                    report.install_dir.display()
                );
            }
            (EXIT_SUCCESS, false)
        }
        Ok(StubOutcome::Uninstalled(report)) => {
            // Failures were printed as they happened
            log::debug!(
                "🏁 Uninstall of {:?} finished with {} failures",
                report.install_dir,
                report.failures.len()
            );
            (EXIT_SUCCESS, report.acknowledged)
        }
        Err(e) => {
            log::error!("❌ Install failed: {}", e);
            println!("Installation failed: {e}");
            (EXIT_ERROR, false)
        }
    }
}

/// Wait for Enter so a double-clicked console window stays readable
fn pause() {
    if is_env_true(ENV_NO_PAUSE) || !io::stdin().is_terminal() {
        return;
    }
    print!("Press Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
