//! Terminal setup for the log output

use std::io::IsTerminal;

/// Prepare stdout for UTF-8 log lines and report whether ANSI colour codes
/// will render there.
pub fn prepare_stdout() -> bool {
    std::io::stdout().is_terminal() && enable_vt_output()
}

#[cfg(windows)]
fn enable_vt_output() -> bool {
    use windows_sys::Win32::System::Console as win;

    // Status messages carry CJK text; the legacy OEM code page mangles it.
    // SAFETY: Win32 calls on this process's own stdout handle.
    unsafe {
        win::SetConsoleOutputCP(65001);
        let stdout = win::GetStdHandle(win::STD_OUTPUT_HANDLE);
        let mut mode = 0;
        if win::GetConsoleMode(stdout, &mut mode) == 0 {
            return false;
        }
        win::SetConsoleMode(stdout, mode | win::ENABLE_VIRTUAL_TERMINAL_PROCESSING) != 0
    }
}

#[cfg(not(windows))]
fn enable_vt_output() -> bool {
    true
}
