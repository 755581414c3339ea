use log::debug;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Shell::ExtractIconExW;
use windows::Win32::UI::WindowsAndMessaging::{
    CopyIcon, DestroyIcon, GetClassLongPtrW, GetWindowThreadProcessId, IsWindow, SendMessageW,
    GCLP_HICON, HICON, ICON_BIG, ICON_SMALL, WM_GETICON,
};

/// Exclusively owned icon handle. Windows and window classes retain ownership
/// of the handles they hand out, so anything entering this type must be a
/// duplicate or a freshly extracted handle.
pub struct OwnedIcon(HICON);

impl OwnedIcon {
    /// The caller guarantees `hicon` is valid and not owned elsewhere.
    pub(crate) unsafe fn from_raw(hicon: HICON) -> Self {
        Self(hicon)
    }

    /// Duplicates a borrowed handle into an owned one.
    fn duplicate(borrowed: HICON) -> Option<Self> {
        let copy = unsafe { CopyIcon(borrowed) }.ok()?;
        Some(Self(copy))
    }

    pub fn as_raw(&self) -> HICON {
        self.0
    }
}

impl Drop for OwnedIcon {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = DestroyIcon(self.0);
            }
        }
    }
}

/// Locates the best-available icon for `window`. Ordered fallback chain,
/// first success wins; every step is guarded on its own, so a failing step
/// means "try the next one" and exhaustion is a plain `None`.
pub fn resolve_icon(window: HWND) -> Option<OwnedIcon> {
    if window.0 == 0 || !unsafe { IsWindow(window) }.as_bool() {
        return None;
    }
    window_icon(window, ICON_SMALL)
        .or_else(|| window_icon(window, ICON_BIG))
        .or_else(|| class_icon(window))
        .or_else(|| executable_icon(window))
}

fn window_icon(window: HWND, kind: u32) -> Option<OwnedIcon> {
    let reply = unsafe { SendMessageW(window, WM_GETICON, WPARAM(kind as usize), LPARAM(0)) };
    let borrowed = HICON(reply.0);
    if borrowed.is_invalid() {
        return None;
    }
    OwnedIcon::duplicate(borrowed)
}

fn class_icon(window: HWND) -> Option<OwnedIcon> {
    let raw = unsafe { GetClassLongPtrW(window, GCLP_HICON) };
    if raw == 0 {
        return None;
    }
    debug!("window reported no icon, using class icon");
    OwnedIcon::duplicate(HICON(raw as isize))
}

/// Last resort: the first icon resource embedded in the owning process's
/// executable. The extracted handle is already ours, no duplication needed.
fn executable_icon(window: HWND) -> Option<OwnedIcon> {
    let path = process_image_path(window)?;
    debug!("falling back to executable icon");
    let mut small = HICON::default();
    let extracted =
        unsafe { ExtractIconExW(PCWSTR(path.as_ptr()), 0, None, Some(&mut small), 1) };
    if extracted == 0 || small.is_invalid() {
        return None;
    }
    Some(unsafe { OwnedIcon::from_raw(small) })
}

fn process_image_path(window: HWND) -> Option<Vec<u16>> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
    let mut buffer = [0u16; 1024];
    let mut len = buffer.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut len,
        )
    };
    unsafe {
        let _ = CloseHandle(process);
    }
    if queried.is_err() || len == 0 {
        return None;
    }
    let mut path = buffer[..len as usize].to_vec();
    path.push(0);
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_window_has_no_icon() {
        assert!(resolve_icon(HWND(0)).is_none());
    }

    #[test]
    fn stale_window_has_no_icon() {
        // A handle value no live window should be using.
        assert!(resolve_icon(HWND(-0x5f5f5f60)).is_none());
    }

    #[test]
    fn no_icon_path_for_unowned_window() {
        assert!(process_image_path(HWND(0)).is_none());
    }
}
