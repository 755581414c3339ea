//! Native companion for a window-switching host: resolves the virtual
//! desktop owning a top-level window and extracts window icons as PNG
//! buffers, over a flat FFI surface.

mod com;
mod desktop;
mod encode;
mod error;
mod icon;

use std::panic::{self, AssertUnwindSafe};

use log::warn;
use windows::core::{GUID, HRESULT};
use windows::Win32::Foundation::{E_FAIL, E_INVALIDARG, HWND, S_OK};

pub use crate::com::{runtime, ComApartment, ComRuntime};
pub use crate::desktop::DesktopResolver;
pub use crate::encode::{negotiate, render_png, EncodeOutcome};
pub use crate::error::{Error, Result};
pub use crate::icon::{resolve_icon, OwnedIcon};

/// Full icon pipeline: resolve the window's best-available icon and encode it
/// as PNG. `None` covers both "window has no icon" and "icon could not be
/// encoded"; callers that need to tell them apart should drive
/// [`resolve_icon`] and [`render_png`] themselves.
pub fn window_icon_png(window: HWND) -> Option<Vec<u8>> {
    let icon = icon::resolve_icon(window)?;
    match encode::render_png(icon) {
        Ok(png) => Some(png),
        Err(e) => {
            warn!("icon encode failed: {}", e);
            None
        }
    }
}

/// Writes the id of the virtual desktop owning `window` to `desktop_id`.
///
/// Returns `S_OK` on success, `E_INVALIDARG` when either argument is null,
/// and otherwise the broker's own status code, unmodified. Blocks until the
/// broker answers; there is no timeout. The calling thread must be
/// compatible with the apartment established on the first call into this
/// module.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn GetWindowDesktopId(
    window: HWND,
    desktop_id: *mut GUID,
) -> HRESULT {
    if window.0 == 0 || desktop_id.is_null() {
        return E_INVALIDARG;
    }
    let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
        let runtime = com::runtime()?;
        desktop::DesktopResolver::new(runtime)?.resolve(window)
    }));
    match resolved {
        Ok(Ok(id)) => {
            *desktop_id = id;
            S_OK
        }
        Ok(Err(e)) => e.to_hresult(),
        Err(_) => E_FAIL,
    }
}

/// Extracts `window`'s icon as PNG bytes through a size-query/fill protocol:
/// a null `buffer` returns the required byte count, a sufficiently large
/// buffer is filled and the byte count written is returned.
///
/// Returns `0` when the window has no reachable icon, when encoding fails,
/// or when the buffer is too small; an undersized buffer is left untouched,
/// never filled with a partial image. `buffer_size` must describe `buffer`'s
/// real capacity.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn GetWindowIconData(
    window: HWND,
    buffer: *mut u8,
    buffer_size: i32,
) -> i32 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let png = window_icon_png(window)?;
        let out = if buffer.is_null() {
            None
        } else {
            Some(std::slice::from_raw_parts_mut(
                buffer,
                buffer_size.max(0) as usize,
            ))
        };
        encode::negotiate(&png, out)
    }));
    match outcome {
        Ok(Some(EncodeOutcome::SizeRequired(n))) | Ok(Some(EncodeOutcome::Written(n))) => n as i32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn desktop_id_rejects_null_window() {
        let sentinel = GUID::from_u128(0xDEADBEEF_DEAD_BEEF_DEAD_BEEFDEADBEEF);
        let mut out = sentinel;
        let hr = unsafe { GetWindowDesktopId(HWND(0), &mut out) };
        assert_eq!(hr, E_INVALIDARG);
        assert_eq!(out, sentinel);
    }

    #[test]
    fn desktop_id_rejects_null_out_pointer() {
        let window = unsafe { GetForegroundWindow() };
        let hr = unsafe { GetWindowDesktopId(window, std::ptr::null_mut()) };
        assert_eq!(hr, E_INVALIDARG);
    }

    #[test]
    fn icon_data_is_zero_for_null_window() {
        assert_eq!(
            unsafe { GetWindowIconData(HWND(0), std::ptr::null_mut(), 0) },
            0
        );
    }

    #[test]
    fn size_query_is_idempotent() {
        let window = unsafe { GetForegroundWindow() };
        let first = unsafe { GetWindowIconData(window, std::ptr::null_mut(), 0) };
        let second = unsafe { GetWindowIconData(window, std::ptr::null_mut(), 0) };
        assert_eq!(first, second);
    }

    #[test]
    fn negotiated_buffer_round_trips() {
        let window = unsafe { GetForegroundWindow() };
        let size = unsafe { GetWindowIconData(window, std::ptr::null_mut(), 0) };
        if size == 0 {
            eprintln!("skipping: foreground window has no reachable icon");
            return;
        }

        let mut buffer = vec![0u8; size as usize];
        let written = unsafe { GetWindowIconData(window, buffer.as_mut_ptr(), size) };
        assert_eq!(written, size);
        assert_eq!(&buffer[..8], &PNG_MAGIC);

        // An undersized buffer fails outright and stays untouched.
        let mut small = vec![0x55u8; (size - 1) as usize];
        assert_eq!(
            unsafe { GetWindowIconData(window, small.as_mut_ptr(), size - 1) },
            0
        );
        assert!(small.iter().all(|&b| b == 0x55));
    }

    #[test]
    fn concurrent_queries_do_not_cross_wires() {
        let window = unsafe { GetForegroundWindow() };
        let size = unsafe { GetWindowIconData(window, std::ptr::null_mut(), 0) };
        if size == 0 {
            eprintln!("skipping: foreground window has no reachable icon");
            return;
        }
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let raw = window.0;
                std::thread::spawn(move || {
                    let window = HWND(raw);
                    let size = unsafe { GetWindowIconData(window, std::ptr::null_mut(), 0) };
                    let mut buffer = vec![0u8; size.max(0) as usize];
                    let written =
                        unsafe { GetWindowIconData(window, buffer.as_mut_ptr(), size) };
                    (size, written, buffer)
                })
            })
            .collect();
        for handle in handles {
            let (size, written, buffer) = handle.join().unwrap();
            if size == 0 {
                eprintln!("skipping thread result: icon went away mid-test");
                continue;
            }
            assert_eq!(written, size);
            assert_eq!(&buffer[..8], &PNG_MAGIC);
        }
    }
}
