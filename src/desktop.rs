use log::info;
use windows::core::GUID;
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL};
use windows::Win32::UI::Shell::{IVirtualDesktopManager, VirtualDesktopManager};
use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

use crate::com::ComRuntime;
use crate::error::{Error, Result};

/// Thin wrapper over the shell's virtual desktop broker. Activated per call
/// and released on drop; holds no state beyond the COM reference.
pub struct DesktopResolver(IVirtualDesktopManager);

impl DesktopResolver {
    pub fn new(_runtime: &ComRuntime) -> Result<Self> {
        info!("activating IVirtualDesktopManager");
        let manager = unsafe { CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_ALL) }
            .map_err(|_| Error::ServiceUnavailable)?;
        Ok(Self(manager))
    }

    /// Resolves the id of the virtual desktop owning `window`. Broker
    /// failures are passed through with their original status code.
    pub fn resolve(&self, window: HWND) -> Result<GUID> {
        if window.0 == 0 {
            return Err(Error::InvalidArgument("window"));
        }
        let id = unsafe { self.0.GetWindowDesktopId(window)? };
        Ok(id)
    }

    /// Desktop currently in front, derived from the foreground window.
    pub fn current_desktop(&self) -> Result<GUID> {
        let foreground = unsafe { GetForegroundWindow() };
        if foreground.0 == 0 {
            return Err(Error::InvalidArgument("foreground window"));
        }
        self.resolve(foreground)
    }
}
