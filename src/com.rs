use std::sync::OnceLock;

use log::{debug, info};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};

use crate::error::{Error, Result};

/// RAII guard over a COM apartment, ensuring the init/uninit calls stay
/// balanced: `CoUninitialize` runs in `Drop` only when initialization
/// actually succeeded on this thread.
pub struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    /// Enters a single-threaded apartment on the calling thread. The virtual
    /// desktop broker requires STA affinity; the apartment belongs to this
    /// thread for the guard's lifetime.
    pub fn initialize() -> Result<Self> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_ok() {
            Ok(Self { initialized: true })
        } else {
            debug!("CoInitializeEx failed: {:?}", hr);
            Err(Error::ServiceUnavailable)
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Process-wide COM session. Initialized at most once, on the first call that
/// needs the broker; released at process exit. A failed initialization is
/// sticky, so every later dependent call reports `ServiceUnavailable`.
///
/// The apartment is bound to whichever thread made the first call. Callers
/// are responsible for keeping subsequent calls apartment-compatible; this
/// is not validated here.
pub struct ComRuntime {
    _apartment: ComApartment,
}

impl ComRuntime {
    fn init() -> Result<Self> {
        info!("initializing process-wide COM apartment (STA)");
        Ok(Self {
            _apartment: ComApartment::initialize()?,
        })
    }
}

static RUNTIME: OnceLock<Option<ComRuntime>> = OnceLock::new();

/// The process-wide runtime singleton. Components that talk to the broker
/// take this by reference rather than reaching for ambient global state.
pub fn runtime() -> Result<&'static ComRuntime> {
    RUNTIME
        .get_or_init(|| ComRuntime::init().ok())
        .as_ref()
        .ok_or(Error::ServiceUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_sticky() {
        let first = runtime().is_ok();
        let second = runtime().is_ok();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_apartment_guard_balances() {
        // The runtime may already hold the apartment; a nested guard on the
        // same thread must still init and release cleanly.
        let _ = runtime();
        let guard = ComApartment::initialize();
        assert!(guard.is_ok());
        drop(guard);
        let again = ComApartment::initialize();
        assert!(again.is_ok());
    }
}
