use thiserror::Error;
use windows::core::HRESULT;
use windows::Win32::Foundation::{CO_E_NOTINITIALIZED, E_FAIL, E_INVALIDARG};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A required argument was null or absent.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The COM runtime or the virtual desktop broker could not be reached.
    #[error("desktop broker unavailable")]
    ServiceUnavailable,

    /// OS-reported failure, carried through with its original status code.
    #[error(transparent)]
    Com(#[from] windows::core::Error),

    /// The icon could not be rendered or encoded.
    #[error("icon encoding failed: {0}")]
    Encode(String),
}

impl Error {
    /// Status code surfaced to the foreign caller.
    pub fn to_hresult(&self) -> HRESULT {
        match self {
            Error::InvalidArgument(_) => E_INVALIDARG,
            Error::ServiceUnavailable => CO_E_NOTINITIALIZED,
            Error::Com(e) => e.code(),
            Error::Encode(_) => E_FAIL,
        }
    }
}
