use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("output already released")]
    Released,
}

pub type Result<T> = std::result::Result<T, HwError>;
