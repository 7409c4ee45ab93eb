use thiserror::Error;

/// Failure taxonomy of the decision pipeline.
///
/// How the scheduler reacts:
/// - `Validation`: drop the offending item, keep going with the cycle.
/// - `Device` / `ModelInference`: skip the cycle, force the relay off, retry next cycle.
/// - `Config`: fatal before any hardware is touched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SprayerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("model inference error: {0}")]
    ModelInference(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

impl SprayerError {
    /// Errors that cost the current cycle but not the loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Device(_) | Self::ModelInference(_))
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing camera")]
    MissingCamera,
    #[error("missing leaf detector")]
    MissingDetector,
    #[error("missing severity model")]
    MissingSeverityModel,
    #[error("missing output driver")]
    MissingOutput,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
