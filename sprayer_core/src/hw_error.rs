//! Maps `Box<dyn Error>` from collaborator boundaries to typed `SprayerError`.
//!
//! The traits in `sprayer_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `sprayer_hardware::HwError` downcasting.

use crate::error::SprayerError;

/// Map a camera/output failure to a typed `SprayerError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SprayerError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<sprayer_hardware::error::HwError>() {
            return match hw {
                sprayer_hardware::error::HwError::Released => {
                    SprayerError::State(hw.to_string())
                }
                other => SprayerError::Device(other.to_string()),
            };
        }
    }
    SprayerError::Device(e.to_string())
}

/// Map a detector/severity-model failure. Inference errors are handled like
/// device errors by the loop but keep their own variant for reporting.
pub fn map_model_error(e: &(dyn std::error::Error + 'static)) -> SprayerError {
    SprayerError::ModelInference(e.to_string())
}
