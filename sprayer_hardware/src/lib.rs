//! Device backends for the spray controller.
//!
//! - `sim`: software stand-ins for the camera, detector, severity model and
//!   output relay. Always available.
//! - `gpio`: relay output on a Raspberry Pi pin via `rppal` (feature `hardware`).
//!
//! [`detect_output`] picks the output backend once at startup.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use sim::{
    OutputMonitor, SimulatedCamera, SimulatedDetector, SimulatedOutput, SimulatedSeverity,
};

use sprayer_traits::OutputDriver;

/// Select the relay backend by probing the environment.
///
/// With the `hardware` feature on Linux the GPIO pin is claimed; when that
/// fails (not a Pi, no permission) or the feature is off, a logging simulator
/// is returned instead. The controller never needs to know which one it got.
pub fn detect_output(pin: u8, active_low: bool) -> Box<dyn OutputDriver> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        match gpio::GpioOutput::new(pin, active_low) {
            Ok(out) => {
                tracing::info!(pin, active_low, "gpio output initialized (safe OFF)");
                return Box::new(out);
            }
            Err(e) => {
                tracing::warn!(
                    pin,
                    error = %e,
                    "gpio unavailable; falling back to simulated output"
                );
            }
        }
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let _ = active_low;
        tracing::info!(pin, "built without gpio support; using simulated output");
    }
    Box::new(SimulatedOutput::new(pin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn detect_output_falls_back_to_sim() {
        let mut out = detect_output(17, true);
        assert_eq!(out.backend(), "sim");
        out.set_energized(true).unwrap();
        out.set_energized(false).unwrap();
        out.release().unwrap();
    }
}
