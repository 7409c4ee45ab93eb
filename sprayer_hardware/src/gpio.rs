use rppal::gpio::{Gpio, OutputPin};
use sprayer_traits::{BoxError, OutputDriver};
use tracing::{debug, info};

use crate::error::{HwError, Result};

/// Relay on a BCM pin. Relay boards are commonly active-low: driving the
/// pin low closes the valve circuit.
pub struct GpioOutput {
    pin: Option<OutputPin>,
    active_low: bool,
    bcm: u8,
}

impl GpioOutput {
    pub fn new(bcm: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(bcm)
            .map_err(|e| HwError::Gpio(format!("open pin {bcm}: {e}")))?
            .into_output();
        // Leave the pin in its de-energized level when dropped instead of
        // reverting to an input, which would float an active-low relay.
        pin.set_reset_on_drop(false);
        let mut out = Self {
            pin: Some(pin),
            active_low,
            bcm,
        };
        out.drive(false)?;
        Ok(out)
    }

    fn drive(&mut self, on: bool) -> Result<()> {
        let pin = self.pin.as_mut().ok_or(HwError::Released)?;
        let level_high = on != self.active_low;
        if level_high {
            pin.set_high();
        } else {
            pin.set_low();
        }
        debug!(pin = self.bcm, on, level_high, "gpio drive");
        Ok(())
    }
}

impl OutputDriver for GpioOutput {
    fn set_energized(&mut self, on: bool) -> std::result::Result<(), BoxError> {
        if self.pin.is_none() && !on {
            return Ok(());
        }
        self.drive(on).map_err(Into::into)
    }

    fn release(&mut self) -> std::result::Result<(), BoxError> {
        if self.pin.is_some() {
            self.drive(false)?;
            self.pin = None;
            info!(pin = self.bcm, "gpio released");
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "gpio"
    }
}

impl Drop for GpioOutput {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
