//! Spray decision policies.
//!
//! Two policies exist and are kept deliberately separate, selected through
//! `PolicyCfg`:
//! - [`GraduatedPolicy`] (default): severity bands map to longer sprays.
//! - [`BinaryPolicy`]: any non-zero severity triggers one fixed spray.
use std::fmt;
use std::time::Duration;

use crate::config::PolicyCfg;
use crate::error::SprayerError;
use crate::util::secs_f32;

/// What the actuator is asked to do this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprayDecision {
    pub spray: bool,
    pub amount_secs: f32,
}

impl SprayDecision {
    pub const NONE: Self = Self {
        spray: false,
        amount_secs: 0.0,
    };

    pub fn spray_for(amount_secs: f32) -> Self {
        if amount_secs > 0.0 {
            Self {
                spray: true,
                amount_secs,
            }
        } else {
            Self::NONE
        }
    }

    /// Requested hold as a `Duration` (zero when not spraying).
    pub fn amount(&self) -> Duration {
        if self.spray {
            secs_f32(self.amount_secs)
        } else {
            Duration::ZERO
        }
    }
}

impl fmt::Display for SprayDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spray {
            write!(f, "spray {:.1}s", self.amount_secs)
        } else {
            f.write_str("no spray")
        }
    }
}

/// One graduated band: severities at or above `min_percent` (up to the next
/// band) spray for `amount_secs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min_percent: f32,
    pub amount_secs: f32,
}

impl Band {
    /// [5, 25) → 5 s, [25, 50) → 10 s, [50, ∞) → 20 s.
    pub const fn standard() -> [Band; 3] {
        [
            Band {
                min_percent: 5.0,
                amount_secs: 5.0,
            },
            Band {
                min_percent: 25.0,
                amount_secs: 10.0,
            },
            Band {
                min_percent: 50.0,
                amount_secs: 20.0,
            },
        ]
    }
}

/// Strategy interface shared by every policy.
pub trait SprayPolicy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Pure mapping from plant severity (percent) to a decision.
    fn decide(&self, severity_percent: f32) -> Result<SprayDecision, SprayerError>;
}

fn check_input(severity_percent: f32) -> Result<(), SprayerError> {
    if severity_percent.is_finite() && severity_percent >= 0.0 {
        Ok(())
    } else {
        Err(SprayerError::Validation(format!(
            "plant severity {severity_percent} must be finite and >= 0"
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraduatedPolicy {
    bands: Vec<Band>,
}

impl GraduatedPolicy {
    /// Bands are sorted ascending by `min_percent`.
    pub fn new(mut bands: Vec<Band>) -> Self {
        bands.sort_by(|a, b| a.min_percent.total_cmp(&b.min_percent));
        Self { bands }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }
}

impl Default for GraduatedPolicy {
    fn default() -> Self {
        Self::new(Band::standard().to_vec())
    }
}

impl SprayPolicy for GraduatedPolicy {
    fn name(&self) -> &'static str {
        "graduated"
    }

    fn decide(&self, severity_percent: f32) -> Result<SprayDecision, SprayerError> {
        check_input(severity_percent)?;
        Ok(self
            .bands
            .iter()
            .rev()
            .find(|b| severity_percent >= b.min_percent)
            .map_or(SprayDecision::NONE, |b| SprayDecision::spray_for(b.amount_secs)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryPolicy {
    amount_secs: f32,
}

impl BinaryPolicy {
    pub fn new(amount_secs: f32) -> Self {
        Self { amount_secs }
    }
}

impl Default for BinaryPolicy {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl SprayPolicy for BinaryPolicy {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn decide(&self, severity_percent: f32) -> Result<SprayDecision, SprayerError> {
        check_input(severity_percent)?;
        if severity_percent <= 0.0 {
            return Ok(SprayDecision::NONE);
        }
        Ok(SprayDecision::spray_for(self.amount_secs))
    }
}

/// Instantiate the configured policy.
pub fn from_cfg(cfg: &PolicyCfg) -> Box<dyn SprayPolicy> {
    match cfg {
        PolicyCfg::Graduated { bands } => Box::new(GraduatedPolicy::new(bands.clone())),
        PolicyCfg::Binary { amount_secs } => Box::new(BinaryPolicy::new(*amount_secs)),
    }
}
