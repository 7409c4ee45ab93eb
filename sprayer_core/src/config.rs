//! Runtime configuration for the decision pipeline.
//!
//! These are the structs the components are built from. They are separate
//! from the TOML-deserialized config in `sprayer_config`; see `conversions`.
use std::time::Duration;

use crate::policy::Band;

/// Detection filter settings.
#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// Classes kept by the class filter; empty keeps every class.
    pub relevant_classes: Vec<u32>,
    /// Cap on leaves per frame after ranking.
    pub max_leaves: usize,
    /// Reject boxes smaller than this fraction of the image area.
    pub min_area_frac: f32,
    /// Reject boxes larger than this fraction of the image area.
    pub max_area_frac: f32,
    /// Accepted width/height band, inclusive.
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            relevant_classes: Vec::new(),
            max_leaves: 5,
            min_area_frac: 0.01,
            max_area_frac: 0.50,
            min_aspect: 0.3,
            max_aspect: 3.0,
        }
    }
}

/// Temporal stabilizer settings.
#[derive(Debug, Clone)]
pub struct StabilizerCfg {
    /// Detection sets retained in the history window.
    pub history_len: usize,
}

impl Default for StabilizerCfg {
    fn default() -> Self {
        Self { history_len: 3 }
    }
}

/// Decision policy selection.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyCfg {
    /// Ascending severity bands with increasing spray time.
    Graduated { bands: Vec<Band> },
    /// Spray `amount_secs` for any severity above zero.
    Binary { amount_secs: f32 },
}

impl Default for PolicyCfg {
    fn default() -> Self {
        Self::Graduated {
            bands: Band::standard().to_vec(),
        }
    }
}

/// Actuator safety limits.
#[derive(Debug, Clone)]
pub struct ActuatorCfg {
    /// Hard cap on a single hold.
    pub max_duration: Duration,
    /// Minimum gap between de-energizing and the next energize.
    pub cooldown: Duration,
    /// Granularity at which a hold checks for cancellation.
    pub hold_tick: Duration,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(20),
            cooldown: Duration::from_secs(60),
            hold_tick: Duration::from_millis(50),
        }
    }
}

/// Cycle scheduler cadence and leaf-crop guard.
#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    /// Minimum spacing between inference cycles.
    pub capture_interval: Duration,
    /// Pause between ticks (live-view cadence).
    pub frame_interval: Duration,
    /// Crops with a side shorter than this are not scored.
    pub min_crop_side_px: u32,
    /// When false the relay is never driven; decisions are still logged.
    pub actuation_enabled: bool,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_secs(10),
            frame_interval: Duration::from_millis(30),
            min_crop_side_px: 64,
            actuation_enabled: false,
        }
    }
}
