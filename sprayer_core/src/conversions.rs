//! `From` implementations bridging `sprayer_config` types to `sprayer_core` types.

use crate::config::{ActuatorCfg, FilterCfg, PolicyCfg, SchedulerCfg, StabilizerCfg};
use crate::policy::Band;
use crate::util::{secs_f32, secs_f64};

// ── FilterCfg ────────────────────────────────────────────────────────────────

impl From<&sprayer_config::DetectionCfg> for FilterCfg {
    fn from(c: &sprayer_config::DetectionCfg) -> Self {
        Self {
            relevant_classes: c.infected_class_ids.clone(),
            max_leaves: c.max_leaves_per_frame,
            min_area_frac: c.min_area_frac,
            max_area_frac: c.max_area_frac,
            min_aspect: c.min_aspect,
            max_aspect: c.max_aspect,
        }
    }
}

// ── StabilizerCfg ────────────────────────────────────────────────────────────

impl From<&sprayer_config::StabilizerCfg> for StabilizerCfg {
    fn from(c: &sprayer_config::StabilizerCfg) -> Self {
        Self {
            history_len: c.history_len,
        }
    }
}

// ── PolicyCfg ────────────────────────────────────────────────────────────────

impl From<&sprayer_config::PolicyCfg> for PolicyCfg {
    fn from(c: &sprayer_config::PolicyCfg) -> Self {
        match c.kind {
            sprayer_config::PolicyKind::Graduated => Self::Graduated {
                bands: c
                    .bands
                    .iter()
                    .map(|&(min_percent, amount_secs)| Band {
                        min_percent,
                        amount_secs,
                    })
                    .collect(),
            },
            sprayer_config::PolicyKind::Binary => Self::Binary {
                amount_secs: c.binary_amount_sec,
            },
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&sprayer_config::Sprinkler> for ActuatorCfg {
    fn from(c: &sprayer_config::Sprinkler) -> Self {
        Self {
            max_duration: secs_f32(c.max_duration_sec),
            cooldown: secs_f32(c.cooldown_sec),
            ..ActuatorCfg::default()
        }
    }
}

// ── SchedulerCfg ─────────────────────────────────────────────────────────────

impl From<&sprayer_config::Config> for SchedulerCfg {
    fn from(c: &sprayer_config::Config) -> Self {
        Self {
            capture_interval: secs_f64(c.capture_interval_sec),
            frame_interval: std::time::Duration::from_millis(c.display.frame_interval_ms),
            min_crop_side_px: c.severity.min_crop_side_px,
            actuation_enabled: c.sprinkler.enabled,
        }
    }
}
