//! Plant-level severity from per-leaf readings.
use sprayer_traits::BoundingBox;

use crate::error::SprayerError;

/// Lower edges of severity levels 1, 2 and 3 (percent).
pub const LEVEL_EDGES: [f32; 3] = [5.0, 25.0, 50.0];

/// Aggregate infection across the leaves scored in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlantSeverity {
    /// Mean infected area in percent.
    pub percent: f32,
    /// Discrete level 0..=3.
    pub level: u8,
    /// Number of leaf readings behind `percent`.
    pub leaves: usize,
}

impl PlantSeverity {
    pub fn from_readings(readings: &[f32]) -> Self {
        let percent = aggregate(readings);
        Self {
            percent,
            level: severity_level(percent),
            leaves: readings.len(),
        }
    }
}

/// Arithmetic mean; no readings means no detectable severity (0.0), not an error.
pub fn aggregate(readings: &[f32]) -> f32 {
    if readings.is_empty() {
        return 0.0;
    }
    let sum: f64 = readings.iter().map(|&r| f64::from(r)).sum();
    (sum / readings.len() as f64) as f32
}

/// 0: < 5 %, 1: 5–25 %, 2: 25–50 %, 3: ≥ 50 %.
pub fn severity_level(percent: f32) -> u8 {
    LEVEL_EDGES.iter().filter(|&&edge| percent >= edge).count() as u8
}

/// Whether a leaf box is large enough to be worth scoring.
pub fn crop_is_scorable(bbox: &BoundingBox, min_side_px: u32) -> bool {
    bbox.area() > 0 && bbox.width().min(bbox.height()) >= min_side_px
}

/// Accept a model reading only when it is a finite percentage.
pub fn validate_reading(percent: f32) -> Result<f32, SprayerError> {
    if percent.is_finite() && (0.0..=100.0).contains(&percent) {
        Ok(percent)
    } else {
        Err(SprayerError::Validation(format!(
            "severity reading {percent} outside [0, 100]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(aggregate(&[]), 0.0);
        assert_eq!(PlantSeverity::from_readings(&[]), PlantSeverity::default());
    }

    #[test]
    fn mean_of_readings() {
        assert_eq!(aggregate(&[10.0, 30.0]), 20.0);
        let p = PlantSeverity::from_readings(&[20.0, 40.0, 60.0]);
        assert_eq!(p.percent, 40.0);
        assert_eq!(p.level, 2);
        assert_eq!(p.leaves, 3);
    }

    #[test]
    fn levels_share_policy_edges() {
        assert_eq!(severity_level(0.0), 0);
        assert_eq!(severity_level(4.99), 0);
        assert_eq!(severity_level(5.0), 1);
        assert_eq!(severity_level(24.9), 1);
        assert_eq!(severity_level(25.0), 2);
        assert_eq!(severity_level(50.0), 3);
        assert_eq!(severity_level(100.0), 3);
    }

    #[test]
    fn narrow_crops_are_not_scorable() {
        assert!(crop_is_scorable(&BoundingBox::new(0, 0, 64, 64), 64));
        assert!(!crop_is_scorable(&BoundingBox::new(0, 0, 63, 200), 64));
        assert!(!crop_is_scorable(&BoundingBox::new(0, 0, 200, 10), 64));
        assert!(!crop_is_scorable(&BoundingBox::new(5, 5, 5, 5), 0));
    }

    #[test]
    fn readings_are_range_checked() {
        assert_eq!(validate_reading(42.0), Ok(42.0));
        assert!(validate_reading(-0.1).is_err());
        assert!(validate_reading(100.5).is_err());
        assert!(validate_reading(f32::NAN).is_err());
    }
}
