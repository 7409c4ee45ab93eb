//! Detection filter: class → geometry → rank and cap.
//!
//! Pure and deterministic. Malformed detections (non-finite or out-of-range
//! score, degenerate or out-of-frame box) are rejected one by one and counted;
//! they never abort the rest of the set.
use sprayer_traits::Detection;

use crate::config::FilterCfg;
use crate::error::SprayerError;

/// Added to the box height before dividing so flat boxes cannot divide by zero.
pub const ASPECT_EPSILON: f32 = 1e-6;

/// Result of one filter pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtered {
    /// Kept detections, descending score, at most `max_leaves`.
    pub detections: Vec<Detection>,
    /// Detections dropped as malformed.
    pub invalid: usize,
}

#[derive(Debug, Clone)]
pub struct DetectionFilter {
    cfg: FilterCfg,
}

impl DetectionFilter {
    pub fn new(cfg: FilterCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &FilterCfg {
        &self.cfg
    }

    /// Check a single detection against the frame it came from.
    pub fn validate(det: &Detection, width: u32, height: u32) -> Result<(), SprayerError> {
        if !det.score.is_finite() || !(0.0..=1.0).contains(&det.score) {
            return Err(SprayerError::Validation(format!(
                "score {} outside [0, 1]",
                det.score
            )));
        }
        if !det.bbox.is_valid() {
            return Err(SprayerError::Validation(format!(
                "degenerate box {:?}",
                det.bbox
            )));
        }
        if !det.bbox.fits_within(width, height) {
            return Err(SprayerError::Validation(format!(
                "box {:?} outside {width}x{height} frame",
                det.bbox
            )));
        }
        Ok(())
    }

    /// Class predicate; an empty relevant set keeps everything.
    pub fn is_relevant(&self, det: &Detection) -> bool {
        self.cfg.relevant_classes.is_empty() || self.cfg.relevant_classes.contains(&det.class_id)
    }

    /// Area-fraction and aspect-ratio predicate.
    pub fn passes_geometry(&self, det: &Detection, image_area: u64) -> bool {
        if image_area == 0 {
            return false;
        }
        let area_frac = det.bbox.area() as f64 / image_area as f64;
        if area_frac < f64::from(self.cfg.min_area_frac)
            || area_frac > f64::from(self.cfg.max_area_frac)
        {
            return false;
        }
        let aspect = aspect_ratio(det);
        aspect >= self.cfg.min_aspect && aspect <= self.cfg.max_aspect
    }

    /// Run the full filter over one frame's raw detections.
    pub fn apply(&self, raw: &[Detection], width: u32, height: u32) -> Filtered {
        let image_area = u64::from(width) * u64::from(height);
        let mut invalid = 0usize;
        let mut kept: Vec<Detection> = raw
            .iter()
            .filter(|d| match Self::validate(d, width, height) {
                Ok(()) => true,
                Err(e) => {
                    invalid += 1;
                    tracing::warn!(error = %e, class_id = d.class_id, "detection rejected");
                    false
                }
            })
            .filter(|d| self.is_relevant(d))
            .filter(|d| self.passes_geometry(d, image_area))
            .copied()
            .collect();
        // sort_by is stable: equal scores keep their input order
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(self.cfg.max_leaves);
        tracing::debug!(raw = raw.len(), kept = kept.len(), invalid, "detections filtered");
        Filtered {
            detections: kept,
            invalid,
        }
    }
}

#[inline]
pub fn aspect_ratio(det: &Detection) -> f32 {
    det.bbox.width() as f32 / (det.bbox.height() as f32 + ASPECT_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprayer_traits::BoundingBox;

    fn det(class_id: u32, x1: u32, y1: u32, x2: u32, y2: u32, score: f32) -> Detection {
        Detection::new(class_id, BoundingBox::new(x1, y1, x2, y2), score)
    }

    #[test]
    fn class_filter_keeps_only_relevant() {
        let f = DetectionFilter::new(FilterCfg {
            relevant_classes: vec![1],
            ..FilterCfg::default()
        });
        let out = f.apply(
            &[det(0, 0, 0, 100, 100, 0.9), det(1, 0, 0, 100, 100, 0.8)],
            640,
            480,
        );
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].class_id, 1);
    }

    #[test]
    fn empty_class_set_keeps_all() {
        let f = DetectionFilter::new(FilterCfg::default());
        let out = f.apply(
            &[det(0, 0, 0, 100, 100, 0.9), det(7, 100, 100, 200, 200, 0.8)],
            640,
            480,
        );
        assert_eq!(out.detections.len(), 2);
    }

    #[test]
    fn rejects_tiny_and_huge_boxes() {
        let f = DetectionFilter::new(FilterCfg::default());
        // 640x480 = 307200; 1% = 3072, 50% = 153600
        let tiny = det(0, 0, 0, 50, 50, 0.9); // 2500
        let huge = det(0, 0, 0, 640, 400, 0.9); // 256000
        let ok = det(0, 0, 0, 100, 100, 0.5);
        let out = f.apply(&[tiny, huge, ok], 640, 480);
        assert_eq!(out.detections, vec![ok]);
    }

    #[test]
    fn rejects_slivers() {
        let f = DetectionFilter::new(FilterCfg::default());
        let wide = det(0, 0, 0, 400, 100, 0.9); // aspect 4.0
        let tall = det(0, 0, 0, 60, 300, 0.9); // aspect 0.2
        let out = f.apply(&[wide, tall], 640, 480);
        assert!(out.detections.is_empty());
    }

    #[test]
    fn ranks_and_caps_with_stable_ties() {
        let f = DetectionFilter::new(FilterCfg {
            max_leaves: 3,
            ..FilterCfg::default()
        });
        let a = det(0, 0, 0, 100, 100, 0.5);
        let b = det(0, 10, 10, 110, 110, 0.9);
        let c = det(0, 20, 20, 120, 120, 0.5);
        let d = det(0, 30, 30, 130, 130, 0.7);
        let e = det(0, 40, 40, 140, 140, 0.5);
        let out = f.apply(&[a, b, c, d, e], 640, 480);
        assert_eq!(out.detections, vec![b, d, a]);
    }

    #[test]
    fn malformed_items_are_counted_not_fatal() {
        let f = DetectionFilter::new(FilterCfg::default());
        let good = det(0, 0, 0, 100, 100, 0.6);
        let nan = det(0, 0, 0, 100, 100, f32::NAN);
        let above_one = det(0, 0, 0, 100, 100, 1.5);
        let outside = det(0, 600, 0, 700, 100, 0.9);
        let degenerate = det(0, 50, 50, 50, 90, 0.9);
        let out = f.apply(&[nan, good, above_one, outside, degenerate], 640, 480);
        assert_eq!(out.detections, vec![good]);
        assert_eq!(out.invalid, 4);
    }

    #[test]
    fn zero_height_aspect_is_finite() {
        let d = det(0, 0, 10, 10, 10, 0.5);
        assert!(aspect_ratio(&d).is_finite());
    }
}
