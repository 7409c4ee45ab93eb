//! Software stand-ins for every device, used off-target and in tests.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use sprayer_traits::{
    BoundingBox, BoxError, Camera, Detection, Frame, LeafDetector, OutputDriver, SeverityModel,
};
use tracing::{debug, info, warn};

use crate::error::HwError;

/// Leaf tissue colour painted by the simulated camera.
const LEAF_RGB: [u8; 3] = [46, 139, 60];
/// Lesion colour; red dominates green so the severity stand-in counts it.
const LESION_RGB: [u8; 3] = [139, 90, 43];

/// Tiny xorshift PRNG so simulations are reproducible without extra deps.
#[derive(Debug, Clone)]
struct XorShift(u32);

impl XorShift {
    fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    fn range(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        lo + self.next_u32() % (hi - lo)
    }
}

/// Observable state of a [`SimulatedOutput`], cloneable into tests.
#[derive(Debug, Clone, Default)]
pub struct OutputMonitor {
    energized: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    activations: Arc<AtomicU32>,
}

impl OutputMonitor {
    pub fn is_energized(&self) -> bool {
        self.energized.load(Ordering::SeqCst)
    }
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
    /// Number of off→on transitions seen so far.
    pub fn activations(&self) -> u32 {
        self.activations.load(Ordering::SeqCst)
    }
}

/// Relay stand-in that only logs.
#[derive(Debug)]
pub struct SimulatedOutput {
    pin: u8,
    monitor: OutputMonitor,
}

impl SimulatedOutput {
    pub fn new(pin: u8) -> Self {
        info!(pin, "simulated output initialized (no gpio)");
        Self {
            pin,
            monitor: OutputMonitor::default(),
        }
    }

    pub fn monitor(&self) -> OutputMonitor {
        self.monitor.clone()
    }
}

impl OutputDriver for SimulatedOutput {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        if on && self.monitor.is_released() {
            return Err(HwError::Released.into());
        }
        let was = self.monitor.energized.swap(on, Ordering::SeqCst);
        if on && !was {
            self.monitor.activations.fetch_add(1, Ordering::SeqCst);
        }
        debug!(pin = self.pin, on, "simulated output");
        Ok(())
    }

    fn release(&mut self) -> Result<(), BoxError> {
        self.monitor.energized.store(false, Ordering::SeqCst);
        if !self.monitor.released.swap(true, Ordering::SeqCst) {
            info!(pin = self.pin, "simulated output released");
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sim"
    }
}

/// Synthetic camera painting a leaf-green scene with lesion blotches whose
/// coverage drifts from frame to frame.
#[derive(Debug)]
pub struct SimulatedCamera {
    device_id: u32,
    width: u32,
    height: u32,
    rng: XorShift,
    drop_every: Option<u32>,
    captured: u32,
    released: bool,
}

impl SimulatedCamera {
    /// Opens the camera and discards `warmup_frames` like a real sensor settling.
    pub fn new(width: u32, height: u32, warmup_frames: u32, seed: u32) -> Self {
        let mut cam = Self {
            device_id: 0,
            width,
            height,
            rng: XorShift::new(seed),
            drop_every: None,
            captured: 0,
            released: false,
        };
        for _ in 0..warmup_frames {
            let _ = cam.render();
        }
        info!(width, height, warmup_frames, "simulated camera ready");
        cam
    }

    /// Index of the capture device this camera stands in for.
    pub fn with_device_id(mut self, device_id: u32) -> Self {
        debug!(device_id, "simulated camera bound to device");
        self.device_id = device_id;
        self
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Return `None` from every `n`th capture to exercise the skip path.
    pub fn with_dropped_frames(mut self, n: u32) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    fn render(&mut self) -> Frame {
        let mut frame_rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        let blotches = self.rng.range(0, 12);
        let radius = (self.width.min(self.height) / 12).max(1);
        let centers: Vec<(u32, u32)> = (0..blotches)
            .map(|_| (self.rng.range(0, self.width), self.rng.range(0, self.height)))
            .collect();
        for y in 0..self.height {
            for x in 0..self.width {
                let hit = centers
                    .iter()
                    .any(|&(cx, cy)| x.abs_diff(cx) <= radius && y.abs_diff(cy) <= radius);
                frame_rgb.extend_from_slice(if hit { &LESION_RGB } else { &LEAF_RGB });
            }
        }
        Frame::from_rgb(self.width, self.height, frame_rgb)
            .unwrap_or_else(|| Frame::filled(self.width, self.height, LEAF_RGB))
    }
}

impl Camera for SimulatedCamera {
    fn capture(&mut self) -> Result<Option<Frame>, BoxError> {
        if self.released {
            return Err(HwError::CameraUnavailable(format!(
                "camera {} released",
                self.device_id
            ))
            .into());
        }
        self.captured = self.captured.wrapping_add(1);
        if let Some(n) = self.drop_every
            && self.captured % n == 0
        {
            warn!(frame = self.captured, "simulated camera dropped a frame");
            return Ok(None);
        }
        Ok(Some(self.render()))
    }

    fn release(&mut self) -> Result<(), BoxError> {
        if !self.released {
            self.released = true;
            info!(device_id = self.device_id, "simulated camera released");
        }
        Ok(())
    }
}

/// Detector stand-in producing random but plausible leaf boxes.
#[derive(Debug)]
pub struct SimulatedDetector {
    rng: XorShift,
    base_confidence: f32,
    classes: u32,
}

impl SimulatedDetector {
    pub fn new(base_confidence: f32, seed: u32) -> Self {
        Self {
            rng: XorShift::new(seed),
            base_confidence,
            classes: 2,
        }
    }
}

impl LeafDetector for SimulatedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        let (w, h) = (frame.width(), frame.height());
        let n = self.rng.range(0, 9);
        let mut out = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let bw = i64::from(self.rng.range(w / 20 + 1, w / 2 + 2));
            let bh = i64::from(self.rng.range(h / 20 + 1, h / 2 + 2));
            let x1 = i64::from(self.rng.range(0, w)) - bw / 4;
            let y1 = i64::from(self.rng.range(0, h)) - bh / 4;
            let score = self.rng.next_f32();
            if score < self.base_confidence {
                continue;
            }
            let class_id = self.rng.range(0, self.classes);
            if let Some(bbox) = BoundingBox::clamped(x1, y1, x1 + bw, y1 + bh, w, h) {
                out.push(Detection::new(class_id, bbox, score));
            }
        }
        Ok(out)
    }
}

/// Severity stand-in: share of pixels where red dominates green, in percent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedSeverity;

impl SeverityModel for SimulatedSeverity {
    fn estimate(&mut self, leaf: &Frame) -> Result<f32, BoxError> {
        if leaf.is_empty() {
            return Ok(0.0);
        }
        let lesion = leaf
            .pixels()
            .chunks_exact(Frame::CHANNELS)
            .filter(|px| px[0] > px[1])
            .count();
        Ok(lesion as f32 / leaf.area() as f32 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_output_tracks_activations() {
        let mut out = SimulatedOutput::new(4);
        let monitor = out.monitor();
        out.set_energized(true).unwrap();
        out.set_energized(true).unwrap();
        out.set_energized(false).unwrap();
        out.set_energized(true).unwrap();
        assert_eq!(monitor.activations(), 2);
        assert!(monitor.is_energized());
    }

    #[test]
    fn released_output_refuses_to_energize() {
        let mut out = SimulatedOutput::new(4);
        out.release().unwrap();
        assert!(out.set_energized(true).is_err());
        assert!(out.set_energized(false).is_ok());
        assert!(out.release().is_ok());
    }

    #[test]
    fn severity_counts_lesion_pixels() {
        let mut model = SimulatedSeverity;
        let leaf = Frame::filled(4, 4, LEAF_RGB);
        assert_eq!(model.estimate(&leaf).unwrap(), 0.0);
        let lesion = Frame::filled(4, 4, LESION_RGB);
        assert_eq!(model.estimate(&lesion).unwrap(), 100.0);
    }

    #[test]
    fn detector_boxes_stay_inside_frame() {
        let frame = Frame::filled(64, 48, LEAF_RGB);
        let mut det = SimulatedDetector::new(0.0, 7);
        for _ in 0..50 {
            for d in det.detect(&frame).unwrap() {
                assert!(d.bbox.is_valid());
                assert!(d.bbox.fits_within(64, 48));
                assert!((0.0..1.0).contains(&d.score));
            }
        }
    }

    #[test]
    fn camera_drops_every_nth_frame() {
        let mut cam = SimulatedCamera::new(8, 8, 0, 3).with_dropped_frames(2);
        assert!(cam.capture().unwrap().is_some());
        assert!(cam.capture().unwrap().is_none());
        assert!(cam.capture().unwrap().is_some());
    }
}
