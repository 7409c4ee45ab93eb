//! Collaborator contracts for the spray controller.
//!
//! Everything the decision pipeline talks to (camera, detector, severity
//! model, output driver) is reached through these traits so the core can run
//! against real devices, simulators, or test doubles without changes.
pub mod clock;
pub mod frame;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use frame::{BoundingBox, Detection, Frame};

/// Error type crossing every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait Camera {
    /// Grab the latest frame. `Ok(None)` means "no frame right now" and is not fatal.
    fn capture(&mut self) -> Result<Option<Frame>, BoxError>;
    fn release(&mut self) -> Result<(), BoxError>;
}

pub trait LeafDetector {
    /// Raw detections for `frame`. Boxes are clamped to the frame and never degenerate.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError>;
}

pub trait SeverityModel {
    /// Infected area of a leaf crop in percent, `0.0..=100.0`.
    fn estimate(&mut self, leaf: &Frame) -> Result<f32, BoxError>;
}

pub trait OutputDriver {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError>;
    fn release(&mut self) -> Result<(), BoxError>;
    /// Short backend name for logs ("gpio", "sim").
    fn backend(&self) -> &'static str {
        "unknown"
    }
}

impl<T: OutputDriver + ?Sized> OutputDriver for Box<T> {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        (**self).set_energized(on)
    }
    fn release(&mut self) -> Result<(), BoxError> {
        (**self).release()
    }
    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn capture(&mut self) -> Result<Option<Frame>, BoxError> {
        (**self).capture()
    }
    fn release(&mut self) -> Result<(), BoxError> {
        (**self).release()
    }
}

impl<T: LeafDetector + ?Sized> LeafDetector for Box<T> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        (**self).detect(frame)
    }
}

impl<T: SeverityModel + ?Sized> SeverityModel for Box<T> {
    fn estimate(&mut self, leaf: &Frame) -> Result<f32, BoxError> {
        (**self).estimate(leaf)
    }
}
