//! Test doubles for driving the pipeline without devices.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sprayer_traits::{
    BoxError, Camera, Detection, Frame, LeafDetector, OutputDriver, SeverityModel,
};

fn mock_err(msg: &str) -> BoxError {
    Box::new(std::io::Error::other(msg.to_owned()))
}

/// Output that records every `set_energized` call.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    log: Arc<Mutex<Vec<bool>>>,
    releases: Arc<Mutex<u32>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the call log (`true` = energize).
    pub fn log(&self) -> Arc<Mutex<Vec<bool>>> {
        Arc::clone(&self.log)
    }

    pub fn releases(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.releases)
    }
}

impl OutputDriver for RecordingOutput {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(on);
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), BoxError> {
        if let Ok(mut n) = self.releases.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "recording"
    }
}

/// Output whose energize (or every call) fails.
#[derive(Debug, Default)]
pub struct FailingOutput {
    inner: RecordingOutput,
    fail_off: bool,
}

impl FailingOutput {
    /// Energize fails; de-energize and release succeed.
    pub fn on_energize() -> Self {
        Self::default()
    }

    /// Every call fails.
    pub fn always() -> Self {
        Self {
            inner: RecordingOutput::new(),
            fail_off: true,
        }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<bool>>> {
        self.inner.log()
    }
}

impl OutputDriver for FailingOutput {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        self.inner.set_energized(on)?;
        if on || self.fail_off {
            return Err(mock_err("relay driver fault"));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), BoxError> {
        self.inner.release()?;
        if self.fail_off {
            return Err(mock_err("relay driver fault"));
        }
        Ok(())
    }
}

/// One scripted camera step.
#[derive(Debug, Clone)]
pub enum Shot {
    Frame(Frame),
    Nothing,
    Fail(&'static str),
}

/// Camera that replays a script, then repeats `fallback` forever.
#[derive(Debug)]
pub struct ScriptedCamera {
    script: VecDeque<Shot>,
    fallback: Frame,
    released: bool,
}

impl ScriptedCamera {
    pub fn new(fallback: Frame) -> Self {
        Self {
            script: VecDeque::new(),
            fallback,
            released: false,
        }
    }

    pub fn then(mut self, shot: Shot) -> Self {
        self.script.push_back(shot);
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Camera for ScriptedCamera {
    fn capture(&mut self) -> Result<Option<Frame>, BoxError> {
        if self.released {
            return Err(mock_err("camera released"));
        }
        match self.script.pop_front() {
            Some(Shot::Frame(f)) => Ok(Some(f)),
            Some(Shot::Nothing) => Ok(None),
            Some(Shot::Fail(msg)) => Err(mock_err(msg)),
            None => Ok(Some(self.fallback.clone())),
        }
    }

    fn release(&mut self) -> Result<(), BoxError> {
        self.released = true;
        Ok(())
    }
}

/// Detector returning the same detections for every frame.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    pub detections: Vec<Detection>,
    pub fail: bool,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            detections: Vec::new(),
            fail: true,
        }
    }
}

impl LeafDetector for FixedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        if self.fail {
            return Err(mock_err("detector session failed"));
        }
        Ok(self.detections.clone())
    }
}

/// Severity model returning readings in order, repeating the last one.
#[derive(Debug, Clone)]
pub struct FixedSeverity {
    readings: VecDeque<f32>,
    last: f32,
    calls: usize,
}

impl FixedSeverity {
    pub fn new(value: f32) -> Self {
        Self::sequence(vec![value])
    }

    pub fn sequence(readings: Vec<f32>) -> Self {
        let last = readings.last().copied().unwrap_or(0.0);
        Self {
            readings: readings.into(),
            last,
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl SeverityModel for FixedSeverity {
    fn estimate(&mut self, _leaf: &Frame) -> Result<f32, BoxError> {
        self.calls += 1;
        Ok(self.readings.pop_front().unwrap_or(self.last))
    }
}
