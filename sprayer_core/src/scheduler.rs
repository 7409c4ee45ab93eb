//! The perception-to-actuation loop.
//!
//! Every tick grabs a frame and hands it to the optional [`FrameSink`] with
//! the last overlay. At most once per `capture_interval` a tick also runs a
//! full inference cycle: detect, filter, stabilize, score, decide, actuate.
//! Each cycle runs inside a failure boundary that forces the output off
//! before the loop continues.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sprayer_traits::{
    Camera, Clock, Detection, Frame, LeafDetector, MonotonicClock, OutputDriver, SeverityModel,
};

use crate::actuator::{ActuatorController, ActuatorState, SprayOutcome};
use crate::config::{ActuatorCfg, FilterCfg, PolicyCfg, SchedulerCfg, StabilizerCfg};
use crate::error::{BuildError, Result, SprayerError};
use crate::filter::DetectionFilter;
use crate::hw_error::{map_hw_error, map_model_error};
use crate::policy::{self, SprayDecision, SprayPolicy};
use crate::severity::{PlantSeverity, crop_is_scorable, validate_reading};
use crate::stabilizer::TemporalStabilizer;
use crate::util::ema_fps;

/// What the live view draws on top of each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub boxes: Vec<Detection>,
    pub severity: PlantSeverity,
    pub decision: SprayDecision,
    pub fps: f32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            boxes: Vec::new(),
            severity: PlantSeverity::default(),
            decision: SprayDecision::NONE,
            fps: 0.0,
        }
    }
}

/// Receives every acquired frame. Closures work directly.
pub trait FrameSink {
    fn on_frame(&mut self, frame: &Frame, overlay: &Overlay);
}

impl<F: FnMut(&Frame, &Overlay)> FrameSink for F {
    fn on_frame(&mut self, frame: &Frame, overlay: &Overlay) {
        self(frame, overlay);
    }
}

/// Summary of one completed inference cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub raw_detections: usize,
    pub invalid_detections: usize,
    pub kept: usize,
    pub stable: usize,
    pub scored: usize,
    pub severity: PlantSeverity,
    pub decision: SprayDecision,
    pub outcome: SprayOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Camera had no frame.
    NoFrame,
    /// A transient error ended the cycle; the output was forced off.
    Failed(SprayerError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Frame shown, no inference due.
    Frame,
    Cycle(CycleReport),
    /// An inference cycle was due but did not complete.
    Skipped(SkipReason),
    /// Nothing was acquired on a display-only tick.
    Idle,
}

/// Counters kept across a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub cycles: u64,
    pub skipped: u64,
    pub sprays: u64,
    pub cooldown_rejections: u64,
    pub spray_time: Duration,
}

impl RunStats {
    /// Cycles that were due, completed or not.
    pub fn attempted(&self) -> u64 {
        self.cycles + self.skipped
    }

    fn record(&mut self, outcome: &SprayOutcome) {
        match *outcome {
            SprayOutcome::Sprayed { held, .. } | SprayOutcome::Interrupted { held } => {
                self.sprays += 1;
                self.spray_time += held;
            }
            SprayOutcome::CoolingDown { .. } => self.cooldown_rejections += 1,
            SprayOutcome::NotRequested | SprayOutcome::Cancelled => {}
        }
    }
}

pub struct CycleScheduler<C, D, S, O>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    camera: C,
    detector: D,
    severity_model: S,
    filter: DetectionFilter,
    stabilizer: TemporalStabilizer,
    policy: Box<dyn SprayPolicy>,
    actuator: ActuatorController<O>,
    cfg: SchedulerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
    sink: Option<Box<dyn FrameSink>>,
    last_inference: Option<Instant>,
    last_frame_at: Option<Instant>,
    overlay: Overlay,
    stats: RunStats,
    camera_released: bool,
}

impl<C, D, S, O> core::fmt::Debug for CycleScheduler<C, D, S, O>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("actuator", &self.actuator)
            .field("cfg", &self.cfg)
            .field("stats", &self.stats)
            .field("camera_released", &self.camera_released)
            .finish_non_exhaustive()
    }
}

impl<C, D, S, O> CycleScheduler<C, D, S, O>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    pub fn builder() -> SchedulerBuilder<C, D, S, O> {
        SchedulerBuilder::new()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn fps(&self) -> f32 {
        self.overlay.fps
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn actuator_state(&self) -> ActuatorState {
        self.actuator.state()
    }

    pub fn actuator(&self) -> &ActuatorController<O> {
        &self.actuator
    }

    pub fn stabilizer(&self) -> &TemporalStabilizer {
        &self.stabilizer
    }

    /// Replace the per-frame callback.
    pub fn set_frame_sink(&mut self, sink: impl FrameSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Flag that ends `run` (and any spray hold in progress) once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn inference_due(&self, now: Instant) -> bool {
        self.last_inference
            .is_none_or(|t| now.saturating_duration_since(t) >= self.cfg.capture_interval)
    }

    /// Acquire one frame and, when due, run one inference cycle on it.
    ///
    /// Transient failures come back as `TickOutcome::Skipped`; only errors
    /// the loop cannot recover from are returned as `Err`.
    pub fn tick(&mut self) -> std::result::Result<TickOutcome, SprayerError> {
        let now = self.clock.now();
        let due = self.inference_due(now);

        let frame = match self.camera.capture() {
            Ok(Some(f)) => f,
            Ok(None) => {
                if !due {
                    return Ok(TickOutcome::Idle);
                }
                self.last_inference = Some(now);
                self.stats.skipped += 1;
                tracing::warn!("cycle skipped: camera returned no frame");
                return Ok(TickOutcome::Skipped(SkipReason::NoFrame));
            }
            Err(e) => {
                let err = map_hw_error(e.as_ref());
                if !due {
                    tracing::debug!(error = %err, "frame grab failed");
                    return Ok(TickOutcome::Idle);
                }
                self.last_inference = Some(now);
                return self.fail_cycle(err);
            }
        };

        self.stats.frames += 1;
        if let Some(prev) = self.last_frame_at {
            self.overlay.fps = ema_fps(self.overlay.fps, now.saturating_duration_since(prev));
        }
        self.last_frame_at = Some(now);

        if !due {
            self.emit(&frame);
            return Ok(TickOutcome::Frame);
        }
        self.last_inference = Some(now);

        let outcome = match self.run_cycle(&frame) {
            Ok(report) => {
                self.stats.cycles += 1;
                self.stats.record(&report.outcome);
                Ok(TickOutcome::Cycle(report))
            }
            Err(e) => self.fail_cycle(e),
        };
        self.emit(&frame);
        outcome
    }

    fn emit(&mut self, frame: &Frame) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_frame(frame, &self.overlay);
        }
    }

    /// Failure boundary: output off, then skip or escalate.
    fn fail_cycle(&mut self, err: SprayerError) -> std::result::Result<TickOutcome, SprayerError> {
        if let Err(off) = self.actuator.force_off() {
            tracing::error!(error = %off, "force-off after failed cycle failed");
        }
        if err.is_transient() || matches!(err, SprayerError::Validation(_)) {
            self.stats.skipped += 1;
            tracing::warn!(error = %err, "cycle skipped");
            Ok(TickOutcome::Skipped(SkipReason::Failed(err)))
        } else {
            Err(err)
        }
    }

    /// One full detect → decide → actuate pass over `frame`.
    pub fn run_cycle(&mut self, frame: &Frame) -> std::result::Result<CycleReport, SprayerError> {
        let raw = self
            .detector
            .detect(frame)
            .map_err(|e| map_model_error(e.as_ref()))?;
        let filtered = self.filter.apply(&raw, frame.width(), frame.height());
        if filtered.invalid > 0 {
            tracing::debug!(invalid = filtered.invalid, "dropped malformed detections");
        }
        let kept = filtered.detections.len();
        let stable = self.stabilizer.update(filtered.detections).to_vec();

        let mut readings = Vec::with_capacity(stable.len());
        for det in &stable {
            if !crop_is_scorable(&det.bbox, self.cfg.min_crop_side_px) {
                tracing::trace!(bbox = ?det.bbox, "leaf crop too small to score");
                continue;
            }
            let crop = frame.crop(&det.bbox);
            if crop.is_empty() {
                continue;
            }
            let reading = self
                .severity_model
                .estimate(&crop)
                .map_err(|e| map_model_error(e.as_ref()))?;
            match validate_reading(reading) {
                Ok(r) => readings.push(r),
                Err(e) => tracing::warn!(error = %e, "severity reading rejected"),
            }
        }

        let severity = PlantSeverity::from_readings(&readings);
        let decision = self.policy.decide(severity.percent)?;
        let outcome = if self.cfg.actuation_enabled {
            self.actuator.request(&decision)?
        } else {
            if decision.spray {
                tracing::info!(%decision, "actuation disabled; not driving output");
            }
            SprayOutcome::NotRequested
        };

        tracing::info!(
            severity = severity.percent,
            level = severity.level,
            leaves = stable.len(),
            scored = readings.len(),
            spray = decision.spray,
            amount_s = decision.amount_secs,
            "decision"
        );

        self.overlay.boxes = stable;
        self.overlay.severity = severity;
        self.overlay.decision = decision;

        Ok(CycleReport {
            raw_detections: raw.len(),
            invalid_detections: filtered.invalid,
            kept,
            stable: self.overlay.boxes.len(),
            scored: readings.len(),
            severity,
            decision,
            outcome,
        })
    }

    /// Loop until the shutdown flag is set or `max_cycles` inference cycles
    /// were attempted, then release the devices.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<RunStats> {
        let looped = self.run_loop(max_cycles);
        let released = self.shutdown();
        looped?;
        released?;
        Ok(self.stats.clone())
    }

    fn run_loop(&mut self, max_cycles: Option<u64>) -> std::result::Result<(), SprayerError> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown requested");
                return Ok(());
            }
            self.tick()?;
            if max_cycles.is_some_and(|max| self.stats.attempted() >= max) {
                return Ok(());
            }
            self.clock.sleep(self.cfg.frame_interval);
        }
    }

    /// Turn the output off and release every device. Idempotent.
    pub fn shutdown(&mut self) -> std::result::Result<(), SprayerError> {
        let act = self.actuator.cleanup();
        let cam = if self.camera_released {
            Ok(())
        } else {
            self.camera_released = true;
            self.camera.release().map_err(|e| map_hw_error(e.as_ref()))
        };
        act.and(cam)
    }
}

impl<C, D, S, O> Drop for CycleScheduler<C, D, S, O>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "scheduler shutdown failed on drop");
        }
    }
}

/// Collects the parts of a [`CycleScheduler`]; `build` validates them.
pub struct SchedulerBuilder<C, D, S, O> {
    camera: Option<C>,
    detector: Option<D>,
    severity_model: Option<S>,
    output: Option<O>,
    filter: FilterCfg,
    stabilizer: StabilizerCfg,
    policy: PolicyCfg,
    actuator: ActuatorCfg,
    scheduler: SchedulerCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    shutdown: Option<Arc<AtomicBool>>,
    sink: Option<Box<dyn FrameSink>>,
}

impl<C, D, S, O> Default for SchedulerBuilder<C, D, S, O> {
    fn default() -> Self {
        Self {
            camera: None,
            detector: None,
            severity_model: None,
            output: None,
            filter: FilterCfg::default(),
            stabilizer: StabilizerCfg::default(),
            policy: PolicyCfg::default(),
            actuator: ActuatorCfg::default(),
            scheduler: SchedulerCfg::default(),
            clock: None,
            shutdown: None,
            sink: None,
        }
    }
}

impl<C, D, S, O> SchedulerBuilder<C, D, S, O>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera: C) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn detector(mut self, detector: D) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn severity_model(mut self, model: S) -> Self {
        self.severity_model = Some(model);
        self
    }

    pub fn output(mut self, output: O) -> Self {
        self.output = Some(output);
        self
    }

    pub fn filter(mut self, cfg: FilterCfg) -> Self {
        self.filter = cfg;
        self
    }

    pub fn stabilizer(mut self, cfg: StabilizerCfg) -> Self {
        self.stabilizer = cfg;
        self
    }

    pub fn policy(mut self, cfg: PolicyCfg) -> Self {
        self.policy = cfg;
        self
    }

    pub fn actuator(mut self, cfg: ActuatorCfg) -> Self {
        self.actuator = cfg;
        self
    }

    pub fn scheduler(mut self, cfg: SchedulerCfg) -> Self {
        self.scheduler = cfg;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing shutdown flag (e.g. one set by a Ctrl-C handler).
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn frame_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn build(self) -> std::result::Result<CycleScheduler<C, D, S, O>, BuildError> {
        let camera = self.camera.ok_or(BuildError::MissingCamera)?;
        let detector = self.detector.ok_or(BuildError::MissingDetector)?;
        let severity_model = self.severity_model.ok_or(BuildError::MissingSeverityModel)?;
        let output = self.output.ok_or(BuildError::MissingOutput)?;

        let f = &self.filter;
        if f.max_leaves == 0 {
            return Err(BuildError::InvalidConfig("max_leaves must be >= 1"));
        }
        if !(f.min_area_frac >= 0.0 && f.min_area_frac <= f.max_area_frac && f.max_area_frac <= 1.0)
        {
            return Err(BuildError::InvalidConfig(
                "area fractions must satisfy 0 <= min <= max <= 1",
            ));
        }
        if !(f.min_aspect > 0.0 && f.min_aspect <= f.max_aspect) {
            return Err(BuildError::InvalidConfig(
                "aspect band must satisfy 0 < min <= max",
            ));
        }
        if self.stabilizer.history_len == 0 {
            return Err(BuildError::InvalidConfig("history_len must be >= 1"));
        }
        if self.actuator.max_duration.is_zero() {
            return Err(BuildError::InvalidConfig("max_duration must be > 0"));
        }
        if self.actuator.hold_tick.is_zero() {
            return Err(BuildError::InvalidConfig("hold_tick must be > 0"));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let shutdown = self
            .shutdown
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let actuator = ActuatorController::with_clock(output, self.actuator, Arc::clone(&clock))
            .with_cancel(Arc::clone(&shutdown));
        let policy = policy::from_cfg(&self.policy);
        tracing::debug!(
            policy = policy.name(),
            backend = actuator.backend(),
            "scheduler built"
        );

        Ok(CycleScheduler {
            camera,
            detector,
            severity_model,
            filter: DetectionFilter::new(self.filter),
            stabilizer: TemporalStabilizer::new(self.stabilizer.history_len),
            policy,
            actuator,
            cfg: self.scheduler,
            clock,
            shutdown,
            sink: self.sink,
            last_inference: None,
            last_frame_at: None,
            overlay: Overlay::default(),
            stats: RunStats::default(),
            camera_released: false,
        })
    }
}

/// Build a scheduler from a validated TOML config.
pub fn build_scheduler<C, D, S, O>(
    cfg: &sprayer_config::Config,
    camera: C,
    detector: D,
    severity_model: S,
    output: O,
    shutdown: Arc<AtomicBool>,
) -> Result<CycleScheduler<C, D, S, O>>
where
    C: Camera,
    D: LeafDetector,
    S: SeverityModel,
    O: OutputDriver,
{
    SchedulerBuilder::new()
        .camera(camera)
        .detector(detector)
        .severity_model(severity_model)
        .output(output)
        .filter(FilterCfg::from(&cfg.detection))
        .stabilizer(StabilizerCfg::from(&cfg.stabilizer))
        .policy(PolicyCfg::from(&cfg.policy))
        .actuator(ActuatorCfg::from(&cfg.sprinkler))
        .scheduler(SchedulerCfg::from(cfg))
        .shutdown_flag(shutdown)
        .build()
        .map_err(eyre::Report::new)
}
