//! Cooldown- and duration-limited control of the spray output.
//!
//! The controller owns the output driver exclusively. Every energize happens
//! through [`EnergizedGuard`], whose `Drop` turns the output off again, so an
//! error or panic in the hold window leaves the relay de-energized.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sprayer_traits::{BoxError, Clock, MonotonicClock, OutputDriver};

use crate::config::ActuatorCfg;
use crate::error::SprayerError;
use crate::hw_error::map_hw_error;
use crate::policy::SprayDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorPhase {
    Idle,
    Cooling,
    Spraying,
}

/// Result of one spray request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayOutcome {
    /// Decision was "no spray".
    NotRequested,
    /// Output was held for `held`; `clamped` when the request exceeded the cap.
    Sprayed { held: Duration, clamped: bool },
    /// Rejected, the previous spray ended less than the cooldown ago.
    CoolingDown { remaining: Duration },
    /// Hold cut short by cancellation; the output is off.
    Interrupted { held: Duration },
    /// Shutdown was already requested; the output was never touched.
    Cancelled,
}

impl SprayOutcome {
    pub fn energized(&self) -> bool {
        matches!(self, Self::Sprayed { .. } | Self::Interrupted { .. })
    }
}

/// Snapshot of the controller's persistent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub last_deenergized: Option<Instant>,
    pub energized: bool,
}

/// Scoped energize. Dropping the guard de-energizes unless `disengage` already did.
struct EnergizedGuard<'a, O: OutputDriver> {
    output: &'a mut O,
    armed: bool,
}

impl<'a, O: OutputDriver> EnergizedGuard<'a, O> {
    fn engage(output: &'a mut O) -> Result<Self, BoxError> {
        if let Err(e) = output.set_energized(true) {
            // The relay may have latched before the error surfaced.
            if let Err(off) = output.set_energized(false) {
                tracing::warn!(error = %off, "de-energize after failed energize also failed");
            }
            return Err(e);
        }
        Ok(Self {
            output,
            armed: true,
        })
    }

    fn disengage(mut self) -> Result<(), BoxError> {
        self.armed = false;
        self.output.set_energized(false)
    }
}

impl<O: OutputDriver> Drop for EnergizedGuard<'_, O> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = self.output.set_energized(false)
        {
            tracing::error!(error = %e, "failed to de-energize output on unwind");
        }
    }
}

pub struct ActuatorController<O: OutputDriver> {
    output: O,
    cfg: ActuatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    last_deenergized: Option<Instant>,
    energized: bool,
    released: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl<O: OutputDriver> core::fmt::Debug for ActuatorController<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActuatorController")
            .field("backend", &self.output.backend())
            .field("max_duration", &self.cfg.max_duration)
            .field("cooldown", &self.cfg.cooldown)
            .field("energized", &self.energized)
            .field("released", &self.released)
            .finish()
    }
}

impl<O: OutputDriver> ActuatorController<O> {
    pub fn new(output: O, cfg: ActuatorCfg) -> Self {
        Self::with_clock(output, cfg, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(output: O, cfg: ActuatorCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            output,
            cfg,
            clock,
            last_deenergized: None,
            energized: false,
            released: false,
            cancel: None,
        }
    }

    /// Flag checked before energizing and during a hold. Once set, no new
    /// spray starts and a running hold ends early.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn cfg(&self) -> &ActuatorCfg {
        &self.cfg
    }

    pub fn backend(&self) -> &'static str {
        self.output.backend()
    }

    pub fn state(&self) -> ActuatorState {
        ActuatorState {
            last_deenergized: self.last_deenergized,
            energized: self.energized,
        }
    }

    /// Phase as of now; cooldown expiry is evaluated lazily.
    pub fn phase(&self) -> ActuatorPhase {
        if self.energized {
            ActuatorPhase::Spraying
        } else if self.cooldown_remaining(self.clock.now()).is_some() {
            ActuatorPhase::Cooling
        } else {
            ActuatorPhase::Idle
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_deenergized?;
        let since = now.saturating_duration_since(last);
        (since < self.cfg.cooldown).then(|| self.cfg.cooldown - since)
    }

    /// Act on one decision. Blocks for the length of the hold.
    pub fn request(&mut self, decision: &SprayDecision) -> Result<SprayOutcome, SprayerError> {
        let requested = decision.amount();
        if requested.is_zero() {
            return Ok(SprayOutcome::NotRequested);
        }
        if self.released {
            return Err(SprayerError::State("actuator already released".into()));
        }
        if self.cancel_requested() {
            tracing::info!(
                requested_ms = requested.as_millis() as u64,
                "spray skipped: shutdown requested"
            );
            return Ok(SprayOutcome::Cancelled);
        }
        if let Some(remaining) = self.cooldown_remaining(self.clock.now()) {
            tracing::info!(
                remaining_ms = remaining.as_millis() as u64,
                "spray skipped: cooling down"
            );
            return Ok(SprayOutcome::CoolingDown { remaining });
        }

        let hold = requested.min(self.cfg.max_duration);
        let clamped = requested > self.cfg.max_duration;
        if clamped {
            tracing::warn!(
                requested_ms = requested.as_millis() as u64,
                max_ms = self.cfg.max_duration.as_millis() as u64,
                "spray duration clamped"
            );
        }

        let guard = match EnergizedGuard::engage(&mut self.output) {
            Ok(g) => g,
            Err(e) => {
                // The output was touched; count this as a de-energization.
                self.last_deenergized = Some(self.clock.now());
                self.energized = false;
                return Err(map_hw_error(e.as_ref()));
            }
        };
        self.energized = true;
        let start = self.clock.now();
        tracing::info!(hold_ms = hold.as_millis() as u64, "output energized");

        let mut interrupted = false;
        loop {
            let held = self.clock.since(start);
            if held >= hold {
                break;
            }
            // Field-level read: `guard` holds `&mut self.output`.
            if self
                .cancel
                .as_ref()
                .is_some_and(|c| c.load(Ordering::Relaxed))
            {
                interrupted = true;
                break;
            }
            self.clock.sleep((hold - held).min(self.cfg.hold_tick));
        }

        let off = guard.disengage();
        let held = self.clock.since(start);
        self.last_deenergized = Some(self.clock.now());
        if let Err(e) = off {
            // Energized flag stays set so force_off/cleanup retry.
            tracing::error!(error = %e, "failed to de-energize output");
            return Err(map_hw_error(e.as_ref()));
        }
        self.energized = false;
        tracing::info!(held_ms = held.as_millis() as u64, interrupted, "output de-energized");

        Ok(if interrupted {
            SprayOutcome::Interrupted { held }
        } else {
            SprayOutcome::Sprayed { held, clamped }
        })
    }

    /// De-energize without releasing the device. Used at every failure boundary.
    pub fn force_off(&mut self) -> Result<(), SprayerError> {
        if self.released {
            return Ok(());
        }
        self.output
            .set_energized(false)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        if self.energized {
            self.last_deenergized = Some(self.clock.now());
            self.energized = false;
        }
        Ok(())
    }

    /// De-energize and release the output. Safe to call repeatedly.
    pub fn cleanup(&mut self) -> Result<(), SprayerError> {
        if self.released {
            return Ok(());
        }
        let off = self.output.set_energized(false);
        if self.energized {
            self.last_deenergized = Some(self.clock.now());
        }
        self.energized = false;
        let rel = self.output.release();
        self.released = true;
        tracing::debug!(backend = self.output.backend(), "output released");
        off.and(rel).map_err(|e| map_hw_error(e.as_ref()))
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<O: OutputDriver> Drop for ActuatorController<O> {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!(error = %e, "actuator cleanup failed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingOutput, RecordingOutput};
    use sprayer_traits::ManualClock;

    fn cfg(max_s: u64, cooldown_s: u64) -> ActuatorCfg {
        ActuatorCfg {
            max_duration: Duration::from_secs(max_s),
            cooldown: Duration::from_secs(cooldown_s),
            hold_tick: Duration::from_millis(50),
        }
    }

    #[test]
    fn no_spray_is_a_noop() {
        let out = RecordingOutput::new();
        let log = out.log();
        let mut act =
            ActuatorController::with_clock(out, cfg(5, 10), Arc::new(ManualClock::new()));
        assert_eq!(
            act.request(&SprayDecision::NONE).unwrap(),
            SprayOutcome::NotRequested
        );
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(act.phase(), ActuatorPhase::Idle);
    }

    #[test]
    fn guard_turns_output_off_when_dropped() {
        let mut out = RecordingOutput::new();
        let log = out.log();
        {
            let _g = EnergizedGuard::engage(&mut out).unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn cancel_before_request_never_energizes() {
        let clock = Arc::new(ManualClock::new());
        let cancel = Arc::new(AtomicBool::new(true));
        let out = RecordingOutput::new();
        let log = out.log();
        let mut act = ActuatorController::with_clock(out, cfg(5, 10), clock).with_cancel(cancel);
        let outcome = act.request(&SprayDecision::spray_for(5.0)).unwrap();
        assert_eq!(outcome, SprayOutcome::Cancelled);
        assert!(log.lock().unwrap().is_empty());
        assert!(!act.state().energized);
        assert_eq!(act.state().last_deenergized, None);
        assert_eq!(act.phase(), ActuatorPhase::Idle);
    }

    /// Raises the shared cancel flag as soon as it is switched on.
    struct TrippingOutput {
        inner: RecordingOutput,
        cancel: Arc<AtomicBool>,
    }

    impl OutputDriver for TrippingOutput {
        fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
            if on {
                self.cancel.store(true, Ordering::Relaxed);
            }
            self.inner.set_energized(on)
        }

        fn release(&mut self) -> Result<(), BoxError> {
            self.inner.release()
        }

        fn backend(&self) -> &'static str {
            "tripping"
        }
    }

    #[test]
    fn cancel_during_hold_ends_early_and_off() {
        let clock = Arc::new(ManualClock::new());
        let cancel = Arc::new(AtomicBool::new(false));
        let inner = RecordingOutput::new();
        let log = inner.log();
        let out = TrippingOutput {
            inner,
            cancel: cancel.clone(),
        };
        let mut act = ActuatorController::with_clock(out, cfg(5, 10), clock).with_cancel(cancel);
        let outcome = act.request(&SprayDecision::spray_for(5.0)).unwrap();
        assert_eq!(outcome, SprayOutcome::Interrupted { held: Duration::ZERO });
        assert_eq!(*log.lock().unwrap(), vec![true, false]);
        assert!(!act.state().energized);
        assert_eq!(act.phase(), ActuatorPhase::Cooling);
    }

    #[test]
    fn failed_energize_leaves_output_off() {
        let clock = Arc::new(ManualClock::new());
        let out = FailingOutput::on_energize();
        let log = out.log();
        let mut act = ActuatorController::with_clock(out, cfg(5, 10), clock);
        let err = act.request(&SprayDecision::spray_for(3.0)).unwrap_err();
        assert!(matches!(err, SprayerError::Device(_)));
        assert!(!act.state().energized);
        assert_eq!(log.lock().unwrap().last(), Some(&false));
        // A touched output starts the cooldown.
        assert_eq!(act.phase(), ActuatorPhase::Cooling);
    }
}
