use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::rstest;
use sprayer_core::mocks::{FailingOutput, RecordingOutput};
use sprayer_core::{
    ActuatorCfg, ActuatorController, ActuatorPhase, SprayDecision, SprayOutcome, SprayerError,
};
use sprayer_traits::{ManualClock, OutputDriver};

fn cfg(max_s: u64, cooldown_s: u64) -> ActuatorCfg {
    ActuatorCfg {
        max_duration: Duration::from_secs(max_s),
        cooldown: Duration::from_secs(cooldown_s),
        hold_tick: Duration::from_millis(50),
    }
}

/// Output that stamps each transition with the clock offset.
struct TimedOutput {
    clock: ManualClock,
    log: Arc<Mutex<Vec<(bool, Duration)>>>,
}

impl OutputDriver for TimedOutput {
    fn set_energized(&mut self, on: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.log.lock().unwrap().push((on, self.clock.elapsed()));
        Ok(())
    }
    fn release(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[test]
fn cooldown_counts_from_deenergize() {
    let clock = ManualClock::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let out = TimedOutput {
        clock: clock.clone(),
        log: Arc::clone(&log),
    };
    let mut act = ActuatorController::with_clock(out, cfg(5, 10), Arc::new(clock.clone()));

    // t=0: energize, hold 5 s, off at t=5.
    let first = act.request(&SprayDecision::spray_for(5.0)).unwrap();
    assert_eq!(
        first,
        SprayOutcome::Sprayed {
            held: Duration::from_secs(5),
            clamped: false
        }
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(5));
    assert_eq!(act.phase(), ActuatorPhase::Cooling);

    // t=6: still cooling.
    clock.set_elapsed(Duration::from_secs(6));
    assert_eq!(
        act.request(&SprayDecision::spray_for(5.0)).unwrap(),
        SprayOutcome::CoolingDown {
            remaining: Duration::from_secs(9)
        }
    );

    clock.set_elapsed(Duration::from_millis(14_900));
    assert!(matches!(
        act.request(&SprayDecision::spray_for(5.0)).unwrap(),
        SprayOutcome::CoolingDown { .. }
    ));

    // Exactly one cooldown after the first de-energize.
    clock.set_elapsed(Duration::from_secs(15));
    assert_eq!(act.phase(), ActuatorPhase::Idle);
    assert!(act.request(&SprayDecision::spray_for(5.0)).unwrap().energized());

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            (true, Duration::ZERO),
            (false, Duration::from_secs(5)),
            (true, Duration::from_secs(15)),
            (false, Duration::from_secs(20)),
        ]
    );
}

#[rstest]
#[case(100.0, 20, Duration::from_secs(20), true)]
#[case(20.0, 20, Duration::from_secs(20), false)]
#[case(2.5, 20, Duration::from_millis(2500), false)]
fn hold_is_clamped_to_max(
    #[case] amount: f32,
    #[case] max_s: u64,
    #[case] held: Duration,
    #[case] clamped: bool,
) {
    let clock = Arc::new(ManualClock::new());
    let mut act =
        ActuatorController::with_clock(RecordingOutput::new(), cfg(max_s, 60), clock.clone());
    let outcome = act.request(&SprayDecision::spray_for(amount)).unwrap();
    assert_eq!(outcome, SprayOutcome::Sprayed { held, clamped });
    assert_eq!(clock.elapsed(), held);
}

#[test]
fn first_request_is_never_cooling() {
    let act = ActuatorController::with_clock(
        RecordingOutput::new(),
        cfg(5, 3600),
        Arc::new(ManualClock::new()),
    );
    assert_eq!(act.phase(), ActuatorPhase::Idle);
    assert_eq!(act.state().last_deenergized, None);
}

#[test]
fn cleanup_twice_is_ok_and_off() {
    let out = RecordingOutput::new();
    let log = out.log();
    let releases = out.releases();
    let mut act = ActuatorController::with_clock(out, cfg(5, 10), Arc::new(ManualClock::new()));

    act.cleanup().unwrap();
    assert!(!act.state().energized);
    act.cleanup().unwrap();
    assert!(!act.state().energized);

    assert_eq!(*log.lock().unwrap(), vec![false]);
    assert_eq!(*releases.lock().unwrap(), 1);
    assert!(act.is_released());
}

#[test]
fn request_after_cleanup_is_a_state_error() {
    let mut act = ActuatorController::with_clock(
        RecordingOutput::new(),
        cfg(5, 10),
        Arc::new(ManualClock::new()),
    );
    act.cleanup().unwrap();
    assert!(matches!(
        act.request(&SprayDecision::spray_for(1.0)),
        Err(SprayerError::State(_))
    ));
    // No-spray decisions stay a no-op.
    assert_eq!(
        act.request(&SprayDecision::NONE).unwrap(),
        SprayOutcome::NotRequested
    );
}

#[test]
fn drop_releases_output() {
    let out = RecordingOutput::new();
    let releases = out.releases();
    {
        let _act = ActuatorController::with_clock(out, cfg(5, 10), Arc::new(ManualClock::new()));
    }
    assert_eq!(*releases.lock().unwrap(), 1);
}

#[test]
fn cleanup_reports_driver_fault_but_still_marks_released() {
    let mut act = ActuatorController::with_clock(
        FailingOutput::always(),
        cfg(5, 10),
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(act.cleanup(), Err(SprayerError::Device(_))));
    assert!(act.is_released());
    assert!(act.cleanup().is_ok());
}

#[test]
fn force_off_keeps_handle() {
    let out = RecordingOutput::new();
    let releases = out.releases();
    let mut act = ActuatorController::with_clock(out, cfg(5, 10), Arc::new(ManualClock::new()));
    let before = act.state();
    act.force_off().unwrap();
    assert_eq!(act.state(), before);
    assert_eq!(*releases.lock().unwrap(), 0);
    assert!(act.request(&SprayDecision::spray_for(1.0)).is_ok());
}
