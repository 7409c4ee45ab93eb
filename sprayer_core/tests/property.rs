use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use sprayer_core::filter::aspect_ratio;
use sprayer_core::{
    ActuatorCfg, ActuatorController, DetectionFilter, FilterCfg, GraduatedPolicy, SprayDecision,
    SprayPolicy, TemporalStabilizer, aggregate,
};
use sprayer_traits::{BoundingBox, Detection, ManualClock, OutputDriver};

const W: u32 = 640;
const H: u32 = 480;

prop_compose! {
    fn detection_strategy()(
        x1 in 0u32..W,
        y1 in 0u32..H,
        w in 1u32..W,
        h in 1u32..H,
        class_id in 0u32..3,
        score in 0.0f32..=1.0,
    ) -> Detection {
        let bbox = BoundingBox::new(x1, y1, (x1 + w).min(W), (y1 + h).min(H));
        Detection::new(class_id, bbox, score)
    }
}

proptest! {
    #[test]
    fn filter_never_exceeds_max_leaves(
        dets in prop::collection::vec(detection_strategy(), 0..40),
        max_leaves in 1usize..8,
    ) {
        let filter = DetectionFilter::new(FilterCfg { max_leaves, ..FilterCfg::default() });
        let out = filter.apply(&dets, W, H);
        prop_assert!(out.detections.len() <= max_leaves);
        for pair in out.detections.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn out_of_band_aspect_is_always_excluded(
        dets in prop::collection::vec(detection_strategy(), 0..40)
    ) {
        let filter = DetectionFilter::new(FilterCfg { max_leaves: 100, ..FilterCfg::default() });
        let out = filter.apply(&dets, W, H);
        for d in &out.detections {
            let a = aspect_ratio(d);
            prop_assert!((0.3..=3.0).contains(&a), "aspect {a} kept");
        }
    }

    #[test]
    fn stabilizer_history_is_bounded(sizes in prop::collection::vec(0usize..6, 0..30)) {
        let mut st = TemporalStabilizer::new(3);
        let det = Detection::new(0, BoundingBox::new(0, 0, 10, 10), 0.5);
        for (i, n) in sizes.iter().enumerate() {
            let best = st.update(vec![det; *n]).len();
            prop_assert!(st.len() <= 3);
            prop_assert_eq!(st.len(), (i + 1).min(3));
            let window_max = st.history().map(<[Detection]>::len).max().unwrap_or(0);
            prop_assert_eq!(best, window_max);
        }
    }

    #[test]
    fn aggregate_stays_within_readings(readings in prop::collection::vec(0.0f32..=100.0, 1..20)) {
        let mean = aggregate(&readings);
        let lo = readings.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = readings.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        prop_assert!(mean >= lo - 1e-3 && mean <= hi + 1e-3);
    }

    #[test]
    fn graduated_amount_is_monotonic(a in 0.0f32..150.0, b in 0.0f32..150.0) {
        let p = GraduatedPolicy::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let dl = p.decide(lo).unwrap();
        let dh = p.decide(hi).unwrap();
        prop_assert!(dl.amount_secs <= dh.amount_secs);
    }

    #[test]
    fn never_energized_within_cooldown(
        steps in prop::collection::vec((0u64..30_000, 0.0f32..40.0), 1..25),
    ) {
        let clock = ManualClock::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let out = TimedOutput { clock: clock.clone(), log: Arc::clone(&log) };
        let cfg = ActuatorCfg {
            max_duration: Duration::from_secs(20),
            cooldown: Duration::from_secs(10),
            hold_tick: Duration::from_millis(250),
        };
        let mut act = ActuatorController::with_clock(out, cfg, Arc::new(clock.clone()));
        for (gap_ms, amount) in steps {
            clock.advance(Duration::from_millis(gap_ms));
            act.request(&SprayDecision::spray_for(amount)).unwrap();
        }
        let log = log.lock().unwrap();
        let mut last_off: Option<Duration> = None;
        for pair in log.chunks(2) {
            let &[(true, on_at), (false, off_at)] = pair else {
                panic!("unpaired transitions: {pair:?}");
            };
            prop_assert!(off_at - on_at <= Duration::from_secs(20));
            if let Some(off) = last_off {
                prop_assert!(on_at - off >= Duration::from_secs(10));
            }
            last_off = Some(off_at);
        }
    }
}

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
