#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use sprayer_core::{DetectionFilter, FilterCfg, GraduatedPolicy, SprayPolicy, aggregate};
use sprayer_traits::{BoundingBox, Detection};

#[derive(Debug, Arbitrary)]
struct RawDet {
    class_id: u8,
    x1: u16,
    y1: u16,
    x2: u16,
    y2: u16,
    score: f32,
}

#[derive(Debug, Arbitrary)]
struct Input {
    width: u16,
    height: u16,
    max_leaves: u8,
    dets: Vec<RawDet>,
    readings: Vec<f32>,
}

// Malformed detector output must be dropped, never panic, and the result is
// always bounded and inside the frame.
fuzz_target!(|input: Input| {
    let (w, h) = (u32::from(input.width), u32::from(input.height));
    let max_leaves = usize::from(input.max_leaves.max(1));
    let filter = DetectionFilter::new(FilterCfg {
        max_leaves,
        ..FilterCfg::default()
    });
    let dets: Vec<Detection> = input
        .dets
        .iter()
        .map(|d| {
            let bbox = BoundingBox {
                x1: u32::from(d.x1),
                y1: u32::from(d.y1),
                x2: u32::from(d.x2),
                y2: u32::from(d.y2),
            };
            Detection::new(u32::from(d.class_id), bbox, d.score)
        })
        .collect();
    let out = filter.apply(&dets, w, h);
    assert!(out.detections.len() <= max_leaves);
    for d in &out.detections {
        assert!(d.bbox.fits_within(w, h));
        assert!((0.0..=1.0).contains(&d.score));
    }

    let valid: Vec<f32> = input
        .readings
        .into_iter()
        .filter(|r| r.is_finite() && (0.0..=100.0).contains(r))
        .collect();
    let severity = aggregate(&valid);
    assert!(GraduatedPolicy::default().decide(severity).is_ok());
});
