//! Config loading, device assembly and the three commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde_json::json;
use sprayer_core::error::{Result as CoreResult, SprayerError};
use sprayer_core::{
    CycleReport, CycleScheduler, Overlay, RunStats, SkipReason, SprayOutcome, TickOutcome,
};
use sprayer_hardware::{SimulatedCamera, SimulatedDetector, SimulatedSeverity, detect_output};
use sprayer_traits::{Camera, Frame, OutputDriver};

type Scheduler =
    CycleScheduler<SimulatedCamera, SimulatedDetector, SimulatedSeverity, Box<dyn OutputDriver>>;

/// Read, parse and validate the config. Any failure is a `SprayerError::Config`
/// and happens before a device is opened.
pub fn load_config(path: &Path) -> CoreResult<sprayer_config::Config> {
    sprayer_config::load_file(path)
        .map_err(|e| eyre::Report::new(SprayerError::Config(format!("{e:#}"))))
}

fn assemble(
    cfg: &sprayer_config::Config,
    seed: u32,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<Scheduler> {
    let output = detect_output(cfg.sprinkler.gpio_pin, cfg.sprinkler.active_low);
    let camera = SimulatedCamera::new(
        cfg.camera.width,
        cfg.camera.height,
        cfg.camera.warmup_frames,
        seed,
    )
    .with_device_id(cfg.camera.device_id);
    let detector = SimulatedDetector::new(cfg.detection.base_confidence, seed.wrapping_add(1));
    let mut sched = sprayer_core::build_scheduler(
        cfg,
        camera,
        detector,
        SimulatedSeverity,
        output,
        shutdown,
    )?;
    sched.set_frame_sink(|frame: &Frame, overlay: &Overlay| {
        tracing::debug!(
            width = frame.width(),
            height = frame.height(),
            boxes = overlay.boxes.len(),
            severity = overlay.severity.percent,
            decision = %overlay.decision,
            fps = overlay.fps,
            "frame"
        );
    });
    tracing::info!(
        policy = sched.policy_name(),
        backend = sched.actuator().backend(),
        camera = cfg.camera.device_id,
        enabled = cfg.sprinkler.enabled,
        capture_interval_s = cfg.capture_interval_sec,
        "controller ready"
    );
    Ok(sched)
}

pub fn run_loop(
    cfg: &sprayer_config::Config,
    seed: u32,
    max_cycles: Option<u64>,
    shutdown: Arc<AtomicBool>,
    json_mode: bool,
) -> CoreResult<RunStats> {
    let mut sched = assemble(cfg, seed, shutdown)?;
    let stats = sched.run(max_cycles)?;
    print_stats(&stats, json_mode);
    Ok(stats)
}

pub fn run_once(
    cfg: &sprayer_config::Config,
    seed: u32,
    shutdown: Arc<AtomicBool>,
    json_mode: bool,
) -> CoreResult<()> {
    let mut sched = assemble(cfg, seed, shutdown)?;
    let tick = sched.tick();
    sched.shutdown()?;
    match tick? {
        TickOutcome::Cycle(report) => {
            print_report(&report, json_mode);
            Ok(())
        }
        TickOutcome::Skipped(SkipReason::Failed(e)) => Err(eyre::Report::new(e)),
        other => Err(eyre::Report::new(SprayerError::Device(format!(
            "no inference cycle ran ({other:?})"
        )))),
    }
}

pub fn self_check(cfg: &sprayer_config::Config, seed: u32, json_mode: bool) -> CoreResult<()> {
    let mut output = detect_output(cfg.sprinkler.gpio_pin, cfg.sprinkler.active_low);
    let backend = output.backend();
    let out_res = output
        .set_energized(false)
        .and_then(|()| output.release())
        .map_err(|e| SprayerError::Device(format!("output: {e}")));

    let mut camera = SimulatedCamera::new(cfg.camera.width, cfg.camera.height, 0, seed);
    let cam_res = camera
        .capture()
        .map_err(|e| SprayerError::Device(format!("camera: {e}")))
        .map(|f| f.map(|f| (f.width(), f.height())));
    if let Err(e) = camera.release() {
        tracing::warn!(error = %e, "camera release failed");
    }

    out_res?;
    let frame = cam_res?;
    if json_mode {
        println!(
            "{}",
            json!({
                "ok": true,
                "output": backend,
                "gpio_pin": cfg.sprinkler.gpio_pin,
                "frame": frame.map(|(w, h)| json!({ "width": w, "height": h })),
            })
        );
    } else {
        match frame {
            Some((w, h)) => println!("ok: output={backend} camera={w}x{h}"),
            None => println!("ok: output={backend} camera=no frame yet"),
        }
    }
    Ok(())
}

fn outcome_str(outcome: &SprayOutcome) -> String {
    match outcome {
        SprayOutcome::NotRequested => "not requested".into(),
        SprayOutcome::Sprayed { held, clamped } => {
            let note = if *clamped { " (clamped)" } else { "" };
            format!("sprayed {:.1}s{note}", held.as_secs_f32())
        }
        SprayOutcome::CoolingDown { remaining } => {
            format!("cooling down, {:.1}s left", remaining.as_secs_f32())
        }
        SprayOutcome::Interrupted { held } => {
            format!("interrupted after {:.1}s", held.as_secs_f32())
        }
        SprayOutcome::Cancelled => "cancelled".into(),
    }
}

fn print_report(r: &CycleReport, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            json!({
                "leaves": r.stable,
                "scored": r.scored,
                "severity_percent": r.severity.percent,
                "severity_level": r.severity.level,
                "spray": r.decision.spray,
                "amount_s": r.decision.amount_secs,
                "outcome": outcome_str(&r.outcome),
            })
        );
    } else {
        println!(
            "severity {:.1}% (level {}), {} leaves -> {} [{}]",
            r.severity.percent,
            r.severity.level,
            r.stable,
            r.decision,
            outcome_str(&r.outcome)
        );
    }
}

fn print_stats(s: &RunStats, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            json!({
                "frames": s.frames,
                "cycles": s.cycles,
                "skipped": s.skipped,
                "sprays": s.sprays,
                "cooldown_rejections": s.cooldown_rejections,
                "spray_time_s": s.spray_time.as_secs_f64(),
            })
        );
    } else {
        println!(
            "cycles: {} (skipped {}), sprays: {} ({:.1}s total), cooldown rejections: {}, frames: {}",
            s.cycles,
            s.skipped,
            s.sprays,
            s.spray_time.as_secs_f64(),
            s.cooldown_rejections,
            s.frames
        );
    }
}
