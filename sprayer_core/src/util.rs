//! Small time and rate helpers.
use std::time::Duration;

/// Weight given to the previous frame-rate estimate.
pub const FPS_EMA_KEEP: f32 = 0.9;

/// Convert seconds to a `Duration`; negative, NaN or zero inputs become zero
/// and overly large values saturate.
#[inline]
pub fn secs_f32(secs: f32) -> Duration {
    if !(secs.is_finite() && secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
}

/// f64 flavour of [`secs_f32`].
#[inline]
pub fn secs_f64(secs: f64) -> Duration {
    if !(secs.is_finite() && secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Fold one frame interval into the smoothed frame rate.
/// The first valid sample seeds the average; zero-length intervals are ignored.
#[inline]
pub fn ema_fps(prev_fps: f32, frame_dt: Duration) -> f32 {
    let dt = frame_dt.as_secs_f32();
    if dt <= 0.0 {
        return prev_fps;
    }
    let current = 1.0 / dt;
    if prev_fps > 0.0 {
        FPS_EMA_KEEP * prev_fps + (1.0 - FPS_EMA_KEEP) * current
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_conversion_guards_bad_input() {
        assert_eq!(secs_f32(f32::NAN), Duration::ZERO);
        assert_eq!(secs_f32(-1.0), Duration::ZERO);
        assert_eq!(secs_f32(2.5), Duration::from_millis(2500));
        assert_eq!(secs_f64(f64::INFINITY), Duration::ZERO);
        assert_eq!(secs_f64(0.25), Duration::from_millis(250));
    }

    #[test]
    fn ema_seeds_then_smooths() {
        let fps = ema_fps(0.0, Duration::from_millis(100));
        assert!((fps - 10.0).abs() < 1e-4);
        let fps = ema_fps(fps, Duration::from_millis(50));
        // 0.9 * 10 + 0.1 * 20
        assert!((fps - 11.0).abs() < 1e-4);
        assert_eq!(ema_fps(fps, Duration::ZERO), fps);
    }
}
