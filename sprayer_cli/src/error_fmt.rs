//! Human-readable error descriptions and structured JSON error formatting.

use sprayer_core::error::{BuildError, SprayerError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingCamera
            | BuildError::MissingDetector
            | BuildError::MissingSeverityModel
            | BuildError::MissingOutput => format!(
                "What happened: The controller could not be assembled ({be}).\nLikely causes: A device failed to initialize before the loop was built.\nHow to fix: Run `sprayer self-check` and check the logs for the failing device."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [detection], [stabilizer] or [sprinkler] tables.\nHow to fix: Edit the config file, then rerun. See etc/sprayer.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SprayerError>() {
        return match se {
            SprayerError::Config(msg) => format!(
                "What happened: Configuration is invalid or incomplete.\nLikely causes: {msg}\nHow to fix: Edit the TOML config (only [sprinkler].gpio_pin is required) and try again."
            ),
            SprayerError::Device(msg) => format!(
                "What happened: A device failed ({msg}).\nLikely causes: Camera unplugged, wrong GPIO pin, or missing GPIO permissions.\nHow to fix: Check wiring and [sprinkler].gpio_pin; run `sprayer self-check`."
            ),
            SprayerError::ModelInference(msg) => format!(
                "What happened: Model inference failed ({msg}).\nLikely causes: Corrupt or incompatible model files.\nHow to fix: Re-run with --log-level=debug and verify the model setup."
            ),
            SprayerError::State(msg) => format!(
                "What happened: The controller was used after shutdown ({msg}).\nLikely causes: A device was released while the loop was still running.\nHow to fix: Restart the controller."
            ),
            SprayerError::Validation(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration, 3 for devices, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 2;
    }
    match err.downcast_ref::<SprayerError>() {
        Some(SprayerError::Config(_)) => 2,
        Some(SprayerError::Device(_)) => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "ConfigError",
            _ => "BuildError",
        };
    }
    match err.downcast_ref::<SprayerError>() {
        Some(SprayerError::Config(_)) => "ConfigError",
        Some(SprayerError::Device(_)) => "DeviceError",
        Some(SprayerError::ModelInference(_)) => "ModelInferenceError",
        Some(SprayerError::State(_)) => "StateError",
        Some(SprayerError::Validation(_)) => "ValidationError",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_2() {
        let e = eyre::Report::new(SprayerError::Config("missing gpio_pin".into()));
        assert_eq!(exit_code_for_error(&e), 2);
        assert!(humanize(&e).contains("gpio_pin"));
        let e = eyre::Report::new(BuildError::InvalidConfig("history_len must be >= 1"));
        assert_eq!(exit_code_for_error(&e), 2);
    }

    #[test]
    fn device_errors_exit_3() {
        let e = eyre::Report::new(SprayerError::Device("camera gone".into()));
        assert_eq!(exit_code_for_error(&e), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "DeviceError");
        assert_eq!(v["exit_code"], 3);
    }

    #[test]
    fn unknown_errors_fall_back() {
        let e = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&e), 1);
        assert!(humanize(&e).contains("Original: boom"));
    }
}
