#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the spray controller.
//!
//! - `Config` and its tables are deserialized from TOML, then `validate()`d.
//! - Only `[sprinkler].gpio_pin` is mandatory; everything else has defaults.
use serde::Deserialize;
use serde::de::Deserializer;
use std::path::Path;

fn default_capture_interval_sec() -> f64 {
    10.0
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Minimum spacing between inference cycles (seconds).
    #[serde(default = "default_capture_interval_sec")]
    pub capture_interval_sec: f64,
    pub sprinkler: Sprinkler,
    #[serde(default)]
    pub camera: CameraCfg,
    #[serde(default)]
    pub detection: DetectionCfg,
    #[serde(default)]
    pub stabilizer: StabilizerCfg,
    #[serde(default)]
    pub severity: SeverityCfg,
    #[serde(default)]
    pub policy: PolicyCfg,
    #[serde(default)]
    pub display: DisplayCfg,
    #[serde(default)]
    pub logging: Logging,
}

fn default_max_duration_sec() -> f32 {
    20.0
}
fn default_cooldown_sec() -> f32 {
    60.0
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Sprinkler {
    /// BCM pin driving the valve relay. Also accepts "output_id".
    #[serde(alias = "output_id")]
    pub gpio_pin: u8,
    /// Hard cap on a single spray, regardless of what the policy asks for.
    #[serde(default = "default_max_duration_sec")]
    pub max_duration_sec: f32,
    /// Minimum time between the end of one spray and the start of the next.
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: f32,
    /// When false, decisions are computed and logged but the relay is never driven.
    #[serde(default)]
    pub enabled: bool,
    /// Relay closes when the pin is driven low.
    #[serde(default = "default_true")]
    pub active_low: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraCfg {
    pub device_id: u32,
    pub width: u32,
    pub height: u32,
    /// Frames discarded after opening the device
    pub warmup_frames: u32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            warmup_frames: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectionCfg {
    /// Classes kept by the filter; empty keeps every class.
    pub infected_class_ids: Vec<u32>,
    pub max_leaves_per_frame: usize,
    /// Detector-side confidence floor.
    pub base_confidence: f32,
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            infected_class_ids: Vec::new(),
            max_leaves_per_frame: 5,
            base_confidence: 0.3,
            min_area_frac: 0.01,
            max_area_frac: 0.50,
            min_aspect: 0.3,
            max_aspect: 3.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StabilizerCfg {
    /// Number of recent detection sets kept for smoothing.
    pub history_len: usize,
}

impl Default for StabilizerCfg {
    fn default() -> Self {
        Self { history_len: 3 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SeverityCfg {
    /// Leaf crops with a side shorter than this are not scored.
    pub min_crop_side_px: u32,
}

impl Default for SeverityCfg {
    fn default() -> Self {
        Self {
            min_crop_side_px: 64,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Severity bands map to increasing spray durations.
    #[default]
    Graduated,
    /// Any non-zero severity triggers one fixed-length spray.
    Binary,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PolicyCfg {
    pub kind: PolicyKind,
    /// Graduated bands as `(min_percent, amount_sec)`. Accepts either:
    /// - array of tables: [{ min_percent = 5.0, amount_sec = 5.0 }, ...]
    /// - array of tuples: [[5.0, 5.0], [25.0, 10.0], ...]
    #[serde(deserialize_with = "de_bands")]
    pub bands: Vec<(f32, f32)>,
    /// Spray length used by the binary policy.
    pub binary_amount_sec: f32,
}

impl Default for PolicyCfg {
    fn default() -> Self {
        Self {
            kind: PolicyKind::Graduated,
            bands: vec![(5.0, 5.0), (25.0, 10.0), (50.0, 20.0)],
            binary_amount_sec: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BandToml {
    Tuple((f32, f32)),
    Table { min_percent: f32, amount_sec: f32 },
}

fn de_bands<'de, D>(deserializer: D) -> Result<Vec<(f32, f32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<BandToml> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|b| match b {
            BandToml::Tuple(t) => t,
            BandToml::Table {
                min_percent,
                amount_sec,
            } => (min_percent, amount_sec),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    /// Pause between live frames when no inference is due (ms).
    pub frame_interval_ms: u64,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            frame_interval_ms: 30,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn finite_in(v: f32, lo: f32, hi: f32) -> bool {
    v.is_finite() && v >= lo && v <= hi
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if !self.capture_interval_sec.is_finite() || self.capture_interval_sec < 0.0 {
            eyre::bail!("capture_interval_sec must be a finite value >= 0");
        }
        if self.capture_interval_sec > 24.0 * 60.0 * 60.0 {
            eyre::bail!("capture_interval_sec is unreasonably large (>24h)");
        }

        // Sprinkler
        if !(self.sprinkler.max_duration_sec.is_finite() && self.sprinkler.max_duration_sec > 0.0) {
            eyre::bail!("sprinkler.max_duration_sec must be > 0");
        }
        if self.sprinkler.max_duration_sec > 600.0 {
            eyre::bail!("sprinkler.max_duration_sec is unreasonably large (>10min)");
        }
        if !finite_in(self.sprinkler.cooldown_sec, 0.0, 24.0 * 60.0 * 60.0) {
            eyre::bail!("sprinkler.cooldown_sec must be in [0, 86400]");
        }

        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            eyre::bail!("camera.width and camera.height must be > 0");
        }

        // Detection
        let d = &self.detection;
        if d.max_leaves_per_frame == 0 {
            eyre::bail!("detection.max_leaves_per_frame must be >= 1");
        }
        if !finite_in(d.base_confidence, 0.0, 1.0) {
            eyre::bail!("detection.base_confidence must be in [0.0, 1.0]");
        }
        if !finite_in(d.min_area_frac, 0.0, 1.0) || !finite_in(d.max_area_frac, 0.0, 1.0) {
            eyre::bail!("detection area fractions must be in [0.0, 1.0]");
        }
        if d.min_area_frac >= d.max_area_frac {
            eyre::bail!("detection.min_area_frac must be < detection.max_area_frac");
        }
        if !(d.min_aspect.is_finite() && d.min_aspect > 0.0) || !d.max_aspect.is_finite() {
            eyre::bail!("detection.min_aspect must be > 0 and both aspect bounds finite");
        }
        if d.min_aspect >= d.max_aspect {
            eyre::bail!("detection.min_aspect must be < detection.max_aspect");
        }

        // Stabilizer / severity
        if self.stabilizer.history_len == 0 {
            eyre::bail!("stabilizer.history_len must be >= 1");
        }
        if self.severity.min_crop_side_px == 0 {
            eyre::bail!("severity.min_crop_side_px must be >= 1");
        }

        // Policy
        let p = &self.policy;
        if !(p.binary_amount_sec.is_finite() && p.binary_amount_sec > 0.0) {
            eyre::bail!("policy.binary_amount_sec must be > 0");
        }
        if p.kind == PolicyKind::Graduated && p.bands.is_empty() {
            eyre::bail!("policy.bands must not be empty for the graduated policy");
        }
        let mut prev: Option<f32> = None;
        for (min_percent, amount_sec) in &p.bands {
            if !finite_in(*min_percent, 0.0, 100.0) {
                eyre::bail!("policy.bands min_percent must be in [0, 100]");
            }
            if !(amount_sec.is_finite() && *amount_sec >= 0.0) {
                eyre::bail!("policy.bands amount_sec must be >= 0");
            }
            if let Some(prev) = prev
                && *min_percent <= prev
            {
                eyre::bail!("policy.bands must be strictly ascending by min_percent");
            }
            prev = Some(*min_percent);
        }

        // Display
        if self.display.frame_interval_ms > 10_000 {
            eyre::bail!("display.frame_interval_ms is unreasonably large (>10s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
