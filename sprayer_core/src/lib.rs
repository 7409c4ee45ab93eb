#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Decision-and-actuation pipeline for the leaf-disease sprayer (hardware-agnostic).
//!
//! Devices are reached only through the `sprayer_traits` contracts. One
//! inference cycle flows through:
//!
//! - **Filtering** (`filter`): validation, class filter, area/aspect gates, top-N by score
//! - **Stabilization** (`stabilizer`): largest recent detection set wins
//! - **Severity** (`severity`): per-leaf readings averaged to a plant percentage
//! - **Policy** (`policy`): graduated bands or binary trigger
//! - **Actuation** (`actuator`): cooldown, duration cap, fail-safe off
//!
//! `scheduler` drives the loop and owns every component.

pub mod actuator;
pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod policy;
pub mod scheduler;
pub mod severity;
pub mod stabilizer;
pub mod util;

pub use actuator::{ActuatorController, ActuatorPhase, ActuatorState, SprayOutcome};
pub use config::{ActuatorCfg, FilterCfg, PolicyCfg, SchedulerCfg, StabilizerCfg};
pub use error::{BuildError, Report, Result, SprayerError};
pub use filter::{DetectionFilter, Filtered};
pub use policy::{Band, BinaryPolicy, GraduatedPolicy, SprayDecision, SprayPolicy};
pub use scheduler::{
    CycleReport, CycleScheduler, FrameSink, Overlay, RunStats, SchedulerBuilder, SkipReason,
    TickOutcome, build_scheduler,
};
pub use severity::{PlantSeverity, aggregate, severity_level};
pub use stabilizer::TemporalStabilizer;
