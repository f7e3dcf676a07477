//! Device tiering and frame-rate driven quality control.
//!
//! Detection runs once: [`detect_capabilities`] gathers graphics facts, a
//! software render benchmark, a CPU benchmark and host facts, and
//! [`determine_tier`] turns them into a [`Tier`]. [`CapabilityProbe`] runs the
//! same detection on a background thread so a host can keep rendering.
//!
//! After start-up the [`PerformanceGovernor`] is fed frame timestamps. It
//! keeps a rolling window of frames-per-second samples and, whenever the
//! average falls below the threshold, steps down one tier and pushes the
//! new [`TierPreset`] into the render core through
//! [`renderer::QualityControl`]. It never steps up on its own.

mod bench;
mod capabilities;
mod error;
mod governor;
mod host;
mod monitor;
mod probe;
mod tier;

pub use bench::{
    cpu_benchmark, cpu_score, render_benchmark, render_score, BenchmarkResult, SyntheticCanvas,
};
pub use capabilities::{
    capability_score, detect_capabilities, determine_tier, tier_for_score, Capabilities,
    ProbeSettings,
};
pub use error::GovernorError;
pub use governor::{ChangeReason, GovernorSettings, PerformanceGovernor, TierChange};
pub use host::{is_mobile_user_agent, HostEnvironment, HostOverrides, NativeHost, NetworkType};
pub use monitor::FpsMonitor;
pub use probe::CapabilityProbe;
pub use tier::{Tier, TierPreset};
