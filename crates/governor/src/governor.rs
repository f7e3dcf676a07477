use std::collections::BTreeMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use fieldconfig::{FieldConfig, GovernorSection};
use renderer::QualityControl;
use tracing::{debug, info, warn};

use crate::capabilities::{determine_tier, Capabilities};
use crate::error::GovernorError;
use crate::monitor::FpsMonitor;
use crate::tier::{Tier, TierPreset};

/// Tier used when nothing was configured or detected.
const FALLBACK_TIER: Tier = Tier::Medium;

#[derive(Debug, Clone, PartialEq)]
pub struct GovernorSettings {
    /// Whether the FPS monitor may step tiers down.
    pub adaptive: bool,
    pub fps_threshold: f32,
    pub sample_window: usize,
    pub min_samples: usize,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self::from(&GovernorSection::default())
    }
}

impl From<&GovernorSection> for GovernorSettings {
    fn from(section: &GovernorSection) -> Self {
        Self {
            adaptive: section.adaptive,
            fps_threshold: section.fps_threshold,
            sample_window: section.sample_window,
            min_samples: section.min_samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeReason {
    /// Rolling average fell below the threshold.
    Degraded { average_fps: f32 },
    /// Requested through [`PerformanceGovernor::set_tier`].
    Manual,
}

/// Published to subscribers on every tier transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TierChange {
    pub from: Tier,
    pub to: Tier,
    pub reason: ChangeReason,
    pub preset: TierPreset,
}

pub struct PerformanceGovernor {
    tier: Tier,
    presets: BTreeMap<Tier, TierPreset>,
    settings: GovernorSettings,
    monitor: FpsMonitor,
    subscribers: Vec<Sender<TierChange>>,
}

impl std::fmt::Debug for PerformanceGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceGovernor")
            .field("tier", &self.tier)
            .field("settings", &self.settings)
            .field("samples", &self.monitor.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl PerformanceGovernor {
    /// Governor starting at `tier` with the built-in presets.
    pub fn new(tier: Tier, settings: GovernorSettings) -> Self {
        let presets = Tier::ALL
            .into_iter()
            .map(|tier| (tier, TierPreset::builtin(tier)))
            .collect();
        Self {
            tier,
            presets,
            monitor: FpsMonitor::new(settings.sample_window),
            settings,
            subscribers: Vec::new(),
        }
    }

    /// Builds a governor from the configuration file. A configured tier
    /// wins over `detected`; without either the governor starts at
    /// `medium`. Tier overrides from the file replace preset fields.
    pub fn from_config(
        config: &FieldConfig,
        detected: Option<&Capabilities>,
    ) -> Result<Self, GovernorError> {
        let tier = match config.governor.fixed_tier() {
            Some(name) => name.parse()?,
            None => detected.map(determine_tier).unwrap_or(FALLBACK_TIER),
        };
        let mut governor = Self::new(tier, GovernorSettings::from(&config.governor));
        for tier in Tier::ALL {
            if let Some(patch) = config.tier_override(tier.as_str()) {
                let preset = TierPreset::builtin(tier).with_override(tier, patch)?;
                governor.presets.insert(tier, preset);
            }
        }
        debug!(%tier, adaptive = governor.settings.adaptive, "governor configured");
        Ok(governor)
    }

    pub fn with_preset(mut self, tier: Tier, preset: TierPreset) -> Self {
        self.presets.insert(tier, preset);
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    pub fn monitor(&self) -> &FpsMonitor {
        &self.monitor
    }

    pub fn preset(&self, tier: Tier) -> TierPreset {
        self.presets
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| TierPreset::builtin(tier))
    }

    pub fn current_preset(&self) -> TierPreset {
        self.preset(self.tier)
    }

    /// New channel receiving every subsequent [`TierChange`].
    pub fn subscribe(&mut self) -> Receiver<TierChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Pushes the current tier's preset into the render core.
    pub fn apply_profile(&self, control: &mut dyn QualityControl) -> bool {
        let preset = self.current_preset();
        let mut accepted = control.set_quality(preset.resolution_scale);
        if !preset.parameters.is_empty() {
            accepted &= control.update_parameters(&preset.parameters);
        }
        accepted
    }

    /// Feeds one presented frame. Returns the tier change when the frame
    /// completed a sample that triggered a degradation.
    pub fn record_frame(
        &mut self,
        timestamp_ms: f64,
        control: &mut dyn QualityControl,
    ) -> Option<TierChange> {
        self.monitor.record_frame(timestamp_ms)?;
        self.evaluate(control)
    }

    /// Feeds an externally measured frames-per-second sample.
    pub fn record_sample(
        &mut self,
        fps: f32,
        control: &mut dyn QualityControl,
    ) -> Option<TierChange> {
        self.monitor.push_sample(fps);
        self.evaluate(control)
    }

    /// Runs one degradation check against the current window.
    pub fn evaluate(&mut self, control: &mut dyn QualityControl) -> Option<TierChange> {
        if !self.settings.adaptive || self.monitor.len() < self.settings.min_samples.max(1) {
            return None;
        }
        let average_fps = self.monitor.average()?;
        if average_fps >= self.settings.fps_threshold || self.tier == Tier::Low {
            return None;
        }
        self.monitor.clear();
        let next = self.tier.step_down();
        Some(self.transition(next, ChangeReason::Degraded { average_fps }, control))
    }

    /// Moves to `tier` explicitly; the only way back up.
    pub fn set_tier(&mut self, tier: Tier, control: &mut dyn QualityControl) -> TierChange {
        self.monitor.clear();
        self.transition(tier, ChangeReason::Manual, control)
    }

    fn transition(
        &mut self,
        to: Tier,
        reason: ChangeReason,
        control: &mut dyn QualityControl,
    ) -> TierChange {
        let from = self.tier;
        self.tier = to;
        if !self.apply_profile(control) {
            warn!(tier = %to, "render core rejected tier preset");
        }
        match &reason {
            ChangeReason::Degraded { average_fps } => {
                info!(%from, %to, average_fps, "frame rate below threshold; lowering tier")
            }
            ChangeReason::Manual => info!(%from, %to, "tier set"),
        }
        let change = TierChange {
            from,
            to,
            reason,
            preset: self.current_preset(),
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
        change
    }
}
