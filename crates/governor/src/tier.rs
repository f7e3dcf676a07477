use std::fmt;
use std::str::FromStr;

use fieldconfig::{ShaderQuality, TierOverride};
use renderer::PartialState;
use serde::Serialize;

use crate::error::GovernorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
    Ultra,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Low, Tier::Medium, Tier::High, Tier::Ultra];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
            Tier::Ultra => "ultra",
        }
    }

    /// The next lower tier; `low` stays `low`.
    pub fn step_down(self) -> Tier {
        match self {
            Tier::Ultra => Tier::High,
            Tier::High => Tier::Medium,
            Tier::Medium | Tier::Low => Tier::Low,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = GovernorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Tier::Low),
            "medium" => Ok(Tier::Medium),
            "high" => Ok(Tier::High),
            "ultra" => Ok(Tier::Ultra),
            _ => Err(GovernorError::UnknownTier(s.to_string())),
        }
    }
}

/// Rendering budget attached to a tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierPreset {
    /// Render core quality factor.
    pub resolution_scale: f32,
    pub particle_count: u32,
    pub point_count: u32,
    pub shader_quality: ShaderQuality,
    pub complexity: f32,
    pub post_effects: bool,
    /// Parameters pushed to the render core with the preset.
    pub parameters: PartialState,
}

impl TierPreset {
    pub fn builtin(tier: Tier) -> Self {
        let (resolution_scale, particle_count, point_count, shader_quality, complexity, post_effects) =
            match tier {
                Tier::Low => (0.5, 150, 2_000, ShaderQuality::Low, 0.5, false),
                Tier::Medium => (0.75, 400, 6_000, ShaderQuality::Medium, 0.75, false),
                Tier::High => (1.0, 800, 12_000, ShaderQuality::High, 1.0, true),
                Tier::Ultra => (1.0, 1_500, 24_000, ShaderQuality::High, 1.25, true),
            };
        Self {
            resolution_scale,
            particle_count,
            point_count,
            shader_quality,
            complexity,
            post_effects,
            parameters: PartialState::default(),
        }
    }

    /// Layers a configuration override over this preset.
    pub fn with_override(mut self, tier: Tier, patch: &TierOverride) -> Result<Self, GovernorError> {
        if let Some(scale) = patch.resolution_scale {
            self.resolution_scale = scale;
        }
        if let Some(count) = patch.particle_count {
            self.particle_count = count;
        }
        if let Some(count) = patch.point_count {
            self.point_count = count;
        }
        if let Some(quality) = patch.shader_quality {
            self.shader_quality = quality;
        }
        if let Some(complexity) = patch.complexity {
            self.complexity = complexity;
        }
        if let Some(post_effects) = patch.post_effects {
            self.post_effects = post_effects;
        }
        if !patch.parameters.is_empty() {
            self.parameters =
                patch
                    .parameters_as::<PartialState>()
                    .map_err(|err| GovernorError::InvalidPreset {
                        tier: tier.to_string(),
                        message: err.to_string(),
                    })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Ultra".parse::<Tier>().expect("tier"), Tier::Ultra);
        assert_eq!(" low ".parse::<Tier>().expect("tier"), Tier::Low);
        assert!(matches!(
            "extreme".parse::<Tier>(),
            Err(GovernorError::UnknownTier(name)) if name == "extreme"
        ));
    }

    #[test]
    fn step_down_bottoms_out_at_low() {
        let mut tier = Tier::Ultra;
        let mut seen = vec![tier];
        for _ in 0..4 {
            tier = tier.step_down();
            seen.push(tier);
        }
        assert_eq!(
            seen,
            vec![Tier::Ultra, Tier::High, Tier::Medium, Tier::Low, Tier::Low]
        );
    }

    #[test]
    fn builtin_presets_match_table() {
        let low = TierPreset::builtin(Tier::Low);
        assert_eq!(low.resolution_scale, 0.5);
        assert_eq!(low.particle_count, 150);
        assert!(!low.post_effects);
        let ultra = TierPreset::builtin(Tier::Ultra);
        assert_eq!(ultra.point_count, 24_000);
        assert_eq!(ultra.shader_quality, ShaderQuality::High);
        assert_eq!(ultra.complexity, 1.25);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let patch: TierOverride = toml::from_str(
            "resolution_scale = 0.6\npost_effects = true\n[parameters]\ngridDensity = 4.0\n",
        )
        .expect("override");
        let preset = TierPreset::builtin(Tier::Medium)
            .with_override(Tier::Medium, &patch)
            .expect("apply override");
        assert_eq!(preset.resolution_scale, 0.6);
        assert!(preset.post_effects);
        assert_eq!(preset.particle_count, 400);
        assert_eq!(preset.parameters.grid_density, Some(4.0));
    }

    #[test]
    fn bad_override_parameters_are_rejected() {
        let patch: TierOverride =
            toml::from_str("[parameters]\ngridDensity = \"dense\"\n").expect("override");
        assert!(matches!(
            TierPreset::builtin(Tier::Low).with_override(Tier::Low, &patch),
            Err(GovernorError::InvalidPreset { .. })
        ));
    }
}
