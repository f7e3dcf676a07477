//! Versioned TOML configuration for hyperfield.
//!
//! ```toml
//! version = 1
//!
//! [render]
//! geometry = "hypersphere"
//! projection = "stereographic"
//! fps = 60
//!
//! [render.parameters]
//! gridDensity = 12.0
//!
//! [governor]
//! tier = "auto"
//! probe_timeout = "3s"
//!
//! [tiers.low]
//! resolution_scale = 0.4
//!
//! [fragments]
//! packs = ["~/shaders/lattices"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

/// Tier names accepted in `governor.tier` and as `[tiers.<name>]` keys.
pub const TIER_NAMES: [&str; 4] = ["low", "medium", "high", "ultra"];

/// Network classes accepted in `governor.network`.
pub const NETWORK_TYPES: [&str; 4] = ["slow-2g", "2g", "3g", "4g"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderQuality {
    Low,
    Medium,
    High,
}

impl fmt::Display for ShaderQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldConfig {
    pub version: u32,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub governor: GovernorSection,
    #[serde(default)]
    pub tiers: BTreeMap<String, TierOverride>,
    #[serde(default)]
    pub fragments: FragmentsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RenderSection {
    pub geometry: Option<String>,
    pub projection: Option<String>,
    pub quality: Option<f32>,
    pub fps: Option<f32>,
    /// Preview window size as `WxH`.
    pub size: Option<String>,
    /// Initial visualization parameters, keyed like the state fields
    /// (`morphFactor`, `colorScheme.primary`, ...).
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub parameters: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GovernorSection {
    /// Fixed tier, or `auto`/absent to detect one.
    pub tier: Option<String>,
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,
    #[serde(default = "default_fps_threshold")]
    pub fps_threshold: f32,
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_benchmark_frames")]
    pub benchmark_frames: u32,
    #[serde(default = "default_cpu_matrix_size")]
    pub cpu_matrix_size: usize,
    #[serde(
        default = "default_probe_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub probe_timeout: Duration,
    /// Overrides the detected network class.
    pub network: Option<String>,
    /// Overrides the detected device memory in GiB.
    pub device_memory_gb: Option<f32>,
    /// Overrides the user agent used by the mobile heuristic.
    pub user_agent: Option<String>,
}

impl Default for GovernorSection {
    fn default() -> Self {
        Self {
            tier: None,
            adaptive: default_adaptive(),
            fps_threshold: default_fps_threshold(),
            sample_window: default_sample_window(),
            min_samples: default_min_samples(),
            benchmark_frames: default_benchmark_frames(),
            cpu_matrix_size: default_cpu_matrix_size(),
            probe_timeout: default_probe_timeout(),
            network: None,
            device_memory_gb: None,
            user_agent: None,
        }
    }
}

impl GovernorSection {
    /// The configured tier name, with `auto` treated as unset.
    pub fn fixed_tier(&self) -> Option<&str> {
        self.tier
            .as_deref()
            .map(str::trim)
            .filter(|tier| !tier.eq_ignore_ascii_case("auto"))
    }
}

/// Per-tier adjustments layered over the built-in presets.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TierOverride {
    pub resolution_scale: Option<f32>,
    pub particle_count: Option<u32>,
    pub point_count: Option<u32>,
    pub shader_quality: Option<ShaderQuality>,
    pub complexity: Option<f32>,
    pub post_effects: Option<bool>,
    /// Parameters pushed to the render core when the tier is applied.
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub parameters: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FragmentsSection {
    #[serde(default)]
    pub packs: Vec<PathBuf>,
}

fn default_adaptive() -> bool {
    true
}

fn default_fps_threshold() -> f32 {
    30.0
}

fn default_sample_window() -> usize {
    100
}

fn default_min_samples() -> usize {
    3
}

fn default_benchmark_frames() -> u32 {
    60
}

fn default_cpu_matrix_size() -> usize {
    64
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            render: RenderSection::default(),
            governor: GovernorSection::default(),
            tiers: BTreeMap::new(),
            fragments: FragmentsSection::default(),
        }
    }
}

impl FieldConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FieldConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn tier_override(&self, tier: &str) -> Option<&TierOverride> {
        self.tiers.get(tier)
    }

    /// Decodes `[render.parameters]` into the caller's parameter type.
    pub fn render_parameters<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_table(&self.render.parameters, "render.parameters")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        self.validate_render()?;
        self.validate_governor()?;

        for (name, tier) in &self.tiers {
            if !TIER_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unknown tier '{name}'; expected one of {}",
                    TIER_NAMES.join(", ")
                )));
            }
            if let Some(scale) = tier.resolution_scale {
                if !(scale > 0.0 && scale <= 1.0) {
                    return Err(ConfigError::Invalid(format!(
                        "tiers.{name}.resolution_scale must be in (0, 1]"
                    )));
                }
            }
            if let Some(complexity) = tier.complexity {
                if !complexity.is_finite() || complexity < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "tiers.{name}.complexity must be a non-negative number"
                    )));
                }
            }
        }

        for pack in &self.fragments.packs {
            if pack.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "fragments.packs may not contain an empty path".into(),
                ));
            }
        }

        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        for (field, value) in [("geometry", &render.geometry), ("projection", &render.projection)] {
            if value.as_deref().is_some_and(|name| name.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "render.{field} may not be empty"
                )));
            }
        }
        if let Some(quality) = render.quality {
            if !(0.1..=1.0).contains(&quality) {
                return Err(ConfigError::Invalid(
                    "render.quality must be between 0.1 and 1.0".into(),
                ));
            }
        }
        if let Some(fps) = render.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }
        if let Some(size) = render.size.as_deref() {
            let valid = size
                .split_once(['x', 'X'])
                .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
                .is_some_and(|(w, h)| w > 0 && h > 0);
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "render.size '{size}' is invalid; expected WxH, e.g. 1280x720"
                )));
            }
        }
        Ok(())
    }

    fn validate_governor(&self) -> Result<(), ConfigError> {
        let governor = &self.governor;
        if let Some(tier) = governor.fixed_tier() {
            if !TIER_NAMES.contains(&tier.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "governor.tier '{tier}' is invalid; expected auto or one of {}",
                    TIER_NAMES.join(", ")
                )));
            }
        }
        if !governor.fps_threshold.is_finite() || governor.fps_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "governor.fps_threshold must be greater than zero".into(),
            ));
        }
        if governor.sample_window == 0 {
            return Err(ConfigError::Invalid(
                "governor.sample_window must be at least 1".into(),
            ));
        }
        if governor.min_samples == 0 || governor.min_samples > governor.sample_window {
            return Err(ConfigError::Invalid(format!(
                "governor.min_samples must be between 1 and sample_window ({})",
                governor.sample_window
            )));
        }
        if governor.benchmark_frames == 0 {
            return Err(ConfigError::Invalid(
                "governor.benchmark_frames must be at least 1".into(),
            ));
        }
        if !(1..=512).contains(&governor.cpu_matrix_size) {
            return Err(ConfigError::Invalid(
                "governor.cpu_matrix_size must be between 1 and 512".into(),
            ));
        }
        if governor.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "governor.probe_timeout must be greater than zero".into(),
            ));
        }
        if let Some(network) = governor.network.as_deref() {
            if !NETWORK_TYPES.contains(&network) {
                return Err(ConfigError::Invalid(format!(
                    "governor.network '{network}' is invalid; expected one of {}",
                    NETWORK_TYPES.join(", ")
                )));
            }
        }
        if let Some(memory) = governor.device_memory_gb {
            if !memory.is_finite() || memory < 0.0 {
                return Err(ConfigError::Invalid(
                    "governor.device_memory_gb must be >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}

impl TierOverride {
    /// Decodes `parameters` into the caller's parameter type.
    pub fn parameters_as<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_table(&self.parameters, "tier parameters")
    }
}

fn decode_table<T: DeserializeOwned>(table: &toml::Table, what: &str) -> Result<T, ConfigError> {
    toml::Value::Table(table.clone())
        .try_into()
        .map_err(|err| ConfigError::Invalid(format!("{what}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[render]
geometry = "hypersphere"
projection = "stereographic"
quality = 0.8
fps = 60
size = "1600x900"

[render.parameters]
gridDensity = 12.0
colorScheme = { primary = [0.0, 1.0, 0.5] }

[governor]
tier = "auto"
fps_threshold = 24
probe_timeout = "1500ms"
network = "3g"

[tiers.low]
resolution_scale = 0.4
shader_quality = "low"

[tiers.ultra.parameters]
patternIntensity = 1.4

[fragments]
packs = ["packs/lattices"]
"#;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Params {
        grid_density: Option<f32>,
        pattern_intensity: Option<f32>,
    }

    #[test]
    fn parses_sample_config() {
        let config = FieldConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.render.geometry.as_deref(), Some("hypersphere"));
        assert_eq!(config.render.fps, Some(60.0));
        assert_eq!(config.governor.fixed_tier(), None);
        assert_eq!(config.governor.fps_threshold, 24.0);
        assert_eq!(config.governor.probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.governor.sample_window, 100);
        assert!(config.governor.adaptive);
        assert_eq!(
            config.tier_override("low").and_then(|tier| tier.shader_quality),
            Some(ShaderQuality::Low)
        );
        assert_eq!(config.fragments.packs, vec![PathBuf::from("packs/lattices")]);
    }

    #[test]
    fn decodes_parameter_tables() {
        let config = FieldConfig::from_toml_str(SAMPLE).expect("parse config");
        let params: Params = config.render_parameters().expect("render parameters");
        assert_eq!(params.grid_density, Some(12.0));
        let ultra: Params = config
            .tier_override("ultra")
            .expect("ultra override")
            .parameters_as()
            .expect("tier parameters");
        assert_eq!(ultra.pattern_intensity, Some(1.4));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = FieldConfig::from_toml_str("version = 1").expect("minimal config");
        assert_eq!(config, FieldConfig::default());
        assert_eq!(config.governor.min_samples, 3);
        assert_eq!(config.governor.cpu_matrix_size, 64);
        assert_eq!(config.governor.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_version() {
        let err = FieldConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("version 2")));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "[render]\nquality = 1.5",
            "[render]\nsize = \"0x10\"",
            "[governor]\nfps_threshold = 0",
            "[governor]\nmin_samples = 200",
            "[governor]\nnetwork = \"5g\"",
            "[governor]\ntier = \"extreme\"",
            "[tiers.huge]\ncomplexity = 1.0",
            "[tiers.low]\nresolution_scale = 0",
        ] {
            let input = format!("version = 1\n{body}\n");
            let err = FieldConfig::from_toml_str(&input).expect_err(body);
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
        }
    }

    #[test]
    fn fixed_tier_ignores_auto() {
        let config = FieldConfig::from_toml_str("version = 1\n[governor]\ntier = \"High\"\n")
            .expect("tier config");
        assert_eq!(config.governor.fixed_tier(), Some("High"));
    }
}
