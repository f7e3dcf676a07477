//! Visualization state, parameter keys and uniform bookkeeping.
//!
//! [`VisualizationState`] is the single record the render core owns. Outside
//! the crate it is only ever visible through a shared reference; the only
//! mutation path is [`PartialState`] fed through
//! [`crate::RenderCore::update_parameters`] (or the quality/frame paths inside
//! the core). Each [`ParameterKey`] maps to the exact [`Uniform`]s it feeds,
//! which is what the dirty set is computed from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::UniformValue;

/// Every uniform the base fragment template declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Uniform {
    Time,
    Resolution,
    Dimension,
    MorphFactor,
    RotationSpeed,
    UniverseModifier,
    PatternIntensity,
    GridDensity,
    LineThickness,
    ShellWidth,
    TetraThickness,
    GlitchIntensity,
    ColorShift,
    WorldBlend,
    WorldIntensity,
    AudioBass,
    AudioMid,
    AudioHigh,
    PrimaryColor,
    SecondaryColor,
    BackgroundColor,
    Mouse,
}

impl Uniform {
    pub const ALL: [Uniform; 22] = [
        Uniform::Time,
        Uniform::Resolution,
        Uniform::Dimension,
        Uniform::MorphFactor,
        Uniform::RotationSpeed,
        Uniform::UniverseModifier,
        Uniform::PatternIntensity,
        Uniform::GridDensity,
        Uniform::LineThickness,
        Uniform::ShellWidth,
        Uniform::TetraThickness,
        Uniform::GlitchIntensity,
        Uniform::ColorShift,
        Uniform::WorldBlend,
        Uniform::WorldIntensity,
        Uniform::AudioBass,
        Uniform::AudioMid,
        Uniform::AudioHigh,
        Uniform::PrimaryColor,
        Uniform::SecondaryColor,
        Uniform::BackgroundColor,
        Uniform::Mouse,
    ];

    /// Name of the uniform as declared in GLSL.
    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "u_time",
            Self::Resolution => "u_resolution",
            Self::Dimension => "u_dimension",
            Self::MorphFactor => "u_morphFactor",
            Self::RotationSpeed => "u_rotationSpeed",
            Self::UniverseModifier => "u_universeModifier",
            Self::PatternIntensity => "u_patternIntensity",
            Self::GridDensity => "u_gridDensity",
            Self::LineThickness => "u_lineThickness",
            Self::ShellWidth => "u_shellWidth",
            Self::TetraThickness => "u_tetraThickness",
            Self::GlitchIntensity => "u_glitchIntensity",
            Self::ColorShift => "u_colorShift",
            Self::WorldBlend => "u_worldBlend",
            Self::WorldIntensity => "u_worldIntensity",
            Self::AudioBass => "u_audioBass",
            Self::AudioMid => "u_audioMid",
            Self::AudioHigh => "u_audioHigh",
            Self::PrimaryColor => "u_primaryColor",
            Self::SecondaryColor => "u_secondaryColor",
            Self::BackgroundColor => "u_backgroundColor",
            Self::Mouse => "u_mouse",
        }
    }

    /// Transient uniforms are refreshed every frame and are not part of the
    /// initial dirty set.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Time)
    }
}

impl fmt::Display for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recognised keys of [`PartialState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterKey {
    Geometry,
    Projection,
    Dimension,
    MorphFactor,
    RotationSpeed,
    UniverseModifier,
    PatternIntensity,
    GridDensity,
    LineThickness,
    ShellWidth,
    TetraThickness,
    GlitchIntensity,
    ColorShift,
    WorldBlend,
    WorldIntensity,
    AudioLevels,
    ColorScheme,
    MousePosition,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 18] = [
        ParameterKey::Geometry,
        ParameterKey::Projection,
        ParameterKey::Dimension,
        ParameterKey::MorphFactor,
        ParameterKey::RotationSpeed,
        ParameterKey::UniverseModifier,
        ParameterKey::PatternIntensity,
        ParameterKey::GridDensity,
        ParameterKey::LineThickness,
        ParameterKey::ShellWidth,
        ParameterKey::TetraThickness,
        ParameterKey::GlitchIntensity,
        ParameterKey::ColorShift,
        ParameterKey::WorldBlend,
        ParameterKey::WorldIntensity,
        ParameterKey::AudioLevels,
        ParameterKey::ColorScheme,
        ParameterKey::MousePosition,
    ];

    /// Uniforms that become stale when this key changes.
    pub fn uniforms(self) -> &'static [Uniform] {
        match self {
            Self::Geometry | Self::Projection => &[],
            Self::Dimension => &[Uniform::Dimension],
            Self::MorphFactor => &[Uniform::MorphFactor],
            Self::RotationSpeed => &[Uniform::RotationSpeed],
            Self::UniverseModifier => &[Uniform::UniverseModifier],
            Self::PatternIntensity => &[Uniform::PatternIntensity],
            Self::GridDensity => &[Uniform::GridDensity],
            Self::LineThickness => &[Uniform::LineThickness],
            Self::ShellWidth => &[Uniform::ShellWidth],
            Self::TetraThickness => &[Uniform::TetraThickness],
            Self::GlitchIntensity => &[Uniform::GlitchIntensity],
            Self::ColorShift => &[Uniform::ColorShift],
            Self::WorldBlend => &[Uniform::WorldBlend],
            Self::WorldIntensity => &[Uniform::WorldIntensity],
            Self::AudioLevels => &[Uniform::AudioBass, Uniform::AudioMid, Uniform::AudioHigh],
            Self::ColorScheme => &[
                Uniform::PrimaryColor,
                Uniform::SecondaryColor,
                Uniform::BackgroundColor,
            ],
            Self::MousePosition => &[Uniform::Mouse],
        }
    }

    /// Keys that select a different fragment program instead of a uniform.
    pub fn requires_rebuild(self) -> bool {
        matches!(self, Self::Geometry | Self::Projection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AudioLevels {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorScheme {
    pub primary: [f32; 3],
    pub secondary: [f32; 3],
    pub background: [f32; 3],
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            primary: [1.0, 0.0, 1.0],
            secondary: [0.0, 1.0, 1.0],
            background: [0.02, 0.02, 0.05],
        }
    }
}

/// Complete visualization state owned by the render core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationState {
    pub time: f64,
    pub delta_time: f64,
    pub resolution: (u32, u32),
    pub geometry: String,
    pub projection: String,
    pub dimension: f32,
    pub morph_factor: f32,
    pub rotation_speed: f32,
    pub universe_modifier: f32,
    pub pattern_intensity: f32,
    pub grid_density: f32,
    pub line_thickness: f32,
    pub shell_width: f32,
    pub tetra_thickness: f32,
    pub glitch_intensity: f32,
    pub color_shift: f32,
    pub world_blend: f32,
    pub world_intensity: f32,
    pub audio_levels: AudioLevels,
    pub color_scheme: ColorScheme,
    pub mouse_position: (f32, f32),
    pub quality: f32,
}

impl Default for VisualizationState {
    fn default() -> Self {
        Self {
            time: 0.0,
            delta_time: 0.0,
            resolution: (0, 0),
            geometry: "hypercube".to_string(),
            projection: "perspective".to_string(),
            dimension: 3.5,
            morph_factor: 0.5,
            rotation_speed: 0.5,
            universe_modifier: 1.0,
            pattern_intensity: 1.0,
            grid_density: 8.0,
            line_thickness: 0.03,
            shell_width: 0.025,
            tetra_thickness: 0.035,
            glitch_intensity: 0.0,
            color_shift: 0.0,
            world_blend: 0.0,
            world_intensity: 1.0,
            audio_levels: AudioLevels::default(),
            color_scheme: ColorScheme::default(),
            mouse_position: (0.5, 0.5),
            quality: 1.0,
        }
    }
}

macro_rules! merge_scalars {
    ($state:ident, $partial:ident, $changed:ident, $($field:ident => $key:ident),* $(,)?) => {
        $(
            if let Some(value) = $partial.$field {
                if !value.is_finite() {
                    tracing::warn!(parameter = ?ParameterKey::$key, value, "ignoring non-finite parameter");
                } else if value != $state.$field {
                    $state.$field = value;
                    $changed.push(ParameterChange::whole(ParameterKey::$key));
                }
            }
        )*
    };
}

/// One key that changed during a merge, with the uniforms it made stale.
/// Compound keys list only the components that actually moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParameterChange {
    pub(crate) key: ParameterKey,
    pub(crate) uniforms: Vec<Uniform>,
}

impl ParameterChange {
    fn whole(key: ParameterKey) -> Self {
        Self {
            key,
            uniforms: key.uniforms().to_vec(),
        }
    }

    fn components<const N: usize>(
        key: ParameterKey,
        moved: [(bool, Uniform); N],
    ) -> Option<Self> {
        let uniforms: Vec<Uniform> = moved
            .into_iter()
            .filter_map(|(changed, uniform)| changed.then_some(uniform))
            .collect();
        (!uniforms.is_empty()).then_some(Self { key, uniforms })
    }
}

impl VisualizationState {
    /// Merges `partial` into the state and returns what actually changed.
    pub(crate) fn merge(&mut self, partial: &PartialState) -> Vec<ParameterChange> {
        let mut changed = Vec::new();

        if let Some(geometry) = partial.geometry.as_deref() {
            if geometry != self.geometry {
                self.geometry = geometry.to_string();
                changed.push(ParameterChange::whole(ParameterKey::Geometry));
            }
        }
        if let Some(projection) = partial.projection.as_deref() {
            if projection != self.projection {
                self.projection = projection.to_string();
                changed.push(ParameterChange::whole(ParameterKey::Projection));
            }
        }

        merge_scalars!(self, partial, changed,
            dimension => Dimension,
            morph_factor => MorphFactor,
            rotation_speed => RotationSpeed,
            universe_modifier => UniverseModifier,
            pattern_intensity => PatternIntensity,
            grid_density => GridDensity,
            line_thickness => LineThickness,
            shell_width => ShellWidth,
            tetra_thickness => TetraThickness,
            glitch_intensity => GlitchIntensity,
            color_shift => ColorShift,
            world_blend => WorldBlend,
            world_intensity => WorldIntensity,
        );

        if let Some(audio) = &partial.audio_levels {
            let merged = AudioLevels {
                bass: finite_or(audio.bass, self.audio_levels.bass),
                mid: finite_or(audio.mid, self.audio_levels.mid),
                high: finite_or(audio.high, self.audio_levels.high),
            };
            let current = self.audio_levels;
            changed.extend(ParameterChange::components(
                ParameterKey::AudioLevels,
                [
                    (merged.bass != current.bass, Uniform::AudioBass),
                    (merged.mid != current.mid, Uniform::AudioMid),
                    (merged.high != current.high, Uniform::AudioHigh),
                ],
            ));
            self.audio_levels = merged;
        }

        if let Some(colors) = &partial.color_scheme {
            let merged = ColorScheme {
                primary: finite_vec3_or(colors.primary, self.color_scheme.primary),
                secondary: finite_vec3_or(colors.secondary, self.color_scheme.secondary),
                background: finite_vec3_or(colors.background, self.color_scheme.background),
            };
            let current = self.color_scheme;
            changed.extend(ParameterChange::components(
                ParameterKey::ColorScheme,
                [
                    (merged.primary != current.primary, Uniform::PrimaryColor),
                    (merged.secondary != current.secondary, Uniform::SecondaryColor),
                    (merged.background != current.background, Uniform::BackgroundColor),
                ],
            ));
            self.color_scheme = merged;
        }

        if let Some([x, y]) = partial.mouse_position {
            if x.is_finite() && y.is_finite() && (x, y) != self.mouse_position {
                self.mouse_position = (x, y);
                changed.push(ParameterChange::whole(ParameterKey::MousePosition));
            }
        }

        changed
    }

    /// Value to upload for `uniform`.
    pub fn uniform_value(&self, uniform: Uniform) -> UniformValue {
        use UniformValue::{Float, Vec2, Vec3};
        match uniform {
            Uniform::Time => Float(self.time as f32),
            Uniform::Resolution => Vec2([self.resolution.0 as f32, self.resolution.1 as f32]),
            Uniform::Dimension => Float(self.dimension),
            Uniform::MorphFactor => Float(self.morph_factor),
            Uniform::RotationSpeed => Float(self.rotation_speed),
            Uniform::UniverseModifier => Float(self.universe_modifier),
            Uniform::PatternIntensity => Float(self.pattern_intensity),
            Uniform::GridDensity => Float(self.grid_density),
            Uniform::LineThickness => Float(self.line_thickness),
            Uniform::ShellWidth => Float(self.shell_width),
            Uniform::TetraThickness => Float(self.tetra_thickness),
            Uniform::GlitchIntensity => Float(self.glitch_intensity),
            Uniform::ColorShift => Float(self.color_shift),
            Uniform::WorldBlend => Float(self.world_blend),
            Uniform::WorldIntensity => Float(self.world_intensity),
            Uniform::AudioBass => Float(self.audio_levels.bass),
            Uniform::AudioMid => Float(self.audio_levels.mid),
            Uniform::AudioHigh => Float(self.audio_levels.high),
            Uniform::PrimaryColor => Vec3(self.color_scheme.primary),
            Uniform::SecondaryColor => Vec3(self.color_scheme.secondary),
            Uniform::BackgroundColor => Vec3(self.color_scheme.background),
            Uniform::Mouse => Vec2([self.mouse_position.0, self.mouse_position.1]),
        }
    }

    /// Clear color derived from the background of the color scheme.
    pub fn clear_color(&self) -> [f32; 4] {
        let [r, g, b] = self.color_scheme.background;
        [r, g, b, 1.0]
    }
}

fn finite_or(value: Option<f32>, current: f32) -> f32 {
    value.filter(|value| value.is_finite()).unwrap_or(current)
}

fn finite_vec3_or(value: Option<[f32; 3]>, current: [f32; 3]) -> [f32; 3] {
    value
        .filter(|value| value.iter().all(|component| component.is_finite()))
        .unwrap_or(current)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAudioLevels {
    pub bass: Option<f32>,
    pub mid: Option<f32>,
    pub high: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialColorScheme {
    pub primary: Option<[f32; 3]>,
    pub secondary: Option<[f32; 3]>,
    pub background: Option<[f32; 3]>,
}

/// Sparse parameter update. Absent fields leave the state untouched and
/// unknown keys are ignored when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialState {
    #[serde(alias = "geometryType", skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(alias = "projectionMethod", skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,
    #[serde(alias = "dimensions", skip_serializing_if = "Option::is_none")]
    pub dimension: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morph_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub universe_modifier: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_density: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_thickness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tetra_thickness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glitch_intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_shift: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_blend: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_levels: Option<PartialAudioLevels>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<PartialColorScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_position: Option<[f32; 2]>,
}

impl PartialState {
    /// Spelling used when serializing `key`; accepted aliases map to their
    /// field name and anything else is returned unchanged.
    pub fn canonical_key(key: &str) -> &str {
        match key {
            "geometryType" => "geometry",
            "projectionMethod" => "projection",
            "dimensions" => "dimension",
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlays `other` on top of `self`, field by field.
    pub fn overlay(&mut self, other: PartialState) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            geometry, projection, dimension, morph_factor, rotation_speed, universe_modifier,
            pattern_intensity, grid_density, line_thickness, shell_width, tetra_thickness,
            glitch_intensity, color_shift, world_blend, world_intensity, mouse_position
        );
        if let Some(audio) = other.audio_levels {
            let current = self.audio_levels.get_or_insert_with(Default::default);
            current.bass = audio.bass.or(current.bass);
            current.mid = audio.mid.or(current.mid);
            current.high = audio.high.or(current.high);
        }
        if let Some(colors) = other.color_scheme {
            let current = self.color_scheme.get_or_insert_with(Default::default);
            current.primary = colors.primary.or(current.primary);
            current.secondary = colors.secondary.or(current.secondary);
            current.background = colors.background.or(current.background);
        }
    }
}

/// Ordered set of uniforms waiting to be uploaded.
#[derive(Debug, Clone, Default)]
pub(crate) struct DirtyUniforms {
    pending: BTreeSet<Uniform>,
}

impl DirtyUniforms {
    pub(crate) fn mark(&mut self, uniform: Uniform) {
        self.pending.insert(uniform);
    }

    pub(crate) fn mark_change(&mut self, change: &ParameterChange) {
        self.pending.extend(change.uniforms.iter().copied());
    }

    pub(crate) fn mark_all(&mut self, include_transient: bool) {
        self.pending.extend(
            Uniform::ALL
                .iter()
                .copied()
                .filter(|uniform| include_transient || !uniform.is_transient()),
        );
    }

    pub(crate) fn take(&mut self) -> BTreeSet<Uniform> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn restore(&mut self, uniforms: impl IntoIterator<Item = Uniform>) {
        self.pending.extend(uniforms);
    }

    pub(crate) fn snapshot(&self) -> BTreeSet<Uniform> {
        self.pending.clone()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed_partial(key: ParameterKey) -> PartialState {
        let mut partial = PartialState::default();
        match key {
            ParameterKey::Geometry => partial.geometry = Some("hypersphere".into()),
            ParameterKey::Projection => partial.projection = Some("stereographic".into()),
            ParameterKey::Dimension => partial.dimension = Some(4.0),
            ParameterKey::MorphFactor => partial.morph_factor = Some(0.9),
            ParameterKey::RotationSpeed => partial.rotation_speed = Some(1.5),
            ParameterKey::UniverseModifier => partial.universe_modifier = Some(2.0),
            ParameterKey::PatternIntensity => partial.pattern_intensity = Some(0.2),
            ParameterKey::GridDensity => partial.grid_density = Some(12.0),
            ParameterKey::LineThickness => partial.line_thickness = Some(0.05),
            ParameterKey::ShellWidth => partial.shell_width = Some(0.1),
            ParameterKey::TetraThickness => partial.tetra_thickness = Some(0.2),
            ParameterKey::GlitchIntensity => partial.glitch_intensity = Some(0.4),
            ParameterKey::ColorShift => partial.color_shift = Some(0.3),
            ParameterKey::WorldBlend => partial.world_blend = Some(0.7),
            ParameterKey::WorldIntensity => partial.world_intensity = Some(0.6),
            ParameterKey::AudioLevels => {
                partial.audio_levels = Some(PartialAudioLevels {
                    mid: Some(0.8),
                    ..Default::default()
                })
            }
            ParameterKey::ColorScheme => {
                partial.color_scheme = Some(PartialColorScheme {
                    secondary: Some([0.1, 0.2, 0.3]),
                    ..Default::default()
                })
            }
            ParameterKey::MousePosition => partial.mouse_position = Some([0.1, 0.9]),
        }
        partial
    }

    #[test]
    fn every_key_reports_exactly_itself() {
        for key in ParameterKey::ALL {
            let mut state = VisualizationState::default();
            let keys: Vec<_> = state
                .merge(&changed_partial(key))
                .into_iter()
                .map(|change| change.key)
                .collect();
            assert_eq!(keys, vec![key], "merge for {key:?}");
        }
    }

    #[test]
    fn identical_values_are_not_changes() {
        let mut state = VisualizationState::default();
        let partial = PartialState {
            grid_density: Some(8.0),
            geometry: Some("hypercube".into()),
            mouse_position: Some([0.5, 0.5]),
            audio_levels: Some(PartialAudioLevels::default()),
            ..Default::default()
        };
        assert!(state.merge(&partial).is_empty());
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let mut state = VisualizationState::default();
        let partial = PartialState {
            dimension: Some(f32::NAN),
            morph_factor: Some(f32::INFINITY),
            ..Default::default()
        };
        assert!(state.merge(&partial).is_empty());
        assert_eq!(state.dimension, 3.5);
    }

    #[test]
    fn compound_merge_keeps_untouched_components() {
        let mut state = VisualizationState::default();
        state.merge(&changed_partial(ParameterKey::ColorScheme));
        assert_eq!(state.color_scheme.secondary, [0.1, 0.2, 0.3]);
        assert_eq!(state.color_scheme.primary, ColorScheme::default().primary);
    }

    #[test]
    fn compound_keys_mark_only_moved_components() {
        let mut state = VisualizationState::default();
        let changes = state.merge(&changed_partial(ParameterKey::ColorScheme));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].uniforms, vec![Uniform::SecondaryColor]);

        let changes = state.merge(&PartialState {
            audio_levels: Some(PartialAudioLevels {
                bass: Some(0.0),
                high: Some(0.4),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].uniforms, vec![Uniform::AudioHigh]);
    }

    #[test]
    fn partial_state_parses_camel_case_and_ignores_unknown_keys() {
        let partial: PartialState = serde_json::from_str(
            r#"{"gridDensity": 4.0, "geometryType": "duocylinder",
                "audioLevels": {"bass": 0.5}, "particleCount": 12}"#,
        )
        .expect("parse partial state");
        assert_eq!(partial.grid_density, Some(4.0));
        assert_eq!(partial.geometry.as_deref(), Some("duocylinder"));
        assert_eq!(
            partial.audio_levels.as_ref().and_then(|audio| audio.bass),
            Some(0.5)
        );
    }

    #[test]
    fn aliases_resolve_to_serialized_names() {
        for (alias, value) in [
            ("geometryType", serde_json::json!("duocylinder")),
            ("projectionMethod", serde_json::json!("orthographic")),
            ("dimensions", serde_json::json!(4.0)),
        ] {
            let canonical = PartialState::canonical_key(alias);
            assert_ne!(canonical, alias);
            let from_alias: PartialState =
                serde_json::from_value(serde_json::json!({ alias: value.clone() })).expect("alias");
            let reserialized = serde_json::to_value(&from_alias).expect("serialize");
            assert_eq!(reserialized[canonical], value, "{alias}");
        }
        assert_eq!(PartialState::canonical_key("gridDensity"), "gridDensity");
    }

    #[test]
    fn overlay_prefers_newer_fields() {
        let mut base = PartialState {
            grid_density: Some(4.0),
            dimension: Some(3.0),
            ..Default::default()
        };
        base.overlay(PartialState {
            grid_density: Some(6.0),
            ..Default::default()
        });
        assert_eq!(base.grid_density, Some(6.0));
        assert_eq!(base.dimension, Some(3.0));
    }

    #[test]
    fn dirty_set_initialisation_skips_transient() {
        let mut dirty = DirtyUniforms::default();
        dirty.mark_all(false);
        let snapshot = dirty.snapshot();
        assert!(!snapshot.contains(&Uniform::Time));
        assert_eq!(snapshot.len(), Uniform::ALL.len() - 1);
    }
}
