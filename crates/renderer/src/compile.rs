//! Base shader sources and the slot-based fragment template.
//!
//! The fragment template contains `#pragma slot(name)` marker lines. A
//! [`ShaderTemplate`] is parsed once, then assembled with a [`SlotFills`]
//! value; assembly fails if any slot is left empty or a fill names a slot the
//! template does not have.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Slot receiving the geometry fragment (`geometryLattice`).
pub const SLOT_GEOMETRY: &str = "geometry";
/// Slot receiving the projection fragment (`project4D`).
pub const SLOT_PROJECTION: &str = "projection";

/// Source name the shared vertex shader is registered under.
pub const BASE_VERTEX: &str = "base-vertex";
/// Source name the fragment template is registered under.
pub const BASE_FRAGMENT: &str = "base";

/// Attribute carrying quad positions in clip space.
pub const POSITION_ATTRIBUTE: &str = "a_position";

const SLOT_PREFIX: &str = "#pragma slot";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("slot `{0}` was never filled")]
    UnfilledSlot(String),
    #[error("template has no slot named `{0}`")]
    UnknownSlot(String),
    #[error("slot `{0}` appears more than once")]
    DuplicateSlot(String),
    #[error("malformed slot marker on line {line}: `{text}`")]
    MalformedMarker { line: usize, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(String),
}

/// Parsed shader source with named injection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderTemplate {
    segments: Vec<Segment>,
}

impl ShaderTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut seen = Vec::<String>::new();

        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if !trimmed.starts_with(SLOT_PREFIX) {
                text.push_str(line);
                text.push('\n');
                continue;
            }

            let name = parse_marker(trimmed).ok_or_else(|| TemplateError::MalformedMarker {
                line: index + 1,
                text: trimmed.to_string(),
            })?;
            if seen.iter().any(|existing| existing == name) {
                return Err(TemplateError::DuplicateSlot(name.to_string()));
            }
            seen.push(name.to_string());

            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Slot(name.to_string()));
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// Names of the slots in the order they appear.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    pub fn has_slots(&self) -> bool {
        self.slots().next().is_some()
    }

    pub fn assemble(&self, fills: &SlotFills) -> Result<String, TemplateError> {
        if let Some(unknown) = fills
            .names()
            .find(|name| !self.slots().any(|slot| slot == *name))
        {
            return Err(TemplateError::UnknownSlot(unknown.to_string()));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let code = fills
                        .get(name)
                        .ok_or_else(|| TemplateError::UnfilledSlot(name.clone()))?;
                    out.push_str(code);
                    if !code.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_marker(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix(SLOT_PREFIX)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?.trim();
    let valid = !inner.is_empty()
        && inner
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    valid.then_some(inner)
}

/// Code assigned to template slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFills {
    fills: BTreeMap<String, String>,
}

impl SlotFills {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(
        &mut self,
        slot: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<&mut Self, TemplateError> {
        let slot = slot.into();
        if self.fills.contains_key(&slot) {
            return Err(TemplateError::DuplicateSlot(slot));
        }
        self.fills.insert(slot, code.into());
        Ok(self)
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.fills.get(slot).map(String::as_str)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.fills.keys().map(String::as_str)
    }
}

/// Re-prints `source` with line numbers, marking `failing_line` with `>>`.
pub fn annotate_source(source: &str, failing_line: Option<u32>) -> String {
    let width = source.lines().count().max(1).to_string().len();
    let mut out = String::new();
    for (index, line) in source.lines().enumerate() {
        let number = index + 1;
        let marker = if failing_line == Some(number as u32) {
            ">>"
        } else {
            "  "
        };
        let _ = writeln!(out, "{marker} {number:>width$} | {line}");
    }
    out
}

/// Shared pass-through vertex shader for the full-screen quad.
pub const VERTEX_SOURCE: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_position * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Fragment template; geometry and projection code is injected at the slots.
///
/// Geometry fragments define `float geometryLattice(vec4 p, float density,
/// float thickness)` and projection fragments define
/// `vec3 project4D(vec4 p, float dimension)`.
pub const FRAGMENT_TEMPLATE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform FieldParams {
    vec3 u_primaryColor;
    float u_time;
    vec3 u_secondaryColor;
    float u_dimension;
    vec3 u_backgroundColor;
    float u_morphFactor;
    vec2 u_resolution;
    vec2 u_mouse;
    float u_rotationSpeed;
    float u_universeModifier;
    float u_patternIntensity;
    float u_gridDensity;
    float u_lineThickness;
    float u_shellWidth;
    float u_tetraThickness;
    float u_glitchIntensity;
    float u_colorShift;
    float u_worldBlend;
    float u_worldIntensity;
    float u_audioBass;
    float u_audioMid;
    float u_audioHigh;
} params;

#pragma slot(geometry)

#pragma slot(projection)

mat2 rotation2(float angle) {
    float c = cos(angle);
    float s = sin(angle);
    return mat2(c, -s, s, c);
}

vec4 fieldPoint(vec2 uv) {
    float t = params.u_time * params.u_rotationSpeed;
    vec4 p = vec4(uv * (1.0 + params.u_morphFactor), sin(t * 0.7) * params.u_morphFactor, cos(t * 0.3));
    vec2 xw = rotation2(t) * vec2(p.x, p.w);
    p = vec4(xw.x, p.y, p.z, xw.y);
    vec2 yz = rotation2(t * 0.6) * vec2(p.y, p.z);
    p = vec4(p.x, yz.x, yz.y, p.w);
    vec2 zw = rotation2(t * 0.4 + params.u_mouse.x * 3.14159) * vec2(p.z, p.w);
    p = vec4(p.x, p.y, zw.x, zw.y);
    return p * params.u_universeModifier;
}

void main() {
    vec2 resolution = max(params.u_resolution, vec2(1.0, 1.0));
    vec2 uv = (gl_FragCoord.xy - 0.5 * resolution) / resolution.y;
    uv += (params.u_mouse - vec2(0.5, 0.5)) * 0.2;
    uv.x += params.u_glitchIntensity * sin(uv.y * 80.0 + params.u_time * 20.0) * 0.02;

    vec4 p = fieldPoint(uv);
    vec3 projected = project4D(p, params.u_dimension);
    float density = params.u_gridDensity * (1.0 + params.u_audioBass);
    float lattice = geometryLattice(vec4(projected, p.w), density, params.u_lineThickness);
    float shell = smoothstep(params.u_shellWidth, 0.0, abs(length(projected) - 1.0));
    float tetra = smoothstep(params.u_tetraThickness, 0.0, abs(projected.x + projected.y + projected.z) * 0.25);
    float pattern = clamp((lattice + shell * params.u_audioMid + tetra * params.u_audioHigh) * params.u_patternIntensity, 0.0, 1.0);

    float hue = 0.5 + 0.5 * sin(params.u_colorShift * 6.28318 + p.w);
    vec3 base = mix(params.u_primaryColor, params.u_secondaryColor, hue);
    vec3 color = mix(params.u_backgroundColor, base, pattern);
    color = mix(color, color.gbr, params.u_worldBlend) * params.u_worldIntensity;
    outColor = vec4(color, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn fills(geometry: &str, projection: &str) -> SlotFills {
        let mut fills = SlotFills::new();
        fills.fill(SLOT_GEOMETRY, geometry).expect("fill geometry");
        fills.fill(SLOT_PROJECTION, projection).expect("fill projection");
        fills
    }

    #[test]
    fn base_template_exposes_both_slots() {
        let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE).expect("parse template");
        let slots: Vec<_> = template.slots().collect();
        assert_eq!(slots, vec![SLOT_GEOMETRY, SLOT_PROJECTION]);
    }

    #[test]
    fn assembly_injects_code_in_place() {
        let template = ShaderTemplate::parse("a\n#pragma slot(geometry)\nb\n#pragma slot(projection)\n")
            .expect("parse template");
        let out = template
            .assemble(&fills("GEO", "PROJ"))
            .expect("assemble");
        assert_eq!(out, "a\nGEO\nb\nPROJ\n");
    }

    #[test]
    fn assembly_rejects_unfilled_slot() {
        let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE).expect("parse template");
        let mut partial = SlotFills::new();
        partial.fill(SLOT_GEOMETRY, "float g;").expect("fill");
        let err = template.assemble(&partial).expect_err("projection missing");
        assert_eq!(err, TemplateError::UnfilledSlot(SLOT_PROJECTION.into()));
    }

    #[test]
    fn assembly_rejects_unknown_slot() {
        let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE).expect("parse template");
        let mut extra = fills("g", "p");
        extra.fill("lighting", "x").expect("fill");
        let err = template.assemble(&extra).expect_err("unknown slot");
        assert_eq!(err, TemplateError::UnknownSlot("lighting".into()));
    }

    #[test]
    fn parse_rejects_malformed_and_duplicate_markers() {
        let err = ShaderTemplate::parse("x\n#pragma slot geometry\n").expect_err("malformed");
        assert!(matches!(err, TemplateError::MalformedMarker { line: 2, .. }));

        let err = ShaderTemplate::parse("#pragma slot(a)\n#pragma slot(a)\n").expect_err("dup");
        assert_eq!(err, TemplateError::DuplicateSlot("a".into()));
    }

    #[test]
    fn fills_reject_double_assignment() {
        let mut fills = SlotFills::new();
        fills.fill("geometry", "a").expect("first fill");
        assert!(fills.fill("geometry", "b").is_err());
    }

    #[test]
    fn annotate_marks_failing_line() {
        let annotated = annotate_source("one\ntwo\nthree", Some(2));
        let lines: Vec<_> = annotated.lines().collect();
        assert_eq!(lines[0], "   1 | one");
        assert_eq!(lines[1], ">> 2 | two");
    }
}
