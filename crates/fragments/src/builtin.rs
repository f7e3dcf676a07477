//! Fragments shipped with the crate.

pub const HYPERCUBE: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    vec4 cell = abs(fract(p * density * 0.5) - vec4(0.5));
    float edge = min(min(cell.x, cell.y), min(cell.z, cell.w));
    float grid = 1.0 - smoothstep(0.0, thickness, edge);
    float hull = max(max(abs(p.x), abs(p.y)), max(abs(p.z), abs(p.w)));
    float frame = 1.0 - smoothstep(0.0, thickness * 2.0, abs(hull - 1.0));
    return max(grid, frame);
}
";

pub const HYPERSPHERE: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    float radius = length(p);
    float shells = abs(fract(radius * density * 0.5) - 0.5);
    float rings = abs(fract(atan(p.y, p.x) * density / 6.28318) - 0.5);
    float shell = 1.0 - smoothstep(0.0, thickness, shells);
    float ring = 1.0 - smoothstep(0.0, thickness * 2.0, rings * radius);
    return max(shell, ring * 0.6);
}
";

pub const HYPERTETRAHEDRON: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    vec4 q = p * density * 0.25;
    float a = abs(fract(dot(q, vec4(0.5, 0.5, 0.5, -0.5))) - 0.5);
    float b = abs(fract(dot(q, vec4(0.5, -0.5, -0.5, -0.5))) - 0.5);
    float c = abs(fract(dot(q, vec4(-0.5, 0.5, -0.5, -0.5))) - 0.5);
    float d = abs(fract(dot(q, vec4(-0.5, -0.5, 0.5, -0.5))) - 0.5);
    float edge = min(min(a, b), min(c, d));
    return 1.0 - smoothstep(0.0, thickness, edge);
}
";

pub const DUOCYLINDER: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    float inner = length(p.xy);
    float outer = length(p.zw);
    float bands = abs(fract((inner - outer) * density * 0.5) - 0.5);
    float twist = abs(fract((atan(p.y, p.x) + atan(p.w, p.z)) * density / 6.28318) - 0.5);
    return 1.0 - smoothstep(0.0, thickness, min(bands, twist));
}
";

pub const PERSPECTIVE: &str = r"vec3 project4D(vec4 p, float dimension) {
    float depth = max(dimension - p.w, 0.1);
    return p.xyz * (1.5 / depth);
}
";

pub const ORTHOGRAPHIC: &str = r"vec3 project4D(vec4 p, float dimension) {
    return p.xyz * (1.0 + (dimension - 3.0) * 0.1);
}
";

pub const STEREOGRAPHIC: &str = r"vec3 project4D(vec4 p, float dimension) {
    float radius = max(length(p), 0.0001);
    vec4 unit = p / radius;
    float denom = max(1.0 - unit.w, 0.05);
    return unit.xyz / denom * (dimension / 3.5);
}
";

/// Built-in geometry fragments as `(name, description, code)`.
pub const GEOMETRIES: [(&str, &str, &str); 4] = [
    ("hypercube", "tesseract lattice with hull edges", HYPERCUBE),
    ("hypersphere", "concentric 3-sphere shells", HYPERSPHERE),
    ("hypertetrahedron", "5-cell plane lattice", HYPERTETRAHEDRON),
    ("duocylinder", "twisted product of two circles", DUOCYLINDER),
];

/// Built-in projection fragments as `(name, description, code)`.
pub const PROJECTIONS: [(&str, &str, &str); 3] = [
    ("perspective", "divide by distance along w", PERSPECTIVE),
    ("orthographic", "drop the w axis", ORTHOGRAPHIC),
    ("stereographic", "project the unit 3-sphere from its pole", STEREOGRAPHIC),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GEOMETRY_ENTRY_POINT, PROJECTION_ENTRY_POINT};

    #[test]
    fn every_fragment_defines_its_entry_point() {
        for (name, _, code) in GEOMETRIES {
            assert!(code.contains(GEOMETRY_ENTRY_POINT), "{name}");
        }
        for (name, _, code) in PROJECTIONS {
            assert!(code.contains(PROJECTION_ENTRY_POINT), "{name}");
        }
    }
}
