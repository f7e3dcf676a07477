use crate::provider::{FragmentTable, SourceFragment};

pub(crate) const CUBE: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    vec4 cell = abs(fract(p * density) - 0.5);
    float edge = min(min(cell.x, cell.y), min(cell.z, cell.w));
    return 1.0 - smoothstep(0.0, thickness, edge);
}
";

pub(crate) const SPHERE: &str = r"float geometryLattice(vec4 p, float density, float thickness) {
    float shell = abs(fract(length(p) * density) - 0.5);
    return 1.0 - smoothstep(0.0, thickness, shell);
}
";

pub(crate) const PROJECTION: &str = r"vec3 project4D(vec4 p, float dimension) {
    float w = 1.0 / max(dimension - p.w, 0.1);
    return p.xyz * w;
}
";

pub(crate) const SOLID_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 outColor;
void main() {
    outColor = vec4(1.0, 0.0, 1.0, 1.0);
}
";

pub(crate) fn fragment_table() -> FragmentTable {
    FragmentTable::new()
        .with_geometry("hypercube", SourceFragment::new(CUBE))
        .with_geometry("hypersphere", SourceFragment::new(SPHERE))
        .with_projection("perspective", SourceFragment::new(PROJECTION))
}
