//! Geometry and projection fragments for the hyperfield shader template.
//!
//! The [`FragmentLibrary`] starts with the built-in fragments compiled into
//! the crate and can be extended with on-disk [`FragmentPack`]s. A pack is a
//! directory with a `fragments.toml` manifest next to the GLSL files it
//! lists; [`FragmentRepository`] finds packs across a list of root
//! directories. Pack entries override built-ins of the same name.
//!
//! Geometry fragments must define
//! `float geometryLattice(vec4 p, float density, float thickness)` and
//! projection fragments `vec3 project4D(vec4 p, float dimension)`.

pub mod builtin;
pub mod library;
pub mod manifest;
pub mod pack;
pub mod path;
pub mod repository;

pub use library::{FragmentEntry, FragmentLibrary, FragmentOrigin, LibraryFragment};
pub use manifest::{FragmentDecl, FragmentManifest, MANIFEST_FILE};
pub use pack::{FragmentPack, PackError, PackFragment};
pub use path::expand_path;
pub use repository::FragmentRepository;

/// Symbol every geometry fragment must define.
pub const GEOMETRY_ENTRY_POINT: &str = "geometryLattice";
/// Symbol every projection fragment must define.
pub const PROJECTION_ENTRY_POINT: &str = "project4D";
