//! Turns the configuration file and command line into what a run needs:
//! the effective configuration, the fragment library, the surface size and
//! the initial visualization parameters.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use fieldconfig::FieldConfig;
use fragments::{expand_path, FragmentLibrary, FragmentRepository};
use renderer::{FragmentKind, PartialState};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cli::RunArgs;
use crate::paths::AppPaths;

const DEFAULT_SIZE: (u32, u32) = (1280, 720);

/// Loads the configuration and applies command line overrides that affect
/// governor behaviour. Returns the config and the file it came from.
pub fn load_config(paths: &AppPaths, args: &RunArgs) -> Result<(FieldConfig, PathBuf)> {
    let (mut config, path) = match &args.config {
        Some(path) => (
            FieldConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            path.clone(),
        ),
        None => {
            let path = paths.config_file();
            let config = FieldConfig::load_or_default(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            (config, path)
        }
    };
    debug!(path = %path.display(), "configuration loaded");

    if let Some(tier) = &args.tier {
        config.governor.tier = Some(tier.clone());
    }
    if args.no_adaptive {
        config.governor.adaptive = false;
    }
    if let Some(quality) = args.quality {
        config.render.quality = Some(quality);
    }
    config
        .validate()
        .context("command line produced an invalid configuration")?;
    Ok((config, path))
}

/// Built-in fragments, then packs discovered under the pack roots, then
/// packs named in the config file or on the command line.
pub fn build_library(
    paths: &AppPaths,
    config: &FieldConfig,
    config_path: &Path,
    extra_packs: &[PathBuf],
) -> Result<FragmentLibrary> {
    let mut library = FragmentLibrary::builtin();
    for pack in FragmentRepository::new(paths.pack_roots()).discover() {
        info!(pack = pack.name(), root = %pack.root().display(), "using fragment pack");
        library.add_pack(&pack);
    }

    let mut roots = Vec::new();
    if let Some(dir) = config_path.parent() {
        roots.push(dir.to_path_buf());
    }
    roots.extend(paths.pack_roots());
    let repository = FragmentRepository::new(roots);
    for requested in config.fragments.packs.iter().chain(extra_packs) {
        let expanded = expand_path(&requested.to_string_lossy())
            .with_context(|| format!("invalid pack path {}", requested.display()))?;
        let pack = repository
            .resolve(&expanded)
            .with_context(|| format!("failed to load fragment pack {}", requested.display()))?;
        info!(pack = pack.name(), root = %pack.root().display(), "using fragment pack");
        library.add_pack(&pack);
    }
    Ok(library)
}

pub fn surface_size(config: &FieldConfig, args: &RunArgs) -> Result<(u32, u32)> {
    match args.size.as_deref().or(config.render.size.as_deref()) {
        Some(spec) => parse_surface_size(spec),
        None => Ok(DEFAULT_SIZE),
    }
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 1280x720"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size '{spec}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size '{spec}'"))?;
    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }
    Ok((width, height))
}

/// Splits `KEY=VALUE`. The value is read as JSON and falls back to a plain
/// string, so `geometry=duocylinder` works without quoting.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter name missing in '{raw}'");
    }
    let value = serde_json::from_str(value.trim())
        .unwrap_or_else(|_| Value::String(value.trim().to_string()));
    Ok((key.to_string(), value))
}

/// Layers tier preset parameters, `[render]` settings and command line
/// values, later ones winning.
pub fn initial_state(
    config: &FieldConfig,
    args: &RunArgs,
    preset: &PartialState,
) -> Result<PartialState> {
    let mut merged = match serde_json::to_value(preset)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let configured: Map<String, Value> = config
        .render_parameters()
        .context("invalid [render.parameters]")?;
    for (key, value) in configured {
        insert_parameter(&mut merged, &key, value);
    }

    let names = [
        ("geometry", config.render.geometry.as_ref(), args.geometry.as_ref()),
        ("projection", config.render.projection.as_ref(), args.projection.as_ref()),
    ];
    for (key, from_config, from_args) in names {
        if let Some(name) = from_args.or(from_config) {
            merged.insert(key.to_string(), Value::String(name.clone()));
        }
    }
    for raw in &args.assignments {
        let (key, value) = parse_assignment(raw)?;
        insert_parameter(&mut merged, &key, value);
    }

    serde_json::from_value(Value::Object(merged)).context("invalid visualization parameters")
}

/// Inserts under the canonical name so an alias in a later layer replaces
/// the earlier value instead of colliding with it.
fn insert_parameter(merged: &mut Map<String, Value>, key: &str, value: Value) {
    merged.insert(PartialState::canonical_key(key).to_string(), value);
}

/// Fails early with the available names when a fragment is unknown.
pub fn ensure_fragment(library: &FragmentLibrary, kind: FragmentKind, name: &str) -> Result<()> {
    if library.contains(kind, name) {
        return Ok(());
    }
    let available: Vec<String> = library
        .entries()
        .into_iter()
        .filter(|entry| entry.kind == kind)
        .map(|entry| entry.name)
        .collect();
    bail!(
        "unknown {kind} '{name}'; available: {}",
        available.join(", ")
    )
}
