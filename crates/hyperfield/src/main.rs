mod cli;
mod paths;
mod probe;
mod run;
mod session;

use anyhow::{bail, Result};
use fragments::{FragmentEntry, FragmentLibrary};
use renderer::compile::{FRAGMENT_TEMPLATE, SLOT_GEOMETRY, SLOT_PROJECTION};
use renderer::gpu::validate_glsl;
use renderer::{FragmentKind, ShaderStage, ShaderTemplate, SlotFills};
use tracing::{error, info};

use crate::cli::{Cli, Command, FragmentsArgs, RunArgs};
use crate::paths::AppPaths;

fn main() -> Result<()> {
    let Cli { run: run_args, command } = cli::parse();
    run::initialise_tracing();

    match command {
        Some(Command::Probe(args)) => probe::run(&args, &run_args),
        Some(Command::Fragments(args)) => list_fragments(&args, &run_args),
        Some(Command::Paths) => print_paths(&run_args),
        None => run::run(run_args),
    }
}

fn list_fragments(args: &FragmentsArgs, run_args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, config_path) = session::load_config(&paths, run_args)?;
    let library = session::build_library(&paths, &config, &config_path, &run_args.packs)?;

    let entries = library.entries();
    for entry in &entries {
        println!(
            "{:<10} {:<18} {:<16} {}",
            entry.kind.to_string(),
            entry.name,
            entry.origin.to_string(),
            entry.description.as_deref().unwrap_or("")
        );
    }

    if args.check {
        let failures = check_pairs(&library, &entries)?;
        if failures > 0 {
            bail!("{failures} fragment combination(s) failed to validate");
        }
        info!("all fragment combinations validate");
    }
    Ok(())
}

/// Assembles every geometry/projection pair and validates it as GLSL.
fn check_pairs(library: &FragmentLibrary, entries: &[FragmentEntry]) -> Result<usize> {
    let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE)?;
    let mut failures = 0;
    for geometry in names_of(entries, FragmentKind::Geometry) {
        for projection in names_of(entries, FragmentKind::Projection) {
            let (Some(geometry_fragment), Some(projection_fragment)) = (
                library.get(FragmentKind::Geometry, geometry),
                library.get(FragmentKind::Projection, projection),
            ) else {
                continue;
            };
            let mut fills = SlotFills::new();
            fills.fill(SLOT_GEOMETRY, geometry_fragment.code())?;
            fills.fill(SLOT_PROJECTION, projection_fragment.code())?;
            let source = template.assemble(&fills)?;
            if let Err(diagnostic) = validate_glsl(ShaderStage::Fragment, &source) {
                error!(%geometry, %projection, %diagnostic, "fragment combination is invalid");
                failures += 1;
            }
        }
    }
    Ok(failures)
}

fn names_of(entries: &[FragmentEntry], kind: FragmentKind) -> impl Iterator<Item = &str> {
    entries
        .iter()
        .filter(move |entry| entry.kind == kind)
        .map(|entry| entry.name.as_str())
}

fn print_paths(run_args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_file = run_args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    println!("config  {}", config_file.display());
    println!("data    {}", paths.data_dir().display());
    for root in paths.pack_roots() {
        println!("packs   {}", root.display());
    }
    Ok(())
}
