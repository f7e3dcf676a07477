use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hyperfield",
    author,
    version,
    about = "Adaptive real-time 4D visual field renderer"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file; defaults to `hyperfield.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE", env = "HYPERFIELD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Geometry fragment to render (e.g. `hypercube`, `duocylinder`).
    #[arg(long, value_name = "NAME")]
    pub geometry: Option<String>,

    /// Projection fragment (e.g. `perspective`, `stereographic`).
    #[arg(long, value_name = "NAME")]
    pub projection: Option<String>,

    /// Fix the performance tier (`low`, `medium`, `high`, `ultra`) or `auto` to detect it.
    #[arg(long, value_name = "TIER")]
    pub tier: Option<String>,

    /// Initial render quality between 0.1 and 1.0; overrides the tier's resolution scale.
    #[arg(long, value_name = "FACTOR")]
    pub quality: Option<f32>,

    /// Surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Frame rate cap for the window (0=uncapped); the simulated rate in headless mode.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Extra fragment pack directory; may be repeated.
    #[arg(long = "pack", global = true, value_name = "DIR")]
    pub packs: Vec<PathBuf>,

    /// Set a visualization parameter, e.g. `--set gridDensity=12` or
    /// `--set 'colorScheme={"primary":[1,0,0]}'`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,

    /// Render without a window using the headless backend.
    #[arg(long)]
    pub headless: bool,

    /// Number of frames to render in headless mode.
    #[arg(long, value_name = "COUNT", default_value_t = 300)]
    pub frames: u32,

    /// Keep the starting tier even when the frame rate drops.
    #[arg(long)]
    pub no_adaptive: bool,

    /// Print the final state as JSON after a headless run.
    #[arg(long)]
    pub dump_state: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark this machine and report the tier it would run at.
    Probe(ProbeArgs),
    /// List the available geometry and projection fragments.
    Fragments(FragmentsArgs),
    /// Print the resolved configuration file and pack directories.
    Paths,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Skip the GPU adapter query and score with the headless backend's facts.
    #[arg(long)]
    pub headless: bool,

    /// Override the number of benchmark frames.
    #[arg(long, value_name = "COUNT")]
    pub frames: Option<u32>,
}

#[derive(Args, Debug)]
pub struct FragmentsArgs {
    /// Validate every geometry/projection pair as GLSL.
    #[arg(long)]
    pub check: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
