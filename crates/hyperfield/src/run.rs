use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use fieldconfig::FieldConfig;
use fragments::FragmentLibrary;
use governor::{PerformanceGovernor, Tier};
use renderer::gpu::{PowerPreference, WgpuGraphics};
use renderer::headless::{HeadlessGraphics, HeadlessSurface};
use renderer::{
    run_preview, Clock, CoreOptions, FragmentKind, FrameObserver, ManualScheduler, PreviewConfig, QualityControl, RenderCore, RenderError,
    ShaderManager, SteppedClock, VisualizationState,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::probe;
use crate::session::{self, ensure_fragment};

const HEADLESS_FPS: f32 = 60.0;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Final report printed by `--dump-state`.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    frames: u64,
    tier: Tier,
    quality: f32,
    state: &'a VisualizationState,
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, config_path) = session::load_config(&paths, &args)?;
    let library = Rc::new(session::build_library(
        &paths,
        &config,
        &config_path,
        &args.packs,
    )?);
    let size = session::surface_size(&config, &args)?;

    let governor = build_governor(&config, args.headless)?;
    let preset = governor.current_preset();

    let mut options = CoreOptions {
        initial: session::initial_state(&config, &args, &preset.parameters)?,
        quality: Some(config.render.quality.unwrap_or(preset.resolution_scale)),
        ..CoreOptions::default()
    };
    let geometry = options.initial.geometry.clone().unwrap_or_else(|| "hypercube".into());
    let projection = options
        .initial
        .projection
        .clone()
        .unwrap_or_else(|| "perspective".into());
    ensure_fragment(&library, FragmentKind::Geometry, &geometry)?;
    ensure_fragment(&library, FragmentKind::Projection, &projection)?;
    info!(
        %geometry,
        %projection,
        tier = %governor.tier(),
        quality = ?options.quality,
        adaptive = governor.settings().adaptive,
        "starting hyperfield"
    );

    let fps = args.fps.or(config.render.fps);
    if args.headless {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        options.on_error = Some(Box::new(move |err: &RenderError| {
            warn!(error = %err, "render loop error");
            sink.borrow_mut().push(err.clone());
        }));
        let fps = fps.filter(|fps| *fps > 0.0).unwrap_or(HEADLESS_FPS);
        run_headless(library, size, options, governor, &args, fps, &errors)
    } else {
        options.on_error = Some(Box::new(|err: &RenderError| {
            warn!(error = %err, "render loop error");
        }));
        let shaders: ShaderManager<WgpuGraphics> = ShaderManager::with_base_sources(
            Box::new(Rc::clone(&library)),
            Box::new(library),
        )
        .context("failed to register base shaders")?;
        let preview = PreviewConfig {
            size,
            title: format!("hyperfield: {geometry} / {projection}"),
            target_fps: fps.filter(|fps| *fps > 0.0),
            power: PowerPreference::High,
        };
        run_preview(preview, shaders, options, Some(observe(governor)))
    }
}

/// Picks the starting tier: configured or `--tier`, otherwise measured.
fn build_governor(config: &FieldConfig, headless: bool) -> Result<PerformanceGovernor> {
    if config.governor.fixed_tier().is_some() {
        return PerformanceGovernor::from_config(config, None).context("invalid governor settings");
    }
    let graphics = probe::graphics_facts(headless);
    let detected = match probe::detect(config, graphics, None) {
        Ok(capabilities) => Some(capabilities),
        Err(err) => {
            warn!(error = %err, "capability probe failed; using the default tier");
            None
        }
    };
    PerformanceGovernor::from_config(config, detected.as_ref()).context("invalid governor settings")
}

fn observe(mut governor: PerformanceGovernor) -> FrameObserver {
    Box::new(move |timestamp_ms: f64, control: &mut dyn QualityControl| {
        governor.record_frame(timestamp_ms, control);
    })
}

fn run_headless(
    library: Rc<FragmentLibrary>,
    size: (u32, u32),
    options: CoreOptions,
    mut governor: PerformanceGovernor,
    args: &RunArgs,
    fps: f32,
    errors: &Rc<RefCell<Vec<RenderError>>>,
) -> Result<()> {
    let shaders: ShaderManager<HeadlessGraphics> =
        ShaderManager::with_base_sources(Box::new(Rc::clone(&library)), Box::new(library))
            .context("failed to register base shaders")?;
    let scheduler = ManualScheduler::new();
    let mut core = RenderCore::new(
        HeadlessSurface::new(size.0, size.1),
        HeadlessGraphics::new(size.0, size.1),
        shaders,
        Box::new(scheduler.clone()),
        options,
    )
    .context("failed to initialise render core")?;
    core.start().context("failed to start render loop")?;

    let mut clock = SteppedClock::at_fps(f64::from(fps));
    for _ in 0..args.frames {
        core.process_requests();
        let Some(handle) = scheduler.take_due() else {
            break;
        };
        let timestamp = clock.now_ms();
        if core.run_frame(handle, timestamp) {
            governor.record_frame(timestamp, &mut core);
        } else if !core.is_running() {
            break;
        }
    }

    if let Some(err) = errors.borrow().first() {
        bail!("render loop stopped after {} frames: {err}", core.frames_rendered());
    }
    info!(
        frames = core.frames_rendered(),
        tier = %governor.tier(),
        quality = core.quality(),
        "headless run finished"
    );

    if args.dump_state {
        let report = RunReport {
            frames: core.frames_rendered(),
            tier: governor.tier(),
            quality: core.quality(),
            state: core.state(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    core.dispose();
    Ok(())
}
