//! `hyperfield probe`: one-time capability detection.

use anyhow::{Context, Result};
use fieldconfig::FieldConfig;
use governor::{
    capability_score, determine_tier, Capabilities, CapabilityProbe, HostOverrides, NativeHost,
    ProbeSettings,
};
use renderer::gpu::{adapter_capabilities, PowerPreference};
use renderer::headless::HeadlessGraphics;
use renderer::{GraphicsCapabilities, GraphicsContext};
use serde_json::json;
use tracing::{debug, warn};

use crate::cli::{ProbeArgs, RunArgs};
use crate::paths::AppPaths;
use crate::session;

/// Adapter facts used for scoring. Falls back to the headless backend's
/// facts when no adapter is available.
pub fn graphics_facts(headless: bool) -> GraphicsCapabilities {
    if headless {
        return HeadlessGraphics::new(1, 1).capabilities();
    }
    match adapter_capabilities(PowerPreference::High) {
        Ok(capabilities) => capabilities,
        Err(err) => {
            warn!(error = %err, "GPU adapter query failed; scoring with fallback facts");
            HeadlessGraphics::new(1, 1).capabilities()
        }
    }
}

/// Runs the benchmarks on a worker thread and waits for them up to the
/// configured probe timeout.
pub fn detect(
    config: &FieldConfig,
    graphics: GraphicsCapabilities,
    frames: Option<u32>,
) -> Result<Capabilities> {
    let host = HostOverrides::from_config(NativeHost::new(), &config.governor)
        .context("invalid host overrides in [governor]")?;
    let mut settings = ProbeSettings::from(&config.governor);
    if let Some(frames) = frames {
        settings.benchmark_frames = frames.max(1);
    }
    debug!(?settings, "spawning capability probe");
    let mut probe = CapabilityProbe::spawn(host, graphics, settings)?;
    let capabilities = probe.wait(config.governor.probe_timeout)?;
    Ok(capabilities)
}

pub fn run(args: &ProbeArgs, run_args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, _) = session::load_config(&paths, run_args)?;
    let capabilities = detect(&config, graphics_facts(args.headless), args.frames)?;
    let score = capability_score(&capabilities);
    let tier = determine_tier(&capabilities);

    if args.json {
        let report = json!({
            "capabilities": capabilities,
            "score": score,
            "tier": tier,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let memory = capabilities
        .device_memory_gb
        .map(|gb| format!("{gb:.1} GiB"))
        .unwrap_or_else(|| "unknown".to_string());
    let network = capabilities
        .network
        .map(|network| network.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("renderer        {}", capabilities.renderer);
    println!(
        "api             primary={} secondary={}",
        capabilities.primary_api, capabilities.secondary_api
    );
    println!("max texture     {}", capabilities.max_texture_size);
    println!("extensions      {}", capabilities.extensions.join(", "));
    println!("render score    {}", capabilities.render_score);
    println!("cpu score       {}", capabilities.cpu_score);
    println!("memory          {memory}");
    println!("mobile          {}", capabilities.mobile);
    println!("network         {network}");
    println!("score           {score}");
    println!("tier            {tier}");
    Ok(())
}
