use renderer::GraphicsCapabilities;
use serde::Serialize;
use tracing::{debug, info};

use crate::bench::{cpu_benchmark, render_benchmark};
use crate::host::{is_mobile_user_agent, HostEnvironment, NetworkType};
use crate::tier::Tier;

const LARGE_TEXTURE: u32 = 4096;
const PREFERRED_EXTENSION: &str = "float32-filterable";

/// Knobs for the one-time detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub benchmark_frames: u32,
    pub cpu_matrix_size: usize,
    pub seed: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            benchmark_frames: 60,
            cpu_matrix_size: 64,
            seed: 0x5eed,
        }
    }
}

impl From<&fieldconfig::GovernorSection> for ProbeSettings {
    fn from(section: &fieldconfig::GovernorSection) -> Self {
        Self {
            benchmark_frames: section.benchmark_frames,
            cpu_matrix_size: section.cpu_matrix_size,
            ..Self::default()
        }
    }
}

/// Everything tier scoring looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Capabilities {
    pub primary_api: bool,
    pub secondary_api: bool,
    pub max_texture_size: u32,
    pub extensions: Vec<String>,
    pub renderer: String,
    pub render_score: u32,
    pub cpu_score: u32,
    pub device_memory_gb: Option<f32>,
    pub mobile: bool,
    pub network: Option<NetworkType>,
}

/// Runs both benchmarks and collects host facts.
pub fn detect_capabilities(
    host: &dyn HostEnvironment,
    graphics: &GraphicsCapabilities,
    settings: &ProbeSettings,
) -> Capabilities {
    let render = render_benchmark(settings.benchmark_frames, settings.seed);
    let (cpu_elapsed, cpu_score) = cpu_benchmark(settings.cpu_matrix_size, settings.seed);
    debug!(
        frames = render.frames,
        fps = render.fps,
        render_score = render.score,
        cpu_ms = cpu_elapsed.as_secs_f64() * 1000.0,
        cpu_score,
        "benchmarks finished"
    );

    let capabilities = Capabilities {
        primary_api: graphics.primary_api,
        secondary_api: graphics.secondary_api,
        max_texture_size: graphics.max_texture_size,
        extensions: graphics.extensions.clone(),
        renderer: graphics.renderer.clone(),
        render_score: render.score,
        cpu_score,
        device_memory_gb: host.device_memory_gb(),
        mobile: host
            .user_agent()
            .is_some_and(|agent| is_mobile_user_agent(&agent)),
        network: host.network_type(),
    };
    info!(
        renderer = %capabilities.renderer,
        render_score = capabilities.render_score,
        cpu_score = capabilities.cpu_score,
        memory_gb = ?capabilities.device_memory_gb,
        mobile = capabilities.mobile,
        "capabilities detected"
    );
    capabilities
}

/// Weighted sum over the detected capabilities.
pub fn capability_score(capabilities: &Capabilities) -> i32 {
    let mut score = 0;
    if capabilities.primary_api {
        score += 20;
        if capabilities.max_texture_size >= LARGE_TEXTURE {
            score += 10;
        }
        if capabilities
            .extensions
            .iter()
            .any(|extension| extension == PREFERRED_EXTENSION)
        {
            score += 5;
        }
    }
    if capabilities.secondary_api {
        score += 20;
    }

    score += match capabilities.render_score {
        s if s > 500 => 25,
        s if s > 300 => 15,
        s if s > 100 => 5,
        _ => 0,
    };
    score += match capabilities.cpu_score {
        s if s > 200 => 15,
        s if s > 100 => 5,
        _ => 0,
    };
    score += match capabilities.device_memory_gb {
        Some(memory) if memory >= 8.0 => 15,
        Some(memory) if memory >= 4.0 => 10,
        _ => 0,
    };
    if capabilities.mobile {
        score -= 15;
    }
    if capabilities.network.is_some_and(NetworkType::is_slow) {
        score -= 10;
    }
    score
}

pub fn tier_for_score(score: i32) -> Tier {
    match score {
        s if s >= 70 => Tier::Ultra,
        s if s >= 50 => Tier::High,
        s if s >= 30 => Tier::Medium,
        _ => Tier::Low,
    }
}

pub fn determine_tier(capabilities: &Capabilities) -> Tier {
    let score = capability_score(capabilities);
    let tier = tier_for_score(score);
    debug!(score, %tier, "scored capabilities");
    tier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostOverrides;

    fn desktop() -> Capabilities {
        Capabilities {
            primary_api: true,
            secondary_api: true,
            max_texture_size: 8192,
            extensions: vec![PREFERRED_EXTENSION.to_string()],
            renderer: "test".into(),
            render_score: 600,
            cpu_score: 250,
            device_memory_gb: Some(16.0),
            mobile: false,
            network: Some(NetworkType::FourG),
        }
    }

    #[test]
    fn score_thresholds_pick_tiers() {
        assert_eq!(tier_for_score(72), Tier::Ultra);
        assert_eq!(tier_for_score(70), Tier::Ultra);
        assert_eq!(tier_for_score(55), Tier::High);
        assert_eq!(tier_for_score(35), Tier::Medium);
        assert_eq!(tier_for_score(10), Tier::Low);
        assert_eq!(tier_for_score(-25), Tier::Low);
    }

    #[test]
    fn full_desktop_scores_every_weight() {
        assert_eq!(capability_score(&desktop()), 110);
        assert_eq!(determine_tier(&desktop()), Tier::Ultra);
    }

    #[test]
    fn penalties_and_lower_bands_apply() {
        let phone = Capabilities {
            secondary_api: false,
            max_texture_size: 2048,
            extensions: Vec::new(),
            render_score: 150,
            cpu_score: 150,
            device_memory_gb: Some(4.0),
            mobile: true,
            network: Some(NetworkType::Slow2g),
            ..desktop()
        };
        // 20 + 5 + 5 + 10 - 15 - 10
        assert_eq!(capability_score(&phone), 15);
        assert_eq!(determine_tier(&phone), Tier::Low);
    }

    #[test]
    fn texture_and_extension_bonus_need_primary_api() {
        let fallback_only = Capabilities {
            primary_api: false,
            render_score: 0,
            cpu_score: 0,
            device_memory_gb: None,
            ..desktop()
        };
        assert_eq!(capability_score(&fallback_only), 20);
    }

    #[test]
    fn detection_combines_host_and_graphics_facts() {
        let mut host = HostOverrides::new(crate::host::NativeHost);
        host.user_agent = Some("Mozilla/5.0 (iPad; CPU OS 17_0)".into());
        host.device_memory_gb = Some(6.0);
        let graphics = GraphicsCapabilities {
            primary_api: true,
            secondary_api: false,
            max_texture_size: 4096,
            extensions: Vec::new(),
            renderer: "headless".into(),
        };
        let settings = ProbeSettings {
            benchmark_frames: 2,
            cpu_matrix_size: 4,
            seed: 3,
        };

        let capabilities = detect_capabilities(&host, &graphics, &settings);
        assert!(capabilities.mobile);
        assert_eq!(capabilities.device_memory_gb, Some(6.0));
        assert_eq!(capabilities.max_texture_size, 4096);
        assert_eq!(capabilities.renderer, "headless");
    }
}
