use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::GraphicsCapabilities;

/// Adapter power preference requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    Low,
    #[default]
    High,
}

impl PowerPreference {
    fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            Self::Low => wgpu::PowerPreference::LowPower,
            Self::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
    pub capabilities: GraphicsCapabilities,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub(crate) fn new<T>(target: &T, initial_size: (u32, u32), power: PowerPreference) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = new_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the host keeps the window alive for as long as the
        // graphics context exists.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power.to_wgpu(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let capabilities = describe_adapter(&instance, &adapter);
        let limits = adapter.limits();
        tracing::debug!(
            renderer = %capabilities.renderer,
            max_texture_size = capabilities.max_texture_size,
            extensions = ?capabilities.extensions,
            "selected GPU adapter"
        );

        let max_dimension = limits.max_texture_dimension_2d;
        let width = initial_size.0.max(1);
        let height = initial_size.1.max(1);
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("hyperfield device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(limits),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::warn!(?reason, %message, "GPU device lost");
            lost_flag.store(true, Ordering::SeqCst);
        });

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| surface_caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?present_mode, ?surface_format, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            surface_format,
            capabilities,
            lost,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    pub(crate) fn destroy(&self) {
        if !self.lost.swap(true, Ordering::SeqCst) {
            self.device.destroy();
        }
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

const FEATURE_NAMES: &[(wgpu::Features, &str)] = &[
    (wgpu::Features::FLOAT32_FILTERABLE, "float32-filterable"),
    (wgpu::Features::SHADER_F16, "shader-f16"),
    (wgpu::Features::TEXTURE_COMPRESSION_BC, "texture-compression-bc"),
    (wgpu::Features::TEXTURE_COMPRESSION_ETC2, "texture-compression-etc2"),
    (wgpu::Features::TIMESTAMP_QUERY, "timestamp-query"),
    (wgpu::Features::DEPTH_CLIP_CONTROL, "depth-clip-control"),
];

fn describe_adapter(instance: &wgpu::Instance, adapter: &wgpu::Adapter) -> GraphicsCapabilities {
    let info = adapter.get_info();
    let features = adapter.features();
    let primary_api = matches!(
        info.backend,
        wgpu::Backend::Vulkan | wgpu::Backend::Metal | wgpu::Backend::Dx12
    );
    let secondary_api =
        info.backend == wgpu::Backend::Gl || !instance.enumerate_adapters(wgpu::Backends::GL).is_empty();

    GraphicsCapabilities {
        primary_api,
        secondary_api,
        max_texture_size: adapter.limits().max_texture_dimension_2d,
        extensions: FEATURE_NAMES
            .iter()
            .filter(|(feature, _)| features.contains(*feature))
            .map(|(_, name)| (*name).to_string())
            .collect(),
        renderer: format!("{} ({:?}, {:?})", info.name, info.backend, info.device_type),
    }
}

/// Probes the default adapter without creating a window.
pub fn adapter_capabilities(power: PowerPreference) -> Result<GraphicsCapabilities> {
    let instance = new_instance();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: power.to_wgpu(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;
    Ok(describe_adapter(&instance, &adapter))
}
