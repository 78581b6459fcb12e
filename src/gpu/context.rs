/// wgpu device and queue ownership
///
/// The pipeline is the only user of the device, so the context is created
/// once per session and moved into it.

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;

use crate::error::GpuResourceError;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    pub max_texture_dimension: u32,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_name)
            .field("max_texture_dimension", &self.max_texture_dimension)
            .finish_non_exhaustive()
    }
}

impl GpuContext {
    /// Acquire a high-performance adapter and a compute-capable device
    pub fn new() -> Result<Self, GpuResourceError> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self, GpuResourceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuResourceError::NoAdapter)?;

        let info = adapter.get_info();
        let adapter_limits = adapter.limits();
        // Large sensors need more than the 8192 default
        let limits = wgpu::Limits {
            max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Darkroom Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(|e| GpuResourceError::Device(e.to_string()))?;

        tracing::info!(
            "🖥️  GPU: {} ({:?}), max texture {}",
            info.name,
            info.backend,
            limits.max_texture_dimension_2d
        );

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            max_texture_dimension: limits.max_texture_dimension_2d,
        })
    }

    /// Reject images the device cannot hold in a single texture
    pub fn check_size(&self, width: u32, height: u32) -> Result<(), GpuResourceError> {
        let max = self.max_texture_dimension;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuResourceError::TooLarge { width, height, max });
        }
        Ok(())
    }
}
