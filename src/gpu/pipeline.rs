/// Compute pipeline for non-destructive RAW development
///
/// This module manages all the wgpu plumbing:
/// - RAW texture upload (one per loaded image)
/// - Stage textures, reused across frames while their size holds
/// - The uniform buffer carrying the adjustment record
/// - Dispatch of ingest -> rotate -> grain -> develop -> histogram
/// - Blocking readback for display and export
///
/// Preview renders downscale on ingest and may carry a transient view
/// rotation while the user drags. Full renders run at native resolution
/// with no view transform; geometry is already baked into the RAW image.

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use wgpu::util::DeviceExt;

use crate::error::GpuResourceError;
use crate::gpu::context::GpuContext;
use crate::gpu::histogram::{DisplayHistogram, HistogramCounts, HistogramEngine, HISTOGRAM_BINS};
use crate::gpu::shaders;
use crate::gpu::texture::{self, GpuTexture};
use crate::pixels::{ProcessedImage, RawImage};
use crate::raw::transform;
use crate::state::uniforms::Uniforms;

const WORKING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const GRAIN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
const WORKGROUP: u32 = 16;
const GRAIN_SEED: u32 = 0x9E37;

/// Per-dispatch parameters shared by every stage.
/// Must match `StageParams` in the WGSL prelude.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageParams {
    pub src_size: [u32; 2],
    pub dst_size: [u32; 2],
    pub scale: [f32; 2],
    pub quarter_turns: u32,
    pub angle: f32,
    pub grain_size: f32,
    pub grain_seed: u32,
    pub _pad: [u32; 2],
}

impl StageParams {
    fn resample(src: (u32, u32), dst: (u32, u32)) -> Self {
        Self {
            src_size: [src.0, src.1],
            dst_size: [dst.0, dst.1],
            scale: [src.0 as f32 / dst.0 as f32, src.1 as f32 / dst.1 as f32],
            ..Self::default()
        }
    }
}

/// Transient rotation applied to the preview only
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewTransform {
    /// Clockwise quarter turns
    pub quarter_turns: i32,
    /// Clockwise degrees
    pub angle: f32,
}

impl ViewTransform {
    pub fn is_identity(&self) -> bool {
        self.quarter_turns.rem_euclid(4) == 0 && self.angle.abs() < 1e-3
    }
}

/// Preview size whose longest edge fits `max_dim`
pub fn preview_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_dim == 0 || longest <= max_dim {
        return (width, height);
    }
    let scale = longest as f32 / max_dim as f32;
    (
        ((width as f32 / scale).round() as u32).clamp(1, max_dim),
        ((height as f32 / scale).round() as u32).clamp(1, max_dim),
    )
}

// ========== Layout helpers ==========

pub(crate) fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    body: &str,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shaders::stage_source(body).into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point,
    })
}

fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    width: u32,
    height: u32,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(width.div_ceil(WORKGROUP), height.div_ceil(WORKGROUP), 1);
}

fn params_buffer(device: &wgpu::Device, label: &str, params: &StageParams) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(params),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

fn view_entry(binding: u32, texture: &GpuTexture) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(&texture.view),
    }
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

// ========== Kernels ==========

struct Kernels {
    ingest_layout: wgpu::BindGroupLayout,
    rotate_layout: wgpu::BindGroupLayout,
    grain_layout: wgpu::BindGroupLayout,
    develop_layout: wgpu::BindGroupLayout,
    copy: wgpu::ComputePipeline,
    lanczos: wgpu::ComputePipeline,
    quarter: wgpu::ComputePipeline,
    arbitrary: wgpu::ComputePipeline,
    grain: wgpu::ComputePipeline,
    develop: wgpu::ComputePipeline,
}

impl Kernels {
    fn new(device: &wgpu::Device) -> Self {
        let float = wgpu::TextureSampleType::Float { filterable: false };

        let ingest_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.ingest.layout"),
            entries: &[
                texture_entry(0, wgpu::TextureSampleType::Uint),
                storage_texture_entry(1, WORKING_FORMAT),
                uniform_entry(2),
            ],
        });
        let rotate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.rotate.layout"),
            entries: &[
                texture_entry(0, float),
                storage_texture_entry(1, WORKING_FORMAT),
                uniform_entry(2),
            ],
        });
        let grain_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.grain.layout"),
            entries: &[storage_texture_entry(0, GRAIN_FORMAT), uniform_entry(1)],
        });
        let develop_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.develop.layout"),
            entries: &[
                texture_entry(0, float),
                storage_texture_entry(1, WORKING_FORMAT),
                uniform_entry(2),
                texture_entry(3, float),
                uniform_entry(4),
            ],
        });

        Self {
            copy: compute_pipeline(device, "darkroom.ingest.copy", &ingest_layout, shaders::INGEST_SHADER, "copy_main"),
            lanczos: compute_pipeline(
                device,
                "darkroom.ingest.lanczos",
                &ingest_layout,
                shaders::INGEST_SHADER,
                "lanczos_main",
            ),
            quarter: compute_pipeline(
                device,
                "darkroom.rotate.quarter",
                &rotate_layout,
                shaders::ROTATE_SHADER,
                "quarter_main",
            ),
            arbitrary: compute_pipeline(
                device,
                "darkroom.rotate.arbitrary",
                &rotate_layout,
                shaders::ROTATE_SHADER,
                "arbitrary_main",
            ),
            grain: compute_pipeline(device, "darkroom.grain", &grain_layout, shaders::GRAIN_SHADER, "grain_main"),
            develop: compute_pipeline(
                device,
                "darkroom.develop",
                &develop_layout,
                shaders::DEVELOP_SHADER,
                "develop_main",
            ),
            ingest_layout,
            rotate_layout,
            grain_layout,
            develop_layout,
        }
    }

    fn rotate(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        src: &GpuTexture,
        dst: &GpuTexture,
        params: StageParams,
    ) {
        let params = params_buffer(device, "darkroom.rotate.params", &params);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("darkroom.rotate.bind_group"),
            layout: &self.rotate_layout,
            entries: &[view_entry(0, src), view_entry(1, dst), buffer_entry(2, &params)],
        });
        dispatch(encoder, "darkroom.rotate.pass", pipeline, &bind_group, dst.width, dst.height);
    }

    /// Record the full stage chain from `raw` into `textures.output`
    #[allow(clippy::too_many_arguments)]
    fn encode_chain(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        raw: &GpuTexture,
        textures: &mut StageTextures,
        uniform_buffer: &wgpu::Buffer,
        uniforms: &Uniforms,
        view: ViewTransform,
        target: (u32, u32),
    ) {
        // ---- Ingest ----
        let ingest = texture::reuse_storage(
            textures.ingest.take(),
            device,
            "darkroom.ingest",
            target.0,
            target.1,
            WORKING_FORMAT,
        );
        let ingest_params = StageParams::resample((raw.width, raw.height), target);
        let downscaled = ingest_params.scale[0] > 1.0 || ingest_params.scale[1] > 1.0;
        {
            let params = params_buffer(device, "darkroom.ingest.params", &ingest_params);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("darkroom.ingest.bind_group"),
                layout: &self.ingest_layout,
                entries: &[view_entry(0, raw), view_entry(1, &ingest), buffer_entry(2, &params)],
            });
            let pipeline = if downscaled { &self.lanczos } else { &self.copy };
            dispatch(encoder, "darkroom.ingest.pass", pipeline, &bind_group, target.0, target.1);
        }

        // ---- View rotation ----
        let turns = view.quarter_turns.rem_euclid(4) as u32;
        let quarter = (turns != 0).then(|| {
            let (w, h) = if turns % 2 == 1 { (ingest.height, ingest.width) } else { (ingest.width, ingest.height) };
            let dst = texture::reuse_storage(textures.quarter.take(), device, "darkroom.quarter", w, h, WORKING_FORMAT);
            let params = StageParams {
                quarter_turns: turns,
                ..StageParams::resample((ingest.width, ingest.height), (w, h))
            };
            self.rotate(device, encoder, &self.quarter, &ingest, &dst, params);
            dst
        });
        let after_quarter = quarter.as_ref().unwrap_or(&ingest);

        let angled = (view.angle.abs() >= 1e-3).then(|| {
            let (w, h) = transform::rotated_size(after_quarter.width, after_quarter.height, view.angle);
            let dst = texture::reuse_storage(textures.angle.take(), device, "darkroom.angle", w, h, WORKING_FORMAT);
            let params = StageParams {
                angle: view.angle,
                ..StageParams::resample((after_quarter.width, after_quarter.height), (w, h))
            };
            self.rotate(device, encoder, &self.arbitrary, after_quarter, &dst, params);
            dst
        });
        let source = angled.as_ref().unwrap_or(after_quarter);
        let dims = (source.width, source.height);

        // ---- Grain field ----
        // Grain size is in output pixels of the full image; scale it with the preview
        let grain_size = uniforms.grain_size / ingest_params.scale[0].max(1.0);
        let grain = texture::reuse_storage(textures.grain.take(), device, "darkroom.grain", dims.0, dims.1, GRAIN_FORMAT);
        let key = GrainKey {
            size_bits: grain_size.to_bits(),
            width: dims.0,
            height: dims.1,
        };
        if uniforms.grain_amount > 0.0 && textures.grain_key != Some(key) {
            let params = params_buffer(
                device,
                "darkroom.grain.params",
                &StageParams {
                    grain_size,
                    grain_seed: GRAIN_SEED,
                    ..StageParams::resample(dims, dims)
                },
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("darkroom.grain.bind_group"),
                layout: &self.grain_layout,
                entries: &[view_entry(0, &grain), buffer_entry(1, &params)],
            });
            dispatch(encoder, "darkroom.grain.pass", &self.grain, &bind_group, dims.0, dims.1);
            textures.grain_key = Some(key);
            tracing::debug!("Regenerated grain field {}x{} size {grain_size:.2}", dims.0, dims.1);
        }

        // ---- Develop ----
        let output = texture::reuse_storage(textures.output.take(), device, "darkroom.output", dims.0, dims.1, WORKING_FORMAT);
        {
            let params = params_buffer(device, "darkroom.develop.params", &StageParams::resample(dims, dims));
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("darkroom.develop.bind_group"),
                layout: &self.develop_layout,
                entries: &[
                    view_entry(0, source),
                    view_entry(1, &output),
                    buffer_entry(2, uniform_buffer),
                    view_entry(3, &grain),
                    buffer_entry(4, &params),
                ],
            });
            dispatch(encoder, "darkroom.develop.pass", &self.develop, &bind_group, dims.0, dims.1);
        }

        textures.angle = angled.or(textures.angle.take());
        textures.quarter = quarter.or(textures.quarter.take());
        textures.ingest = Some(ingest);
        textures.grain = Some(grain);
        textures.output = Some(output);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GrainKey {
    size_bits: u32,
    width: u32,
    height: u32,
}

/// Intermediate textures of one render chain
#[derive(Debug, Default)]
struct StageTextures {
    ingest: Option<GpuTexture>,
    quarter: Option<GpuTexture>,
    angle: Option<GpuTexture>,
    grain: Option<GpuTexture>,
    grain_key: Option<GrainKey>,
    output: Option<GpuTexture>,
}

// ========== Pipeline ==========

pub struct GpuPipeline {
    ctx: GpuContext,
    kernels: Kernels,
    uniform_buffer: wgpu::Buffer,
    raw: Option<GpuTexture>,
    preview: StageTextures,
    histogram: HistogramEngine,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for GpuPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuPipeline")
            .field("ctx", &self.ctx)
            .field("raw", &self.raw)
            .field("preview", &self.preview.output)
            .finish_non_exhaustive()
    }
}

impl GpuPipeline {
    pub fn new(ctx: GpuContext, histogram_smoothing: f32) -> Self {
        let kernels = Kernels::new(&ctx.device);
        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("darkroom.uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let histogram = HistogramEngine::new(&ctx.device, histogram_smoothing);
        tracing::info!("✅ GPU pipeline ready on {}", ctx.adapter_name);
        Self {
            ctx,
            kernels,
            uniform_buffer,
            raw: None,
            preview: StageTextures::default(),
            histogram,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn has_image(&self) -> bool {
        self.raw.is_some()
    }

    /// Replace the source texture. Resets the histogram.
    pub fn upload_raw(&mut self, image: &RawImage) -> Result<(), GpuResourceError> {
        self.ctx.check_size(image.width, image.height)?;
        self.raw = Some(texture::upload_raw(&self.ctx.device, &self.ctx.queue, image));
        self.histogram.reset();
        Ok(())
    }

    /// Develop the preview and queue its histogram. Returns the preview size.
    pub fn render_preview(
        &mut self,
        uniforms: &Uniforms,
        view: ViewTransform,
        max_dim: u32,
    ) -> Result<(u32, u32), GpuResourceError> {
        let raw = self.raw.as_ref().ok_or(GpuResourceError::Unavailable)?;
        let target = preview_dimensions(raw.width, raw.height, max_dim);
        let device = &self.ctx.device;

        self.ctx.queue.write_buffer(&self.uniform_buffer, 0, uniforms.as_bytes());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("darkroom.preview.encoder"),
        });
        self.kernels.encode_chain(
            device,
            &mut encoder,
            raw,
            &mut self.preview,
            &self.uniform_buffer,
            uniforms,
            view,
            target,
        );
        let output = self.preview.output.as_ref().ok_or(GpuResourceError::Unavailable)?;
        let size = (output.width, output.height);
        self.histogram.encode(device, &mut encoder, output);
        self.ctx.queue.submit(Some(encoder.finish()));
        self.histogram.after_submit();
        Ok(size)
    }

    /// Blocking readback of the last preview render
    pub fn read_preview(&self) -> Result<ProcessedImage, GpuResourceError> {
        let output = self.preview.output.as_ref().ok_or(GpuResourceError::Unavailable)?;
        let data = texture::read_rgba16f(&self.ctx.device, &self.ctx.queue, output)?;
        ProcessedImage::new(data, output.width, output.height)
            .ok_or_else(|| GpuResourceError::Readback("preview size mismatch".to_string()))
    }

    /// Native-resolution render for export. Intermediate textures are
    /// released afterwards.
    pub fn render_full(&mut self, uniforms: &Uniforms) -> Result<ProcessedImage, GpuResourceError> {
        let raw = self.raw.as_ref().ok_or(GpuResourceError::Unavailable)?;
        let device = &self.ctx.device;
        tracing::info!("📐 Full-resolution render {}x{}", raw.width, raw.height);

        let mut textures = StageTextures::default();
        self.ctx.queue.write_buffer(&self.uniform_buffer, 0, uniforms.as_bytes());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("darkroom.full.encoder"),
        });
        self.kernels.encode_chain(
            device,
            &mut encoder,
            raw,
            &mut textures,
            &self.uniform_buffer,
            uniforms,
            ViewTransform::default(),
            (raw.width, raw.height),
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let output = textures.output.as_ref().ok_or(GpuResourceError::Unavailable)?;
        let data = texture::read_rgba16f(device, &self.ctx.queue, output)?;
        ProcessedImage::new(data, output.width, output.height)
            .ok_or_else(|| GpuResourceError::Readback("full render size mismatch".to_string()))
    }

    /// Linear-luma histogram of the uploaded RAW, by stops
    pub fn compute_raw_histogram(&self) -> Result<[u32; HISTOGRAM_BINS], GpuResourceError> {
        let raw = self.raw.as_ref().ok_or(GpuResourceError::Unavailable)?;
        self.histogram.compute_raw(&self.ctx.device, &self.ctx.queue, raw)
    }

    /// Non-blocking histogram collection; true when new data arrived
    pub fn poll_histogram(&mut self) -> bool {
        self.histogram.poll(&self.ctx.device)
    }

    pub fn wait_histogram(&mut self) -> bool {
        self.histogram.wait(&self.ctx.device)
    }

    pub fn histogram(&self) -> Option<&DisplayHistogram> {
        self.histogram.histogram()
    }

    pub fn histogram_counts(&self) -> Option<&HistogramCounts> {
        self.histogram.latest_counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_params_layout() {
        assert_eq!(std::mem::size_of::<StageParams>(), 48);
    }

    #[test]
    fn test_preview_dimensions() {
        assert_eq!(preview_dimensions(4000, 3000, 2560), (2560, 1920));
        assert_eq!(preview_dimensions(3000, 4000, 2560), (1920, 2560));
        assert_eq!(preview_dimensions(800, 600, 2560), (800, 600));
        assert_eq!(preview_dimensions(800, 600, 0), (800, 600));
    }

    #[test]
    fn test_view_transform_identity() {
        assert!(ViewTransform::default().is_identity());
        assert!(ViewTransform { quarter_turns: 4, angle: 0.0 }.is_identity());
        assert!(!ViewTransform { quarter_turns: 1, angle: 0.0 }.is_identity());
        assert!(!ViewTransform { quarter_turns: 0, angle: 2.5 }.is_identity());
    }

    fn test_pipeline() -> Option<GpuPipeline> {
        match GpuContext::new() {
            Ok(ctx) => Some(GpuPipeline::new(ctx, 0.0)),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    fn gradient(width: u32, height: u32) -> RawImage {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y) * 65535 / (width + height)) as u16;
                data.extend_from_slice(&[v, v, v, 65535]);
            }
        }
        RawImage::new(data, width, height).unwrap()
    }

    #[test]
    fn test_gpu_preview_matches_cpu_histogram() {
        let Some(mut pipeline) = test_pipeline() else { return };
        pipeline.upload_raw(&gradient(96, 64)).unwrap();
        let size = pipeline
            .render_preview(&Uniforms::defaults(), ViewTransform::default(), 2560)
            .unwrap();
        assert_eq!(size, (96, 64));
        pipeline.wait_histogram();
        let counts = pipeline.histogram_counts().unwrap();
        for channel in 0..4 {
            assert_eq!(counts.total(channel), 96 * 64);
        }
        assert!(pipeline.histogram().is_some());
    }

    #[test]
    fn test_gpu_view_rotation_swaps_dimensions() {
        let Some(mut pipeline) = test_pipeline() else { return };
        pipeline.upload_raw(&gradient(80, 40)).unwrap();
        let view = ViewTransform { quarter_turns: 1, angle: 0.0 };
        let size = pipeline.render_preview(&Uniforms::defaults(), view, 2560).unwrap();
        assert_eq!(size, (40, 80));
        let image = pipeline.read_preview().unwrap();
        assert_eq!((image.width, image.height), (40, 80));
    }

    #[test]
    fn test_gpu_raw_histogram_matches_cpu() {
        let Some(mut pipeline) = test_pipeline() else { return };
        let image = RawImage::filled(33, 17, [8192, 8192, 8192, 65535]);
        pipeline.upload_raw(&image).unwrap();
        let gpu = pipeline.compute_raw_histogram().unwrap();
        assert_eq!(gpu, crate::gpu::histogram::accumulate_raw(&image));
    }
}
