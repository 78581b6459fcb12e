/// Histograms of the processed preview and of the linear RAW data
///
/// The processed histogram is accumulated on the GPU every render and read
/// back through two alternating mapped buffers, so the frame loop never
/// waits on it. A copy is only scheduled into a slot that is free; if both
/// are still in flight the frame simply skips its histogram.
///
/// The RAW histogram bins linear luma by stops and feeds auto-adjust. It is
/// computed once per loaded image.

use iced_wgpu::wgpu;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::color;
use crate::error::GpuResourceError;
use crate::gpu::pipeline::{compute_pipeline, storage_entry, texture_entry};
use crate::gpu::shaders;
use crate::gpu::texture::GpuTexture;
use crate::pixels::{ProcessedImage, RawImage};

pub const HISTOGRAM_BINS: usize = 256;
/// Channels in the processed histogram: R, G, B, luma
pub const HISTOGRAM_CHANNELS: usize = 4;
pub const LUMA_CHANNEL: usize = 3;

/// Stop range covered by the RAW histogram, relative to sensor white
pub const RAW_EV_MIN: f32 = -12.0;
pub const RAW_EV_MAX: f32 = 0.0;

const PROCESSED_BUFFER_SIZE: u64 = (HISTOGRAM_BINS * HISTOGRAM_CHANNELS * 4) as u64;
const RAW_BUFFER_SIZE: u64 = (HISTOGRAM_BINS * 4) as u64;
const WORKGROUP: u32 = 16;

/// Bin of a display-referred value in [0, 1]
pub fn unit_bin(v: f32) -> usize {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    ((v * HISTOGRAM_BINS as f32) as usize).min(HISTOGRAM_BINS - 1)
}

/// Bin of a linear luma value on the stop scale
pub fn raw_bin_for_luma(luma: f32) -> usize {
    if luma.is_nan() || luma <= 0.0 {
        return 0;
    }
    let t = (luma.log2() - RAW_EV_MIN) / (RAW_EV_MAX - RAW_EV_MIN);
    ((t * HISTOGRAM_BINS as f32).max(0.0) as usize).min(HISTOGRAM_BINS - 1)
}

/// Stop value at the center of a RAW histogram bin
pub fn raw_bin_ev(bin: usize) -> f32 {
    RAW_EV_MIN + (bin as f32 + 0.5) / HISTOGRAM_BINS as f32 * (RAW_EV_MAX - RAW_EV_MIN)
}

/// Raw bin counts for R, G, B and luma
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramCounts {
    pub bins: [[u32; HISTOGRAM_BINS]; HISTOGRAM_CHANNELS],
}

impl Default for HistogramCounts {
    fn default() -> Self {
        Self {
            bins: [[0; HISTOGRAM_BINS]; HISTOGRAM_CHANNELS],
        }
    }
}

impl HistogramCounts {
    pub fn total(&self, channel: usize) -> u64 {
        self.bins[channel].iter().map(|&c| c as u64).sum()
    }

    fn from_flat(flat: &[u32]) -> Self {
        let mut counts = Self::default();
        for (channel, chunk) in flat.chunks_exact(HISTOGRAM_BINS).take(HISTOGRAM_CHANNELS).enumerate() {
            counts.bins[channel].copy_from_slice(chunk);
        }
        counts
    }
}

/// Per-bin fractions, smoothed over successive renders
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayHistogram {
    pub bins: [[f32; HISTOGRAM_BINS]; HISTOGRAM_CHANNELS],
}

impl Default for DisplayHistogram {
    fn default() -> Self {
        Self {
            bins: [[0.0; HISTOGRAM_BINS]; HISTOGRAM_CHANNELS],
        }
    }
}

impl DisplayHistogram {
    pub fn from_counts(counts: &HistogramCounts) -> Self {
        let mut display = Self::default();
        display.blend(counts, 0.0);
        display
    }

    /// Mix `counts` in, keeping `smoothing` of the previous value
    pub fn blend(&mut self, counts: &HistogramCounts, smoothing: f32) {
        let keep = smoothing.clamp(0.0, 1.0);
        for channel in 0..HISTOGRAM_CHANNELS {
            let total = counts.total(channel).max(1) as f32;
            for (v, &c) in self.bins[channel].iter_mut().zip(counts.bins[channel].iter()) {
                *v = *v * keep + (c as f32 / total) * (1.0 - keep);
            }
        }
    }

    /// Largest fraction across the color channels, for plot scaling
    pub fn peak(&self) -> f32 {
        self.bins
            .iter()
            .take(LUMA_CHANNEL)
            .flat_map(|c| c.iter())
            .fold(0.0f32, |a, &b| a.max(b))
    }
}

/// CPU reference for the processed histogram
pub fn accumulate_processed(image: &ProcessedImage) -> HistogramCounts {
    let mut counts = HistogramCounts::default();
    for px in image.data.chunks_exact(4) {
        let r = px[0] as f32 / 65535.0;
        let g = px[1] as f32 / 65535.0;
        let b = px[2] as f32 / 65535.0;
        counts.bins[0][unit_bin(r)] += 1;
        counts.bins[1][unit_bin(g)] += 1;
        counts.bins[2][unit_bin(b)] += 1;
        counts.bins[LUMA_CHANNEL][unit_bin(color::luma(r, g, b))] += 1;
    }
    counts
}

/// CPU reference for the RAW histogram
pub fn accumulate_raw(image: &RawImage) -> [u32; HISTOGRAM_BINS] {
    let mut bins = [0u32; HISTOGRAM_BINS];
    for px in image.data.chunks_exact(4) {
        let l = color::luma(
            px[0] as f32 / 65535.0,
            px[1] as f32 / 65535.0,
            px[2] as f32 / 65535.0,
        );
        bins[raw_bin_for_luma(l)] += 1;
    }
    bins
}

// ========== Readback slots ==========

const SLOT_FREE: u8 = 0;
const SLOT_COPIED: u8 = 1;
const SLOT_MAPPING: u8 = 2;
const SLOT_MAPPED: u8 = 3;
const SLOT_FAILED: u8 = 4;

struct ReadbackSlot {
    buffer: wgpu::Buffer,
    state: Arc<AtomicU8>,
}

impl ReadbackSlot {
    fn new(device: &wgpu::Device, index: usize) -> Self {
        Self {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("darkroom.histogram.readback.{index}")),
                size: PROCESSED_BUFFER_SIZE,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            state: Arc::new(AtomicU8::new(SLOT_FREE)),
        }
    }

    fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }
}

pub struct HistogramEngine {
    processed_pipeline: wgpu::ComputePipeline,
    processed_layout: wgpu::BindGroupLayout,
    raw_pipeline: wgpu::ComputePipeline,
    raw_layout: wgpu::BindGroupLayout,
    accumulator: wgpu::Buffer,
    slots: [ReadbackSlot; 2],
    next_slot: usize,
    display: DisplayHistogram,
    latest: Option<HistogramCounts>,
    smoothing: f32,
    complete: bool,
}

impl std::fmt::Debug for HistogramEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistogramEngine")
            .field("next_slot", &self.next_slot)
            .field("smoothing", &self.smoothing)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

impl HistogramEngine {
    pub fn new(device: &wgpu::Device, smoothing: f32) -> Self {
        let processed_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.histogram.layout"),
            entries: &[
                texture_entry(0, wgpu::TextureSampleType::Float { filterable: false }),
                storage_entry(1),
            ],
        });
        let raw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("darkroom.raw_histogram.layout"),
            entries: &[texture_entry(0, wgpu::TextureSampleType::Uint), storage_entry(1)],
        });

        let processed_pipeline = compute_pipeline(
            device,
            "darkroom.histogram",
            &processed_layout,
            shaders::HISTOGRAM_SHADER,
            "processed_main",
        );
        let raw_pipeline = compute_pipeline(
            device,
            "darkroom.raw_histogram",
            &raw_layout,
            shaders::RAW_HISTOGRAM_SHADER,
            "raw_main",
        );

        let accumulator = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("darkroom.histogram.accumulator"),
            size: PROCESSED_BUFFER_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            processed_pipeline,
            processed_layout,
            raw_pipeline,
            raw_layout,
            accumulator,
            slots: [ReadbackSlot::new(device, 0), ReadbackSlot::new(device, 1)],
            next_slot: 0,
            display: DisplayHistogram::default(),
            latest: None,
            smoothing: smoothing.clamp(0.0, 0.99),
            complete: false,
        }
    }

    /// Record accumulation over `source` into `encoder`.
    ///
    /// Returns whether a readback copy was scheduled. Call `after_submit`
    /// once the encoder has been submitted.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &GpuTexture,
    ) -> bool {
        let slot = &self.slots[self.next_slot];
        if slot.state() != SLOT_FREE {
            tracing::debug!("Histogram readback slots busy, skipping this frame");
            return false;
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("darkroom.histogram.bind_group"),
            layout: &self.processed_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.accumulator.as_entire_binding(),
                },
            ],
        });

        encoder.clear_buffer(&self.accumulator, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("darkroom.histogram.pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.processed_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                source.width.div_ceil(WORKGROUP),
                source.height.div_ceil(WORKGROUP),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&self.accumulator, 0, &slot.buffer, 0, PROCESSED_BUFFER_SIZE);
        slot.state.store(SLOT_COPIED, Ordering::Release);
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        true
    }

    /// Start mapping every slot whose copy has been submitted
    pub fn after_submit(&self) {
        for slot in &self.slots {
            if slot
                .state
                .compare_exchange(SLOT_COPIED, SLOT_MAPPING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let state = Arc::clone(&slot.state);
            slot.buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
                let next = if result.is_ok() { SLOT_MAPPED } else { SLOT_FAILED };
                state.store(next, Ordering::Release);
            });
        }
    }

    /// Collect finished readbacks without blocking. Returns true if the
    /// display histogram changed.
    pub fn poll(&mut self, device: &wgpu::Device) -> bool {
        device.poll(wgpu::Maintain::Poll);
        self.collect()
    }

    /// Block until every in-flight readback has landed
    pub fn wait(&mut self, device: &wgpu::Device) -> bool {
        device.poll(wgpu::Maintain::Wait);
        self.collect()
    }

    fn collect(&mut self) -> bool {
        let mut updated = false;
        for i in 0..self.slots.len() {
            match self.slots[i].state() {
                SLOT_MAPPED => {
                    let counts = {
                        let data = self.slots[i].buffer.slice(..).get_mapped_range();
                        let flat: &[u32] = bytemuck::cast_slice(&data[..]);
                        HistogramCounts::from_flat(flat)
                    };
                    self.slots[i].buffer.unmap();
                    self.slots[i].state.store(SLOT_FREE, Ordering::Release);
                    self.accept(counts);
                    updated = true;
                }
                SLOT_FAILED => {
                    tracing::warn!("⚠️  Histogram readback failed, slot {i} released");
                    self.slots[i].state.store(SLOT_FREE, Ordering::Release);
                }
                _ => {}
            }
        }
        updated
    }

    fn accept(&mut self, counts: HistogramCounts) {
        if self.complete {
            self.display.blend(&counts, self.smoothing);
        } else {
            self.display = DisplayHistogram::from_counts(&counts);
            self.complete = true;
        }
        self.latest = Some(counts);
    }

    /// Smoothed histogram, once at least one readback has completed
    pub fn histogram(&self) -> Option<&DisplayHistogram> {
        self.complete.then_some(&self.display)
    }

    pub fn latest_counts(&self) -> Option<&HistogramCounts> {
        self.latest.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Forget the previous image's histogram
    pub fn reset(&mut self) {
        self.display = DisplayHistogram::default();
        self.latest = None;
        self.complete = false;
    }

    /// Blocking RAW histogram over an `Rgba16Uint` texture
    pub fn compute_raw(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        raw: &GpuTexture,
    ) -> Result<[u32; HISTOGRAM_BINS], GpuResourceError> {
        let bins = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("darkroom.raw_histogram.bins"),
            size: RAW_BUFFER_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("darkroom.raw_histogram.readback"),
            size: RAW_BUFFER_SIZE,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("darkroom.raw_histogram.bind_group"),
            layout: &self.raw_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&raw.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: bins.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("darkroom.raw_histogram.encoder"),
        });
        encoder.clear_buffer(&bins, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("darkroom.raw_histogram.pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.raw_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(raw.width.div_ceil(WORKGROUP), raw.height.div_ceil(WORKGROUP), 1);
        }
        encoder.copy_buffer_to_buffer(&bins, 0, &readback, 0, RAW_BUFFER_SIZE);
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuResourceError::Readback(e.to_string()))?
            .map_err(|e| GpuResourceError::Readback(e.to_string()))?;

        let mut out = [0u32; HISTOGRAM_BINS];
        {
            let data = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&data[..]));
        }
        readback.unmap();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_bin_edges() {
        assert_eq!(unit_bin(0.0), 0);
        assert_eq!(unit_bin(1.0), 255);
        assert_eq!(unit_bin(-3.0), 0);
        assert_eq!(unit_bin(0.5), 128);
        assert_eq!(unit_bin(f32::NAN), 0);
    }

    #[test]
    fn test_raw_bins_by_stops() {
        assert_eq!(raw_bin_for_luma(0.0), 0);
        assert_eq!(raw_bin_for_luma(1.0), 255);
        assert_eq!(raw_bin_for_luma(1e-9), 0);
        // Half of the 12-stop range
        assert_eq!(raw_bin_for_luma(2f32.powi(-6)), 128);
        assert!(raw_bin_ev(0) > RAW_EV_MIN && raw_bin_ev(255) < RAW_EV_MAX);
    }

    #[test]
    fn test_processed_counts_every_pixel_once_per_channel() {
        let data: Vec<u16> = (0..64u16)
            .flat_map(|i| [i * 1000, 65535 - i * 1000, i * 500, 65535])
            .collect();
        let image = ProcessedImage::new(data, 8, 8).unwrap();
        let counts = accumulate_processed(&image);
        for channel in 0..HISTOGRAM_CHANNELS {
            assert_eq!(counts.total(channel), 64);
        }
    }

    #[test]
    fn test_raw_counts_every_pixel() {
        let image = RawImage::filled(10, 7, [4096, 4096, 4096, 65535]);
        let bins = accumulate_raw(&image);
        assert_eq!(bins.iter().map(|&b| b as u64).sum::<u64>(), 70);
        assert_eq!(bins.iter().filter(|&&b| b > 0).count(), 1);
    }

    #[test]
    fn test_display_blend() {
        let mut counts = HistogramCounts::default();
        counts.bins[0][10] = 4;
        let mut display = DisplayHistogram::from_counts(&counts);
        assert_eq!(display.bins[0][10], 1.0);

        let mut other = HistogramCounts::default();
        other.bins[0][20] = 4;
        display.blend(&other, 0.5);
        assert!((display.bins[0][10] - 0.5).abs() < 1e-6);
        assert!((display.bins[0][20] - 0.5).abs() < 1e-6);
        assert!((display.peak() - 0.5).abs() < 1e-6);
    }
}
