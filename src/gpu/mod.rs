/// GPU-accelerated RAW development module
///
/// This module provides real-time, non-destructive processing using wgpu
/// compute shaders.
///
/// Architecture:
/// - `context.rs` - adapter, device and queue
/// - `texture.rs` - texture ownership, upload and readback
/// - `shaders.rs` - WGSL kernel sources
/// - `pipeline.rs` - stage chain, preview and full-resolution renders
/// - `histogram.rs` - GPU histograms with non-blocking readback
///
/// The RAW image is uploaded once as Rgba16Uint; every slider change
/// re-runs the chain from that texture.

pub mod context;
pub mod histogram;
pub mod pipeline;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use histogram::{DisplayHistogram, HistogramCounts};
pub use pipeline::{GpuPipeline, ViewTransform};
