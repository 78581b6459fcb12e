/// Owned GPU textures and the copies in and out of them
///
/// Each `GpuTexture` has exactly one owner. When an image changes size or
/// format the texture is dropped and recreated rather than reused.

use iced_wgpu::wgpu;

use crate::error::GpuResourceError;
use crate::pixels::RawImage;

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl GpuTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Storage target written by a compute stage and read by the next one
    pub fn storage(device: &wgpu::Device, label: &str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
    }

    pub fn size(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    pub fn matches(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        self.width == width && self.height == height && self.format == format
    }
}

/// Reuse `previous` if it already has this shape, otherwise allocate anew
pub fn reuse_storage(
    previous: Option<GpuTexture>,
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    match previous {
        Some(texture) if texture.matches(width, height, format) => texture,
        _ => {
            tracing::debug!("Allocating {label} {width}x{height} {format:?}");
            GpuTexture::storage(device, label, width, height, format)
        }
    }
}

/// Upload a linear RGBA16 image into a fresh `Rgba16Uint` texture
pub fn upload_raw(device: &wgpu::Device, queue: &wgpu::Queue, image: &RawImage) -> GpuTexture {
    let texture = GpuTexture::new(
        device,
        "darkroom.raw",
        image.width,
        image.height,
        wgpu::TextureFormat::Rgba16Uint,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
    );

    let bytes: &[u8] = bytemuck::cast_slice(&image.data);
    tracing::info!("💾 Uploading {} bytes of RAW RGBA16 data to GPU", bytes.len());
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(8 * image.width),
            rows_per_image: Some(image.height),
        },
        texture.size(),
    );
    texture
}

/// Row pitch of a texture-to-buffer copy, padded to the copy alignment
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

/// Blocking readback of an `Rgba16Float` texture as unsigned 16-bit RGBA
pub fn read_rgba16f(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &GpuTexture,
) -> Result<Vec<u16>, GpuResourceError> {
    let unpadded = texture.width * 8;
    let padded = padded_bytes_per_row(unpadded);

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("darkroom.readback"),
        size: padded as u64 * texture.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("darkroom.readback.encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &texture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &output_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(texture.height),
            },
        },
        texture.size(),
    );
    queue.submit(Some(encoder.finish()));

    let slice = output_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| GpuResourceError::Readback(e.to_string()))?
        .map_err(|e| GpuResourceError::Readback(e.to_string()))?;

    let mut out = Vec::with_capacity(texture.width as usize * texture.height as usize * 4);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize).take(texture.height as usize) {
            let halves: &[half::f16] = bytemuck::cast_slice(&row[..unpadded as usize]);
            out.extend(halves.iter().map(|h| unit_to_u16(h.to_f32())));
        }
    }
    output_buffer.unmap();
    Ok(out)
}

/// [0, 1] float to the full u16 range
pub fn unit_to_u16(v: f32) -> u16 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(8), 256);
        assert_eq!(padded_bytes_per_row(8 * 100), 1024);
    }

    #[test]
    fn test_unit_to_u16() {
        assert_eq!(unit_to_u16(0.0), 0);
        assert_eq!(unit_to_u16(1.5), 65535);
        assert_eq!(unit_to_u16(f32::NAN), 0);
        assert_eq!(unit_to_u16(0.5), 32768);
    }
}
