/// CPU-side pixel buffers
///
/// `RawImage` is the authoritative linear source the GPU textures are built
/// from; it doubles as the undo snapshot type. `ProcessedImage` is what comes
/// back from the GPU after development, ready for encoding.

/// Linear 16-bit RGBA pixels, row-major, 4 samples per pixel
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    pub data: Vec<u16>,
    pub width: u32,
    pub height: u32,
}

impl RawImage {
    /// Wrap an RGBA16 buffer. Returns `None` if the length doesn't match.
    pub fn new(data: Vec<u16>, width: u32, height: u32) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { data, width, height })
    }

    /// Solid-color image, mostly useful for tests and placeholders
    pub fn filled(width: u32, height: u32, rgba: [u16; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self { data, width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u16; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<u16>()
    }
}

// Pixel buffers are huge; keep Debug output to the header.
impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Display-referred (sRGB encoded) 16-bit RGBA pixels read back from the GPU
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub data: Vec<u16>,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    pub fn new(data: Vec<u16>, width: u32, height: u32) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { data, width, height })
    }

    /// 8-bit RGBA, used for on-screen display
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.data.iter().map(|&v| (v >> 8) as u8).collect()
    }

    /// 8-bit RGB with alpha dropped, used by the 8-bit encoders
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| [(px[0] >> 8) as u8, (px[1] >> 8) as u8, (px[2] >> 8) as u8])
            .collect()
    }

    /// 16-bit RGB with alpha dropped
    pub fn to_rgb16(&self) -> Vec<u16> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }

    /// Mean Rec. 709 luma in [0, 1]
    pub fn mean_luma(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .data
            .chunks_exact(4)
            .map(|px| {
                crate::color::luma(
                    px[0] as f32 / 65535.0,
                    px[1] as f32 / 65535.0,
                    px[2] as f32 / 65535.0,
                ) as f64
            })
            .sum();
        sum / (self.data.len() / 4) as f64
    }
}

impl std::fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_length() {
        assert!(RawImage::new(vec![0; 15], 2, 2).is_none());
        assert!(RawImage::new(vec![0; 16], 2, 2).is_some());
    }

    #[test]
    fn test_rgb8_drops_alpha() {
        let img = ProcessedImage::new(vec![65535, 32768, 0, 65535], 1, 1).unwrap();
        assert_eq!(img.to_rgb8(), vec![255, 128, 0]);
    }
}
