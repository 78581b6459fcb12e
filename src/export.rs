/// Export encoders and atomic file writes
///
/// Supported outputs:
/// - JPEG: quality, progressive scan, chroma subsampling (jpeg-encoder)
/// - PNG: 8-bit RGB, optionally Adam7 interlaced (lodepng)
/// - TIFF: none/deflate compression, 8 or 16 bits per channel (tiff)
///
/// An optional target size resamples the render (Lanczos3) before encoding.
///
/// Files are written to a hidden `.partial` sibling and renamed into place
/// only once the encoder has finished, so a failed export never leaves a
/// truncated file under the requested name.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::EncodeError;
use crate::pixels::ProcessedImage;

const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Jpeg,
    Png,
    Tiff,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Jpeg, ExportFormat::Png, ExportFormat::Tiff];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Png => "png",
            ExportFormat::Tiff => "tiff",
        }
    }

    /// Guess from a file extension, case-insensitively
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "png" => Some(ExportFormat::Png),
            "tif" | "tiff" => Some(ExportFormat::Tiff),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Jpeg => "JPEG",
            ExportFormat::Png => "PNG",
            ExportFormat::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChromaSubsampling {
    #[serde(rename = "4:4:4")]
    Full,
    #[serde(rename = "4:2:2")]
    Half,
    #[default]
    #[serde(rename = "4:2:0")]
    Quarter,
}

impl ChromaSubsampling {
    pub const ALL: [ChromaSubsampling; 3] = [
        ChromaSubsampling::Full,
        ChromaSubsampling::Half,
        ChromaSubsampling::Quarter,
    ];

    fn sampling_factor(self) -> jpeg_encoder::SamplingFactor {
        match self {
            ChromaSubsampling::Full => jpeg_encoder::SamplingFactor::F_1_1,
            ChromaSubsampling::Half => jpeg_encoder::SamplingFactor::F_2_1,
            ChromaSubsampling::Quarter => jpeg_encoder::SamplingFactor::F_2_2,
        }
    }
}

impl std::fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChromaSubsampling::Full => "4:4:4",
            ChromaSubsampling::Half => "4:2:2",
            ChromaSubsampling::Quarter => "4:2:0",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct JpegOptions {
    /// 0-100
    pub quality: u8,
    pub progressive: bool,
    pub subsampling: ChromaSubsampling,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: 90,
            progressive: true,
            subsampling: ChromaSubsampling::Quarter,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PngOptions {
    pub interlaced: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TiffCompression {
    None,
    #[default]
    Deflate,
}

impl TiffCompression {
    pub const ALL: [TiffCompression; 2] = [TiffCompression::None, TiffCompression::Deflate];
}

impl std::fmt::Display for TiffCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TiffCompression::None => "Uncompressed",
            TiffCompression::Deflate => "Deflate",
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "16")]
    Sixteen,
}

impl BitDepth {
    pub const ALL: [BitDepth; 2] = [BitDepth::Eight, BitDepth::Sixteen];
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BitDepth::Eight => "8-bit",
            BitDepth::Sixteen => "16-bit",
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TiffOptions {
    pub compression: TiffCompression,
    pub bit_depth: BitDepth,
}

/// Output size in pixels. A zero side follows the source aspect ratio.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
}

impl ResizeTarget {
    /// Concrete output size for a `width`x`height` source, or `None` when
    /// no resampling is needed
    pub fn resolve(self, width: u32, height: u32) -> Option<(u32, u32)> {
        let scaled = |side: u32, num: u32, den: u32| {
            ((u64::from(side) * u64::from(num) + u64::from(den) / 2) / u64::from(den.max(1))).max(1) as u32
        };
        let size = match (self.width, self.height) {
            (0, 0) => return None,
            (w, 0) => (w, scaled(height, w, width)),
            (0, h) => (scaled(width, h, height), h),
            (w, h) => (w, h),
        };
        (size != (width, height)).then_some(size)
    }
}

/// Everything an export needs besides the pixels and the destination
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub jpeg: JpegOptions,
    pub png: PngOptions,
    pub tiff: TiffOptions,
    pub resize: Option<ResizeTarget>,
}

impl ExportOptions {
    pub fn jpeg(quality: u8, subsampling: ChromaSubsampling) -> Self {
        Self {
            format: ExportFormat::Jpeg,
            jpeg: JpegOptions {
                quality,
                subsampling,
                ..JpegOptions::default()
            },
            ..Self::default()
        }
    }
}

// ========== Encoders ==========

/// Encode `image` into `writer` in the configured format.
/// `progress` receives fractions in [0, 1].
pub fn encode<W: Write + Seek>(
    image: &ProcessedImage,
    options: &ExportOptions,
    writer: &mut W,
    progress: &dyn Fn(f32),
) -> Result<(), EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::Codec("image is empty".to_string()));
    }
    progress(0.0);
    let scaled = resized(image, options.resize)?;
    let image = scaled.as_ref();
    match options.format {
        ExportFormat::Jpeg => encode_jpeg(image, &options.jpeg, writer, progress),
        ExportFormat::Png => encode_png(image, &options.png, writer, progress),
        ExportFormat::Tiff => encode_tiff(image, &options.tiff, writer, progress),
    }?;
    progress(1.0);
    Ok(())
}

/// Resample to the target size, borrowing `image` when no resize is asked for
pub fn resized(image: &ProcessedImage, target: Option<ResizeTarget>) -> Result<Cow<'_, ProcessedImage>, EncodeError> {
    use image::{imageops, ImageBuffer, Rgba};

    let Some((width, height)) = target.and_then(|t| t.resolve(image.width, image.height)) else {
        return Ok(Cow::Borrowed(image));
    };
    let source: ImageBuffer<Rgba<u16>, Vec<u16>> = ImageBuffer::from_raw(image.width, image.height, image.data.clone())
        .ok_or_else(|| EncodeError::Codec("pixel buffer does not match its size".to_string()))?;
    let scaled = imageops::resize(&source, width, height, imageops::FilterType::Lanczos3);
    tracing::info!("📐 Resized export {}x{} -> {width}x{height}", image.width, image.height);
    ProcessedImage::new(scaled.into_raw(), width, height)
        .map(Cow::Owned)
        .ok_or_else(|| EncodeError::Codec("resampled buffer has the wrong size".to_string()))
}

fn encode_jpeg<W: Write>(
    image: &ProcessedImage,
    options: &JpegOptions,
    writer: &mut W,
    progress: &dyn Fn(f32),
) -> Result<(), EncodeError> {
    if image.width > JPEG_MAX_DIMENSION || image.height > JPEG_MAX_DIMENSION {
        return Err(EncodeError::TooLarge {
            format: "JPEG",
            width: image.width,
            height: image.height,
        });
    }
    let rgb = image.to_rgb8();
    progress(0.3);

    let mut encoder = jpeg_encoder::Encoder::new(writer, options.quality.min(100));
    encoder.set_progressive(options.progressive);
    encoder.set_sampling_factor(options.subsampling.sampling_factor());
    encoder
        .encode(
            &rgb,
            image.width as u16,
            image.height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .map_err(|e| EncodeError::Codec(e.to_string()))
}

fn encode_png<W: Write>(
    image: &ProcessedImage,
    options: &PngOptions,
    writer: &mut W,
    progress: &dyn Fn(f32),
) -> Result<(), EncodeError> {
    let rgb = image.to_rgb8();
    progress(0.3);

    let mut encoder = lodepng::Encoder::new();
    encoder.set_auto_convert(false);
    encoder.info_raw_mut().colortype = lodepng::ColorType::RGB;
    encoder.info_raw_mut().set_bitdepth(8);
    let info = encoder.info_png_mut();
    info.color.colortype = lodepng::ColorType::RGB;
    info.color.set_bitdepth(8);
    // 1 = Adam7
    info.interlace_method = u8::from(options.interlaced);

    let png = encoder
        .encode(&rgb, image.width as usize, image.height as usize)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    progress(0.9);
    writer.write_all(&png)?;
    Ok(())
}

fn encode_tiff<W: Write + Seek>(
    image: &ProcessedImage,
    options: &TiffOptions,
    writer: &mut W,
    progress: &dyn Fn(f32),
) -> Result<(), EncodeError> {
    use tiff::encoder::compression::{Deflate, Uncompressed};
    use tiff::encoder::{colortype, TiffEncoder};

    let codec = |e: tiff::TiffError| EncodeError::Codec(e.to_string());
    let mut encoder = TiffEncoder::new(writer).map_err(codec)?;
    let (w, h) = (image.width, image.height);

    match (options.bit_depth, options.compression) {
        (BitDepth::Eight, compression) => {
            let rgb = image.to_rgb8();
            progress(0.3);
            match compression {
                TiffCompression::None => encoder
                    .write_image_with_compression::<colortype::RGB8, _>(w, h, Uncompressed, &rgb),
                TiffCompression::Deflate => encoder
                    .write_image_with_compression::<colortype::RGB8, _>(w, h, Deflate::default(), &rgb),
            }
        }
        (BitDepth::Sixteen, compression) => {
            let rgb = image.to_rgb16();
            progress(0.3);
            match compression {
                TiffCompression::None => encoder
                    .write_image_with_compression::<colortype::RGB16, _>(w, h, Uncompressed, &rgb),
                TiffCompression::Deflate => encoder
                    .write_image_with_compression::<colortype::RGB16, _>(w, h, Deflate::default(), &rgb),
            }
        }
    }
    .map_err(codec)
}

/// Encode to `path` through a temporary sibling. Returns the final file size.
pub fn encode_to_file(
    image: &ProcessedImage,
    options: &ExportOptions,
    path: &Path,
    progress: &dyn Fn(f32),
) -> Result<u64, EncodeError> {
    write_then_rename(path, |file| {
        let mut writer = io::BufWriter::new(file);
        encode(image, options, &mut writer, &|p| progress(p * 0.95))?;
        writer.flush()?;
        Ok::<(), EncodeError>(())
    })?;
    let size = fs::metadata(path)?.len();
    progress(1.0);
    tracing::info!(
        "💾 Exported {} ({}x{}, {} kB)",
        path.display(),
        image.width,
        image.height,
        size.div_ceil(1024)
    );
    Ok(size)
}

/// Trial-encode in memory and report the size in kilobytes, rounded up
pub fn estimate_size_kb(image: &ProcessedImage, options: &ExportOptions) -> Result<u64, EncodeError> {
    let mut buffer = Cursor::new(Vec::new());
    encode(image, options, &mut buffer, &|_| {})?;
    Ok((buffer.into_inner().len() as u64).div_ceil(1024))
}

// ========== Atomic writes ==========

/// Hidden sibling used while `path` is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Run `write` against a temporary file next to `path`, then rename it into
/// place. On any failure the temporary file is removed and `path` is left
/// as it was.
pub fn write_then_rename<F, E>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut File) -> Result<(), E>,
    E: From<io::Error>,
{
    let partial = partial_path(path);
    let written = File::create(&partial)
        .map_err(E::from)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        });

    let renamed = written.and_then(|()| fs::rename(&partial, path).map_err(E::from));
    if renamed.is_err() {
        let _ = fs::remove_file(&partial);
    }
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> ProcessedImage {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let r = (x * 65535 / width.max(1)) as u16;
                let g = (y * 65535 / height.max(1)) as u16;
                data.extend_from_slice(&[r, g, 32768, 65535]);
            }
        }
        ProcessedImage::new(data, width, height).unwrap()
    }

    #[test]
    fn test_jpeg_roundtrips_through_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = gradient(64, 48);
        let size = encode_to_file(&img, &ExportOptions::default(), &path, &|_| {}).unwrap();
        assert!(size > 0);

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_png_and_tiff16_decode() {
        let dir = tempfile::tempdir().unwrap();
        let img = gradient(20, 10);

        let png = dir.path().join("out.png");
        let options = ExportOptions {
            format: ExportFormat::Png,
            ..Default::default()
        };
        encode_to_file(&img, &options, &png, &|_| {}).unwrap();
        assert_eq!(image::open(&png).unwrap().width(), 20);

        let tif = dir.path().join("out.tiff");
        let options = ExportOptions {
            format: ExportFormat::Tiff,
            tiff: TiffOptions {
                compression: TiffCompression::Deflate,
                bit_depth: BitDepth::Sixteen,
            },
            ..Default::default()
        };
        encode_to_file(&img, &options, &tif, &|_| {}).unwrap();
        let decoded = image::open(&tif).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
        assert_eq!(decoded.color(), image::ColorType::Rgb16);
    }

    /// Interlace method byte of the IHDR chunk
    fn png_interlace_method(bytes: &[u8]) -> u8 {
        assert_eq!(&bytes[12..16], b"IHDR");
        bytes[28]
    }

    #[test]
    fn test_png_interlace_flag_is_written() {
        let img = gradient(16, 16);
        let mut options = ExportOptions {
            format: ExportFormat::Png,
            ..Default::default()
        };

        let mut plain = Cursor::new(Vec::new());
        encode(&img, &options, &mut plain, &|_| {}).unwrap();
        assert_eq!(png_interlace_method(plain.get_ref()), 0);

        options.png.interlaced = true;
        let mut adam7 = Cursor::new(Vec::new());
        encode(&img, &options, &mut adam7, &|_| {}).unwrap();
        assert_eq!(png_interlace_method(adam7.get_ref()), 1);

        let decoded = image::load_from_memory(adam7.get_ref()).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.into_raw(), img.to_rgb8());
    }

    #[test]
    fn test_resize_target_resolution() {
        let keep = ResizeTarget { width: 0, height: 0 };
        assert_eq!(keep.resolve(400, 300), None);
        assert_eq!(ResizeTarget { width: 200, height: 0 }.resolve(400, 300), Some((200, 150)));
        assert_eq!(ResizeTarget { width: 0, height: 100 }.resolve(400, 300), Some((133, 100)));
        assert_eq!(ResizeTarget { width: 64, height: 64 }.resolve(400, 300), Some((64, 64)));
        assert_eq!(ResizeTarget { width: 400, height: 300 }.resolve(400, 300), None);
    }

    #[test]
    fn test_export_is_resized_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        let options = ExportOptions {
            format: ExportFormat::Png,
            resize: Some(ResizeTarget { width: 30, height: 0 }),
            ..Default::default()
        };
        encode_to_file(&gradient(60, 40), &options, &path, &|_| {}).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn test_jpeg_defaults_to_progressive() {
        assert!(JpegOptions::default().progressive);
        assert!(ExportOptions::jpeg(80, ChromaSubsampling::Full).jpeg.progressive);
    }

    #[test]
    fn test_unwritable_destination_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.jpg");
        let err = encode_to_file(&gradient(8, 8), &ExportOptions::default(), &path, &|_| {}).unwrap_err();
        assert!(matches!(err, EncodeError::Io(_)));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_progress_is_monotonic_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.jpg");
        let seen = std::cell::RefCell::new(Vec::new());
        encode_to_file(&gradient(16, 16), &ExportOptions::default(), &path, &|p| {
            seen.borrow_mut().push(p)
        })
        .unwrap();
        let seen = seen.into_inner();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(1.0));
    }

    #[test]
    fn test_estimate_tracks_quality() {
        let img = gradient(128, 128);
        let low = estimate_size_kb(&img, &ExportOptions::jpeg(10, ChromaSubsampling::Quarter)).unwrap();
        let high = estimate_size_kb(&img, &ExportOptions::jpeg(100, ChromaSubsampling::Full)).unwrap();
        assert!(low > 0);
        assert!(high >= low);
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        let result: Result<(), EncodeError> =
            write_then_rename(&path, |_| Err(EncodeError::Codec("boom".to_string())));
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let img = ProcessedImage::new(Vec::new(), 0, 0).unwrap();
        assert!(estimate_size_kb(&img, &ExportOptions::default()).is_err());
    }

    #[test]
    fn test_options_json_shape() {
        let json = serde_json::to_string(&ExportOptions::jpeg(80, ChromaSubsampling::Half)).unwrap();
        assert!(json.contains("\"4:2:2\""));
        assert!(json.contains("\"jpeg\""));
        let back: ExportOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.jpeg.quality, 80);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.JPEG")), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_path(Path::new("x.tif")), Some(ExportFormat::Tiff));
        assert_eq!(ExportFormat::from_path(Path::new("x.bmp")), None);
    }
}
