/// RAW sensor data loader
///
/// Decodes the actual sensor data (not the embedded JPEG) with rawloader and
/// develops it into linear 16-bit RGBA: black/white level normalization,
/// as-shot white balance, bilinear demosaic, camera-to-sRGB matrix, sensor
/// crop and orientation.

use std::io::Cursor;
use std::path::Path;

use crate::color;
use crate::error::DecodeError;
use crate::pixels::RawImage;
use crate::raw::exif::{self, ExifSummary};
use crate::raw::transform;

/// Exposure estimate bound when no metadata hint exists, in stops
const MAX_INITIAL_EXPOSURE: f32 = 3.0;

/// Everything a load produces
#[derive(Debug, Clone)]
pub struct DecodedRaw {
    pub image: RawImage,
    /// Stops of compensation to apply by default (`Uniforms::base_exposure`)
    pub initial_exposure: f32,
    pub exif: ExifSummary,
}

/// Per-channel sensor calibration pulled out of the RAW header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLevels {
    pub black: [f32; 4],
    pub white: [f32; 4],
    /// White balance gains normalized to green = 1, indexed by CFA color
    pub wb: [f32; 4],
}

impl SensorLevels {
    fn normalize(&self, value: f32, color: usize) -> f32 {
        let c = color.min(3);
        let range = (self.white[c] - self.black[c]).max(1.0);
        ((value - self.black[c]) / range).max(0.0) * self.wb[c]
    }
}

/// Decode a RAW file from disk.
///
/// Fails without side effects: nothing is returned until the whole image
/// has been developed.
pub fn decode_raw(path: &Path) -> Result<DecodedRaw, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let raw = rawloader::decode(&mut Cursor::new(&bytes)).map_err(|e| {
        let msg = e.to_string();
        if msg.to_lowercase().contains("unknown") || msg.contains("Unsupported") {
            DecodeError::Unsupported(msg)
        } else {
            DecodeError::Corrupt(msg)
        }
    })?;

    tracing::info!(
        "📷 Decoded {} {}: {}x{} sensor, cpp {}",
        raw.clean_make,
        raw.clean_model,
        raw.width,
        raw.height,
        raw.cpp
    );

    let image = develop(&raw)?;
    let image = transform::rotate_quarter(&image, orientation_turns(raw.orientation));

    let mut exif = exif::read_summary(&bytes, path);
    if exif.make.is_none() {
        exif.make = Some(raw.clean_make.clone());
    }
    if exif.model.is_none() {
        exif.model = Some(raw.clean_model.clone());
    }

    let initial_exposure = match exif.baseline_exposure {
        Some(ev) => {
            tracing::info!("☀️  BaselineExposure {ev:+.2} EV");
            ev
        }
        None => estimate_exposure(&image),
    };

    tracing::info!("✅ Developed {}x{} RGBA16", image.width, image.height);
    Ok(DecodedRaw {
        image,
        initial_exposure,
        exif,
    })
}

/// Sensor data to linear sRGB RGBA16
fn develop(raw: &rawloader::RawImage) -> Result<RawImage, DecodeError> {
    let (width, height) = (raw.width, raw.height);
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty);
    }

    let samples: Vec<f32> = match &raw.data {
        rawloader::RawImageData::Integer(values) => values.iter().map(|&v| v as f32).collect(),
        rawloader::RawImageData::Float(values) => values.clone(),
    };
    if samples.len() < width * height * raw.cpp {
        return Err(DecodeError::Corrupt(format!(
            "expected {} samples, got {}",
            width * height * raw.cpp,
            samples.len()
        )));
    }

    let levels = sensor_levels(raw);
    let xyz_to_cam = [
        raw.xyz_to_cam[0][0], raw.xyz_to_cam[0][1], raw.xyz_to_cam[0][2],
        raw.xyz_to_cam[1][0], raw.xyz_to_cam[1][1], raw.xyz_to_cam[1][2],
        raw.xyz_to_cam[2][0], raw.xyz_to_cam[2][1], raw.xyz_to_cam[2][2],
    ];
    let matrix = color::calculate_cam_to_srgb_matrix(xyz_to_cam);

    let rgb = if raw.cpp == 3 {
        samples
            .chunks_exact(3)
            .take(width * height)
            .map(|px| [levels.normalize(px[0], 0), levels.normalize(px[1], 1), levels.normalize(px[2], 2)])
            .collect()
    } else {
        demosaic_bilinear(&samples, width, height, |row, col| raw.cfa.color_at(row, col), &levels)
    };

    let full = to_rgba16(&rgb, &matrix, width as u32, height as u32);

    // crops: [top, right, bottom, left]
    let [top, right, bottom, left] = raw.crops;
    if left + right < width && top + bottom < height && (top | right | bottom | left) != 0 {
        let rect = (
            left as u32,
            top as u32,
            (width - left - right) as u32,
            (height - top - bottom) as u32,
        );
        return Ok(transform::crop(&full, rect));
    }
    Ok(full)
}

fn sensor_levels(raw: &rawloader::RawImage) -> SensorLevels {
    let wb = raw.wb_coeffs;
    let wb = if wb[0].is_finite() && wb[1].is_finite() && wb[1] > 0.0 && wb[0] > 0.0 {
        let g = wb[1];
        let g2 = if wb[3].is_finite() && wb[3] > 0.0 { wb[3] / g } else { 1.0 };
        [wb[0] / g, 1.0, wb[2] / g, g2]
    } else {
        tracing::warn!("⚠️  No white balance data found, using neutral");
        [1.0; 4]
    };

    SensorLevels {
        black: raw.blacklevels.map(f32::from),
        white: raw.whitelevels.map(f32::from),
        wb,
    }
}

/// Bilinear demosaic for any CFA layout: each missing channel is the mean of
/// the same-colored neighbors in the surrounding 3x3 window
pub fn demosaic_bilinear(
    samples: &[f32],
    width: usize,
    height: usize,
    color_at: impl Fn(usize, usize) -> usize,
    levels: &SensorLevels,
) -> Vec<[f32; 3]> {
    let colors: Vec<u8> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (y, x)))
        .map(|(y, x)| channel_of(color_at(y, x)) as u8)
        .collect();
    let values: Vec<f32> = samples[..width * height]
        .iter()
        .enumerate()
        .map(|(i, &v)| levels.normalize(v, color_at(i / width, i % width)))
        .collect();

    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let own = colors[idx] as usize;
            let mut sum = [0.0f32; 3];
            let mut count = [0u32; 3];
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    let c = colors[n] as usize;
                    sum[c] += values[n];
                    count[c] += 1;
                }
            }
            let mut px = [0.0f32; 3];
            for c in 0..3 {
                px[c] = if c == own {
                    values[idx]
                } else if count[c] > 0 {
                    sum[c] / count[c] as f32
                } else {
                    0.0
                };
            }
            out.push(px);
        }
    }
    out
}

/// CFA color index to RGB channel; the second green and emerald count as green
fn channel_of(color: usize) -> usize {
    match color {
        0 => 0,
        2 => 2,
        _ => 1,
    }
}

fn to_rgba16(rgb: &[[f32; 3]], matrix: &[f32; 9], width: u32, height: u32) -> RawImage {
    let apply = !color::is_identity_matrix(matrix);
    let mut data = Vec::with_capacity(rgb.len() * 4);
    for px in rgb {
        let px = if apply { color::apply_matrix(matrix, *px) } else { *px };
        for v in px {
            data.push((v.clamp(0.0, 1.0) * 65535.0).round() as u16);
        }
        data.push(u16::MAX);
    }
    RawImage { data, width, height }
}

/// Quarter turns that bring the sensor image upright
fn orientation_turns(orientation: rawloader::Orientation) -> i32 {
    match orientation {
        rawloader::Orientation::Rotate90 => 1,
        rawloader::Orientation::Rotate180 => 2,
        rawloader::Orientation::Rotate270 => 3,
        rawloader::Orientation::Normal | rawloader::Orientation::Unknown => 0,
        other => {
            tracing::debug!("Ignoring mirrored orientation {other:?}");
            0
        }
    }
}

/// Stops needed to bring the log-average luminance to mid-gray, bounded
pub fn estimate_exposure(image: &RawImage) -> f32 {
    const STEP: usize = 7;
    let mut log_sum = 0.0f64;
    let mut n = 0usize;
    for px in image.data.chunks_exact(4).step_by(STEP) {
        let l = color::luma(
            px[0] as f32 / 65535.0,
            px[1] as f32 / 65535.0,
            px[2] as f32 / 65535.0,
        );
        log_sum += (l.max(1e-5) as f64).log2();
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let mean_log = (log_sum / n as f64) as f32;
    (0.18f32.log2() - mean_log).clamp(-MAX_INITIAL_EXPOSURE, MAX_INITIAL_EXPOSURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RGGB: [[usize; 2]; 2] = [[0, 1], [3, 2]];

    fn neutral_levels() -> SensorLevels {
        SensorLevels {
            black: [0.0; 4],
            white: [1000.0; 4],
            wb: [1.0; 4],
        }
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = decode_raw(Path::new("/nonexistent/path.nef")).unwrap_err();
        assert!(matches!(err, DecodeError::Unreadable { .. }));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.cr2");
        std::fs::write(&path, b"definitely not a raw file").unwrap();
        let err = decode_raw(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(_) | DecodeError::Corrupt(_)));
    }

    #[test]
    fn test_flat_field_demosaics_flat() {
        let (w, h) = (6, 4);
        let samples = vec![500.0; w * h];
        let rgb = demosaic_bilinear(&samples, w, h, |r, c| RGGB[r % 2][c % 2], &neutral_levels());
        for px in rgb {
            for v in px {
                assert!((v - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_red_only_scene() {
        // Only red photosites see light
        let (w, h) = (4, 4);
        let samples: Vec<f32> = (0..w * h)
            .map(|i| if RGGB[(i / w) % 2][(i % w) % 2] == 0 { 1000.0 } else { 0.0 })
            .collect();
        let rgb = demosaic_bilinear(&samples, w, h, |r, c| RGGB[r % 2][c % 2], &neutral_levels());
        // Interior blue site at (1, 1) gets red from its diagonals
        let px = rgb[w + 1];
        assert!((px[0] - 1.0).abs() < 1e-6);
        assert_eq!(px[1], 0.0);
        assert_eq!(px[2], 0.0);
    }

    #[test]
    fn test_levels_and_white_balance() {
        let levels = SensorLevels {
            black: [100.0; 4],
            white: [1100.0; 4],
            wb: [2.0, 1.0, 1.5, 1.0],
        };
        assert!((levels.normalize(600.0, 0) - 1.0).abs() < 1e-6);
        assert!((levels.normalize(600.0, 1) - 0.5).abs() < 1e-6);
        assert_eq!(levels.normalize(50.0, 2), 0.0);
    }

    #[test]
    fn test_exposure_estimate() {
        let gray = RawImage::filled(8, 8, [11796, 11796, 11796, 65535]);
        assert!(estimate_exposure(&gray).abs() < 0.01);

        let dark = RawImage::filled(8, 8, [10, 10, 10, 65535]);
        assert_eq!(estimate_exposure(&dark), 3.0);
    }
}
