/// EXIF summary for the info panel
///
/// Parsing is done by kamadak-exif. TIFF-based RAWs are read directly; other
/// containers are searched for an embedded `Exif\0\0` block. Only the fields
/// we show are kept: camera, ISO, shutter, aperture, focal length, DNG
/// BaselineExposure, GPS position and capture time.

use ::exif::{Context, Exif, In, Reader, Tag, Value};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::io::Cursor;
use std::path::Path;

/// DNG BaselineExposure, not among the crate's named tags
const BASELINE_EXPOSURE: Tag = Tag(Context::Tiff, 0xC62A);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    pub make: Option<String>,
    pub model: Option<String>,
    pub iso: Option<u32>,
    /// Seconds
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    /// Millimetres
    pub focal_length: Option<f64>,
    /// DNG BaselineExposure in stops
    pub baseline_exposure: Option<f32>,
    /// Signed decimal degrees (latitude, longitude)
    pub gps: Option<(f64, f64)>,
    pub captured: Option<NaiveDateTime>,
}

impl ExifSummary {
    /// Camera and exposure triple, e.g. `Canon EOS R5 · ISO 100 · 1/250 s · f/2.8`
    pub fn camera_line(&self) -> String {
        let camera = match (&self.make, &self.model) {
            (Some(make), Some(model)) if model.starts_with(make.as_str()) => model.clone(),
            (Some(make), Some(model)) => format!("{make} {model}"),
            (None, Some(model)) => model.clone(),
            (Some(make), None) => make.clone(),
            (None, None) => "Unknown camera".to_string(),
        };

        let mut parts = vec![camera];
        if let Some(iso) = self.iso {
            parts.push(format!("ISO {iso}"));
        }
        if let Some(t) = self.exposure_time {
            parts.push(format_shutter(t));
        }
        if let Some(f) = self.f_number {
            parts.push(format!("f/{f:.1}"));
        }
        if let Some(mm) = self.focal_length {
            parts.push(format!("{mm:.0} mm"));
        }
        parts.join(" · ")
    }

    /// Position and capture time, e.g. `48.85840, 2.29450 · 2024-05-01 12:00:00`
    pub fn location_line(&self) -> String {
        let mut parts = Vec::new();
        match self.gps {
            Some((lat, lon)) => parts.push(format!("{lat:.5}, {lon:.5}")),
            None => parts.push("No GPS".to_string()),
        }
        match self.captured {
            Some(t) => parts.push(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => parts.push("Unknown date".to_string()),
        }
        parts.join(" · ")
    }
}

fn format_shutter(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "? s".to_string();
    }
    if seconds < 1.0 {
        format!("1/{:.0} s", 1.0 / seconds)
    } else {
        format!("{seconds:.1} s")
    }
}

/// Read what we can from `bytes`; the file's mtime stands in for a missing
/// capture time
pub fn read_summary(bytes: &[u8], path: &Path) -> ExifSummary {
    let mut summary = parse(bytes).map(|exif| summarize(&exif)).unwrap_or_default();

    if summary.captured.is_none() {
        summary.captured = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(|t| DateTime::<Local>::from(t).naive_local());
    }
    summary
}

fn parse(bytes: &[u8]) -> Option<Exif> {
    let reader = Reader::new();
    match reader.read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => Some(exif),
        Err(e) => {
            let pos = bytes.windows(6).position(|w| w == b"Exif\0\0")?;
            let embedded = reader.read_raw(bytes[pos + 6..].to_vec());
            if embedded.is_err() {
                tracing::warn!("⚠️  No readable EXIF: {e}");
            }
            embedded.ok()
        }
    }
}

fn summarize(exif: &Exif) -> ExifSummary {
    let gps = match (degrees(exif, Tag::GPSLatitude), degrees(exif, Tag::GPSLongitude)) {
        (Some(lat), Some(lon)) => {
            let lat = if text(exif, Tag::GPSLatitudeRef).as_deref() == Some("S") { -lat } else { lat };
            let lon = if text(exif, Tag::GPSLongitudeRef).as_deref() == Some("W") { -lon } else { lon };
            Some((lat, lon))
        }
        _ => None,
    };

    ExifSummary {
        make: text(exif, Tag::Make),
        model: text(exif, Tag::Model),
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        exposure_time: real(exif, Tag::ExposureTime),
        f_number: real(exif, Tag::FNumber),
        focal_length: real(exif, Tag::FocalLength),
        baseline_exposure: real(exif, BASELINE_EXPOSURE).map(|ev| ev as f32),
        gps,
        captured: timestamp(exif, Tag::DateTimeOriginal).or_else(|| timestamp(exif, Tag::DateTime)),
    }
}

fn text(exif: &Exif, tag: Tag) -> Option<String> {
    let Value::Ascii(parts) = &exif.get_field(tag, In::PRIMARY)?.value else {
        return None;
    };
    let s = String::from_utf8_lossy(parts.first()?);
    let s = s.trim_end_matches('\0').trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn real(exif: &Exif, tag: Tag) -> Option<f64> {
    let value = match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => v.first()?.to_f64(),
        Value::SRational(v) => v.first()?.to_f64(),
        other => f64::from(other.get_uint(0)?),
    };
    value.is_finite().then_some(value)
}

/// Degrees, minutes and seconds as one decimal angle
fn degrees(exif: &Exif, tag: Tag) -> Option<f64> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) if v.len() >= 3 => {
            let angle = v[0].to_f64() + v[1].to_f64() / 60.0 + v[2].to_f64() / 3600.0;
            angle.is_finite().then_some(angle)
        }
        _ => None,
    }
}

fn timestamp(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    let Value::Ascii(parts) = &exif.get_field(tag, In::PRIMARY)?.value else {
        return None;
    };
    let t = ::exif::DateTime::from_ascii(parts.first()?).ok()?;
    NaiveDate::from_ymd_opt(t.year.into(), t.month.into(), t.day.into())?
        .and_hms_opt(t.hour.into(), t.minute.into(), t.second.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::exif::experimental::Writer;
    use ::exif::{Field, Rational, SRational};

    fn field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    fn ascii(s: &str) -> Value {
        Value::Ascii(vec![s.as_bytes().to_vec()])
    }

    fn ratio(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    /// Little-endian TIFF holding `fields`
    fn tiff(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for f in fields {
            writer.push_field(f);
        }
        let mut out = Cursor::new(Vec::new());
        writer.write(&mut out, true).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_summary_from_tiff() {
        let fields = [
            field(Tag::Make, ascii("Canon")),
            field(Tag::Model, ascii("Canon EOS R5")),
            field(BASELINE_EXPOSURE, Value::SRational(vec![SRational { num: 1, denom: 2 }])),
            field(Tag::ExposureTime, Value::Rational(vec![ratio(1, 250)])),
            field(Tag::FNumber, Value::Rational(vec![ratio(28, 10)])),
            field(Tag::PhotographicSensitivity, Value::Short(vec![100])),
            field(Tag::FocalLength, Value::Rational(vec![ratio(50, 1)])),
            field(Tag::DateTimeOriginal, ascii("2024:05:01 12:30:00")),
            field(Tag::GPSLatitudeRef, ascii("N")),
            field(Tag::GPSLatitude, Value::Rational(vec![ratio(48, 1), ratio(30, 1), ratio(0, 1)])),
            field(Tag::GPSLongitudeRef, ascii("W")),
            field(Tag::GPSLongitude, Value::Rational(vec![ratio(2, 1), ratio(15, 1), ratio(0, 1)])),
        ];
        let s = summarize(&parse(&tiff(&fields)).unwrap());

        assert_eq!(s.make.as_deref(), Some("Canon"));
        assert_eq!(s.iso, Some(100));
        assert_eq!(s.baseline_exposure, Some(0.5));
        assert_eq!(s.camera_line(), "Canon EOS R5 · ISO 100 · 1/250 s · f/2.8 · 50 mm");

        let (lat, lon) = s.gps.unwrap();
        assert!((lat - 48.5).abs() < 1e-9);
        assert!((lon + 2.25).abs() < 1e-9);
        assert_eq!(s.location_line(), "48.50000, -2.25000 · 2024-05-01 12:30:00");
    }

    #[test]
    fn test_embedded_exif_block() {
        let mut file = b"FUJIFILMCCD-RAW junk Exif\0\0".to_vec();
        file.extend_from_slice(&tiff(&[field(Tag::Model, ascii("X-T5"))]));

        let s = summarize(&parse(&file).unwrap());
        assert_eq!(s.model.as_deref(), Some("X-T5"));
        assert_eq!(s.camera_line(), "X-T5");
    }

    #[test]
    fn test_garbage_is_harmless() {
        assert!(parse(b"not an image").is_none());
        assert!(parse(b"II*\0\xff\xff\xff\x7f").is_none());
        assert_eq!(ExifSummary::default().location_line(), "No GPS · Unknown date");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.nef");
        std::fs::write(&path, b"nothing").unwrap();
        let s = read_summary(b"nothing", &path);
        assert_eq!(s.make, None);
        assert!(s.captured.is_some());
    }
}
