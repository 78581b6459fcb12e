//! End-to-end session flows. GPU scenarios return early without an adapter.

use std::path::Path;

use raw_darkroom::export::{ChromaSubsampling, ExportFormat, ExportOptions};
use raw_darkroom::gpu::histogram::HISTOGRAM_CHANNELS;
use raw_darkroom::gpu::{GpuContext, GpuPipeline};
use raw_darkroom::raw::exif::ExifSummary;
use raw_darkroom::raw::DecodedRaw;
use raw_darkroom::state::{CropRect, PendingOp};
use raw_darkroom::{AppConfig, Field, RawImage, Session};

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        presets_path: Some(dir.join("presets.json")),
        sidecar_autosave: false,
        ..AppConfig::default()
    }
}

/// Smooth gradient so crops and rotations are distinguishable
fn gradient(width: u32, height: u32) -> DecodedRaw {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let r = (x as u64 * 60000 / width.max(1) as u64) as u16;
            let g = (y as u64 * 60000 / height.max(1) as u64) as u16;
            data.extend_from_slice(&[r, g, 9000, 65535]);
        }
    }
    DecodedRaw {
        image: RawImage::new(data, width, height).unwrap(),
        initial_exposure: 0.0,
        exif: ExifSummary::default(),
    }
}

fn gpu_session(dir: &Path) -> Option<Session> {
    let Ok(ctx) = GpuContext::new() else {
        eprintln!("no GPU adapter, skipping");
        return None;
    };
    let config = config(dir);
    let pipeline = GpuPipeline::new(ctx, config.histogram_smoothing);
    Some(Session::new(config, Some(pipeline)).unwrap())
}

#[test]
fn large_install_matches_dimensions_and_marks_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path()), None).unwrap();
    let decoded = DecodedRaw {
        image: RawImage::filled(4000, 3000, [12000, 12000, 12000, 65535]),
        initial_exposure: 0.0,
        exif: ExifSummary::default(),
    };
    session.install_image(dir.path().join("big.dng"), decoded);
    assert_eq!(session.image_size(), Some((4000, 3000)));
    assert!(session.status().image_dirty);
}

#[test]
fn crop_then_undo_restores_exact_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path()), None).unwrap();
    session.install_image(dir.path().join("a.nef"), gradient(200, 120));
    let before = session.image().unwrap().raw.clone();

    session
        .queue_op(PendingOp::Crop {
            rect: CropRect::new(0.25, 0.25, 0.75, 0.75),
            quarter_turns: 0,
        })
        .unwrap();
    session.begin_frame();
    assert_eq!(session.image_size(), Some((100, 60)));
    assert_eq!(session.undo_depth(), 1);

    session.request_undo().unwrap();
    session.begin_frame();
    assert_eq!(session.image().unwrap().raw, before);
    assert_eq!(session.undo_depth(), 0);
}

#[test]
fn saved_preset_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path()), None).unwrap();
    session.set_field(Field::Temperature, 0.4);
    session.set_field(Field::Vibrance, 0.25);
    session.set_field(Field::Exposure, 0.3);
    let saved = *session.uniforms();
    assert!(session.save_preset("Warm").unwrap());
    drop(session);

    let mut reloaded = Session::new(config(dir.path()), None).unwrap();
    reloaded.apply_preset("Warm").unwrap();
    assert_eq!(*reloaded.uniforms(), saved);
    assert!(reloaded.apply_preset("Cold").is_err());
}

#[test]
fn exposure_brightens_preview_and_histogram_is_conserved() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut session) = gpu_session(dir.path()) else {
        return;
    };
    session.install_image(dir.path().join("a.nef"), gradient(320, 200));
    assert!(session.settle());
    let (baseline, pixels) = {
        let (preview, _) = session.preview().unwrap();
        (preview.mean_luma(), u64::from(preview.width * preview.height))
    };
    let counts = session.histogram_counts().unwrap().clone();
    for channel in 0..HISTOGRAM_CHANNELS {
        assert_eq!(counts.total(channel), pixels);
    }

    session.set_field(Field::Exposure, 1.0);
    session.set_field(Field::Contrast, 0.0);
    assert!(session.settle());
    let brighter = session.preview().unwrap().0.mean_luma();
    assert!(brighter > baseline, "{brighter} <= {baseline}");

    let counts = session.histogram_counts().unwrap();
    for channel in 0..HISTOGRAM_CHANNELS {
        assert_eq!(counts.total(channel), pixels);
    }
}

#[test]
fn estimate_then_export_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut session) = gpu_session(dir.path()) else {
        return;
    };
    session.install_image(dir.path().join("a.nef"), gradient(256, 160));
    session.settle();

    let options = ExportOptions::jpeg(90, ChromaSubsampling::Quarter);
    session.request_estimate(options).unwrap();
    session.settle();
    let status = session.status();
    assert!(status.estimated_size_kb.unwrap_or(0) > 0);
    assert!(!status.is_exporting);

    let out = dir.path().join("a.jpg");
    session.request_export(&out, options).unwrap();
    assert!(session.status().is_exporting);
    session.settle();
    let status = session.status();
    assert!(!status.is_exporting);
    assert_eq!(status.last_export.as_deref(), Some(out.as_path()));
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn export_into_missing_directory_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut session) = gpu_session(dir.path()) else {
        return;
    };
    session.install_image(dir.path().join("a.nef"), gradient(64, 40));
    session.settle();

    let out = dir.path().join("nowhere").join("a.png");
    let options = ExportOptions {
        format: ExportFormat::Png,
        ..ExportOptions::default()
    };
    session.request_export(&out, options).unwrap();
    session.settle();

    let status = session.status();
    assert!(!status.is_exporting);
    assert!(status.error.is_some());
    assert_eq!(status.last_export, None);
    assert!(!out.exists());
}
