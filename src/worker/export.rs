/// Off-thread export and export-size estimation
///
/// Both take an `Arc` of the rendered image at launch and never touch the
/// GPU. Export progress is published as an `f32` stored in an `AtomicU32`
/// so the frame loop can read it without locking.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::{Job, JobPoll};
use crate::error::{EncodeError, Result};
use crate::export::{self, ExportOptions};
use crate::pixels::ProcessedImage;

/// Lock-free fractional progress
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU32>);

impl Progress {
    pub fn set(&self, value: f32) {
        self.0.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub path: PathBuf,
    /// Bytes written
    pub result: std::result::Result<u64, EncodeError>,
}

#[derive(Debug)]
pub struct ExportWorker {
    job: Job<ExportOutcome>,
    progress: Progress,
}

impl Default for ExportWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportWorker {
    pub fn new() -> Self {
        Self {
            job: Job::new("export"),
            progress: Progress::default(),
        }
    }

    pub fn start(&mut self, image: Arc<ProcessedImage>, options: ExportOptions, path: PathBuf) -> Result<()> {
        // Checked first so a rejected start leaves the running export's progress alone
        self.job.check_idle()?;
        let progress = self.progress.clone();
        progress.set(0.0);
        self.job.start(move || {
            tracing::info!("💾 Exporting {} as {}", path.display(), options.format);
            let result = export::encode_to_file(&image, &options, &path, &|p| progress.set(p));
            if let Err(e) = &result {
                tracing::error!("❌ Export to {} failed: {e}", path.display());
            }
            ExportOutcome { path, result }
        })
    }

    pub fn check_idle(&self) -> Result<()> {
        self.job.check_idle()
    }

    pub fn is_exporting(&self) -> bool {
        self.job.is_running()
    }

    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    pub fn poll(&mut self) -> JobPoll<ExportOutcome> {
        self.job.poll()
    }

    pub fn wait(&mut self) -> JobPoll<ExportOutcome> {
        self.job.wait()
    }
}

/// Trial encode reporting the output size in kilobytes
#[derive(Debug)]
pub struct EstimateWorker {
    job: Job<std::result::Result<u64, EncodeError>>,
}

impl Default for EstimateWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimateWorker {
    pub fn new() -> Self {
        Self {
            job: Job::new("size estimate"),
        }
    }

    pub fn start(&mut self, image: Arc<ProcessedImage>, options: ExportOptions) -> Result<()> {
        self.job.start(move || {
            let result = export::estimate_size_kb(&image, &options);
            match &result {
                Ok(kb) => tracing::info!("📏 Estimated {} export at {kb} kB", options.format),
                Err(e) => tracing::warn!("⚠️  Size estimate failed: {e}"),
            }
            result
        })
    }

    pub fn check_idle(&self) -> Result<()> {
        self.job.check_idle()
    }

    pub fn is_estimating(&self) -> bool {
        self.job.is_running()
    }

    pub fn poll(&mut self) -> JobPoll<std::result::Result<u64, EncodeError>> {
        self.job.poll()
    }

    pub fn wait(&mut self) -> JobPoll<std::result::Result<u64, EncodeError>> {
        self.job.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<ProcessedImage> {
        let data = (0..32 * 32)
            .flat_map(|i: u32| {
                let v = (i * 64) as u16;
                [v, v / 2, 65535 - v, 65535]
            })
            .collect();
        Arc::new(ProcessedImage::new(data, 32, 32).unwrap())
    }

    #[test]
    fn test_progress_roundtrips_through_bits() {
        let p = Progress::default();
        assert_eq!(p.get(), 0.0);
        p.set(0.375);
        assert_eq!(p.get(), 0.375);
        p.set(7.0);
        assert_eq!(p.get(), 1.0);
    }

    #[test]
    fn test_export_writes_file_and_reports_full_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.jpg");
        let mut worker = ExportWorker::new();
        worker.start(image(), ExportOptions::default(), path.clone()).unwrap();
        match worker.wait() {
            JobPoll::Finished(outcome) => assert!(outcome.result.unwrap() > 0),
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(path.exists());
        assert_eq!(worker.progress(), 1.0);
        assert!(!worker.is_exporting());
    }

    #[test]
    fn test_export_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("worker.png");
        let mut worker = ExportWorker::new();
        worker.start(image(), ExportOptions::default(), path.clone()).unwrap();
        match worker.wait() {
            JobPoll::Finished(outcome) => {
                assert!(matches!(outcome.result, Err(EncodeError::Io(_))));
                assert_eq!(outcome.path, path);
            }
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(!worker.is_exporting());
        assert!(!path.exists());
        assert!(!export::partial_path(&path).exists());
    }

    #[test]
    fn test_estimate_is_positive() {
        let mut worker = EstimateWorker::new();
        worker.start(image(), ExportOptions::default()).unwrap();
        match worker.wait() {
            JobPoll::Finished(result) => assert!(result.unwrap() > 0),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }
}
