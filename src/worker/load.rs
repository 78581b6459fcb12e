/// Off-thread RAW decoding
///
/// The decoded buffer is handed back once; the frame loop installs it and
/// uploads it to the GPU. A failed decode reports the error and leaves the
/// current image alone.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{Job, JobPoll};
use crate::error::{DecodeError, Result};
use crate::raw::{decode_raw, DecodedRaw};

/// Result of one load, tagged with the path that was requested
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub result: std::result::Result<DecodedRaw, DecodeError>,
}

#[derive(Debug)]
pub struct LoadWorker {
    job: Job<LoadOutcome>,
    pending: Option<PathBuf>,
}

impl Default for LoadWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadWorker {
    pub fn new() -> Self {
        Self {
            job: Job::new("load"),
            pending: None,
        }
    }

    /// Decode `path` with the RAW loader
    pub fn start(&mut self, path: PathBuf) -> Result<()> {
        self.start_with(path, decode_raw)
    }

    /// Decode `path` with a caller-supplied decoder
    pub fn start_with<F>(&mut self, path: PathBuf, decode: F) -> Result<()>
    where
        F: FnOnce(&Path) -> std::result::Result<DecodedRaw, DecodeError> + Send + 'static,
    {
        let request = path.clone();
        self.job.start(move || {
            let started = Instant::now();
            tracing::info!("📂 Loading {}", path.display());
            let result = decode(&path);
            if let Ok(decoded) = &result {
                tracing::info!(
                    "✅ Decoded {}x{} in {:.2}s",
                    decoded.image.width,
                    decoded.image.height,
                    started.elapsed().as_secs_f32()
                );
            }
            LoadOutcome { path, result }
        })?;
        self.pending = Some(request);
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.job.is_running()
    }

    /// Path of the load in flight
    pub fn pending_path(&self) -> Option<&Path> {
        self.pending.as_deref().filter(|_| self.is_loading())
    }

    pub fn poll(&mut self) -> JobPoll<LoadOutcome> {
        self.job.poll()
    }

    pub fn wait(&mut self) -> JobPoll<LoadOutcome> {
        self.job.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::RawImage;
    use crate::raw::exif::ExifSummary;

    #[test]
    fn test_load_with_custom_decoder() {
        let mut worker = LoadWorker::new();
        worker
            .start_with(PathBuf::from("synthetic.dng"), |_| {
                Ok(DecodedRaw {
                    image: RawImage::filled(8, 4, [100, 200, 300, 65535]),
                    initial_exposure: 0.5,
                    exif: ExifSummary::default(),
                })
            })
            .unwrap();
        assert!(worker.is_loading());
        match worker.wait() {
            JobPoll::Finished(outcome) => {
                assert_eq!(outcome.path, PathBuf::from("synthetic.dng"));
                let decoded = outcome.result.unwrap();
                assert_eq!((decoded.image.width, decoded.image.height), (8, 4));
            }
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(!worker.is_loading());
    }

    #[test]
    fn test_missing_file_reports_decode_error() {
        let mut worker = LoadWorker::new();
        worker.start(PathBuf::from("/nonexistent/file.nef")).unwrap();
        match worker.wait() {
            JobPoll::Finished(outcome) => {
                assert!(matches!(outcome.result, Err(DecodeError::Unreadable { .. })));
            }
            other => panic!("unexpected poll result: {other:?}"),
        }
    }
}
