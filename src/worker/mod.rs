/// Background workers
///
/// Each kind of background task (load, export, size estimate) runs on its
/// own named OS thread and hands its result back through a oneshot channel.
/// The frame loop polls once per frame and never blocks on a worker.
///
/// Only one task of each kind may be in flight; starting another while one
/// is running is rejected with `ValidationError::Busy`.

pub mod export;
pub mod load;

pub use export::{EstimateWorker, ExportOutcome, ExportWorker};
pub use load::{LoadOutcome, LoadWorker};

use std::thread::JoinHandle;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{Result, ValidationError};

/// State of a job as seen from the frame loop
#[derive(Debug)]
pub enum JobPoll<T> {
    Idle,
    Running,
    Finished(T),
    /// The worker thread died without reporting (it panicked)
    Lost,
}

/// A single-flight background task producing one `T`
pub struct Job<T> {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    result: Option<oneshot::Receiver<T>>,
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("running", &self.result.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Job<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: None,
            result: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.result.is_some()
    }

    /// Fails with `Busy` while a task is in flight
    pub fn check_idle(&self) -> Result<()> {
        if self.is_running() {
            return Err(ValidationError::Busy(self.name).into());
        }
        Ok(())
    }

    /// Run `work` on a fresh thread
    pub fn start<F>(&mut self, work: F) -> Result<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.check_idle()?;
        self.join();

        let (tx, rx) = oneshot::channel();
        let handle = std::thread::Builder::new()
            .name(format!("darkroom-{}", self.name))
            .spawn(move || {
                // The receiver is gone only if the job was dropped mid-run
                let _ = tx.send(work());
            })?;
        self.handle = Some(handle);
        self.result = Some(rx);
        tracing::debug!("Started {} worker", self.name);
        Ok(())
    }

    /// Non-blocking check for a result
    pub fn poll(&mut self) -> JobPoll<T> {
        let Some(rx) = self.result.as_mut() else {
            return JobPoll::Idle;
        };
        match rx.try_recv() {
            Ok(value) => {
                self.result = None;
                self.join();
                JobPoll::Finished(value)
            }
            Err(TryRecvError::Empty) => JobPoll::Running,
            Err(TryRecvError::Closed) => {
                self.result = None;
                self.join();
                tracing::error!("❌ {} worker exited without a result", self.name);
                JobPoll::Lost
            }
        }
    }

    /// Block until the running job reports. Must not be called from async code.
    pub fn wait(&mut self) -> JobPoll<T> {
        let Some(rx) = self.result.take() else {
            return JobPoll::Idle;
        };
        let outcome = match rx.blocking_recv() {
            Ok(value) => JobPoll::Finished(value),
            Err(_) => JobPoll::Lost,
        };
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("❌ {} worker panicked", self.name);
            }
        }
    }
}

impl<T> Drop for Job<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_job_runs_to_completion() {
        let mut job = Job::new("test");
        job.start(|| 21 * 2).unwrap();
        assert!(matches!(job.wait(), JobPoll::Finished(42)));
        assert!(matches!(job.poll(), JobPoll::Idle));
    }

    #[test]
    fn test_second_start_is_rejected_while_running() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut job = Job::new("gate");
        job.start(move || {
            let _ = release_rx.recv();
            1
        })
        .unwrap();

        assert!(matches!(job.poll(), JobPoll::Running));
        let err = job.start(|| 2).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Validation(ValidationError::Busy("gate"))
        ));

        release_tx.send(()).unwrap();
        assert!(matches!(job.wait(), JobPoll::Finished(1)));
        job.start(|| 3).unwrap();
        assert!(matches!(job.wait(), JobPoll::Finished(3)));
    }

    #[test]
    fn test_panicking_job_is_lost() {
        let mut job: Job<u32> = Job::new("panics");
        job.start(|| panic!("worker failure")).unwrap();
        assert!(matches!(job.wait(), JobPoll::Lost));
        assert!(!job.is_running());
    }
}
