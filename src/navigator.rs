/// File navigation collaborator
///
/// The browser panel lists RAW files and reports a selection through a
/// channel; the session drains it once per frame and acts only on the most
/// recent path.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Extensions treated as camera RAW files (lowercase)
pub const RAW_EXTENSIONS: [&str; 16] = [
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2",
    "pef", "srw", "erf", "kdc", "dcr", "mos", "raw", "rwl",
];

pub fn is_raw_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

/// RAW files under `dir`, sorted by path. Unreadable entries are skipped.
pub fn list_raw_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir).follow_links(true);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_raw_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    tracing::info!("📁 Found {} RAW files in {}", files.len(), dir.display());
    files
}

/// Sending half, held by the browser
#[derive(Debug, Clone)]
pub struct SelectionSender(mpsc::UnboundedSender<PathBuf>);

impl SelectionSender {
    /// Returns false once the session is gone
    pub fn select(&self, path: PathBuf) -> bool {
        self.0.send(path).is_ok()
    }
}

/// Receiving half, held by the session
#[derive(Debug)]
pub struct SelectionReceiver(mpsc::UnboundedReceiver<PathBuf>);

impl SelectionReceiver {
    /// Drain everything queued and keep only the newest selection
    pub fn take_latest(&mut self) -> Option<PathBuf> {
        let mut latest = None;
        while let Ok(path) = self.0.try_recv() {
            latest = Some(path);
        }
        latest
    }
}

pub fn selection_channel() -> (SelectionSender, SelectionReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SelectionSender(tx), SelectionReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_extension_matching() {
        assert!(is_raw_file(Path::new("/photos/IMG_0001.CR2")));
        assert!(is_raw_file(Path::new("a.dng")));
        assert!(!is_raw_file(Path::new("a.jpg")));
        assert!(!is_raw_file(Path::new("README")));
    }

    #[test]
    fn test_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("day2");
        std::fs::create_dir(&nested).unwrap();
        for name in ["b.nef", "a.ARW", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.dng"), b"x").unwrap();

        let flat = list_raw_files(dir.path(), false);
        let names: Vec<_> = flat.iter().filter_map(|p| p.file_name()?.to_str()).collect();
        assert_eq!(names, ["a.ARW", "b.nef"]);

        assert_eq!(list_raw_files(dir.path(), true).len(), 3);
    }

    #[test]
    fn test_only_latest_selection_is_taken() {
        let (tx, mut rx) = selection_channel();
        assert_eq!(rx.take_latest(), None);
        tx.select(PathBuf::from("one.nef"));
        tx.select(PathBuf::from("two.nef"));
        assert_eq!(rx.take_latest(), Some(PathBuf::from("two.nef")));
        assert_eq!(rx.take_latest(), None);
    }
}
