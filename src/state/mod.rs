/// State management module
///
/// Everything the main thread owns between frames:
/// - Adjustment parameters and their text form (uniforms.rs)
/// - Crop/rotate editing and the deferred geometry queue (geometry.rs)
/// - Bounded undo snapshots (history.rs)
/// - Named presets and per-image sidecars (presets.rs)
/// - Histogram-driven auto adjust (auto_adjust.rs)
/// - Slider gesture and text-entry context (slider.rs)

pub mod auto_adjust;
pub mod geometry;
pub mod history;
pub mod presets;
pub mod slider;
pub mod uniforms;

pub use geometry::{CropRect, PendingOp, PendingOps};
pub use history::UndoStack;
pub use presets::PresetStore;
pub use uniforms::{Field, Uniforms};
