/// GPU-driven RAW photo development
///
/// The crate is split the way the frame loop sees it:
/// - `raw`: decoding camera files into linear RGBA16 and the CPU geometry ops
/// - `state`: the adjustment record, geometry editors, undo and presets
/// - `gpu`: the compute chain that develops the preview and the histograms
/// - `worker`: background load, export and size-estimate threads
/// - `session`: the main-thread owner that ties them together each frame

pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod gpu;
pub mod navigator;
pub mod pixels;
pub mod raw;
pub mod session;
pub mod state;
pub mod worker;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use pixels::{ProcessedImage, RawImage};
pub use session::{EditMode, Session, SessionStatus};
pub use state::{Field, Uniforms};
