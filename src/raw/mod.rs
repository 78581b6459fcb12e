/// RAW image decoding module
///
/// This module handles:
/// - Decoding and developing sensor data into linear RGBA16 (loader.rs)
/// - Reading the EXIF summary shown in the info panel (exif.rs)
/// - CPU crop/rotate used to bake geometry edits (transform.rs)

pub mod exif;
pub mod loader;
pub mod transform;

pub use loader::{decode_raw, DecodedRaw};
