/// Error taxonomy for the development core
///
/// Each failure class has its own enum so callers can tell a bad RAW file
/// apart from a failed export or a missing GPU. The crate-level `Error`
/// wraps them for code paths that can fail in more than one way.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Unreadable, unsupported or corrupt RAW input
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported RAW format: {0}")]
    Unsupported(String),

    #[error("corrupt RAW data: {0}")]
    Corrupt(String),

    #[error("RAW file decoded to an empty image")]
    Empty,
}

/// Export write or codec failure
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("image {width}x{height} exceeds the {format} encoder limit")]
    TooLarge {
        format: &'static str,
        width: u32,
        height: u32,
    },
}

/// Texture/buffer allocation or device failure
#[derive(Error, Debug)]
pub enum GpuResourceError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    Device(String),

    #[error("texture {width}x{height} exceeds the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("no GPU pipeline is attached to this session")]
    Unavailable,
}

/// Invalid user input or a rejected request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("preset name must not be empty")]
    EmptyName,

    #[error("a {0} task is already running")]
    Busy(&'static str),

    #[error("no preset named '{0}'")]
    UnknownPreset(String),

    #[error("no image is loaded")]
    NoImage,
}

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Gpu(#[from] GpuResourceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
