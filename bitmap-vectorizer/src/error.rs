use std::path::PathBuf;

use image::ImageError;
use thiserror::Error;

/// Every way a vectorization run can fail. All of them are fatal.
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// A flag value that could not be turned into a usable setting
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A palette entry that is not a 3, 6 or 8 digit hex color
    #[error("invalid color {value:?}: {reason}")]
    InvalidColor { value: String, reason: &'static str },

    /// The input raster could not be opened or decoded
    #[error("failed to decode {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: ImageError,
    },

    /// The tracer rejected the pixel buffer
    #[error("tracing failed: {0}")]
    Trace(String),

    /// The optimizer could not parse the markup it was given
    #[error("SVG optimization failed: {0}")]
    Optimize(String),

    /// The output file could not be written
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VectorizeError {
    pub(crate) fn invalid_color(value: &str, reason: &'static str) -> Self {
        VectorizeError::InvalidColor {
            value: value.to_string(),
            reason,
        }
    }
}

pub type Result<T, E = VectorizeError> = std::result::Result<T, E>;
