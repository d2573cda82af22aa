//! Trace raster images into stylized SVG.
//!
//! A run is a straight pipeline: decode and clean up the bitmap ([`raster`]),
//! quantize and trace it per color layer ([`quantize`], [`trace`]), rewrite the
//! markup ([`postprocess`]), optionally optimize it ([`optimize`]) and write it
//! ([`pipeline`]).

pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod optimize;
pub mod pipeline;
pub mod postprocess;
pub mod quantize;
pub mod raster;
pub mod trace;

pub use color::Rgba;
pub use config::{Config, Mode};
pub use error::{Result, VectorizeError};
pub use optimize::{Optimizer, Passthrough, UsvgOptimizer};
pub use pipeline::{Pipeline, RunSummary};
pub use raster::{ImageRasterizer, PixelBuffer, PreprocessOptions, Rasterizer};
pub use trace::{LayerTracer, TraceOptions, Tracer};
