use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{Config, Mode};
use crate::error::{Result, VectorizeError};
use crate::optimize::{Optimizer, UsvgOptimizer};
use crate::postprocess::PostProcess;
use crate::raster::{ImageRasterizer, PixelBuffer, Rasterizer};
use crate::trace::{LayerTracer, Tracer};

/// Decode, trace, rewrite, optimize and write, in that order.
///
/// The three collaborators are generic so tests can swap any of them for a stub.
#[derive(Debug, Clone, Default)]
pub struct Pipeline<R = ImageRasterizer, T = LayerTracer, O = UsvgOptimizer> {
    rasterizer: R,
    tracer: T,
    optimizer: O,
}

impl Pipeline {
    /// Pipeline backed by `image`/`imageproc`, vtracer and usvg
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: Rasterizer, T: Tracer, O: Optimizer> Pipeline<R, T, O> {
    pub fn with_collaborators(rasterizer: R, tracer: T, optimizer: O) -> Self {
        Self {
            rasterizer,
            tracer,
            optimizer,
        }
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Produce the final markup for `config.input` without touching the output path
    pub fn render(&self, config: &Config) -> Result<String> {
        let pixels = self
            .rasterizer
            .rasterize(&config.input, &config.preprocess_options())?;
        self.vectorize(&pixels, config)
    }

    /// Same as [`Pipeline::render`] for an image already in memory
    pub fn render_bytes(&self, raw: &[u8], config: &Config) -> Result<String> {
        let pixels = self
            .rasterizer
            .rasterize_bytes(raw, &config.preprocess_options())?;
        self.vectorize(&pixels, config)
    }

    /// Render and write `config.output`. Nothing is written if any stage fails.
    pub fn run(&self, config: &Config) -> Result<RunSummary> {
        let svg = self.render(config)?;
        write_svg(&config.output, &svg)?;
        Ok(RunSummary::new(config, svg.len()))
    }

    fn vectorize(&self, pixels: &PixelBuffer, config: &Config) -> Result<String> {
        let svg = self.tracer.trace(pixels, &config.trace_options())?;

        let post = PostProcess {
            drop_white: config.drop_white,
            merge_tolerance: config.merge_tolerance,
        };
        let svg = post.apply(svg);

        if config.optimize {
            self.optimizer.optimize(&svg)
        } else {
            Ok(svg)
        }
    }
}

/// Write the whole document in a single call
pub fn write_svg(path: &Path, svg: &str) -> Result<()> {
    fs::write(path, svg).map_err(|source| VectorizeError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} bytes to {}", svg.len(), path.display());
    Ok(())
}

/// What a finished run reports on stdout
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub mode: Mode,
    pub layers: usize,
    pub upscale: f64,
    pub preblur: f64,
    pub median: f64,
    pub merge_tolerance: f64,
    pub bytes: usize,
}

impl RunSummary {
    pub fn new(config: &Config, bytes: usize) -> Self {
        Self {
            output: config.output.clone(),
            mode: config.mode,
            layers: config.effective_layers(),
            upscale: config.upscale,
            preblur: config.preblur,
            median: config.median,
            merge_tolerance: config.merge_tolerance,
            bytes,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Saved → {}  (mode={}, layers={}, upscale={}x, preblur={}, median={}, mergeTol={})",
            self.output.display(),
            self.mode,
            self.layers,
            self.upscale,
            self.preblur,
            self.median,
            self.merge_tolerance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    #[test]
    fn test_summary_line() {
        let config = Config {
            output: PathBuf::from("out.svg"),
            mode: Mode::Poster,
            layers: 5,
            preblur: 0.6,
            merge_tolerance: 16.0,
            ..Config::default()
        };
        assert_eq!(
            RunSummary::new(&config, 10).to_string(),
            "Saved → out.svg  (mode=poster, layers=5, upscale=1x, preblur=0.6, median=0, mergeTol=16)"
        );
    }

    #[test]
    fn test_summary_reports_palette_length() {
        let config = Config {
            layers: 8,
            palette: Some(vec![Rgba::BLACK, Rgba::WHITE, Rgba::opaque(1, 2, 3)]),
            ..Config::default()
        };
        assert_eq!(RunSummary::new(&config, 0).layers, 3);
    }

    #[test]
    fn test_write_error() {
        let err = write_svg(Path::new("/nonexistent-dir/out.svg"), "<svg/>").unwrap_err();
        assert!(matches!(err, VectorizeError::Write { .. }));
    }
}
