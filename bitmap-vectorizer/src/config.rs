use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

use crate::color::Rgba;
use crate::raster::PreprocessOptions;
use crate::trace::TraceOptions;

pub const DEFAULT_INPUT: &str = "input.png";
pub const DEFAULT_OUTPUT: &str = "output.svg";
pub const DEFAULT_LAYERS: usize = 6;
/// Fewer than two layers cannot separate anything from the background
pub const MIN_LAYERS: usize = 2;

/// Tracing style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Stay close to the source colors and keep small shapes
    #[default]
    Fidelity,
    /// Fewer, larger, flatter regions
    Poster,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fidelity => "fidelity",
            Self::Poster => "poster",
        }
    }

    pub fn preset(&self) -> TracePreset {
        match self {
            Self::Fidelity => TracePreset::FIDELITY,
            Self::Poster => TracePreset::POSTER,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the quantizer picks its starting colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSampling {
    /// Evenly spaced grid samples, same result on every run
    Deterministic,
    /// Use the palette given on the command line as-is
    Palette,
}

/// Per-mode tracing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePreset {
    /// Regions smaller than this are omitted
    pub path_omit: u32,
    /// Straight line fit tolerance
    pub line_tolerance: f64,
    /// Quadratic spline fit tolerance
    pub quad_tolerance: f64,
    pub line_filter: bool,
    pub sampling: ColorSampling,
    pub quant_cycles: u32,
    /// Clusters holding a smaller share of pixels are re-seeded
    pub min_color_ratio: f64,
}

impl TracePreset {
    pub const FIDELITY: TracePreset = TracePreset {
        path_omit: 8,
        line_tolerance: 1.0,
        quad_tolerance: 1.0,
        line_filter: false,
        sampling: ColorSampling::Deterministic,
        quant_cycles: 6,
        min_color_ratio: 0.0,
    };

    pub const POSTER: TracePreset = TracePreset {
        path_omit: 12,
        line_tolerance: 1.3,
        quad_tolerance: 1.3,
        line_filter: true,
        sampling: ColorSampling::Deterministic,
        quant_cycles: 3,
        min_color_ratio: 0.02,
    };
}

/// Resolved parameters of a single run.
///
/// Built once from the command line (see [`crate::cli::Cli::into_config`]) and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: Mode,
    /// Requested color layers, already floored to [`MIN_LAYERS`]
    pub layers: usize,
    pub upscale: f64,
    pub preblur: f64,
    pub median: f64,
    /// Manhattan RGB distance under which fill colors are merged
    pub merge_tolerance: f64,
    pub drop_white: bool,
    pub optimize: bool,
    pub palette: Option<Vec<Rgba>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            mode: Mode::default(),
            layers: DEFAULT_LAYERS,
            upscale: 1.0,
            preblur: 0.0,
            median: 0.0,
            merge_tolerance: 0.0,
            drop_white: false,
            optimize: false,
            palette: None,
        }
    }
}

impl Config {
    /// Number of colors the tracer will produce; a palette wins over `layers`
    pub fn effective_layers(&self) -> usize {
        match &self.palette {
            Some(palette) => palette.len(),
            None => self.layers,
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            upscale: self.upscale,
            median: self.median,
            preblur: self.preblur,
        }
    }

    pub fn trace_options(&self) -> TraceOptions {
        TraceOptions::new(self.mode, self.layers, self.palette.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_match_modes() {
        let fidelity = Mode::Fidelity.preset();
        assert_eq!(fidelity.path_omit, 8);
        assert_eq!(fidelity.quant_cycles, 6);
        assert_eq!(fidelity.min_color_ratio, 0.0);
        assert!(!fidelity.line_filter);

        let poster = Mode::Poster.preset();
        assert_eq!(poster.path_omit, 12);
        assert_eq!(poster.line_tolerance, 1.3);
        assert_eq!(poster.quad_tolerance, 1.3);
        assert_eq!(poster.quant_cycles, 3);
        assert_eq!(poster.min_color_ratio, 0.02);
        assert!(poster.line_filter);
        assert_eq!(poster.sampling, ColorSampling::Deterministic);
    }

    #[test]
    fn test_palette_overrides_layers() {
        let config = Config {
            layers: 9,
            palette: Some(vec![Rgba::BLACK, Rgba::WHITE]),
            ..Config::default()
        };
        assert_eq!(config.effective_layers(), 2);

        let options = config.trace_options();
        assert_eq!(options.colors, 2);
        assert_eq!(options.preset.sampling, ColorSampling::Palette);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Fidelity);
        assert_eq!(config.effective_layers(), DEFAULT_LAYERS);
        assert_eq!(config.input, PathBuf::from("input.png"));
        assert_eq!(config.output, PathBuf::from("output.svg"));
        assert!(!config.optimize && !config.drop_white);
    }
}
