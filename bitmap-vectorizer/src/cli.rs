//! Command-line interface definitions.

use clap::{ArgAction, Parser, ValueHint};
use std::path::PathBuf;

use crate::color::parse_palette;
use crate::config::{Config, Mode, DEFAULT_INPUT, DEFAULT_LAYERS, DEFAULT_OUTPUT, MIN_LAYERS};
use crate::error::{Result, VectorizeError};

/// Trace a raster image into a stylized SVG
#[derive(Parser, Debug, Clone)]
#[command(name = "vectorize", version, about, long_about = None)]
pub struct Cli {
    /// Raster image to trace
    #[arg(default_value = DEFAULT_INPUT, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the SVG
    #[arg(default_value = DEFAULT_OUTPUT, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Tracing preset
    #[arg(long, value_enum, default_value_t = Mode::Fidelity)]
    pub mode: Mode,

    /// Target number of color layers (at least 2)
    #[arg(long, default_value_t = DEFAULT_LAYERS as i64, allow_negative_numbers = true)]
    pub layers: i64,

    /// Nearest-neighbor upscale factor applied before tracing
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub upscale: f64,

    /// Blur radius applied before tracing (0.4-1.0 works well for posters)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub preblur: f64,

    /// Median filter radius applied before tracing
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub median: f64,

    /// Merge fill colors within this Manhattan RGB distance (0-255)
    #[arg(long = "mergecolors", default_value_t = 0.0, allow_negative_numbers = true)]
    pub merge_colors: f64,

    /// Remove pure white regions
    #[arg(long = "dropwhite")]
    pub drop_white: bool,

    /// Run the structural SVG optimizer
    #[arg(long)]
    pub svgo: bool,

    /// Fixed palette as comma separated hex colors, e.g. #000,#7d7e80,#fff
    #[arg(long)]
    pub palette: Option<String>,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Validate the raw flags into a run configuration
    pub fn into_config(self) -> Result<Config> {
        let palette = match self.palette.as_deref() {
            Some(list) => {
                let palette = parse_palette(list)?;
                if palette.is_empty() {
                    return Err(VectorizeError::InvalidArgument(
                        "--palette needs at least one color".to_string(),
                    ));
                }
                Some(palette)
            }
            None => None,
        };

        Ok(Config {
            input: self.input,
            output: self.output,
            mode: self.mode,
            layers: usize::try_from(self.layers).unwrap_or(0).max(MIN_LAYERS),
            upscale: non_negative("upscale", self.upscale)?,
            preblur: non_negative("preblur", self.preblur)?,
            median: non_negative("median", self.median)?,
            merge_tolerance: non_negative("mergecolors", self.merge_colors)?,
            drop_white: self.drop_white,
            optimize: self.svgo,
            palette,
        })
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn non_negative(flag: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(VectorizeError::InvalidArgument(format!(
            "--{flag} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vectorize").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_positionals_and_flags() {
        let config = parse(&[
            "in.jpg",
            "out.svg",
            "--mode=poster",
            "--layers=5",
            "--preblur=0.6",
            "--median",
            "2",
            "--mergecolors=16",
            "--upscale=2",
            "--dropwhite",
            "--svgo",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.input, PathBuf::from("in.jpg"));
        assert_eq!(config.output, PathBuf::from("out.svg"));
        assert_eq!(config.mode, Mode::Poster);
        assert_eq!(config.layers, 5);
        assert_eq!(config.preblur, 0.6);
        assert_eq!(config.median, 2.0);
        assert_eq!(config.merge_tolerance, 16.0);
        assert_eq!(config.upscale, 2.0);
        assert!(config.drop_white);
        assert!(config.optimize);
    }

    #[test]
    fn test_layers_floor() {
        for requested in ["0", "1", "-4"] {
            let config = parse(&[&format!("--layers={requested}")]).into_config().unwrap();
            assert_eq!(config.layers, MIN_LAYERS, "--layers={requested}");
        }
        assert_eq!(parse(&["--layers=14"]).into_config().unwrap().layers, 14);
    }

    #[test]
    fn test_palette_sets_layer_count() {
        let config = parse(&["--layers=9", "--palette=#000,#fff"]).into_config().unwrap();
        assert_eq!(config.palette, Some(vec![Rgba::BLACK, Rgba::WHITE]));
        assert_eq!(config.effective_layers(), 2);
    }

    #[test]
    fn test_bad_palette_is_invalid_color() {
        let err = parse(&["--palette=#000,#12"]).into_config().unwrap_err();
        assert!(matches!(err, VectorizeError::InvalidColor { .. }));
    }

    #[test]
    fn test_empty_palette_rejected() {
        let err = parse(&["--palette=,"]).into_config().unwrap_err();
        assert!(matches!(err, VectorizeError::InvalidArgument(_)));
    }

    #[test]
    fn test_negative_numbers_rejected() {
        let err = parse(&["--preblur=-1"]).into_config().unwrap_err();
        assert!(matches!(err, VectorizeError::InvalidArgument(_)));
    }

    #[test]
    fn test_malformed_and_unknown_flags_rejected() {
        assert!(Cli::try_parse_from(["vectorize", "--layers=many"]).is_err());
        assert!(Cli::try_parse_from(["vectorize", "--mode=sketch"]).is_err());
        assert!(Cli::try_parse_from(["vectorize", "a.png", "b.svg", "--bogus"]).is_err());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(parse(&[]).log_filter(), "warn");
        assert_eq!(parse(&["-vv"]).log_filter(), "debug");
        assert_eq!(parse(&["-q"]).log_filter(), "error");
    }
}
