//! Pipeline ordering and option plumbing, with stubbed collaborators.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use bitmap_vectorizer::config::ColorSampling;
use bitmap_vectorizer::postprocess::distinct_fills;
use bitmap_vectorizer::{
    Config, Mode, Optimizer, Passthrough, Pipeline, PixelBuffer, PreprocessOptions, Rasterizer,
    Result, Rgba, TraceOptions, Tracer, VectorizeError,
};

/// Hands out a fixed buffer and remembers the options it was asked for
#[derive(Default)]
struct StubRasterizer {
    seen: RefCell<Option<PreprocessOptions>>,
}

impl Rasterizer for StubRasterizer {
    fn rasterize(&self, _path: &Path, options: &PreprocessOptions) -> Result<PixelBuffer> {
        *self.seen.borrow_mut() = Some(*options);
        Ok(PixelBuffer::filled(2, 2, Rgba::opaque(255, 0, 0)))
    }

    fn rasterize_bytes(&self, _bytes: &[u8], options: &PreprocessOptions) -> Result<PixelBuffer> {
        *self.seen.borrow_mut() = Some(*options);
        Ok(PixelBuffer::filled(1, 1, Rgba::WHITE))
    }
}

/// Emits one path per fill, ignoring the pixels
struct StubTracer {
    fills: Vec<&'static str>,
    seen: RefCell<Option<TraceOptions>>,
}

impl StubTracer {
    fn new(fills: &[&'static str]) -> Self {
        Self {
            fills: fills.to_vec(),
            seen: RefCell::new(None),
        }
    }
}

impl Tracer for StubTracer {
    fn trace(&self, _pixels: &PixelBuffer, options: &TraceOptions) -> Result<String> {
        *self.seen.borrow_mut() = Some(options.clone());
        let paths: String = self
            .fills
            .iter()
            .map(|fill| format!("<path d=\"M0 0L1 0L1 1Z\" fill=\"{fill}\"/>\n"))
            .collect();
        Ok(format!("<svg xmlns=\"http://www.w3.org/2000/svg\">\n{paths}</svg>\n"))
    }
}

struct MarkingOptimizer;

impl Optimizer for MarkingOptimizer {
    fn optimize(&self, svg: &str) -> Result<String> {
        Ok(format!("<!-- optimized -->{svg}"))
    }
}

struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn rasterize(&self, path: &Path, _options: &PreprocessOptions) -> Result<PixelBuffer> {
        Err(VectorizeError::Decode {
            origin: path.display().to_string(),
            source: image::ImageError::IoError(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )),
        })
    }

    fn rasterize_bytes(&self, _bytes: &[u8], _options: &PreprocessOptions) -> Result<PixelBuffer> {
        unreachable!("only file input is used in these tests")
    }
}

#[test]
fn test_preprocess_and_trace_options_are_forwarded() {
    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#ff0000"]),
        Passthrough,
    );
    let config = Config {
        mode: Mode::Poster,
        layers: 4,
        upscale: 2.0,
        median: 1.0,
        preblur: 0.6,
        ..Config::default()
    };

    pipeline.render(&config).unwrap();

    let raster = pipeline.rasterizer_options();
    assert_eq!(
        raster,
        PreprocessOptions {
            upscale: 2.0,
            median: 1.0,
            preblur: 0.6
        }
    );
    let trace = pipeline.tracer_options();
    assert_eq!(trace.colors, 4);
    assert_eq!(trace.preset.quant_cycles, 3);
    assert_eq!(trace.preset.sampling, ColorSampling::Deterministic);
}

#[test]
fn test_palette_overrides_layers_for_the_tracer() {
    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#000000"]),
        Passthrough,
    );
    let config = Config {
        layers: 12,
        palette: Some(vec![Rgba::BLACK, Rgba::WHITE]),
        ..Config::default()
    };

    pipeline.render(&config).unwrap();

    let trace = pipeline.tracer_options();
    assert_eq!(trace.colors, 2);
    assert_eq!(trace.preset.sampling, ColorSampling::Palette);
    assert_eq!(trace.palette, Some(vec![Rgba::BLACK, Rgba::WHITE]));
}

#[test]
fn test_postprocess_runs_before_optimizer() {
    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#ffffff", "#aa0000", "#ab0000", "#0000ff"]),
        MarkingOptimizer,
    );
    let config = Config {
        drop_white: true,
        merge_tolerance: 4.0,
        optimize: true,
        ..Config::default()
    };

    let svg = pipeline.render(&config).unwrap();
    assert!(svg.starts_with("<!-- optimized -->"));
    assert_eq!(distinct_fills(&svg), vec!["#aa0000", "#0000ff"]);
    assert_eq!(svg.matches("<path").count(), 3);
}

#[test]
fn test_optimizer_skipped_when_disabled() {
    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#ff0000"]),
        MarkingOptimizer,
    );
    let svg = pipeline.render(&Config::default()).unwrap();
    assert!(!svg.contains("optimized"));
}

#[test]
fn test_render_bytes_uses_in_memory_input() {
    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#ffffff"]),
        Passthrough,
    );
    let svg = pipeline.render_bytes(b"raw", &Config::default()).unwrap();
    assert_eq!(svg.matches("<path").count(), 1);
}

#[test]
fn test_decode_failure_leaves_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("existing.svg");
    fs::write(&output, "previous").unwrap();

    let pipeline = Pipeline::with_collaborators(
        FailingRasterizer,
        StubTracer::new(&["#ff0000"]),
        Passthrough,
    );
    let config = Config {
        output: output.clone(),
        ..Config::default()
    };

    let err = pipeline.run(&config).unwrap_err();
    assert!(matches!(err, VectorizeError::Decode { .. }));
    assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
}

#[test]
fn test_run_writes_output_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.svg");

    let pipeline = Pipeline::with_collaborators(
        StubRasterizer::default(),
        StubTracer::new(&["#ff0000"]),
        Passthrough,
    );
    let config = Config {
        output: output.clone(),
        ..Config::default()
    };

    let summary = pipeline.run(&config).unwrap();
    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(summary.bytes, written.len());
    assert_eq!(summary.layers, 6);
    assert!(summary.to_string().contains("mode=fidelity"));
}

/// Accessors over the stub collaborators recorded by the pipeline
trait Recorded {
    fn rasterizer_options(&self) -> PreprocessOptions;
    fn tracer_options(&self) -> TraceOptions;
}

impl<O: Optimizer> Recorded for Pipeline<StubRasterizer, StubTracer, O> {
    fn rasterizer_options(&self) -> PreprocessOptions {
        (*self.rasterizer().seen.borrow()).expect("rasterizer was called")
    }

    fn tracer_options(&self) -> TraceOptions {
        self.tracer().seen.borrow().clone().expect("tracer was called")
    }
}
