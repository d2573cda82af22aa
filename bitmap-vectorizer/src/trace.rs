use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::{debug, info};
use visioncortex::PathSimplifyMode;
use vtracer::{convert, ColorImage, ColorMode, Config, Hierarchical};

use crate::color::Rgba;
use crate::config::{ColorSampling, Mode, TracePreset};
use crate::error::{Result, VectorizeError};
use crate::quantize::{quantize, QuantizeOptions, Quantized};
use crate::raster::PixelBuffer;

/// Coordinates are rounded to this many decimals
pub const ROUND_COORDS: u32 = 1;
/// Blurring happens in the preprocessor, the tracer never blurs on its own
pub const BLUR_RADIUS: u32 = 0;
pub const BLUR_DELTA: u32 = 20;

const CORNER_THRESHOLD: i32 = 60;
const MAX_ITERATIONS: usize = 10;
/// vtracer length threshold per unit of line tolerance
const LENGTH_PER_TOLERANCE: f64 = 4.0;
const MIN_LENGTH_THRESHOLD: f64 = 3.5;
/// vtracer splice threshold (degrees) per unit of quadratic tolerance
const SPLICE_PER_TOLERANCE: f64 = 45.0;

static PATH_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<path\b[^>]*/>").expect("valid path pattern"));
static FILL_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bfill="[^"]*""#).expect("valid fill pattern"));

/// Everything the tracer needs besides the pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOptions {
    /// Number of color layers; equals the palette length when one is given
    pub colors: usize,
    pub round_coords: u32,
    pub blur_radius: u32,
    pub blur_delta: u32,
    pub preset: TracePreset,
    pub palette: Option<Vec<Rgba>>,
}

impl TraceOptions {
    pub fn new(mode: Mode, layers: usize, palette: Option<Vec<Rgba>>) -> Self {
        let mut preset = mode.preset();
        let colors = match &palette {
            Some(palette) => {
                preset.sampling = ColorSampling::Palette;
                palette.len()
            }
            None => layers,
        };

        Self {
            colors,
            round_coords: ROUND_COORDS,
            blur_radius: BLUR_RADIUS,
            blur_delta: BLUR_DELTA,
            preset,
            palette,
        }
    }

    /// Enable the edge-preserving blur run ahead of quantization (off by default)
    pub fn with_blur(mut self, radius: u32, delta: u32) -> Self {
        self.blur_radius = radius;
        self.blur_delta = delta;
        self
    }

    pub fn quantize_options(&self) -> QuantizeOptions {
        QuantizeOptions {
            colors: self.colors,
            cycles: self.preset.quant_cycles,
            min_color_ratio: self.preset.min_color_ratio,
        }
    }

    /// vtracer speckle size: omitted regions are those smaller than its square
    pub fn speckle_size(&self) -> usize {
        let base = ((self.preset.path_omit as f64 / 8.0).round() as usize).max(1);
        base + usize::from(self.preset.line_filter)
    }

    fn vtracer_config(&self) -> Config {
        Config {
            color_mode: ColorMode::Binary,
            hierarchical: Hierarchical::Cutout,
            mode: PathSimplifyMode::Spline,
            filter_speckle: self.speckle_size(),
            color_precision: 8,
            layer_difference: 0,
            corner_threshold: CORNER_THRESHOLD,
            length_threshold: (LENGTH_PER_TOLERANCE * self.preset.line_tolerance)
                .max(MIN_LENGTH_THRESHOLD),
            max_iterations: MAX_ITERATIONS,
            splice_threshold: (SPLICE_PER_TOLERANCE * self.preset.quad_tolerance).round() as i32,
            path_precision: Some(self.round_coords),
        }
    }
}

/// Turns a pixel buffer into SVG markup
pub trait Tracer {
    fn trace(&self, pixels: &PixelBuffer, options: &TraceOptions) -> Result<String>;
}

/// Quantizes the image, then traces each palette layer as a binary mask with vtracer
/// and paints the resulting paths in the layer color.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerTracer;

impl Tracer for LayerTracer {
    fn trace(&self, pixels: &PixelBuffer, options: &TraceOptions) -> Result<String> {
        if pixels.width == 0 || pixels.height == 0 {
            return Err(VectorizeError::Trace(format!(
                "empty image ({}x{})",
                pixels.width, pixels.height
            )));
        }
        if pixels.data.len() != pixels.expected_len() {
            return Err(VectorizeError::Trace(format!(
                "pixel buffer holds {} bytes, {}x{} RGBA needs {}",
                pixels.data.len(),
                pixels.width,
                pixels.height,
                pixels.expected_len()
            )));
        }

        let blurred;
        let source = if options.blur_radius > 0 {
            blurred = selective_blur(pixels, options.blur_radius, options.blur_delta);
            &blurred
        } else {
            pixels
        };

        let quantized = quantize(source, &options.quantize_options(), options.palette.as_deref());
        let counts = quantized.counts();

        let mut paths = Vec::new();
        for (layer, color) in quantized.palette.iter().enumerate() {
            if counts[layer] == 0 {
                continue;
            }
            let layer_paths = trace_layer(&quantized, layer, *color, options)?;
            debug!("Layer {} ({}): {} paths", layer, color, layer_paths.len());
            paths.extend(layer_paths);
        }

        info!(
            "Traced {} paths from {} color layers",
            paths.len(),
            quantized.palette.len()
        );
        Ok(svg_document(pixels.width, pixels.height, &paths))
    }
}

/// Trace one palette layer and recolor its paths
fn trace_layer(
    quantized: &Quantized,
    layer: usize,
    color: Rgba,
    options: &TraceOptions,
) -> Result<Vec<String>> {
    let mut pixels = Vec::with_capacity(quantized.indices.len() * 4);
    for inside in quantized.layer_mask(layer) {
        // vtracer's binary mode traces the dark pixels
        let v = if inside { 0 } else { 255 };
        pixels.extend_from_slice(&[v, v, v, 255]);
    }

    let img = ColorImage {
        pixels,
        width: quantized.width as usize,
        height: quantized.height as usize,
    };
    let svg = convert(img, options.vtracer_config())
        .map_err(VectorizeError::Trace)?
        .to_string();

    let fill = fill_attributes(color);
    Ok(PATH_ELEMENT
        .find_iter(&svg)
        .map(|path| FILL_ATTRIBUTE.replace(path.as_str(), NoExpand(&fill)).into_owned())
        .collect())
}

/// `fill="#rrggbb"`, plus `fill-opacity` for translucent palette entries
pub fn fill_attributes(color: Rgba) -> String {
    if color.is_opaque() {
        format!(r#"fill="{}""#, color.to_hex())
    } else {
        format!(
            r#"fill="{}" fill-opacity="{:.3}""#,
            color.to_hex(),
            color.a as f64 / 255.0
        )
    }
}

pub fn svg_document(width: u32, height: u32, paths: &[String]) -> String {
    let mut svg = format!(
        r#"<svg version="1.1" xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push('\n');
    for path in paths {
        svg.push_str(path);
        svg.push('\n');
    }
    svg.push_str("</svg>\n");
    svg
}

/// Box blur that only keeps results differing from the source by at most `delta`
/// (summed over RGBA), so edges survive while flat areas are smoothed.
pub fn selective_blur(pixels: &PixelBuffer, radius: u32, delta: u32) -> PixelBuffer {
    let (w, h) = (pixels.width as i64, pixels.height as i64);
    let r = radius as i64;
    let mut out = pixels.clone();

    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 4];
            let mut n = 0u32;
            for yy in (y - r).max(0)..=(y + r).min(h - 1) {
                for xx in (x - r).max(0)..=(x + r).min(w - 1) {
                    let p = pixels.pixel(xx as u32, yy as u32);
                    sum[0] += p.r as u32;
                    sum[1] += p.g as u32;
                    sum[2] += p.b as u32;
                    sum[3] += p.a as u32;
                    n += 1;
                }
            }
            let blurred = Rgba::new(
                (sum[0] / n) as u8,
                (sum[1] / n) as u8,
                (sum[2] / n) as u8,
                (sum[3] / n) as u8,
            );
            if blurred.manhattan(&pixels.pixel(x as u32, y as u32)) <= delta {
                let i = ((y * w + x) * 4) as usize;
                out.data[i..i + 4].copy_from_slice(&[blurred.r, blurred.g, blurred.b, blurred.a]);
            }
        }
    }

    out
}
