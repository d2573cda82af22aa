use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader, Rgba as Pixel, RgbaImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use tracing::{debug, info};

use crate::color::Rgba;
use crate::error::{Result, VectorizeError};

/// Raw RGBA pixels in row-major order, as handed to the tracer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Solid image of one color, handy for tests and stubs
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let data = [color.r, color.g, color.b, color.a].repeat(width as usize * height as usize);
        Self { width, height, data }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length implied by the dimensions
    pub fn expected_len(&self) -> usize {
        self.pixel_count() * 4
    }

    pub fn pixels(&self) -> impl Iterator<Item = Rgba> + '_ {
        self.data
            .chunks_exact(4)
            .map(|p| Rgba::new(p[0], p[1], p[2], p[3]))
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Rgba::new(self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3])
    }
}

/// Pre-trace cleanup steps; zero (or an upscale of at most 1) disables a step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreprocessOptions {
    pub upscale: f64,
    pub median: f64,
    pub preblur: f64,
}

/// Decodes a raster and prepares it for tracing
pub trait Rasterizer {
    fn rasterize(&self, path: &Path, options: &PreprocessOptions) -> Result<PixelBuffer>;

    /// Same as [`Rasterizer::rasterize`] for an image already in memory
    fn rasterize_bytes(&self, bytes: &[u8], options: &PreprocessOptions) -> Result<PixelBuffer>;
}

/// [`Rasterizer`] backed by the `image` and `imageproc` crates
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn rasterize(&self, path: &Path, options: &PreprocessOptions) -> Result<PixelBuffer> {
        let origin = path.display().to_string();
        let decode = || -> Result<DynamicImage, ImageError> {
            let mut reader = ImageReader::open(path)?.with_guessed_format()?;
            reader.no_limits();
            reader.decode()
        };
        let img = decode().map_err(|source| VectorizeError::Decode { origin, source })?;

        info!("Decoded {} ({}x{})", path.display(), img.width(), img.height());
        Ok(preprocess(img, options))
    }

    fn rasterize_bytes(&self, bytes: &[u8], options: &PreprocessOptions) -> Result<PixelBuffer> {
        let decode = || -> Result<DynamicImage, ImageError> {
            let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
            reader.no_limits();
            reader.decode()
        };
        let img = decode().map_err(|source| VectorizeError::Decode {
            origin: format!("{} byte buffer", bytes.len()),
            source,
        })?;

        info!("Decoded in-memory image ({}x{})", img.width(), img.height());
        Ok(preprocess(img, options))
    }
}

/// Normalize to 8-bit sRGB, flatten onto white, then upscale, denoise and soften
pub fn preprocess(img: DynamicImage, options: &PreprocessOptions) -> PixelBuffer {
    // Embedded ICC profiles are not applied; every source ends up as plain sRGB RGBA8
    let mut rgba = img.to_rgba8();
    flatten_on_white(&mut rgba);

    if options.upscale > 1.0 {
        rgba = upscale_nearest(&rgba, options.upscale);
        debug!("Upscaled x{} to {}x{}", options.upscale, rgba.width(), rgba.height());
    }

    // Windows wider than the image change nothing further
    let widest = rgba.width().max(rgba.height());

    let median_radius = (options.median.round() as u32).min(widest);
    if median_radius > 0 {
        rgba = median_filter(&rgba, median_radius, median_radius);
        debug!("Median filter radius {}", median_radius);
    }

    // Checked after narrowing: tiny values round to 0.0 and huge ones to infinity
    let sigma = (options.preblur as f32).min(widest as f32);
    if sigma > 0.0 && sigma.is_finite() {
        rgba = gaussian_blur_f32(&rgba, sigma);
        debug!("Gaussian blur sigma {}", sigma);
    }

    PixelBuffer::from_image(rgba)
}

/// Composite every pixel over opaque white; the tracer has no notion of transparency
pub fn flatten_on_white(img: &mut RgbaImage) {
    for pixel in img.pixels_mut() {
        let Pixel([r, g, b, a]) = *pixel;
        if a == u8::MAX {
            continue;
        }
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *pixel = Pixel([blend(r), blend(g), blend(b), u8::MAX]);
    }
}

/// Resize to `round(width * factor)` keeping the aspect ratio, without smoothing edges
pub fn upscale_nearest(img: &RgbaImage, factor: f64) -> RgbaImage {
    let (width, height) = img.dimensions();
    let new_width = ((width as f64 * factor).round() as u32).max(1);
    let new_height = ((height as f64 * new_width as f64 / width as f64).round() as u32).max(1);
    imageops::resize(img, new_width, new_height, FilterType::Nearest)
}
