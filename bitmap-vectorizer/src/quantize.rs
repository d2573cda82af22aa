//! Palette quantization ahead of tracing.
//!
//! Colors are seeded either from a fixed palette or from an evenly spaced grid of
//! samples, then refined with a few k-means cycles under Manhattan RGBA distance.

use tracing::debug;

use crate::color::Rgba;
use crate::raster::PixelBuffer;

#[derive(Debug, Clone, PartialEq)]
pub struct QuantizeOptions {
    /// Palette size to aim for when no fixed palette is given
    pub colors: usize,
    pub cycles: u32,
    /// Share of pixels below which a cluster is re-seeded between cycles
    pub min_color_ratio: f64,
}

/// Every pixel mapped to an entry of `palette`
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<Rgba>,
    pub indices: Vec<usize>,
}

impl Quantized {
    /// Pixels assigned to each palette entry
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.palette.len()];
        for &i in &self.indices {
            counts[i] += 1;
        }
        counts
    }

    /// Row-major membership mask of one palette layer
    pub fn layer_mask(&self, layer: usize) -> Vec<bool> {
        self.indices.iter().map(|&i| i == layer).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    r: u64,
    g: u64,
    b: u64,
    a: u64,
    n: u64,
}

impl Accumulator {
    fn add(&mut self, c: Rgba) {
        self.r += c.r as u64;
        self.g += c.g as u64;
        self.b += c.b as u64;
        self.a += c.a as u64;
        self.n += 1;
    }

    fn mean(&self) -> Option<Rgba> {
        (self.n > 0).then(|| {
            Rgba::new(
                (self.r / self.n) as u8,
                (self.g / self.n) as u8,
                (self.b / self.n) as u8,
                (self.a / self.n) as u8,
            )
        })
    }
}

/// Index of the closest palette entry; ties go to the lowest index
pub fn nearest(palette: &[Rgba], color: Rgba) -> (usize, u32) {
    palette
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.manhattan(&color)))
        .min_by_key(|&(i, d)| (d, i))
        .unwrap_or((0, u32::MAX))
}

/// Pick `count` seed colors from a grid laid evenly over the image
pub fn sample_grid(pixels: &PixelBuffer, count: usize) -> Vec<Rgba> {
    let side = (count as f64).sqrt().ceil() as u32;
    let mut samples = Vec::with_capacity(count);

    'rows: for row in 0..side {
        for col in 0..side {
            if samples.len() == count {
                break 'rows;
            }
            let x = ((col + 1) as u64 * pixels.width as u64 / (side + 1) as u64) as u32;
            let y = ((row + 1) as u64 * pixels.height as u64 / (side + 1) as u64) as u32;
            samples.push(pixels.pixel(x, y));
        }
    }

    samples
}

/// Reduce `pixels` to a palette.
///
/// A `fixed` palette is used verbatim and never refined. Otherwise the palette is
/// grid-sampled and averaged over `cycles` passes; a cluster holding less than
/// `min_color_ratio` of the pixels is moved onto the worst-fitting pixel while
/// more passes remain.
pub fn quantize(pixels: &PixelBuffer, options: &QuantizeOptions, fixed: Option<&[Rgba]>) -> Quantized {
    let total = pixels.pixel_count();
    let mut indices = vec![0usize; total];

    let (mut palette, cycles) = match fixed {
        Some(fixed) => (fixed.to_vec(), 1),
        None => (sample_grid(pixels, options.colors), options.cycles.max(1)),
    };

    if palette.is_empty() || total == 0 {
        return Quantized {
            width: pixels.width,
            height: pixels.height,
            palette,
            indices,
        };
    }

    let mut accumulators = vec![Accumulator::default(); palette.len()];
    let mut worst = (0usize, 0u32);

    for cycle in 0..cycles {
        if cycle > 0 {
            for (k, acc) in accumulators.iter().enumerate() {
                if let Some(mean) = acc.mean() {
                    palette[k] = mean;
                }
                let ratio = acc.n as f64 / total as f64;
                if ratio < options.min_color_ratio && cycle < cycles - 1 {
                    palette[k] = pixels.pixel(
                        (worst.0 % pixels.width as usize) as u32,
                        (worst.0 / pixels.width as usize) as u32,
                    );
                }
            }
        }

        accumulators.iter_mut().for_each(|acc| *acc = Accumulator::default());
        worst = (0, 0);

        for (i, color) in pixels.pixels().enumerate() {
            let (k, distance) = nearest(&palette, color);
            indices[i] = k;
            accumulators[k].add(color);
            if distance > worst.1 {
                worst = (i, distance);
            }
        }
    }

    debug!(
        "Quantized {} pixels to {} colors in {} cycles",
        total,
        palette.len(),
        cycles
    );

    Quantized {
        width: pixels.width,
        height: pixels.height,
        palette,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_image(left: Rgba, right: Rgba, width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::new();
        for _ in 0..height {
            for x in 0..width {
                let c = if x < width / 2 { left } else { right };
                data.extend_from_slice(&[c.r, c.g, c.b, c.a]);
            }
        }
        PixelBuffer { width, height, data }
    }

    fn options(colors: usize) -> QuantizeOptions {
        QuantizeOptions {
            colors,
            cycles: 6,
            min_color_ratio: 0.0,
        }
    }

    #[test]
    fn test_solid_image_uses_one_layer() {
        let red = Rgba::opaque(255, 0, 0);
        let pixels = PixelBuffer::filled(2, 2, red);
        let quantized = quantize(&pixels, &options(2), None);

        assert_eq!(quantized.palette.len(), 2);
        assert_eq!(quantized.palette[0], red);
        assert_eq!(quantized.counts(), vec![4, 0]);
    }

    #[test]
    fn test_two_regions_separate() {
        let dark = Rgba::opaque(20, 20, 20);
        let light = Rgba::opaque(230, 230, 230);
        let pixels = split_image(dark, light, 8, 4);
        let quantized = quantize(&pixels, &options(2), None);

        let mut palette = quantized.palette.clone();
        palette.sort_by_key(|c| c.r);
        assert_eq!(palette, vec![dark, light]);
        assert_eq!(quantized.counts(), vec![16, 16]);
    }

    #[test]
    fn test_fixed_palette_is_not_refined() {
        let pixels = split_image(Rgba::opaque(40, 40, 40), Rgba::opaque(200, 200, 200), 4, 4);
        let fixed = [Rgba::BLACK, Rgba::WHITE];
        let quantized = quantize(&pixels, &options(7), Some(&fixed));

        assert_eq!(quantized.palette, fixed.to_vec());
        assert_eq!(quantized.layer_mask(0), split_image(Rgba::BLACK, Rgba::WHITE, 4, 4)
            .pixels()
            .map(|p| p == Rgba::BLACK)
            .collect::<Vec<_>>());
    }

    #[test]
    fn test_deterministic() {
        let pixels = split_image(Rgba::opaque(90, 10, 10), Rgba::opaque(10, 10, 90), 6, 6);
        let a = quantize(&pixels, &options(4), None);
        let b = quantize(&pixels, &options(4), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearest_tie_prefers_first() {
        let palette = [Rgba::opaque(0, 0, 0), Rgba::opaque(20, 0, 0)];
        assert_eq!(nearest(&palette, Rgba::opaque(10, 0, 0)), (0, 10));
    }

    #[test]
    fn test_sample_grid_stays_in_bounds() {
        let pixels = PixelBuffer::filled(1, 1, Rgba::WHITE);
        assert_eq!(sample_grid(&pixels, 9), vec![Rgba::WHITE; 9]);
    }

    #[test]
    fn test_rare_cluster_reseeded() {
        // One odd pixel in a sea of gray; both seeds land on gray
        let gray = Rgba::opaque(128, 128, 128);
        let mut pixels = PixelBuffer::filled(10, 10, gray);
        pixels.data[0..4].copy_from_slice(&[255, 0, 0, 255]);

        let quantized = quantize(
            &pixels,
            &QuantizeOptions {
                colors: 2,
                cycles: 3,
                min_color_ratio: 0.02,
            },
            None,
        );
        assert!(quantized.palette.contains(&Rgba::opaque(255, 0, 0)));
        assert_eq!(quantized.indices.iter().filter(|&&i| quantized.palette[i] == gray).count(), 99);
    }
}
