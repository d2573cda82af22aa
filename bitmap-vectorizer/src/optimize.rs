//! Structural SVG optimization using usvg.
//!
//! usvg resolves styles, drops unused definitions and collapses groups; paths are
//! then re-emitted with transforms baked in, reduced precision, default paint
//! attributes omitted and adjacent same-paint paths merged.

use std::fmt::Write as _;

use tracing::{debug, info};
use usvg::tiny_skia_path::{PathSegment, Point, Transform};
use usvg::{FillRule, Node, Paint};

use crate::error::{Result, VectorizeError};

/// Rewrites SVG markup into an equivalent, smaller document
pub trait Optimizer {
    fn optimize(&self, svg: &str) -> Result<String>;
}

/// Returns the markup unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Optimizer for Passthrough {
    fn optimize(&self, svg: &str) -> Result<String> {
        Ok(svg.to_string())
    }
}

/// Options for the usvg-backed optimizer
#[derive(Debug, Clone)]
pub struct UsvgOptimizer {
    /// Decimal digits kept in coordinates and transforms
    pub precision: u8,
    /// Passes are repeated while the output keeps shrinking
    pub max_passes: usize,
}

impl Default for UsvgOptimizer {
    fn default() -> Self {
        Self {
            precision: 1,
            max_passes: 10,
        }
    }
}

impl Optimizer for UsvgOptimizer {
    fn optimize(&self, svg: &str) -> Result<String> {
        let mut best = self.pass(svg)?;
        let mut passes = 1;

        while passes < self.max_passes {
            let next = self.pass(&best)?;
            passes += 1;
            if next.len() >= best.len() {
                break;
            }
            best = next;
        }

        info!(
            "Optimized SVG in {} passes: {} -> {} bytes",
            passes,
            svg.len(),
            best.len()
        );
        Ok(best)
    }
}

/// A filled path flattened to absolute coordinates
#[derive(Debug, Clone, PartialEq)]
struct FlatPath {
    paint: FlatPaint,
    data: String,
    bounds: Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FlatPaint {
    rgb: [u8; 3],
    opacity: f32,
    even_odd: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        }
    }

    fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Shared area, not just a shared edge
    fn overlaps(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

impl UsvgOptimizer {
    fn pass(&self, svg: &str) -> Result<String> {
        let tree = usvg::Tree::from_data(svg.as_bytes(), &usvg::Options::default())
            .map_err(|e| VectorizeError::Optimize(e.to_string()))?;

        let mut paths = Vec::new();
        if !self.flatten(tree.root(), &mut paths) {
            // Gradients, strokes, images or effects: leave serialization to usvg
            debug!("Document has content beyond flat fills, using usvg writer");
            let write_options = usvg::WriteOptions {
                coordinates_precision: self.precision,
                transforms_precision: self.precision,
                indent: usvg::Indent::None,
                attributes_indent: usvg::Indent::None,
                ..Default::default()
            };
            return Ok(tree.to_string(&write_options));
        }

        let before = paths.len();
        let merged = merge_adjacent(paths);
        debug!("Merged {} paths into {}", before, merged.len());

        let size = tree.size();
        Ok(self.write(size.width(), size.height(), &merged))
    }

    /// Collect every filled path in paint order. Returns `false` when the document
    /// contains something this writer cannot reproduce.
    fn flatten(&self, group: &usvg::Group, out: &mut Vec<FlatPath>) -> bool {
        for node in group.children() {
            match node {
                Node::Group(child) => {
                    let plain = child.opacity().get() >= 1.0
                        && child.clip_path().is_none()
                        && child.mask().is_none()
                        && child.filters().is_empty();
                    if !plain || !self.flatten(child, out) {
                        return false;
                    }
                }
                Node::Path(path) => {
                    if path.stroke().is_some() {
                        return false;
                    }
                    if !path.is_visible() {
                        continue;
                    }
                    let Some(fill) = path.fill() else {
                        continue;
                    };
                    let Paint::Color(color) = fill.paint() else {
                        return false;
                    };
                    let paint = FlatPaint {
                        rgb: [color.red, color.green, color.blue],
                        opacity: fill.opacity().get(),
                        even_odd: fill.rule() == FillRule::EvenOdd,
                    };
                    let (data, bounds) =
                        path_data(path.data().segments(), path.abs_transform(), self.precision);
                    out.push(FlatPath {
                        paint,
                        data,
                        bounds,
                    });
                }
                _ => return false,
            }
        }
        true
    }

    fn write(&self, width: f32, height: f32, paths: &[FlatPath]) -> String {
        let w = format_number(width, self.precision);
        let h = format_number(height, self.precision);
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        );

        for path in paths {
            svg.push_str("<path");
            let [r, g, b] = path.paint.rgb;
            if path.paint.rgb != [0, 0, 0] {
                let _ = write!(svg, r##" fill="#{r:02x}{g:02x}{b:02x}""##);
            }
            if path.paint.opacity < 1.0 {
                let _ = write!(
                    svg,
                    r#" fill-opacity="{}""#,
                    format_number(path.paint.opacity, 3)
                );
            }
            if path.paint.even_odd {
                svg.push_str(r#" fill-rule="evenodd""#);
            }
            let _ = write!(svg, r#" d="{}"/>"#, path.data);
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Concatenate runs of neighbouring paths that share paint and do not overlap,
/// which keeps the painted result identical.
fn merge_adjacent(paths: Vec<FlatPath>) -> Vec<FlatPath> {
    let mut merged: Vec<FlatPath> = Vec::with_capacity(paths.len());

    for path in paths {
        if let Some(last) = merged.last_mut() {
            if last.paint == path.paint && !last.bounds.overlaps(&path.bounds) {
                last.data.push_str(&path.data);
                last.bounds = last.bounds.union(&path.bounds);
                continue;
            }
        }
        merged.push(path);
    }

    merged
}

fn map_point(ts: &Transform, p: Point) -> Point {
    Point::from_xy(
        ts.sx * p.x + ts.kx * p.y + ts.tx,
        ts.ky * p.x + ts.sy * p.y + ts.ty,
    )
}

/// Absolute path data with the transform applied, plus its control-point bounds
fn path_data(
    segments: impl Iterator<Item = PathSegment>,
    ts: Transform,
    precision: u8,
) -> (String, Bounds) {
    let mut data = String::new();
    let mut bounds = Bounds::empty();

    let mut push = |data: &mut String, command: char, points: &[Point]| {
        data.push(command);
        for (i, p) in points.iter().enumerate() {
            let p = map_point(&ts, *p);
            bounds.include(p);
            if i > 0 {
                data.push(' ');
            }
            let x = format_number(p.x, precision);
            let y = format_number(p.y, precision);
            let _ = write!(data, "{x} {y}");
        }
    };

    for segment in segments {
        match segment {
            PathSegment::MoveTo(p) => push(&mut data, 'M', &[p]),
            PathSegment::LineTo(p) => push(&mut data, 'L', &[p]),
            PathSegment::QuadTo(p1, p) => push(&mut data, 'Q', &[p1, p]),
            PathSegment::CubicTo(p1, p2, p) => push(&mut data, 'C', &[p1, p2, p]),
            PathSegment::Close => data.push('Z'),
        }
    }

    (data, bounds)
}

/// Shortest decimal form with at most `precision` fraction digits
pub fn format_number(value: f32, precision: u8) -> String {
    let mut s = format!("{:.*}", precision as usize, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
