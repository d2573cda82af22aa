//! Color values and the textual forms they take in flags and SVG markup.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, VectorizeError};

/// `rgb(r,g,b)` as the tracer and most editors write it (spaces allowed after commas)
static RGB_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgb\((\d+),\s*(\d+),\s*(\d+)\)$").expect("valid rgb() pattern")
});

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// RGB triple used when comparing fill colors. `rgb()` components are kept as
/// written, so values past 255 still count in full toward the distance.
pub type Rgb = [f64; 3];

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional, case is ignored).
    ///
    /// Three digit shorthand doubles every digit; a missing alpha is fully opaque.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VectorizeError::invalid_color(hex, "not a hex color"));
        }

        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => digits.to_string(),
            _ => {
                return Err(VectorizeError::invalid_color(
                    hex,
                    "expected 3, 6 or 8 hex digits",
                ))
            }
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| VectorizeError::invalid_color(hex, "not a hex color"))
        };

        let alpha = if expanded.len() == 8 { channel(6)? } else { 255 };
        Ok(Rgba::new(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    /// Lowercase `#rrggbb`; alpha is carried separately in markup
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == u8::MAX
    }

    /// Sum of absolute differences over all four channels
    pub fn manhattan(&self, other: &Rgba) -> u32 {
        self.r.abs_diff(other.r) as u32
            + self.g.abs_diff(other.g) as u32
            + self.b.abs_diff(other.b) as u32
            + self.a.abs_diff(other.a) as u32
    }
}

impl FromStr for Rgba {
    type Err = VectorizeError;

    fn from_str(s: &str) -> Result<Self> {
        Rgba::from_hex(s)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "{}{:02x}", self.to_hex(), self.a)
        }
    }
}

/// Parse a comma separated list of hex colors. Blank entries are skipped.
pub fn parse_palette(list: &str) -> Result<Vec<Rgba>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Rgba::from_hex)
        .collect()
}

/// Read a fill value in one of the two forms the color merge understands:
/// `#rrggbb` or `rgb(r,g,b)`. Anything else (named colors, `#rgb`, `#rrggbbaa`) is `None`.
pub fn parse_fill(fill: &str) -> Option<Rgb> {
    if let Some(digits) = fill.strip_prefix('#') {
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok().map(f64::from);
        return Some([channel(0)?, channel(2)?, channel(4)?]);
    }

    let caps = RGB_FUNCTION.captures(fill)?;
    let channel = |i: usize| caps[i].parse::<f64>().ok();
    Some([channel(1)?, channel(2)?, channel(3)?])
}

/// Manhattan distance between two RGB triples (0..=765 for in-range colors)
pub fn rgb_distance(a: Rgb, b: Rgb) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}
