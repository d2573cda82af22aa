//! Text-level rewrites of traced SVG: white removal and fill color merging.

use std::sync::LazyLock;

use regex::{NoExpand, Regex, RegexBuilder};
use tracing::{debug, info};

use crate::color::{parse_fill, rgb_distance, Rgb};

static WHITE_HEX_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(?i)<path[^>]*fill="#ffffff"[^>]*/>"##).expect("valid white hex pattern")
});
static WHITE_RGB_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<path[^>]*fill="rgb\(255,\s*255,\s*255\)"[^>]*/>"#)
        .expect("valid white rgb pattern")
});
static FILL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"fill="(#[0-9a-fA-F]{6}|rgb\(\d+,\s*\d+,\s*\d+\))""#).expect("valid fill pattern")
});

/// Which rewrites to apply, in order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PostProcess {
    pub drop_white: bool,
    pub merge_tolerance: f64,
}

impl PostProcess {
    pub fn apply(&self, svg: String) -> String {
        let svg = if self.drop_white { drop_white(&svg) } else { svg };
        merge_colors(&svg, self.merge_tolerance)
    }
}

/// Remove self-closed paths filled with pure white (`#ffffff` or `rgb(255,255,255)`)
pub fn drop_white(svg: &str) -> String {
    let without_hex = WHITE_HEX_PATH.replace_all(svg, "");
    let dropped = WHITE_RGB_PATH.replace_all(&without_hex, "").into_owned();
    debug!("Dropped white paths: {} -> {} bytes", svg.len(), dropped.len());
    dropped
}

/// Distinct fill values in first-seen order, lowercased
pub fn distinct_fills(svg: &str) -> Vec<String> {
    let mut fills: Vec<String> = Vec::new();
    for caps in FILL_VALUE.captures_iter(svg) {
        let fill = caps[1].to_lowercase();
        if !fills.contains(&fill) {
            fills.push(fill);
        }
    }
    fills
}

/// Fill colors that end up painted with the same representative
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    /// First member; every other member is rewritten to it
    pub representative: String,
    pub members: Vec<String>,
    colors: Vec<Rgb>,
}

impl ColorGroup {
    fn new(fill: String, rgb: Rgb) -> Self {
        Self {
            representative: fill.clone(),
            members: vec![fill],
            colors: vec![rgb],
        }
    }

    /// Close enough to the representative, or to any color that already joined.
    ///
    /// Comparing against every member rather than the representative alone lets a
    /// run of near neighbours chain into one group.
    fn accepts(&self, rgb: Rgb, tolerance: f64) -> bool {
        self.colors
            .iter()
            .any(|member| rgb_distance(*member, rgb) <= tolerance)
    }

    fn push(&mut self, fill: String, rgb: Rgb) {
        self.members.push(fill);
        self.colors.push(rgb);
    }
}

/// Greedy first-fit grouping.
///
/// Colors are visited in the given order and join the first existing group that
/// accepts them, not the closest one. The result depends on input order; this is
/// relied upon and must stay that way.
pub fn group_fill_colors(fills: &[String], tolerance: f64) -> Vec<ColorGroup> {
    let mut groups: Vec<ColorGroup> = Vec::new();

    for fill in fills {
        let Some(rgb) = parse_fill(fill) else {
            continue;
        };
        match groups.iter_mut().find(|group| group.accepts(rgb, tolerance)) {
            Some(group) => group.push(fill.clone(), rgb),
            None => groups.push(ColorGroup::new(fill.clone(), rgb)),
        }
    }

    groups
}

/// Rewrite fills within `tolerance` (Manhattan RGB) of each other to one color.
/// A tolerance of zero or less leaves the markup untouched.
pub fn merge_colors(svg: &str, tolerance: f64) -> String {
    if tolerance <= 0.0 {
        return svg.to_string();
    }

    let groups = group_fill_colors(&distinct_fills(svg), tolerance);
    let mut merged = svg.to_string();

    for group in &groups {
        let replacement = format!(r#"fill="{}""#, group.representative);
        for member in group.members.iter().skip(1) {
            let pattern = RegexBuilder::new(&format!(r#"fill="{}""#, regex::escape(member)))
                .case_insensitive(true)
                .build();
            if let Ok(pattern) = pattern {
                merged = pattern
                    .replace_all(&merged, NoExpand(&replacement))
                    .into_owned();
            }
        }
    }

    info!(
        "Merged fill colors into {} groups (tolerance {})",
        groups.len(),
        tolerance
    );
    merged
}
