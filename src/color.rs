use std::collections::BTreeMap;
use std::str::FromStr;

use palette::{Hsl, IntoColor, Srgb};

use crate::config::SchoolConfig;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format::<u8>()
        })
        .collect()
}

/// Parse `#rrggbb` (or `rrggbb`).
pub fn parse_hex(hex: &str) -> Option<Srgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    Srgb::<u8>::from_str(digits).ok()
}

/// Format as lower-case `#rrggbb`.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

// ---------------------------------------------------------------------------
// School → colour
// ---------------------------------------------------------------------------

/// Display colour of every configured school.
///
/// Configured colours are kept; schools without one take hues from
/// [`generate_palette`] in configuration order.
#[derive(Debug, Clone)]
pub struct SchoolColors {
    mapping: BTreeMap<String, Srgb<u8>>,
    default_color: Srgb<u8>,
}

impl SchoolColors {
    pub fn new(schools: &[SchoolConfig]) -> Self {
        let missing = schools
            .iter()
            .filter(|s| s.color.as_deref().and_then(parse_hex).is_none())
            .count();
        let mut generated = generate_palette(missing).into_iter();

        let mapping = schools
            .iter()
            .filter_map(|s| {
                let color = s
                    .color
                    .as_deref()
                    .and_then(parse_hex)
                    .or_else(|| generated.next())?;
                Some((s.name.clone(), color))
            })
            .collect();

        SchoolColors {
            mapping,
            default_color: Srgb::new(128, 128, 128),
        }
    }

    /// Colour for `school`, grey when unknown.
    pub fn color_for(&self, school: &str) -> Srgb<u8> {
        self.mapping
            .get(school)
            .copied()
            .unwrap_or(self.default_color)
    }

    pub fn hex_for(&self, school: &str) -> String {
        to_hex(self.color_for(school))
    }
}
