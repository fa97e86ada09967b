//! Vibrant-style palette extraction used to derive country background
//! colours from their flags.

use std::collections::HashMap;

use crate::error::Result;

/// Colour used when no muted swatch can be found (80% black).
pub const FALLBACK_COLOR: &str = "#CC000000";

const THUMBNAIL_SIZE: u32 = 100;
const MAX_SWATCHES: usize = 64;
const MIN_ALPHA: u8 = 125;
const WHITE_THRESHOLD: u8 = 250;
const QUANT_SHIFT: u8 = 3;

const WEIGHT_SATURATION: f64 = 3.0;
const WEIGHT_LUMA: f64 = 6.5;
const WEIGHT_POPULATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swatch {
    pub rgb: [u8; 3],
    pub population: u32,
}

impl Swatch {
    /// Hue, saturation and lightness, each in `0.0..=1.0`.
    pub fn hsl(&self) -> (f64, f64, f64) {
        let [r, g, b] = self.rgb.map(|c| f64::from(c) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let lightness = (max + min) / 2.0;

        if max == min {
            return (0.0, 0.0, lightness);
        }

        let delta = max - min;
        let saturation = if lightness > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };
        let hue = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        (hue / 6.0, saturation, lightness)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palette {
    pub vibrant: Option<Swatch>,
    pub light_vibrant: Option<Swatch>,
    pub dark_vibrant: Option<Swatch>,
    pub muted: Option<Swatch>,
    pub light_muted: Option<Swatch>,
    pub dark_muted: Option<Swatch>,
}

struct Target {
    luma: (f64, f64, f64),
    saturation: (f64, f64, f64),
}

// (min, target, max)
const VIBRANT: Target = Target {
    luma: (0.3, 0.5, 0.7),
    saturation: (0.35, 1.0, 1.0),
};
const LIGHT_VIBRANT: Target = Target {
    luma: (0.55, 0.74, 1.0),
    saturation: (0.35, 1.0, 1.0),
};
const DARK_VIBRANT: Target = Target {
    luma: (0.0, 0.26, 0.45),
    saturation: (0.35, 1.0, 1.0),
};
const MUTED: Target = Target {
    luma: (0.3, 0.5, 0.7),
    saturation: (0.0, 0.3, 0.4),
};
const LIGHT_MUTED: Target = Target {
    luma: (0.55, 0.74, 1.0),
    saturation: (0.0, 0.3, 0.4),
};
const DARK_MUTED: Target = Target {
    luma: (0.0, 0.26, 0.45),
    saturation: (0.0, 0.3, 0.4),
};

/// Decode an image and build its palette.
pub fn extract_palette(bytes: &[u8]) -> Result<Palette> {
    let mut image = image::load_from_memory(bytes)?;
    if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
    }
    let image = image.to_rgba8();

    // 5-bit buckets: population and channel sums
    let mut buckets: HashMap<[u8; 3], (u32, [u64; 3])> = HashMap::new();
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA || (r > WHITE_THRESHOLD && g > WHITE_THRESHOLD && b > WHITE_THRESHOLD) {
            continue;
        }
        let entry = buckets
            .entry([r >> QUANT_SHIFT, g >> QUANT_SHIFT, b >> QUANT_SHIFT])
            .or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += u64::from(r);
        entry.1[1] += u64::from(g);
        entry.1[2] += u64::from(b);
    }

    let mut swatches: Vec<Swatch> = buckets
        .into_values()
        .map(|(population, sums)| {
            let n = u64::from(population);
            Swatch {
                rgb: [(sums[0] / n) as u8, (sums[1] / n) as u8, (sums[2] / n) as u8],
                population,
            }
        })
        .collect();
    // Deterministic order for equal populations.
    swatches.sort_by(|a, b| b.population.cmp(&a.population).then(a.rgb.cmp(&b.rgb)));
    swatches.truncate(MAX_SWATCHES);

    Ok(build_palette(&swatches))
}

pub fn build_palette(swatches: &[Swatch]) -> Palette {
    let max_population = swatches.iter().map(|s| s.population).max().unwrap_or(0);
    let mut used: Vec<[u8; 3]> = Vec::new();
    let mut pick = |target: &Target| {
        let best = find_swatch(swatches, target, max_population, &used);
        if let Some(swatch) = best {
            used.push(swatch.rgb);
        }
        best
    };

    Palette {
        vibrant: pick(&VIBRANT),
        light_vibrant: pick(&LIGHT_VIBRANT),
        dark_vibrant: pick(&DARK_VIBRANT),
        muted: pick(&MUTED),
        light_muted: pick(&LIGHT_MUTED),
        dark_muted: pick(&DARK_MUTED),
    }
}

fn find_swatch(
    swatches: &[Swatch],
    target: &Target,
    max_population: u32,
    used: &[[u8; 3]],
) -> Option<Swatch> {
    let (min_luma, target_luma, max_luma) = target.luma;
    let (min_sat, target_sat, max_sat) = target.saturation;

    swatches
        .iter()
        .filter(|swatch| !used.contains(&swatch.rgb))
        .filter_map(|swatch| {
            let (_, sat, luma) = swatch.hsl();
            if sat < min_sat || sat > max_sat || luma < min_luma || luma > max_luma {
                return None;
            }
            let population = if max_population == 0 {
                0.0
            } else {
                f64::from(swatch.population) / f64::from(max_population)
            };
            let score = (WEIGHT_SATURATION * (1.0 - (sat - target_sat).abs())
                + WEIGHT_LUMA * (1.0 - (luma - target_luma).abs())
                + WEIGHT_POPULATION * population)
                / (WEIGHT_SATURATION + WEIGHT_LUMA + WEIGHT_POPULATION);
            Some((score, *swatch))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, swatch)| swatch)
}

/// Muted (else dark muted) swatch as `#AARRGGBB`.
pub fn muted_color_argb(palette: &Palette, alpha_percent: u8) -> String {
    match palette.muted.or(palette.dark_muted) {
        Some(swatch) => {
            let alpha = (f64::from(alpha_percent.min(100)) / 100.0 * 255.0).round() as u8;
            let [r, g, b] = swatch.rgb;
            format!("#{:02X}{:02X}{:02X}{:02X}", alpha, r, g, b)
        }
        None => FALLBACK_COLOR.to_string(),
    }
}
