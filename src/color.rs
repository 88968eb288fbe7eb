//! Per-operand and per-pixel color transforms for each inversion mode.
//!
//! Operand-level functions work on normalized `f32` components in [0, 1],
//! matching how colors appear in content streams. Pixel-level functions
//! work on 8-bit channels, matching decoded raster data. The two levels
//! deliberately diverge for `TextOnly`: operand colors almost always paint
//! text and vectors (invert them), while raster pixels almost always carry
//! photographs (leave them alone; the walker skips images entirely).

use crate::InvertMode;

/// Dark background of the custom palette, (42, 42, 42) in 8-bit.
pub const CUSTOM_BG: [f32; 3] = [42.0 / 255.0, 42.0 / 255.0, 42.0 / 255.0];

/// Light foreground of the custom palette, (232, 232, 232) in 8-bit.
pub const CUSTOM_FG: [f32; 3] = [232.0 / 255.0, 232.0 / 255.0, 232.0 / 255.0];

/// Lift applied to mid-tones by the custom palette, 30 in 8-bit.
const CUSTOM_LIFT: f32 = 30.0 / 255.0;

pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Rec. 601 luminance.
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Three-zone map of the custom palette: near-white goes to the dark
/// background, near-black to the light foreground, mid-tones are inverted
/// and lifted slightly toward white.
fn custom_map_rgb(r: f32, g: f32, b: f32) -> [f32; 3] {
    let brightness = luminance(r, g, b);
    if brightness > 0.78 {
        CUSTOM_BG
    } else if brightness < 0.22 {
        CUSTOM_FG
    } else {
        [
            clamp01(1.0 - r + CUSTOM_LIFT),
            clamp01(1.0 - g + CUSTOM_LIFT),
            clamp01(1.0 - b + CUSTOM_LIFT),
        ]
    }
}

/// Transform an RGB operand triple under `mode`.
pub fn invert_rgb(mode: InvertMode, r: f32, g: f32, b: f32) -> [f32; 3] {
    let out = match mode {
        InvertMode::Full | InvertMode::TextOnly => [1.0 - r, 1.0 - g, 1.0 - b],
        InvertMode::Grayscale => {
            let inv = 1.0 - luminance(r, g, b);
            [inv, inv, inv]
        }
        InvertMode::Custom => custom_map_rgb(r, g, b),
    };
    [clamp01(out[0]), clamp01(out[1]), clamp01(out[2])]
}

/// Transform a single gray operand under `mode`.
pub fn invert_gray(mode: InvertMode, gray: f32) -> f32 {
    match mode {
        InvertMode::Full | InvertMode::Grayscale | InvertMode::TextOnly => clamp01(1.0 - gray),
        InvertMode::Custom => {
            let [r, g, b] = custom_map_rgb(gray, gray, gray);
            clamp01(luminance(r, g, b))
        }
    }
}

/// Transform a CMYK operand quadruple under `mode`.
///
/// Naive channel inversion (`1-C, 1-M, 1-Y, 1-K`) is not the perceptual
/// inverse because of the black channel, so the color is converted to RGB,
/// transformed there, and converted back with fresh black generation.
pub fn invert_cmyk(mode: InvertMode, c: f32, m: f32, y: f32, k: f32) -> [f32; 4] {
    let r = (1.0 - c) * (1.0 - k);
    let g = (1.0 - m) * (1.0 - k);
    let b = (1.0 - y) * (1.0 - k);

    let [nr, ng, nb] = invert_rgb(mode, r, g, b);

    let nk = 1.0 - nr.max(ng).max(nb);
    if nk >= 1.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [
            clamp01((1.0 - nr - nk) / (1.0 - nk)),
            clamp01((1.0 - ng - nk) / (1.0 - nk)),
            clamp01((1.0 - nb - nk) / (1.0 - nk)),
            clamp01(nk),
        ]
    }
}

/// Transform one 8-bit RGB pixel under `mode`.
///
/// `TextOnly` inverts only dark pixels (mean below 128), leaving bright
/// pixels as they are, and `Custom` uses the mean-brightness zone map.
pub fn invert_pixel(mode: InvertMode, r: u8, g: u8, b: u8) -> [u8; 3] {
    match mode {
        InvertMode::Full => [255 - r, 255 - g, 255 - b],
        InvertMode::Grayscale => {
            let gray = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8;
            let inv = 255 - gray;
            [inv, inv, inv]
        }
        InvertMode::TextOnly => {
            let mean = (r as u16 + g as u16 + b as u16) / 3;
            if mean < 128 {
                [255 - r, 255 - g, 255 - b]
            } else {
                [r, g, b]
            }
        }
        InvertMode::Custom => {
            let mean = (r as u16 + g as u16 + b as u16) / 3;
            if mean > 200 {
                [42, 42, 42]
            } else if mean < 55 {
                [232, 232, 232]
            } else {
                [
                    (255 - r).saturating_add(30),
                    (255 - g).saturating_add(30),
                    (255 - b).saturating_add(30),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < EPS, "{} != {}", a, b);
    }

    #[test]
    fn full_rgb_is_involutive() {
        let [r, g, b] = invert_rgb(InvertMode::Full, 0.8, 0.2, 0.1);
        assert_close(r, 0.2);
        assert_close(g, 0.8);
        assert_close(b, 0.9);

        let [r, g, b] = invert_rgb(InvertMode::Full, r, g, b);
        assert_close(r, 0.8);
        assert_close(g, 0.2);
        assert_close(b, 0.1);
    }

    #[test]
    fn full_gray_is_involutive() {
        assert_close(invert_gray(InvertMode::Full, 0.3), 0.7);
        assert_close(invert_gray(InvertMode::Full, 0.7), 0.3);
    }

    #[test]
    fn grayscale_inverts_luminance() {
        // Gray 0.6 has luminance 0.6, so the inverse is 0.4.
        assert_close(invert_gray(InvertMode::Grayscale, 0.6), 0.4);

        let [r, g, b] = invert_rgb(InvertMode::Grayscale, 1.0, 0.0, 0.0);
        let expected = 1.0 - 0.299;
        assert_close(r, expected);
        assert_close(g, expected);
        assert_close(b, expected);
    }

    #[test]
    fn cmyk_round_trip_through_rgb() {
        // Pure black ink inverts to no ink at all under Full.
        let [c, m, y, k] = invert_cmyk(InvertMode::Full, 0.0, 0.0, 0.0, 1.0);
        assert_close(c, 0.0);
        assert_close(m, 0.0);
        assert_close(y, 0.0);
        assert_close(k, 0.0);

        // No ink (white) inverts to pure black.
        let [c, m, y, k] = invert_cmyk(InvertMode::Full, 0.0, 0.0, 0.0, 0.0);
        assert_close(c, 0.0);
        assert_close(m, 0.0);
        assert_close(y, 0.0);
        assert_close(k, 1.0);
    }

    #[test]
    fn cmyk_double_inversion_restores_canonical_operands() {
        // A tuple in canonical black-generation form survives two passes.
        let first = invert_cmyk(InvertMode::Full, 0.2, 0.0, 0.0, 0.0);
        let second = invert_cmyk(InvertMode::Full, first[0], first[1], first[2], first[3]);
        assert_close(second[0], 0.2);
        assert_close(second[1], 0.0);
        assert_close(second[2], 0.0);
        assert_close(second[3], 0.0);
    }

    #[test]
    fn custom_maps_extremes_to_palette() {
        // Near-white goes to the dark background.
        let [r, g, b] = invert_rgb(InvertMode::Custom, 1.0, 1.0, 1.0);
        assert_close(r, CUSTOM_BG[0]);
        assert_close(g, CUSTOM_BG[1]);
        assert_close(b, CUSTOM_BG[2]);

        // Near-black goes to the light foreground.
        let [r, g, b] = invert_rgb(InvertMode::Custom, 0.0, 0.0, 0.0);
        assert_close(r, CUSTOM_FG[0]);
        assert_close(g, CUSTOM_FG[1]);
        assert_close(b, CUSTOM_FG[2]);
    }

    #[test]
    fn custom_lifts_mid_tones() {
        let [r, _, _] = invert_rgb(InvertMode::Custom, 0.5, 0.5, 0.5);
        assert_close(r, 0.5 + 30.0 / 255.0);
    }

    #[test]
    fn operand_outputs_stay_in_unit_range() {
        for mode in [
            InvertMode::Full,
            InvertMode::Grayscale,
            InvertMode::TextOnly,
            InvertMode::Custom,
        ] {
            for step in 0..=10 {
                let v = step as f32 / 10.0;
                let [r, g, b] = invert_rgb(mode, v, 1.0 - v, v * 0.5);
                for channel in [r, g, b, invert_gray(mode, v)] {
                    assert!((0.0..=1.0).contains(&channel));
                }
                for channel in invert_cmyk(mode, v, 0.3, 1.0 - v, v * 0.2) {
                    assert!((0.0..=1.0).contains(&channel));
                }
            }
        }
    }

    #[test]
    fn text_only_pixel_inverts_dark_only() {
        // Dark pixel, likely text: inverted.
        assert_eq!(invert_pixel(InvertMode::TextOnly, 10, 20, 30), [245, 235, 225]);
        // Bright pixel, likely background: untouched.
        assert_eq!(invert_pixel(InvertMode::TextOnly, 240, 240, 240), [240, 240, 240]);
    }

    #[test]
    fn full_pixel_inverts_every_channel() {
        assert_eq!(invert_pixel(InvertMode::Full, 255, 0, 128), [0, 255, 127]);
    }

    #[test]
    fn custom_pixel_zones() {
        assert_eq!(invert_pixel(InvertMode::Custom, 250, 250, 250), [42, 42, 42]);
        assert_eq!(invert_pixel(InvertMode::Custom, 10, 10, 10), [232, 232, 232]);
    }
}
