//! Palette extraction for palettized pages.
//!
//! The advanced mode follows the noteshrink approach: sample the image at a
//! fixed stride, detect the background as the most common coarsely-quantized
//! sample, classify samples as foreground by HSV distance from the
//! background, cluster the foreground with k-means, and map every pixel to
//! the resulting palette (background pixels forced to entry 0).

use std::collections::HashMap;

use crate::error::Result;
use crate::preprocess::round_u8;
use crate::source::RasterImage;

/// Tuning knobs for [`extract_palette`]. Defaults match the reference
/// implementation.
#[derive(Debug, Clone)]
pub struct PaletteOptions {
    /// Foreground when |sat - bg_sat| reaches this.
    pub sat_threshold: f32,
    /// Foreground when |val - bg_val| reaches this.
    pub val_threshold: f32,
    /// Sample every n-th pixel for background detection and clustering.
    pub sample_stride: usize,
    /// k-means iteration cap.
    pub kmeans_iterations: usize,
    /// Stretch palette saturation to the full [0,1] range.
    pub stretch_saturation: bool,
    /// Normalize palette value to the full [0,1] range.
    pub normalize_value: bool,
    /// Force palette entry 0 (the background) to pure white.
    pub white_background: bool,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        PaletteOptions {
            sat_threshold: 0.20,
            val_threshold: 0.25,
            sample_stride: 20,
            kmeans_iterations: 32,
            stretch_saturation: false,
            normalize_value: false,
            white_background: false,
        }
    }
}

/// Index-per-pixel buffer plus the finalized float palette (0-255 scale).
#[derive(Debug, Clone)]
pub struct PalettizedImage {
    pub width: u32,
    pub height: u32,
    pub indexes: Vec<u8>,
    pub palette: Vec<[f32; 3]>,
}

impl PalettizedImage {
    /// Composite back to an 8-bit RGB raster, rounding each palette channel
    /// with the +0.5-then-truncate rule and clamping to [0,255].
    pub fn composite(&self) -> RasterImage {
        let mut pixels = Vec::with_capacity(self.indexes.len() * 3);
        for &idx in &self.indexes {
            let entry = self.palette[idx as usize];
            pixels.push(round_u8(entry[0]));
            pixels.push(round_u8(entry[1]));
            pixels.push(round_u8(entry[2]));
        }
        RasterImage::new(self.width, self.height, 3, pixels)
    }
}

/// Saturation and value of an RGB triple, both in [0,1].
pub fn saturation_value(r: u8, g: u8, b: u8) -> (f32, f32) {
    let max = r.max(g).max(b) as f32;
    let min = r.min(g).min(b) as f32;
    let sat = if max > 0.0 { (max - min) / max } else { 0.0 };
    (sat, max / 255.0)
}

/// Full HSV of an RGB triple: hue in [0,360), sat and val in [0,1].
fn rgb_to_hsv(rgb: [f32; 3]) -> (f32, f32, f32) {
    let [r, g, b] = [rgb[0] / 255.0, rgb[1] / 255.0, rgb[2] / 255.0];
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max > 0.0 { delta / max } else { 0.0 };
    (hue, sat, max)
}

/// HSV back to RGB on the 0-255 scale. Hue in degrees, sat/val in [0,1].
fn hsv_to_rgb(hue: f32, sat: f32, val: f32) -> [f32; 3] {
    let c = val * sat;
    let hp = (hue.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = val - c;
    [(r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0]
}

fn squared_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Most common 4-bit-per-channel quantized sample, reported as the mean of
/// the samples falling into the winning bin.
fn detect_background(samples: &[[u8; 3]]) -> [f32; 3] {
    let mut bins: HashMap<u16, (u32, [u64; 3])> = HashMap::new();
    for &[r, g, b] in samples {
        let key = ((r as u16 >> 4) << 8) | ((g as u16 >> 4) << 4) | (b as u16 >> 4);
        let entry = bins.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += r as u64;
        entry.1[1] += g as u64;
        entry.1[2] += b as u64;
    }
    let (_, &(count, sums)) = bins
        .iter()
        .max_by_key(|(key, (count, _))| (*count, u16::MAX - **key))
        .expect("detect_background called with no samples");
    [
        sums[0] as f32 / count as f32,
        sums[1] as f32 / count as f32,
        sums[2] as f32 / count as f32,
    ]
}

/// True when a pixel reads as foreground relative to the background color.
fn is_foreground(px: [u8; 3], bg_sat: f32, bg_val: f32, opts: &PaletteOptions) -> bool {
    let (sat, val) = saturation_value(px[0], px[1], px[2]);
    (sat - bg_sat).abs() >= opts.sat_threshold || (val - bg_val).abs() >= opts.val_threshold
}

/// The foreground sample nearest an evenly-spaced hue anchor, used both for
/// initial seeding and for re-seeding clusters that go empty.
fn seed_from_anchor(samples: &[[f32; 3]], cluster: usize, k: usize) -> [f32; 3] {
    let hue = cluster as f32 * 360.0 / k as f32;
    let anchor = hsv_to_rgb(hue, 1.0, 1.0);
    let mut best = samples[0];
    let mut best_dist = f32::INFINITY;
    for &s in samples {
        let d = squared_distance(s, anchor);
        if d < best_dist {
            best_dist = d;
            best = s;
        }
    }
    best
}

/// Plain k-means over foreground samples in RGB space; empty clusters are
/// re-seeded from hue anchors.
fn kmeans(samples: &[[f32; 3]], k: usize, iterations: usize) -> Vec<[f32; 3]> {
    let mut centers: Vec<[f32; 3]> = (0..k).map(|j| seed_from_anchor(samples, j, k)).collect();
    let mut assignment = vec![0usize; samples.len()];

    for _ in 0..iterations {
        let mut changed = false;
        for (i, &s) in samples.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f32::INFINITY;
            for (j, &c) in centers.iter().enumerate() {
                let d = squared_distance(s, c);
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0u32; k];
        for (i, &s) in samples.iter().enumerate() {
            let j = assignment[i];
            counts[j] += 1;
            sums[j][0] += s[0] as f64;
            sums[j][1] += s[1] as f64;
            sums[j][2] += s[2] as f64;
        }
        for j in 0..k {
            if counts[j] == 0 {
                centers[j] = seed_from_anchor(samples, j, k);
                changed = true;
            } else {
                centers[j] = [
                    (sums[j][0] / counts[j] as f64) as f32,
                    (sums[j][1] / counts[j] as f64) as f32,
                    (sums[j][2] / counts[j] as f64) as f32,
                ];
            }
        }

        if !changed {
            break;
        }
    }
    centers
}

/// Saturation stretch / value normalization / white background, applied to
/// the finished palette before compositing.
fn postprocess_palette(palette: &mut [[f32; 3]], opts: &PaletteOptions) {
    if opts.stretch_saturation || opts.normalize_value {
        let hsv: Vec<(f32, f32, f32)> = palette.iter().map(|&c| rgb_to_hsv(c)).collect();
        let (mut s_min, mut s_max) = (1.0f32, 0.0f32);
        let (mut v_min, mut v_max) = (1.0f32, 0.0f32);
        for &(_, s, v) in &hsv {
            s_min = s_min.min(s);
            s_max = s_max.max(s);
            v_min = v_min.min(v);
            v_max = v_max.max(v);
        }
        for (entry, &(h, s, v)) in palette.iter_mut().zip(&hsv) {
            let s = if opts.stretch_saturation && s_max > s_min {
                ((s - s_min) / (s_max - s_min)).clamp(0.0, 1.0)
            } else {
                s
            };
            let v = if opts.normalize_value && v_max > v_min {
                ((v - v_min) / (v_max - v_min)).clamp(0.0, 1.0)
            } else {
                v
            };
            *entry = hsv_to_rgb(h, s, v);
        }
    }
    if opts.white_background {
        palette[0] = [255.0, 255.0, 255.0];
    }
}

/// Reduce an RGB raster to `colors` palette entries (entry 0 is the
/// detected background) and an index per pixel.
pub fn extract_palette(
    rgb: &RasterImage,
    colors: usize,
    opts: &PaletteOptions,
) -> Result<PalettizedImage> {
    debug_assert_eq!(rgb.channels, 3);
    let colors = colors.clamp(2, 256);
    let pixel_count = rgb.width as usize * rgb.height as usize;
    if pixel_count == 0 {
        return Ok(PalettizedImage {
            width: rgb.width,
            height: rgb.height,
            indexes: Vec::new(),
            palette: vec![[255.0, 255.0, 255.0]; colors],
        });
    }

    let stride = opts.sample_stride.max(1);
    let mut samples: Vec<[u8; 3]> = Vec::with_capacity(pixel_count / stride + 1);
    let mut i = 0;
    while i < pixel_count {
        let o = i * 3;
        samples.push([rgb.pixels[o], rgb.pixels[o + 1], rgb.pixels[o + 2]]);
        i += stride;
    }

    let background = detect_background(&samples);
    let (bg_sat, bg_val) = saturation_value(
        round_u8(background[0]),
        round_u8(background[1]),
        round_u8(background[2]),
    );

    let foreground: Vec<[f32; 3]> = samples
        .iter()
        .filter(|&&px| is_foreground(px, bg_sat, bg_val, opts))
        .map(|&[r, g, b]| [r as f32, g as f32, b as f32])
        .collect();

    let k = colors - 1;
    let mut palette = Vec::with_capacity(colors);
    palette.push(background);
    if foreground.is_empty() {
        // Nothing but background: pad with copies so the palette length is
        // still what the caller asked for.
        palette.resize(colors, background);
    } else {
        palette.extend(kmeans(&foreground, k, opts.kmeans_iterations));
    }

    // Assign pixels against the solved palette, then post-process the
    // palette for output.
    let mut indexes = Vec::with_capacity(pixel_count);
    for p in 0..pixel_count {
        let o = p * 3;
        let px = [rgb.pixels[o], rgb.pixels[o + 1], rgb.pixels[o + 2]];
        if !is_foreground(px, bg_sat, bg_val, opts) {
            indexes.push(0);
            continue;
        }
        let pf = [px[0] as f32, px[1] as f32, px[2] as f32];
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (j, &c) in palette.iter().enumerate() {
            let d = squared_distance(pf, c);
            if d < best_dist {
                best_dist = d;
                best = j;
            }
        }
        indexes.push(best as u8);
    }

    postprocess_palette(&mut palette, opts);

    Ok(PalettizedImage {
        width: rgb.width,
        height: rgb.height,
        indexes,
        palette,
    })
}

/// Placeholder quantization: per-channel posterize to the smallest level
/// grid holding at least `colors` combinations.
pub fn posterize(rgb: &mut RasterImage, colors: usize) {
    let colors = colors.clamp(2, 256);
    let mut levels = 2usize;
    while levels * levels * levels < colors {
        levels += 1;
    }
    let step = 255.0 / (levels - 1) as f32;
    for px in rgb.pixels.iter_mut() {
        let level = (*px as f32 / step + 0.5) as u32;
        *px = round_u8(level as f32 * step);
    }
}
