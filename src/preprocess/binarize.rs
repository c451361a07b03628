//! Bilevel conversion of grayscale planes: plain 50% threshold, 1-D error
//! diffusion, and adaptive local-RMS thresholding.

use crate::flags::{BinarizationMode, Rect};
use crate::source::RasterImage;

/// Window edge for adaptive thresholding (33x33, 16 px of padding per side).
const ADAPTIVE_RADIUS: usize = 16;

/// Plain 50% threshold: >= 128 becomes white, everything else black.
pub fn threshold(gray: &[u8]) -> Vec<u8> {
    gray.iter()
        .map(|&px| if px >= 128 { 255 } else { 0 })
        .collect()
}

/// 1-D error diffusion in raster order.
///
/// A running accumulator gathers pixel intensity; once it reaches 255 the
/// pixel is emitted white and the accumulator resets to 0, otherwise the
/// pixel is emitted black and the remainder carries to the next pixel.
pub fn error_diffusion(gray: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gray.len());
    let mut acc: u32 = 0;
    for &px in gray {
        acc += px as u32;
        if acc >= 255 {
            out.push(255);
            acc = 0;
        } else {
            out.push(0);
        }
    }
    out
}

/// Adaptive local binarization.
///
/// The image is padded by 16 px of edge replication on every side; each
/// pixel is compared against the RMS of its 33x33 window. Pixels strictly
/// brighter than the local RMS become white, the rest (ties included)
/// become black.
pub fn adaptive(gray: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    debug_assert_eq!(gray.len(), w * h);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let pad = ADAPTIVE_RADIUS;
    let pw = w + 2 * pad;
    let ph = h + 2 * pad;

    // Edge-replicated padded copy.
    let mut padded = vec![0u8; pw * ph];
    for py in 0..ph {
        let sy = py.saturating_sub(pad).min(h - 1);
        for px in 0..pw {
            let sx = px.saturating_sub(pad).min(w - 1);
            padded[py * pw + px] = gray[sy * w + sx];
        }
    }

    // Summed-area table of squared intensities, one extra row/column of
    // zeros so window sums need no boundary branches.
    let iw = pw + 1;
    let mut integral = vec![0u64; iw * (ph + 1)];
    for py in 0..ph {
        let mut row_sum: u64 = 0;
        for px in 0..pw {
            let v = padded[py * pw + px] as u64;
            row_sum += v * v;
            integral[(py + 1) * iw + (px + 1)] = integral[py * iw + (px + 1)] + row_sum;
        }
    }

    let window = (2 * pad + 1) as f64;
    let area = window * window;
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            // Window in padded coordinates: [x, x + 33) x [y, y + 33).
            let x1 = x + 2 * pad + 1;
            let y1 = y + 2 * pad + 1;
            let sum_sq = integral[y1 * iw + x1] + integral[y * iw + x]
                - integral[y * iw + x1]
                - integral[y1 * iw + x];
            let rms = (sum_sq as f64 / area).sqrt();
            let px = gray[y * w + x];
            out[y * w + x] = if (px as f64) > rms { 255 } else { 0 };
        }
    }
    out
}

/// Dispatch on the configured sub-mode.
pub fn binarize(gray: &[u8], width: u32, height: u32, mode: BinarizationMode) -> Vec<u8> {
    match mode {
        BinarizationMode::Threshold => threshold(gray),
        BinarizationMode::Diffusion => error_diffusion(gray),
        BinarizationMode::Adaptive => adaptive(gray, width, height),
    }
}

/// Binarize a page in place, leaving illustration rects untouched.
///
/// The bilevel decision is made on the luma plane of the full image so the
/// adaptive window statistics see illustration content, but only pixels
/// outside every rect are overwritten.
pub fn binarize_outside_rects(raster: &mut RasterImage, rects: &[Rect], mode: BinarizationMode) {
    let (w, h) = (raster.width, raster.height);
    let mut luma = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            luma.push(raster.luma(x, y));
        }
    }
    let bilevel = binarize(&luma, w, h, mode);

    let ch = raster.channels as usize;
    for y in 0..h {
        for x in 0..w {
            if rects.iter().any(|r| r.contains(x, y)) {
                continue;
            }
            let v = bilevel[y as usize * w as usize + x as usize];
            let idx = (y as usize * w as usize + x as usize) * ch;
            for c in 0..ch {
                raster.pixels[idx + c] = v;
            }
        }
    }
}
