//! Per-page image preprocessing: loads a page through its [`ImageSource`]
//! and applies the transform its flags call for. Pure and reentrant, safe
//! to run concurrently for distinct pages.

pub mod binarize;
pub mod palette;

use crate::error::Result;
use crate::flags::{PageFlags, PageType, QuantizationMode};
use crate::source::{ChannelRequest, ImageSource, RasterImage};

use palette::PaletteOptions;

/// Round a float channel with the +0.5-then-truncate rule, clamped to
/// [0,255].
pub fn round_u8(v: f32) -> u8 {
    ((v + 0.5) as i32).clamp(0, 255) as u8
}

/// Channel layout to request from the decoder for a page.
///
/// Black-and-white pages without illustration regions collapse to a single
/// channel up front; palettized pages always need RGB; everything else
/// takes the decoder's natural count.
pub fn channel_request(flags: &PageFlags) -> ChannelRequest {
    match flags.page_type {
        PageType::BlackAndWhite if flags.illustration_rects.is_empty() => ChannelRequest::Gray,
        PageType::Palettized => ChannelRequest::Rgb,
        _ => ChannelRequest::Natural,
    }
}

/// Load and preprocess one page according to its flags.
pub fn preprocess_page(source: &dyn ImageSource, flags: &PageFlags) -> Result<RasterImage> {
    let mut raster = source.load(channel_request(flags))?;

    match flags.page_type {
        PageType::BlackAndWhite => {
            if flags.illustration_rects.is_empty() {
                let bilevel = binarize::binarize(
                    &raster.pixels,
                    raster.width,
                    raster.height,
                    flags.binarization_mode(),
                );
                raster = RasterImage::new(raster.width, raster.height, 1, bilevel);
            } else {
                binarize::binarize_outside_rects(
                    &mut raster,
                    &flags.illustration_rects,
                    flags.binarization_mode(),
                );
            }
        }
        PageType::Palettized => {
            let original = if flags.illustration_rects.is_empty() {
                None
            } else {
                Some(raster.clone())
            };

            match flags.quantization_mode() {
                QuantizationMode::Posterize => {
                    palette::posterize(&mut raster, flags.color_count());
                }
                QuantizationMode::Extract => {
                    let palettized = palette::extract_palette(
                        &raster,
                        flags.color_count(),
                        &PaletteOptions::default(),
                    )?;
                    raster = palettized.composite();
                }
            }

            // Illustration regions are exempt from quantization.
            if let Some(original) = original {
                restore_rect_pixels(&mut raster, &original, flags);
            }
        }
        PageType::Color | PageType::Layered | PageType::Auto => {}
    }

    Ok(raster)
}

fn restore_rect_pixels(raster: &mut RasterImage, original: &RasterImage, flags: &PageFlags) {
    let ch = raster.channels as usize;
    for y in 0..raster.height {
        for x in 0..raster.width {
            if flags.illustration_rects.iter().any(|r| r.contains(x, y)) {
                let idx = (y as usize * raster.width as usize + x as usize) * ch;
                raster.pixels[idx..idx + ch].copy_from_slice(&original.pixels[idx..idx + ch]);
            }
        }
    }
}
