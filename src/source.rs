//! Page image sources: the capability the pipeline reads pages through.

use std::path::PathBuf;

use image::DynamicImage;

use crate::error::{Result, ScanbindError};

/// Channel layout requested from a source when loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    /// Whatever the decoder reports, collapsed to 1 or 3 channels
    /// (gray+alpha drops alpha, RGBA drops alpha).
    Natural,
    /// Force single-channel grayscale.
    Gray,
    /// Force 3-channel RGB.
    Rgb,
}

/// 8-bit raster with 1 (gray) or 3 (RGB) interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        debug_assert!(channels == 1 || channels == 3);
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * channels as usize
        );
        RasterImage {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Convert a decoded image honoring a channel request, collapsing
    /// 2-channel images to 1 and 4-channel images to 3.
    pub fn from_decoded(img: DynamicImage, request: ChannelRequest) -> Self {
        use image::ColorType;

        let force_gray = match request {
            ChannelRequest::Gray => true,
            ChannelRequest::Rgb => false,
            ChannelRequest::Natural => matches!(
                img.color(),
                ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
            ),
        };

        if force_gray {
            let gray = img.into_luma8();
            let (w, h) = (gray.width(), gray.height());
            RasterImage::new(w, h, 1, gray.into_raw())
        } else {
            let rgb = img.into_rgb8();
            let (w, h) = (rgb.width(), rgb.height());
            RasterImage::new(w, h, 3, rgb.into_raw())
        }
    }

    /// Per-pixel luma (Rec. 601 integer weights), identity for gray images.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        if self.channels == 1 {
            self.pixels[idx]
        } else {
            let r = self.pixels[idx] as u32;
            let g = self.pixels[idx + 1] as u32;
            let b = self.pixels[idx + 2] as u32;
            ((r * 299 + g * 587 + b * 114) / 1000) as u8
        }
    }
}

/// Capability the pipeline uses to obtain page rasters. Implementations
/// must be callable concurrently for distinct pages; whether the bytes come
/// from a file, memory, or a renderer is the source's business.
pub trait ImageSource: Send + Sync {
    fn load(&self, request: ChannelRequest) -> Result<RasterImage>;

    /// Name shown to users and used for automatic page titles.
    fn display_name(&self) -> String;
}

/// File-backed source decoding through the `image` crate.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileImageSource { path: path.into() }
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, request: ChannelRequest) -> Result<RasterImage> {
        let img = image::open(&self.path).map_err(|e| {
            ScanbindError::image_decode(format!("{}: {e}", self.path.display()))
        })?;
        Ok(RasterImage::from_decoded(img, request))
    }

    fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Strip directory and extension from a display name ("short name" titles).
pub fn short_display_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_strips_directory_and_extension() {
        assert_eq!(short_display_name("scans/page_001.png"), "page_001");
        assert_eq!(short_display_name("page_001"), "page_001");
        assert_eq!(short_display_name(".hidden"), ".hidden");
        assert_eq!(short_display_name("a\\b\\c.tif"), "c");
    }

    #[test]
    fn natural_request_collapses_alpha_channels() {
        let la = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
            2,
            2,
            image::LumaA([40, 255]),
        ));
        let raster = RasterImage::from_decoded(la, ChannelRequest::Natural);
        assert_eq!(raster.channels, 1);
        assert_eq!(raster.pixels, vec![40; 4]);

        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            1,
            image::Rgba([1, 2, 3, 255]),
        ));
        let raster = RasterImage::from_decoded(rgba, ChannelRequest::Natural);
        assert_eq!(raster.channels, 3);
        assert_eq!(raster.pixels, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn luma_matches_rec601_weights() {
        let raster = RasterImage::new(1, 1, 3, vec![255, 0, 0]);
        assert_eq!(raster.luma(0, 0), 76);
        let gray = RasterImage::new(1, 1, 1, vec![200]);
        assert_eq!(gray.luma(0, 0), 200);
    }
}
