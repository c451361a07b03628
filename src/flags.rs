//! Per-page and per-document conversion settings.

use std::path::PathBuf;

use serde::Deserialize;

/// How a page is encoded into the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Color,
    #[serde(rename = "bw")]
    BlackAndWhite,
    /// Encoded like [`PageType::Color`]; kept distinct so project files
    /// round-trip and a backend with real layer separation can branch on it.
    Layered,
    Palettized,
    Auto,
}

/// Binarization sub-mode for black-and-white pages (`PageFlags::param1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinarizationMode {
    Threshold,
    Diffusion,
    Adaptive,
}

/// Quantization sub-mode for palettized pages (`PageFlags::param2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationMode {
    Posterize,
    Extract,
}

/// Axis-aligned region exempt from whole-page binarization/quantization.
/// Half-open on both axes; clamped to image bounds at use sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Settings carried by each page task. Copied by value into the task, so a
/// page keeps its flags even if document-level defaults change afterwards.
#[derive(Debug, Clone)]
pub struct PageFlags {
    pub page_type: PageType,
    /// Binarization sub-mode for BW pages; color count for palettized pages.
    pub param1: i32,
    /// Quantization sub-mode for palettized pages.
    pub param2: i32,
    /// Encoder quality, 0..=100.
    pub quality: u8,
    pub dpi: u32,
    pub illustration_rects: Vec<Rect>,
    /// Explicit title; wins over any automatic title policy.
    pub page_title: Option<String>,
}

impl Default for PageFlags {
    fn default() -> Self {
        PageFlags {
            page_type: PageType::Color,
            param1: 0,
            param2: 0,
            quality: 100,
            dpi: 300,
            illustration_rects: Vec::new(),
            page_title: None,
        }
    }
}

impl PageFlags {
    /// Binarization sub-mode encoded in `param1` (BW pages).
    /// Unknown values fall back to plain thresholding.
    pub fn binarization_mode(&self) -> BinarizationMode {
        match self.param1 {
            1 => BinarizationMode::Diffusion,
            2 => BinarizationMode::Adaptive,
            _ => BinarizationMode::Threshold,
        }
    }

    /// Target color count encoded in `param1` (palettized pages), clamped
    /// to 2..=256.
    pub fn color_count(&self) -> usize {
        self.param1.clamp(2, 256) as usize
    }

    /// Quantization sub-mode encoded in `param2` (palettized pages).
    pub fn quantization_mode(&self) -> QuantizationMode {
        match self.param2 {
            1 => QuantizationMode::Extract,
            _ => QuantizationMode::Posterize,
        }
    }
}

/// Page-title policy applied at finalize time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitlePolicy {
    #[default]
    None,
    /// Use each source's display name; `use_short_name` strips directory
    /// and extension.
    Automatic {
        use_short_name: bool,
    },
}

/// Node of the document outline tree. A node without text is a pure
/// container: its children are emitted but the node itself gets no entry.
#[derive(Debug, Clone, Default)]
pub struct OutlineNode {
    pub text: Option<String>,
    /// Target page index, 0-based.
    pub page: usize,
    pub children: Vec<OutlineNode>,
}

/// Document-wide settings owned by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct DocumentFlags {
    /// Override for the per-run temp directory; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub title_policy: TitlePolicy,
    pub outline: Option<OutlineNode>,
}

impl DocumentFlags {
    /// Finalization can be skipped entirely when neither titles nor an
    /// outline are configured.
    pub fn wants_finalize(&self) -> bool {
        self.title_policy != TitlePolicy::None || self.outline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_count_clamps_to_valid_range() {
        let mut flags = PageFlags {
            page_type: PageType::Palettized,
            ..PageFlags::default()
        };
        flags.param1 = 0;
        assert_eq!(flags.color_count(), 2);
        flags.param1 = 16;
        assert_eq!(flags.color_count(), 16);
        flags.param1 = 4096;
        assert_eq!(flags.color_count(), 256);
    }

    #[test]
    fn rect_containment_is_half_open() {
        let r = Rect {
            x0: 10,
            y0: 10,
            x1: 20,
            y1: 20,
        };
        assert!(r.contains(10, 10));
        assert!(r.contains(19, 19));
        assert!(!r.contains(20, 10));
        assert!(!r.contains(10, 20));
    }

    #[test]
    fn finalize_skipped_without_titles_or_outline() {
        assert!(!DocumentFlags::default().wants_finalize());
        let with_titles = DocumentFlags {
            title_policy: TitlePolicy::Automatic {
                use_short_name: false,
            },
            ..DocumentFlags::default()
        };
        assert!(with_titles.wants_finalize());
    }
}
