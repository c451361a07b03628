//! Project-file parsing: a YAML document describing the output path,
//! document options, and one entry per page.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::flags::{
    BinarizationMode, DocumentFlags, OutlineNode, PageFlags, PageType, QuantizationMode, Rect,
    TitlePolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSpec {
    #[default]
    None,
    Automatic,
    AutomaticShort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlineSpec {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub children: Vec<OutlineSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    pub image: String,
    #[serde(rename = "type", default = "default_page_type")]
    pub page_type: PageType,
    /// Binarization sub-mode, BW pages only.
    #[serde(default)]
    pub mode: Option<BinarizationMode>,
    /// Quantization sub-mode, palettized pages only.
    #[serde(default)]
    pub quantization: Option<QuantizationMode>,
    pub quality: Option<u8>,
    pub dpi: Option<u32>,
    /// Target color count, palettized pages only.
    pub colors: Option<i32>,
    pub title: Option<String>,
    #[serde(default)]
    pub illustrations: Vec<Rect>,
}

fn default_page_type() -> PageType {
    PageType::Color
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub output: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// 0 means auto-discover from hardware parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub page_title: TitleSpec,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub outline: Vec<OutlineSpec>,
}

fn default_dpi() -> u32 {
    300
}

fn default_quality() -> u8 {
    100
}

impl Project {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let project: Project = serde_yml::from_str(yaml).map_err(|e| {
            crate::error::ScanbindError::config(format!("Failed to parse project YAML: {e}"))
        })?;
        project.validate()?;
        Ok(project)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(crate::error::ScanbindError::config(
                "Project has no pages",
            ));
        }
        if self.dpi == 0 {
            return Err(crate::error::ScanbindError::config("dpi must be positive"));
        }
        if self.quality > 100 {
            return Err(crate::error::ScanbindError::config(
                "quality must be in 0..=100",
            ));
        }
        for (i, page) in self.pages.iter().enumerate() {
            if page.dpi == Some(0) {
                return Err(crate::error::ScanbindError::config(format!(
                    "page {i}: dpi must be positive"
                )));
            }
            if matches!(page.quality, Some(q) if q > 100) {
                return Err(crate::error::ScanbindError::config(format!(
                    "page {i}: quality must be in 0..=100"
                )));
            }
        }
        Ok(())
    }

    /// Resolve one page's flags, falling back to the document defaults.
    pub fn page_flags(&self, spec: &PageSpec) -> PageFlags {
        let mut flags = PageFlags {
            page_type: spec.page_type,
            quality: spec.quality.unwrap_or(self.quality),
            dpi: spec.dpi.unwrap_or(self.dpi),
            illustration_rects: spec.illustrations.clone(),
            page_title: spec.title.clone(),
            ..PageFlags::default()
        };
        match spec.page_type {
            PageType::BlackAndWhite => {
                flags.param1 = match spec.mode.unwrap_or(BinarizationMode::Threshold) {
                    BinarizationMode::Threshold => 0,
                    BinarizationMode::Diffusion => 1,
                    BinarizationMode::Adaptive => 2,
                };
            }
            PageType::Palettized => {
                flags.param1 = spec.colors.unwrap_or(8);
                flags.param2 = match spec.quantization.unwrap_or(QuantizationMode::Posterize) {
                    QuantizationMode::Posterize => 0,
                    QuantizationMode::Extract => 1,
                };
            }
            _ => {}
        }
        flags
    }

    pub fn document_flags(&self) -> DocumentFlags {
        let title_policy = match self.page_title {
            TitleSpec::None => TitlePolicy::None,
            TitleSpec::Automatic => TitlePolicy::Automatic {
                use_short_name: false,
            },
            TitleSpec::AutomaticShort => TitlePolicy::Automatic {
                use_short_name: true,
            },
        };
        let outline = if self.outline.is_empty() {
            None
        } else {
            // Synthetic textless root: a pure container for the top level.
            Some(OutlineNode {
                text: None,
                page: 0,
                children: self.outline.iter().map(outline_node).collect(),
            })
        };
        DocumentFlags {
            temp_dir: self.temp_dir.clone(),
            title_policy,
            outline,
        }
    }
}

fn outline_node(spec: &OutlineSpec) -> OutlineNode {
    OutlineNode {
        text: spec.text.clone(),
        page: spec.page,
        children: spec.children.iter().map(outline_node).collect(),
    }
}
