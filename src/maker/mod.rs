//! The maker protocol: format-specific encode/merge/finalize behind a
//! trait, keeping the scheduling side of the pipeline output-agnostic.

pub mod djvu;

use crate::error::{ConvertStatus, Result};
use crate::flags::{OutlineNode, PageFlags, TitlePolicy};
use crate::source::{ImageSource, short_display_name};

/// Whole-document finalize payload: one title slot per page, in page order,
/// plus the optional outline tree.
#[derive(Debug)]
pub struct FinalizeInfo<'a> {
    pub page_titles: Vec<Option<String>>,
    pub outline: Option<&'a OutlineNode>,
}

impl FinalizeInfo<'_> {
    pub fn is_empty(&self) -> bool {
        self.outline.is_none() && self.page_titles.iter().all(|t| t.is_none())
    }
}

/// Format-specific document builder.
///
/// Call contract, enforced by the coordinator:
/// - `convert` runs concurrently from worker threads for disjoint indices;
/// - `merge` runs only on the coordinator thread, in strictly increasing
///   index order, and only for pages that converted successfully — index 0
///   is the seed the document grows from, every later page is appended;
/// - `cleanup` runs after `merge` resolves for that page (skipped merges
///   included) and is best-effort: the coordinator retries a failure once,
///   then drops it;
/// - `finalize` runs at most once, after every page merged.
///
/// Backend-owned resources (temp directories and the like) are released on
/// drop.
pub trait MakerBackend: Send + Sync {
    fn convert(&self, index: usize, flags: &PageFlags, source: &dyn ImageSource) -> ConvertStatus;

    fn merge(&self, index: usize) -> Result<()>;

    fn cleanup(&self, index: usize) -> std::io::Result<()>;

    fn finalize(&self, info: &FinalizeInfo<'_>) -> Result<()>;
}

/// Title for one page: an explicit title wins; otherwise the automatic
/// policy derives one from the source's display name.
pub fn resolve_page_title(
    flags: &PageFlags,
    source: &dyn ImageSource,
    policy: TitlePolicy,
) -> Option<String> {
    if let Some(title) = &flags.page_title {
        return Some(title.clone());
    }
    match policy {
        TitlePolicy::None => None,
        TitlePolicy::Automatic { use_short_name } => {
            let name = source.display_name();
            if use_short_name {
                Some(short_display_name(&name))
            } else {
                Some(name)
            }
        }
    }
}
