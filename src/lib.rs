//! Convert an ordered set of scanned page images into a single multi-page
//! document.
//!
//! Pages are preprocessed per their flags (binarization, error diffusion,
//! palette extraction), encoded independently on a fixed worker pool, and
//! merged strictly in page order into one output artifact; titles and the
//! outline are applied in a whole-document finalize pass. The
//! format-specific side lives behind [`maker::MakerBackend`]; the bundled
//! implementation shells out to the djvulibre tools.

pub mod config;
pub mod error;
pub mod flags;
pub mod maker;
pub mod pipeline;
pub mod preprocess;
pub mod source;

pub use error::{ConvertStatus, Result, ScanbindError};
pub use flags::{DocumentFlags, PageFlags, PageType, TitlePolicy};
pub use pipeline::coordinator::{DocumentConverter, ProgressHandle, RunReport};
