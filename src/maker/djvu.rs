//! DjVu maker backed by the djvulibre command-line tools.
//!
//! Each page is preprocessed, written as a PNM intermediate, and encoded by
//! an independent `cjb2` (bilevel) or `c44` process into a per-page
//! `.djvu` artifact. Page 0's artifact becomes the output document; later
//! pages are appended with `djvm -i`. Titles and the outline are applied in
//! one `djvused` pass at the end.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::{ConvertStatus, Result, ScanbindError};
use crate::flags::{DocumentFlags, OutlineNode, PageFlags, PageType};
use crate::maker::{FinalizeInfo, MakerBackend};
use crate::preprocess;
use crate::source::{ImageSource, RasterImage};

/// Paths of the external djvulibre tools; bare names resolve on PATH.
#[derive(Debug, Clone)]
pub struct DjvuToolchain {
    pub c44: PathBuf,
    pub cjb2: PathBuf,
    pub djvm: PathBuf,
    pub djvused: PathBuf,
}

impl Default for DjvuToolchain {
    fn default() -> Self {
        DjvuToolchain {
            c44: PathBuf::from("c44"),
            cjb2: PathBuf::from("cjb2"),
            djvm: PathBuf::from("djvm"),
            djvused: PathBuf::from("djvused"),
        }
    }
}

pub struct DjvuBackend {
    toolchain: DjvuToolchain,
    temp_dir: PathBuf,
    output: PathBuf,
}

impl DjvuBackend {
    /// Create the backend and its per-run temp directory (under the
    /// document's temp override, or the system temp dir).
    pub fn new(
        output: impl Into<PathBuf>,
        flags: &DocumentFlags,
        toolchain: DjvuToolchain,
    ) -> Result<Self> {
        let base = flags
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_dir = base.join(format!("scanbind-{}-{nonce}", std::process::id()));
        std::fs::create_dir_all(&temp_dir)?;
        Ok(DjvuBackend {
            toolchain,
            temp_dir,
            output: output.into(),
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Per-page encoded artifact path. Page 0 is the seed the document
    /// grows from, so its artifact is the output file itself.
    pub fn page_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.output.clone()
        } else {
            self.temp_dir.join(format!("page_{index:06}.djvu"))
        }
    }

    fn pnm_path(&self, index: usize) -> PathBuf {
        self.temp_dir.join(format!("page_{index:06}.pnm"))
    }

    fn run_tool(&self, tool: &Path, args: &[&std::ffi::OsStr]) -> Result<()> {
        let output = Command::new(tool).args(args).output().map_err(|e| {
            ScanbindError::encode(format!("cannot run {}: {e}", tool.display()))
        })?;
        if !output.status.success() {
            return Err(ScanbindError::encode(format!(
                "{} exited with {}: {}",
                tool.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn encode_page(&self, index: usize, flags: &PageFlags, raster: &RasterImage) -> Result<()> {
        let bilevel = raster.channels == 1
            && flags.page_type == PageType::BlackAndWhite
            && flags.illustration_rects.is_empty();

        let pnm = self.pnm_path(index);
        let mut file = std::fs::File::create(&pnm)?;
        file.write_all(&pnm_bytes(raster, bilevel))?;
        drop(file);

        let page = self.page_path(index);
        let dpi = flags.dpi.to_string();
        if bilevel {
            self.run_tool(
                &self.toolchain.cjb2,
                &[
                    "-dpi".as_ref(),
                    dpi.as_ref(),
                    pnm.as_os_str(),
                    page.as_os_str(),
                ],
            )
        } else {
            let decibel = format!("{:.1}", quality_to_decibel(flags.quality));
            self.run_tool(
                &self.toolchain.c44,
                &[
                    "-dpi".as_ref(),
                    dpi.as_ref(),
                    "-decibel".as_ref(),
                    decibel.as_ref(),
                    pnm.as_os_str(),
                    page.as_os_str(),
                ],
            )
        }
    }
}

impl MakerBackend for DjvuBackend {
    fn convert(&self, index: usize, flags: &PageFlags, source: &dyn ImageSource) -> ConvertStatus {
        let raster = match preprocess::preprocess_page(source, flags) {
            Ok(r) => r,
            Err(ScanbindError::ImageDecodeError(msg)) => {
                warn!(index, %msg, "page image open failed");
                return ConvertStatus::ImageOpen;
            }
            Err(ScanbindError::IoError(e)) => {
                warn!(index, %e, "page image read failed");
                return ConvertStatus::ImageOpen;
            }
            Err(e) => {
                warn!(index, %e, "page preprocessing failed");
                return ConvertStatus::Generic;
            }
        };

        match self.encode_page(index, flags, &raster) {
            Ok(()) => ConvertStatus::Ok,
            Err(e) => {
                warn!(index, %e, "page encode failed");
                ConvertStatus::PageSave
            }
        }
    }

    fn merge(&self, index: usize) -> Result<()> {
        // Index 0 is never merged: its artifact already is the output.
        debug_assert!(index > 0);
        let page = self.page_path(index);
        self.run_tool(
            &self.toolchain.djvm,
            &[
                "-i".as_ref(),
                self.output.as_os_str(),
                page.as_os_str(),
            ],
        )
        .map_err(|e| ScanbindError::merge(e.to_string()))
    }

    fn cleanup(&self, index: usize) -> std::io::Result<()> {
        let _ = std::fs::remove_file(self.pnm_path(index));
        if index == 0 {
            // The seed artifact is the output document; never delete it.
            return Ok(());
        }
        let page = self.page_path(index);
        match std::fs::remove_file(&page) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn finalize(&self, info: &FinalizeInfo<'_>) -> Result<()> {
        if info.is_empty() {
            return Ok(());
        }

        let mut outline_path = None;
        if let Some(outline) = info.outline {
            let path = self.temp_dir.join("outline.sexp");
            std::fs::write(&path, outline_sexpr(outline))?;
            outline_path = Some(path);
        }

        let script = djvused_script(&info.page_titles, outline_path.as_deref());
        let script_path = self.temp_dir.join("finalize.djvused");
        std::fs::write(&script_path, script)?;

        self.run_tool(
            &self.toolchain.djvused,
            &[
                "-f".as_ref(),
                script_path.as_os_str(),
                "-s".as_ref(),
                self.output.as_os_str(),
            ],
        )
        .map_err(|e| ScanbindError::finalize(e.to_string()))
    }
}

impl Drop for DjvuBackend {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.temp_dir) {
            debug!(dir = %self.temp_dir.display(), %e, "temp dir not removed");
        }
    }
}

/// Map encoder quality 0..=100 onto the c44 decibel range 16..=48.
pub fn quality_to_decibel(quality: u8) -> f32 {
    16.0 + quality.min(100) as f32 * 32.0 / 100.0
}

/// Serialize a raster as binary PNM: P4 for bilevel, P5 for gray, P6 for
/// RGB. Bilevel rows are bit-packed with 1 = black, per the PBM convention.
pub fn pnm_bytes(raster: &RasterImage, bilevel: bool) -> Vec<u8> {
    let (w, h) = (raster.width, raster.height);
    if bilevel {
        let mut out = format!("P4\n{w} {h}\n").into_bytes();
        let row_bytes = (w as usize).div_ceil(8);
        for y in 0..h as usize {
            let mut row = vec![0u8; row_bytes];
            for x in 0..w as usize {
                if raster.pixels[y * w as usize + x] < 128 {
                    row[x / 8] |= 0x80 >> (x % 8);
                }
            }
            out.extend_from_slice(&row);
        }
        out
    } else {
        let magic = if raster.channels == 1 { "P5" } else { "P6" };
        let mut out = format!("{magic}\n{w} {h}\n255\n").into_bytes();
        out.extend_from_slice(&raster.pixels);
        out
    }
}

fn escape_djvused(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            // Control characters would break the line-oriented script;
            // djvused accepts octal escapes inside quoted strings.
            c if c.is_control() => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Build the djvused finalize script: one `select N; set-page-title` pair
/// per titled page (djvused pages are 1-based), plus `set-outline` when an
/// outline file was written.
pub fn djvused_script(page_titles: &[Option<String>], outline_file: Option<&Path>) -> String {
    let mut script = String::new();
    for (index, title) in page_titles.iter().enumerate() {
        if let Some(title) = title {
            script.push_str(&format!(
                "select {}; set-page-title \"{}\"\n",
                index + 1,
                escape_djvused(title)
            ));
        }
    }
    if let Some(path) = outline_file {
        // Quoted and escaped like titles: temp paths can carry quotes.
        script.push_str(&format!(
            "set-outline \"{}\"\n",
            escape_djvused(&path.display().to_string())
        ));
    }
    script.push_str("save\n");
    script
}

/// Render an outline tree as a djvused bookmarks s-expression. A node
/// without text is a pure container: its children are spliced into the
/// parent level. Page targets are 1-based `#N` references.
pub fn outline_sexpr(root: &OutlineNode) -> String {
    let mut out = String::from("(bookmarks");
    // The root itself is a container unless it carries text.
    if root.text.is_some() {
        write_outline_node(root, &mut out, 1);
    } else {
        for child in &root.children {
            write_outline_node(child, &mut out, 1);
        }
    }
    out.push_str(")\n");
    out
}

fn write_outline_node(node: &OutlineNode, out: &mut String, depth: usize) {
    match &node.text {
        Some(text) => {
            out.push('\n');
            out.push_str(&" ".repeat(depth));
            out.push_str(&format!(
                "(\"{}\" \"#{}\"",
                escape_djvused(text),
                node.page + 1
            ));
            for child in &node.children {
                write_outline_node(child, out, depth + 1);
            }
            out.push(')');
        }
        None => {
            for child in &node.children {
                write_outline_node(child, out, depth);
            }
        }
    }
}
