//! PDF Color Inverter Library
//!
//! True color inversion for PDFs. Instead of rasterizing pages, the
//! library rewrites color operators inside content streams (pages, Form
//! XObjects, annotation appearances) and re-embeds pixel-inverted raster
//! images, so selectable text, vector graphics, bookmarks and metadata
//! all survive. Each processed page gets an opaque background rectangle
//! and an inverted default color state in front of its content, because
//! PDF's implicit black fill would otherwise disappear on the dark page.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use lopdf::{Document, Object, ObjectId};

pub mod color;
pub mod error;
mod images;
mod rewrite;
pub mod selector;
mod walker;

pub use error::InvertError;
pub use selector::{select_pages, PageRange};

use walker::Walker;

/// How colors are remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvertMode {
    /// Invert every channel of every color.
    #[default]
    Full,
    /// Invert luminance and drop saturation.
    Grayscale,
    /// Invert operand-level colors (text and vectors) but leave raster
    /// images untouched.
    TextOnly,
    /// Map onto a fixed dark palette: near-white to (42, 42, 42),
    /// near-black to (232, 232, 232), mid-tones inverted and lifted.
    Custom,
}

/// Options for PDF color inversion.
#[derive(Debug, Clone)]
pub struct InvertOptions {
    /// Inversion mode.
    pub mode: InvertMode,
    /// Which pages to process. Non-selected pages are removed from the
    /// output.
    pub range: PageRange,
    /// Re-encode opaque images as JPEG instead of lossless flate.
    pub compress_images: bool,
    /// Output DPI hint (150, 300 or 600). Below 300 images are
    /// downscaled; the value also selects JPEG quality.
    pub output_dpi: u32,
}

impl Default for InvertOptions {
    fn default() -> Self {
        Self {
            mode: InvertMode::Full,
            range: PageRange::All,
            compress_images: false,
            output_dpi: 300,
        }
    }
}

/// Result of an inversion run.
#[derive(Debug, Clone, Default)]
pub struct InvertStats {
    pub pages_processed: usize,
    pub streams_rewritten: usize,
    pub images_inverted: usize,
    pub images_skipped: usize,
}

/// Invert a PDF from bytes and return the inverted PDF bytes.
pub fn invert_pdf_bytes(
    input_bytes: &[u8],
    options: &InvertOptions,
) -> Result<(Vec<u8>, InvertStats), InvertError> {
    let cancel = AtomicBool::new(false);
    invert_pdf_bytes_with_cancel(input_bytes, options, &cancel)
}

/// Like [`invert_pdf_bytes`], checking `cancel` between pages. When the
/// flag is set the partial document is discarded and no output is
/// produced.
pub fn invert_pdf_bytes_with_cancel(
    input_bytes: &[u8],
    options: &InvertOptions,
    cancel: &AtomicBool,
) -> Result<(Vec<u8>, InvertStats), InvertError> {
    let mut doc = Document::load_mem(input_bytes)
        .map_err(|e| InvertError::InvalidDocument(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(InvertError::Encrypted);
    }

    let stats = process_document(&mut doc, options, cancel)?;

    let mut output_bytes = Vec::new();
    doc.save_to(&mut output_bytes)
        .map_err(|e| InvertError::Serialization(e.to_string()))?;

    Ok((output_bytes, stats))
}

fn process_document(
    doc: &mut Document,
    options: &InvertOptions,
    cancel: &AtomicBool,
) -> Result<InvertStats, InvertError> {
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let total = page_ids.len();

    let mut selected = selector::select_pages(&options.range, total);
    if selected.is_empty() {
        // An empty or unparsable selection widens to the whole document.
        log::debug!("empty page selection, processing all {} pages", total);
        selected = (0..total).collect();
    }

    let mut stats = InvertStats::default();
    {
        let mut walker = Walker::new(doc, options);
        for &index in &selected {
            if cancel.load(Ordering::Relaxed) {
                return Err(InvertError::Cancelled);
            }
            log::debug!("processing page {}/{}", index + 1, total);
            match walker.process_page(page_ids[index]) {
                Ok(()) => stats.pages_processed += 1,
                Err(e) => {
                    log::warn!("failed to invert page {}/{}: {}", index + 1, total, e);
                }
            }
        }
        stats.streams_rewritten = walker.streams_rewritten;
        stats.images_inverted = walker.images_inverted;
        stats.images_skipped = walker.images_skipped;
    }

    // Remove non-selected pages, highest first so the remaining indices
    // stay valid while removing.
    if options.range != PageRange::All && selected.len() < total {
        let keep: HashSet<usize> = selected.iter().copied().collect();
        for index in (0..total).rev() {
            if !keep.contains(&index) {
                remove_page(doc, page_ids[index]);
            }
        }
        log::debug!("trimmed document to {} pages", keep.len());
    }

    doc.compress();
    Ok(stats)
}

/// Detach a page from the page tree and drop it and its content streams.
fn remove_page(doc: &mut Document, page_id: ObjectId) {
    let parent_id = match doc
        .get_object(page_id)
        .and_then(|obj| obj.as_dict())
        .and_then(|dict| dict.get(b"Parent"))
    {
        Ok(Object::Reference(id)) => *id,
        _ => {
            log::warn!("page {:?} has no parent, not removed", page_id);
            return;
        }
    };

    if let Ok(parent) = doc.get_object_mut(parent_id).and_then(|obj| obj.as_dict_mut()) {
        if let Ok(Object::Array(kids)) = parent.get_mut(b"Kids") {
            kids.retain(|obj| !matches!(obj, Object::Reference(id) if *id == page_id));
        }
    }

    // Decrement Count up the ancestor chain, bounded against cycles.
    let mut cursor = Some(parent_id);
    let mut depth = 0;
    while let Some(id) = cursor {
        depth += 1;
        if depth > 64 {
            break;
        }
        cursor = match doc.get_object_mut(id).and_then(|obj| obj.as_dict_mut()) {
            Ok(dict) => {
                if let Ok(Object::Integer(count)) = dict.get_mut(b"Count") {
                    *count -= 1;
                }
                match dict.get(b"Parent") {
                    Ok(Object::Reference(parent)) => Some(*parent),
                    _ => None,
                }
            }
            Err(_) => None,
        };
    }

    let content_ids: Vec<ObjectId> = match doc.get_object(page_id).and_then(|obj| obj.as_dict()) {
        Ok(dict) => match dict.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![*id],
            Ok(Object::Array(arr)) => arr
                .iter()
                .filter_map(|obj| match obj {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        Err(_) => Vec::new(),
    };
    for id in content_ids {
        doc.objects.remove(&id);
    }
    doc.objects.remove(&page_id);
}

pub mod file_ops {
    //! Path-based front end over the in-memory API.

    use std::fs;
    use std::path::Path;

    use super::{invert_pdf_bytes, InvertError, InvertOptions, InvertStats};

    /// Invert a PDF file and write the result to `output_path`.
    pub fn invert_pdf_file(
        input_path: &Path,
        output_path: &Path,
        options: &InvertOptions,
    ) -> Result<InvertStats, InvertError> {
        let input_bytes = fs::read(input_path)?;
        let (output_bytes, stats) = invert_pdf_bytes(&input_bytes, options)?;
        fs::write(output_path, output_bytes)?;
        Ok(stats)
    }
}
