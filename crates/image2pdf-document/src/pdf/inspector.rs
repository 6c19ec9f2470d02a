// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspector — open existing PDFs with `lopdf` to report page counts and
// document information, and merge several PDFs into one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::OutputSummary;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::post::decode_text_string;
use crate::output::{sha256_hex, write_atomically};

/// Document information read from a PDF's /Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
}

/// Summary of a PDF file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub file_name: Option<String>,
    pub path: Option<PathBuf>,
    pub page_count: usize,
    pub file_size: u64,
    /// Width and height of each page's media box, in points.
    pub page_sizes: Vec<(f32, f32)>,
    pub metadata: PdfMetadata,
}

/// Read-only view over an existing PDF.
pub struct PdfInspector {
    document: Document,
    source_path: Option<PathBuf>,
    file_size: u64,
}

impl PdfInspector {
    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Image2PdfError::NotFound {
                path: path_ref.to_path_buf(),
            },
            _ => Image2PdfError::Io(err),
        })?;
        let mut inspector = Self::from_bytes(&data).map_err(|err| {
            Image2PdfError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;
        inspector.source_path = Some(path_ref.to_path_buf());
        Ok(inspector)
    }

    /// Parse PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            Image2PdfError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
            file_size: data.len() as u64,
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Path given to [`PdfInspector::open`], if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Media box sizes of every page, in page order.
    pub fn page_sizes(&self) -> Vec<(f32, f32)> {
        self.document
            .get_pages()
            .values()
            .map(|&id| self.media_box(id).unwrap_or((0.0, 0.0)))
            .collect()
    }

    /// Title, author and the rest of the /Info dictionary. Missing entries
    /// are `None`.
    pub fn metadata(&self) -> PdfMetadata {
        let Some(info) = self.info_dictionary() else {
            return PdfMetadata::default();
        };
        let field = |key: &[u8]| {
            info.get(key)
                .ok()
                .and_then(|obj| obj.as_str().ok())
                .map(decode_text_string)
                .filter(|s| !s.is_empty())
        };
        PdfMetadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
            creation_date: field(b"CreationDate"),
        }
    }

    /// Page count, size and metadata in one structure.
    pub fn info(&self) -> PdfInfo {
        PdfInfo {
            file_name: self
                .source_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            path: self.source_path.clone(),
            page_count: self.page_count(),
            file_size: self.file_size,
            page_sizes: self.page_sizes(),
            metadata: self.metadata(),
        }
    }

    /// Merge this document with other PDF byte slices. Pages appear in the
    /// order: self, then each supplied document in order.
    #[instrument(skip_all, fields(additional_count = others.len()))]
    pub fn merge(&self, others: &[&[u8]]) -> Result<Vec<u8>> {
        info!(
            base_pages = self.page_count(),
            additional_documents = others.len(),
            "Merging PDFs"
        );

        let mut merged = self.document.clone();

        for (index, other_bytes) in others.iter().enumerate() {
            let other_doc = Document::load_mem(other_bytes).map_err(|err| {
                Image2PdfError::PdfError(format!(
                    "failed to load additional PDF #{}: {}",
                    index + 1,
                    err
                ))
            })?;

            // get_pages is keyed by page number, so iteration is in page order.
            // One cloner per source keeps shared objects shared.
            let mut cloner = ObjectCloner::new(&other_doc);
            for (_, page_id) in other_doc.get_pages() {
                cloner.append_page(&mut merged, page_id)?;
            }
        }

        merged.compress();
        let mut output = Vec::new();
        merged.save_to(&mut output).map_err(|err| {
            Image2PdfError::PdfError(format!("failed to serialise merged PDF: {}", err))
        })?;

        debug!(output_bytes = output.len(), "Merge complete");
        Ok(output)
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        match self.document.trailer.get(b"Info").ok()? {
            Object::Reference(id) => self.document.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    fn media_box(&self, page_id: ObjectId) -> Option<(f32, f32)> {
        let mut dict = self.document.get_dictionary(page_id).ok()?;
        // MediaBox is inheritable; walk up the page tree until one is found.
        loop {
            if let Ok(mb) = dict.get(b"MediaBox") {
                let mb = match mb {
                    Object::Reference(id) => self.document.get_object(*id).ok()?,
                    other => other,
                };
                let values: Vec<f32> = mb
                    .as_array()
                    .ok()?
                    .iter()
                    .filter_map(|v| v.as_float().ok())
                    .collect();
                if let [x0, y0, x1, y1] = values[..] {
                    return Some(((x1 - x0).abs(), (y1 - y0).abs()));
                }
                return None;
            }
            let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
            dict = self.document.get_dictionary(parent).ok()?;
        }
    }
}

/// Merge the PDFs at `inputs`, in order, into `output`.
///
/// Missing inputs are skipped with a warning; it is an error if none exist.
/// The output is written atomically.
#[instrument(skip_all, fields(inputs = inputs.len(), output = %output.as_ref().display()))]
pub fn merge_files<P: AsRef<Path>>(inputs: &[P], output: impl AsRef<Path>) -> Result<OutputSummary> {
    let output = output.as_ref();
    let mut existing = Vec::with_capacity(inputs.len());
    for path in inputs {
        let path = path.as_ref();
        if path.is_file() {
            existing.push(path);
        } else {
            warn!(path = %path.display(), "Skipping missing PDF");
        }
    }

    let Some((first, rest)) = existing.split_first() else {
        return Err(Image2PdfError::InvalidJob(
            "none of the PDFs to merge exist".into(),
        ));
    };

    let base = PdfInspector::open(first)?;
    let others = rest
        .iter()
        .map(std::fs::read)
        .collect::<std::io::Result<Vec<_>>>()?;
    let other_slices: Vec<&[u8]> = others.iter().map(Vec::as_slice).collect();
    let merged = base.merge(&other_slices)?;
    let page_count = PdfInspector::from_bytes(&merged)?.page_count();

    let bytes = write_atomically(output, |w| Ok(w.write_all(&merged)?))?;
    info!(page_count, bytes, "Merged PDF written");
    Ok(OutputSummary {
        path: output.to_path_buf(),
        page_count,
        bytes,
        sha256: sha256_hex(&merged),
    })
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies objects from one document into another, following references.
///
/// Every source object is copied at most once: the target id is reserved and
/// recorded before the object's own references are followed, so cycles such
/// as an annotation's /P pointing back at its page resolve to the copy.
struct ObjectCloner<'a> {
    source: &'a Document,
    ids: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCloner<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            ids: HashMap::new(),
        }
    }

    /// Copy page `page_id` (and everything it references) into `target` and
    /// append it as the last page. Inherited attributes are copied onto the
    /// page, since its source ancestors are not.
    fn append_page(&mut self, target: &mut Document, page_id: ObjectId) -> Result<()> {
        let cloned_id = match self.clone_reference(target, page_id)? {
            Object::Reference(id) => id,
            _ => {
                return Err(Image2PdfError::PdfError(format!(
                    "cannot read page object {:?}",
                    page_id
                )));
            }
        };

        let mut inherited = Vec::new();
        for key in INHERITABLE {
            if let Some(value) = self.inherited_attribute(page_id, key) {
                inherited.push((key, self.clone_object(target, &value)?));
            }
        }

        let pages_id = target
            .catalog()
            .map_err(|err| Image2PdfError::PdfError(format!("no catalog: {}", err)))
            .and_then(|catalog| {
                catalog
                    .get(b"Pages")
                    .and_then(Object::as_reference)
                    .map_err(|err| Image2PdfError::PdfError(format!("no /Pages reference: {}", err)))
            })?;

        if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
            if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
                kids.push(Object::Reference(cloned_id));
            }
            if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
                *count += 1;
            }
        }

        if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
            page_dict.set("Parent", Object::Reference(pages_id));
            for (key, value) in inherited {
                if !page_dict.has(key) {
                    page_dict.set(key, value);
                }
            }
        }
        Ok(())
    }

    /// `key` from the nearest ancestor of `page_id`, when the page itself
    /// lacks it.
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let page = self.source.get_dictionary(page_id).ok()?;
        if page.has(key) {
            return None;
        }
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        // Depth bound guards against a malformed, cyclic page tree.
        for _ in 0..64 {
            let node = self.source.get_dictionary(parent?).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    /// Copy `object`, replacing every reference with one into `target`.
    /// /Parent entries are dropped; the page tree is rebuilt by the caller.
    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.clone_dict(target, dict)?)),
            Object::Array(items) => items
                .iter()
                .map(|item| self.clone_object(target, item))
                .collect::<Result<Vec<_>>>()
                .map(Object::Array),
            Object::Reference(id) => self.clone_reference(target, *id),
            Object::Stream(stream) => Ok(Object::Stream(lopdf::Stream::new(
                self.clone_dict(target, &stream.dict)?,
                stream.content.clone(),
            ))),
            other => Ok(other.clone()),
        }
    }

    fn clone_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.clone_object(target, value)?);
        }
        Ok(copy)
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Result<Object> {
        if let Some(&copied) = self.ids.get(&id) {
            return Ok(Object::Reference(copied));
        }
        let referenced = match self.source.get_object(id) {
            Ok(object) => object,
            Err(err) => {
                warn!(ref_id = ?id, %err, "Cannot resolve reference, using Null");
                return Ok(Object::Null);
            }
        };

        let copied = target.new_object_id();
        self.ids.insert(id, copied);
        let object = self.clone_object(target, referenced)?;
        target.objects.insert(copied, object);
        Ok(Object::Reference(copied))
    }
}
