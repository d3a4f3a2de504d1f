// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — load existing PDFs and rebuild page subsets (merge, split)
// using the `lopdf` crate.

use std::collections::HashMap;

use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::PageRange;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed page trees whose /Parent chain loops.
const MAX_TREE_DEPTH: usize = 64;

/// A parsed PDF.
///
/// Page numbers in this API are 0-based. lopdf numbers pages from 1, so the
/// conversion happens here and nowhere else.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Parse PDF bytes already in memory.
    ///
    /// Encrypted PDFs are refused: the store only handles documents it can
    /// read without a password.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            EphemeraError::TransformFailed(format!("failed to load PDF: {err}"))
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(EphemeraError::UnsupportedFormat(
                "password-protected PDFs cannot be processed".into(),
            ));
        }

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: u32) -> Result<ObjectId> {
        page_id(&self.document, index)
    }

    /// Concatenate every page of every document, in slice order.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn merge(documents: &[&[u8]]) -> Result<Vec<u8>> {
        let mut builder = PageTreeBuilder::new();

        for (index, bytes) in documents.iter().enumerate() {
            let reader = Self::from_bytes(bytes).map_err(|err| match err {
                EphemeraError::TransformFailed(msg) => {
                    EphemeraError::TransformFailed(format!("input #{index}: {msg}"))
                }
                other => other,
            })?;

            // Shared resources are copied once per input, not once per page.
            let mut copier = PageCopier::new(&reader.document);
            for page_id in reader.document.get_pages().into_values() {
                builder.append(&mut copier, page_id)?;
            }
        }

        info!(pages = builder.page_count(), "Merge complete");
        builder.finish()
    }

    /// Build one standalone PDF per range, in range order.
    ///
    /// All ranges are checked against the page count before any output is
    /// produced.
    #[instrument(skip(self), fields(pages = self.page_count()))]
    pub fn extract_ranges(&self, ranges: &[PageRange]) -> Result<Vec<Vec<u8>>> {
        if ranges.is_empty() {
            return Err(EphemeraError::Validation(
                "at least one page range is required".into(),
            ));
        }
        let count = self.page_count();
        for range in ranges {
            range.validate(Some(count))?;
        }

        ranges
            .iter()
            .map(|range| {
                let mut builder = PageTreeBuilder::new();
                let mut copier = PageCopier::new(&self.document);
                for index in range.start..=range.end {
                    builder.append(&mut copier, self.page_id(index)?)?;
                }
                debug!(start = range.start, end = range.end, "Range extracted");
                builder.finish()
            })
            .collect()
    }
}

/// Object id of the page at 0-based `index` in `document`.
pub(crate) fn page_id(document: &Document, index: u32) -> Result<ObjectId> {
    let pages = document.get_pages();
    pages.get(&(index + 1)).copied().ok_or_else(|| {
        EphemeraError::Validation(format!(
            "page {index} does not exist (document has {} pages, numbered from 0)",
            pages.len()
        ))
    })
}

/// Serialise a document.
pub(crate) fn save(document: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    document.save_to(&mut output).map_err(|err| {
        EphemeraError::TransformFailed(format!("failed to serialise PDF: {err}"))
    })?;
    Ok(output)
}

/// Look up an attribute a page inherits from the page tree.
pub(crate) fn inherited<'d>(
    document: &'d Document,
    page: &'d Dictionary,
    key: &[u8],
) -> Option<&'d Object> {
    if let Ok(value) = page.get(key) {
        return Some(value);
    }
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = document.get_dictionary(parent_id).ok()?;
        if let Ok(value) = parent.get(key) {
            return Some(value);
        }
        current = parent;
    }
    None
}

/// Assembles a fresh document out of pages copied from other documents.
pub(crate) struct PageTreeBuilder {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PageTreeBuilder {
    pub(crate) fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub(crate) fn append(&mut self, copier: &mut PageCopier<'_>, page_id: ObjectId) -> Result<()> {
        let new_id = copier.copy_page(&mut self.document, page_id, self.pages_id)?;
        self.kids.push(Object::Reference(new_id));
        Ok(())
    }

    /// Write the page tree and catalog, then serialise.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>> {
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.kids.len() as i64));
        pages.set("Kids", Object::Array(self.kids));
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.document.add_object(Object::Dictionary(catalog));
        self.document
            .trailer
            .set("Root", Object::Reference(catalog_id));

        save(&mut self.document)
    }
}

/// Deep-copies pages and everything they reference from one source document.
///
/// Each source object is copied at most once per copier, so reference cycles
/// (annotations pointing back at their page, shared fonts) terminate and
/// shared resources stay shared.
pub(crate) struct PageCopier<'a> {
    source: &'a Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    pub(crate) fn new(source: &'a Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    /// Copy one page into `target` under the page tree node `parent`.
    ///
    /// Inherited attributes are written onto the copy so it renders the same
    /// outside its original page tree.
    fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> Result<ObjectId> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            EphemeraError::TransformFailed(format!("cannot read page object {page_id:?}: {err}"))
        })?;

        let mut flattened = page.clone();
        for key in INHERITABLE {
            if !flattened.has(key)
                && let Some(value) = inherited(source, page, key)
            {
                flattened.set(key.to_vec(), value.clone());
            }
        }

        let new_id = target.new_object_id();
        self.copied.insert(page_id, new_id);

        let mut copy = self.clone_dictionary(target, &flattened);
        copy.set("Parent", Object::Reference(parent));
        target.objects.insert(new_id, Object::Dictionary(copy));
        Ok(new_id)
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(target, dict)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.clone_object(target, item))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.clone_dictionary(target, &stream.dict);
                Object::Stream(copy)
            }
            Object::Reference(id) => self.clone_reference(target, *id),
            other => other.clone(),
        }
    }

    /// /Parent is dropped: page parents are patched by the caller, and other
    /// parent links (outline items, field hierarchies) belong to structures
    /// that are not carried over.
    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.clone_object(target, value));
        }
        copy
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Object {
        if let Some(&new_id) = self.copied.get(&id) {
            return Object::Reference(new_id);
        }

        let source = self.source;
        let Ok(object) = source.get_object(id) else {
            warn!(?id, "Cannot resolve reference, using Null");
            return Object::Null;
        };

        // Links to pages that are not part of the output would drag the whole
        // page (and its content) in as an unreachable object.
        if is_page(object) {
            return Object::Null;
        }

        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);
        let copy = self.clone_object(target, object);
        target.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

fn is_page(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Page"),
        _ => false,
    }
}
