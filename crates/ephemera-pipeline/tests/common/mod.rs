// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ephemera_core::types::{ArtifactId, DocumentType};
use ephemera_core::PaperSize;
use ephemera_document::{DocumentProcessor, UnavailableOcr};
use ephemera_pipeline::Pipeline;
use ephemera_store::ArtifactStore;
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<ArtifactStore>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path(), 16 * 1024 * 1024).unwrap());
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            Arc::new(DocumentProcessor::new(PaperSize::A4)),
            Arc::new(UnavailableOcr),
            Duration::from_secs(60),
        );
        Self {
            dir,
            store,
            pipeline,
        }
    }

    pub fn put(&self, bytes: &[u8], name: &str, content_type: DocumentType) -> ArtifactId {
        self.store.create(bytes, name, content_type).unwrap().id
    }

    pub fn artifact_count(&self) -> usize {
        self.store.list().unwrap().artifacts.len()
    }
}

/// One page per entry, each drawing that entry as text. With `fields`, the
/// document also carries an AcroForm of text fields with those names.
pub fn pdf_with(texts: &[&str], fields: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut kids = Vec::new();
    for text in texts {
        let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    if !fields.is_empty() {
        let refs = fields
            .iter()
            .map(|name| {
                let mut field = Dictionary::new();
                field.set("FT", Object::Name(b"Tx".to_vec()));
                field.set(
                    "T",
                    Object::String(name.as_bytes().to_vec(), StringFormat::Literal),
                );
                Object::Reference(doc.add_object(Object::Dictionary(field)))
            })
            .collect();
        let mut acroform = Dictionary::new();
        acroform.set("Fields", Object::Array(refs));
        catalog.set("AcroForm", Object::Dictionary(acroform));
    }

    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn pdf(texts: &[&str]) -> Vec<u8> {
    pdf_with(texts, &[])
}

/// Decompressed content of every page, in page order.
pub fn page_contents(pdf: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| doc.get_page_content(id).unwrap())
        .collect()
}

pub fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

/// A small opaque PNG.
pub fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 8, image::Rgba([20, 20, 160, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}
