// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic fixtures for unit tests.

use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

/// A PDF with one page per entry, each showing that entry as text.
///
/// The font and media box live on the page tree root so pages have to
/// inherit them.
pub(crate) fn sample_pdf(texts: &[&str]) -> Vec<u8> {
    build(texts, None)
}

/// Like [`sample_pdf`], with an AcroForm holding the given text fields plus
/// one checkbox named `agree`.
pub(crate) fn form_pdf(text_fields: &[&str]) -> Vec<u8> {
    build(&["form"], Some(text_fields))
}

fn build(texts: &[&str], fields: Option<&[&str]>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    let resources_id = doc.add_object(Object::Dictionary(resources));

    let mut kids = Vec::new();
    let mut first_page = None;
    for text in texts {
        let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        let page_id = doc.add_object(Object::Dictionary(page));
        first_page.get_or_insert(page_id);
        kids.push(Object::Reference(page_id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    pages.set("Resources", Object::Reference(resources_id));
    pages.set(
        "MediaBox",
        Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    if let (Some(names), Some(page_id)) = (fields, first_page) {
        let mut field_refs = Vec::new();
        for name in names {
            field_refs.push(Object::Reference(add_field(&mut doc, page_id, name, b"Tx")));
        }
        field_refs.push(Object::Reference(add_field(&mut doc, page_id, "agree", b"Btn")));

        let mut acroform = Dictionary::new();
        acroform.set("Fields", Object::Array(field_refs));
        catalog.set("AcroForm", Object::Dictionary(acroform));
    }

    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn add_field(doc: &mut Document, page_id: lopdf::ObjectId, name: &str, kind: &[u8]) -> lopdf::ObjectId {
    let mut field = Dictionary::new();
    field.set("Type", Object::Name(b"Annot".to_vec()));
    field.set("Subtype", Object::Name(b"Widget".to_vec()));
    field.set("FT", Object::Name(kind.to_vec()));
    field.set(
        "T",
        Object::String(name.as_bytes().to_vec(), StringFormat::Literal),
    );
    field.set("P", Object::Reference(page_id));
    field.set(
        "Rect",
        Object::Array(vec![Object::Integer(72), Object::Integer(600), Object::Integer(300), Object::Integer(620)]),
    );
    doc.add_object(Object::Dictionary(field))
}

/// The literal strings shown on each page, in page order.
pub(crate) fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            literal_strings(&content).join("")
        })
        .collect()
}

/// Raw content of every page, concatenated per page.
pub(crate) fn page_contents(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned())
        .collect()
}

fn literal_strings(content: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(content);
    let mut out = Vec::new();
    let mut rest = text.as_ref();
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        match after.find(')') {
            Some(close) => {
                out.push(after[..close].to_string());
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    out
}

/// A small RGBA PNG with a transparent border.
pub(crate) fn signature_png() -> Vec<u8> {
    let img = ::image::RgbaImage::from_fn(20, 10, |x, y| {
        if x == 0 || y == 0 {
            ::image::Rgba([0, 0, 0, 0])
        } else {
            ::image::Rgba([10, 20, 200, 255])
        }
    });
    let mut out = Vec::new();
    ::image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ::image::ImageFormat::Png)
        .unwrap();
    out
}

/// An opaque RGB image encoded as JPEG.
pub(crate) fn photo_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = ::image::RgbImage::from_fn(width, height, |x, y| {
        ::image::Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    let encoder = ::image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95);
    img.write_with_encoder(encoder).unwrap();
    out
}
