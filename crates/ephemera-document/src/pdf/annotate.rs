// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page overlays — black-box redaction and signature stamping.
//
// Both work the same way: the page's existing content is wrapped in a
// `q ... Q` pair so its graphics state cannot leak, and a new content stream
// is appended that paints on top.

use std::collections::BTreeMap;

use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::{RedactRegion, SignatureStamp};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;
use crate::pdf::reader::{PdfReader, inherited, page_id, save};

/// Paint opaque black rectangles over the given regions.
#[instrument(skip_all, fields(regions = regions.len()))]
pub fn redact(pdf: &[u8], regions: &[RedactRegion]) -> Result<Vec<u8>> {
    let mut document = PdfReader::from_bytes(pdf)?.into_document();

    let mut by_page: BTreeMap<u32, Vec<&RedactRegion>> = BTreeMap::new();
    for region in regions {
        by_page.entry(region.page).or_default().push(region);
    }

    // Resolve every page first so a bad index fails before anything changes.
    let targets = by_page
        .keys()
        .map(|&page| page_id(&document, page).map(|id| (page, id)))
        .collect::<Result<Vec<_>>>()?;

    for (page, id) in targets {
        let mut ops = String::from("q 0 0 0 rg\n");
        for region in &by_page[&page] {
            ops.push_str(&format!(
                "{} {} {} {} re f\n",
                num(region.x),
                num(region.y),
                num(region.width),
                num(region.height)
            ));
        }
        ops.push_str("Q\n");
        overlay(&mut document, id, ops.into_bytes())?;
        debug!(page, boxes = by_page[&page].len(), "Page redacted");
    }

    info!(pages = by_page.len(), "Redaction applied");
    save(&mut document)
}

/// Draw a signature image at `(x, y)` on one page.
///
/// The image is sized at one point per pixel times `scale`. Transparency is
/// kept through a soft mask so signatures on a clear background do not
/// cover the page.
#[instrument(skip_all, fields(page = stamp.page, scale = stamp.scale))]
pub fn sign(pdf: &[u8], stamp: &SignatureStamp) -> Result<Vec<u8>> {
    let mut document = PdfReader::from_bytes(pdf)?.into_document();
    let target = page_id(&document, stamp.page)?;

    let signature = ImageProcessor::from_bytes(&stamp.image).map_err(|_| {
        EphemeraError::Validation("signature image must be a PNG or JPEG".into())
    })?;
    let image_id = add_image_xobject(&mut document, &signature)?;
    let name = register_xobject(&mut document, target, image_id)?;

    let width = signature.width() as f32 * stamp.scale;
    let height = signature.height() as f32 * stamp.scale;
    let ops = format!(
        "q {} 0 0 {} {} {} cm /{name} Do Q\n",
        num(width),
        num(height),
        num(stamp.x),
        num(stamp.y)
    );
    overlay(&mut document, target, ops.into_bytes())?;

    info!(width, height, "Signature placed");
    save(&mut document)
}

/// PDF number with no exponent and at most two decimals.
fn num(value: f32) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Append `ops` to the page, isolating the existing content first.
fn overlay(document: &mut Document, page: ObjectId, ops: Vec<u8>) -> Result<()> {
    let existing = match document.get_dictionary(page).map(|d| d.get(b"Contents")) {
        Ok(Ok(Object::Reference(id))) => vec![Object::Reference(*id)],
        Ok(Ok(Object::Array(items))) => items.clone(),
        Ok(Err(_)) => Vec::new(),
        Ok(Ok(_)) => {
            return Err(EphemeraError::TransformFailed(
                "page /Contents is neither a stream reference nor an array".into(),
            ));
        }
        Err(err) => {
            return Err(EphemeraError::TransformFailed(format!(
                "cannot read page object {page:?}: {err}"
            )));
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let open = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
    }

    let mut tail = Vec::with_capacity(ops.len() + 2);
    if !contents.is_empty() {
        tail.extend_from_slice(b"Q\n");
    }
    tail.extend_from_slice(&ops);
    let tail_id = document.add_object(Stream::new(Dictionary::new(), tail));
    contents.push(Object::Reference(tail_id));

    document
        .get_dictionary_mut(page)
        .map_err(|err| EphemeraError::TransformFailed(format!("cannot update page: {err}")))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Store the image as an 8-bit RGB XObject, with an /SMask when it has
/// transparency.
fn add_image_xobject(document: &mut Document, image: &ImageProcessor) -> Result<ObjectId> {
    let rgba = image.as_dynamic().to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let smask = if image.has_transparency() {
        let dict = image_dictionary(width, height, b"DeviceGray");
        Some(document.add_object(compressed(dict, alpha)?))
    } else {
        None
    };

    let mut dict = image_dictionary(width, height, b"DeviceRGB");
    if let Some(mask) = smask {
        dict.set("SMask", Object::Reference(mask));
    }
    Ok(document.add_object(compressed(dict, rgb)?))
}

fn image_dictionary(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

fn compressed(dict: Dictionary, content: Vec<u8>) -> Result<Stream> {
    let mut stream = Stream::new(dict, content);
    stream
        .compress()
        .map_err(|err| EphemeraError::TransformFailed(format!("stream compression failed: {err}")))?;
    Ok(stream)
}

/// Give the page its own resource dictionary containing `xobject` under a
/// fresh name, and return that name.
///
/// Resources are often shared between pages (or inherited from the page
/// tree), so the page gets an inline copy rather than an edit in place.
fn register_xobject(document: &mut Document, page: ObjectId, xobject: ObjectId) -> Result<String> {
    let page_dict = document
        .get_dictionary(page)
        .map_err(|err| EphemeraError::TransformFailed(format!("cannot read page: {err}")))?;

    let mut resources = match inherited(document, page_dict, b"Resources") {
        Some(Object::Reference(id)) => document
            .get_dictionary(*id)
            .map(Dictionary::clone)
            .unwrap_or_else(|_| Dictionary::new()),
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => document
            .get_dictionary(*id)
            .map(Dictionary::clone)
            .unwrap_or_else(|_| Dictionary::new()),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let name = (1..)
        .map(|n| format!("EphSig{n}"))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| "EphSig".to_string());

    xobjects.set(name.clone(), Object::Reference(xobject));
    resources.set("XObject", Object::Dictionary(xobjects));

    document
        .get_dictionary_mut(page)
        .map_err(|err| EphemeraError::TransformFailed(format!("cannot update page: {err}")))?
        .set("Resources", Object::Dictionary(resources));
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{page_contents, page_texts, photo_jpeg, sample_pdf, signature_png};

    fn region(page: u32) -> RedactRegion {
        RedactRegion {
            page,
            x: 70.0,
            y: 710.0,
            width: 120.5,
            height: 30.0,
        }
    }

    #[test]
    fn redaction_paints_over_the_right_page() {
        let pdf = sample_pdf(&["keep", "secret"]);
        let out = redact(&pdf, &[region(1)]).unwrap();

        let contents = page_contents(&out);
        assert!(!contents[0].contains(" re f"));
        assert!(contents[1].contains("70 710 120.5 30 re f"));
        // Original text is still underneath; page text order is unchanged.
        assert_eq!(page_texts(&out), vec!["keep", "secret"]);
    }

    #[test]
    fn redaction_keeps_graphics_state_balanced() {
        let out = redact(&sample_pdf(&["a"]), &[region(0), region(0)]).unwrap();
        let content = &page_contents(&out)[0];
        assert_eq!(content.matches('q').count(), content.matches('Q').count());
        assert_eq!(content.matches(" re f").count(), 2);
    }

    #[test]
    fn redaction_on_missing_page_is_a_validation_error() {
        let result = redact(&sample_pdf(&["a"]), &[region(0), region(5)]);
        assert!(matches!(result, Err(EphemeraError::Validation(_))));
    }

    #[test]
    fn signature_is_drawn_with_soft_mask() {
        let stamp = SignatureStamp {
            page: 0,
            x: 100.0,
            y: 50.0,
            scale: 2.0,
            image: signature_png(),
        };
        let out = sign(&sample_pdf(&["contract"]), &stamp).unwrap();

        let content = &page_contents(&out)[0];
        assert!(content.contains("40 0 0 20 100 50 cm /EphSig1 Do"));

        let doc = Document::load_mem(&out).unwrap();
        let page = doc.get_dictionary(*doc.get_pages().get(&1).unwrap()).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"EphSig1").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert!(image.dict.has(b"SMask"));
        // The page still finds its font.
        assert!(resources.has(b"Font"));
    }

    #[test]
    fn opaque_signature_has_no_mask() {
        let stamp = SignatureStamp {
            page: 0,
            x: 0.0,
            y: 0.0,
            scale: 0.5,
            image: photo_jpeg(8, 8),
        };
        let out = sign(&sample_pdf(&["a"]), &stamp).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        let has_mask = doc.objects.values().any(|obj| {
            obj.as_stream()
                .map(|s| s.dict.has(b"SMask"))
                .unwrap_or(false)
        });
        assert!(!has_mask);
    }

    #[test]
    fn signature_on_missing_page_is_rejected() {
        let stamp = SignatureStamp {
            page: 3,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            image: signature_png(),
        };
        assert!(matches!(
            sign(&sample_pdf(&["a"]), &stamp),
            Err(EphemeraError::Validation(_))
        ));
    }

    #[test]
    fn undecodable_signature_is_rejected() {
        let stamp = SignatureStamp {
            page: 0,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            image: b"not an image".to_vec(),
        };
        assert!(matches!(
            sign(&sample_pdf(&["a"]), &stamp),
            Err(EphemeraError::Validation(_))
        ));
    }

    #[test]
    fn numbers_are_formatted_compactly() {
        assert_eq!(num(72.0), "72");
        assert_eq!(num(120.5), "120.5");
        assert_eq!(num(0.126), "0.13");
        assert_eq!(num(-3.0), "-3");
    }
}
