// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF size reduction in three tiers.
//
//   high   — lossless: drop unreachable objects and empty streams, flate
//            every uncompressed stream.
//   medium — high, plus strip document metadata (Info, XMP, thumbnails,
//            PieceInfo).
//   low    — medium, plus re-encode RGB/Gray JPEG images at reduced quality
//            where that makes them smaller.

use ephemera_core::error::Result;
use ephemera_core::ops::Quality;
use lopdf::{Document, Object};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;
use crate::pdf::reader::{PdfReader, save};

/// JPEG quality used by the `low` tier.
const LOW_TIER_JPEG_QUALITY: u8 = 40;

/// Compress `pdf`. The result is never larger than the input: if a tier
/// would grow the file, the input bytes come back unchanged.
#[instrument(skip(pdf), fields(input_bytes = pdf.len()))]
pub fn compress(pdf: &[u8], quality: Quality) -> Result<Vec<u8>> {
    let mut document = PdfReader::from_bytes(pdf)?.into_document();

    if matches!(quality, Quality::Medium | Quality::Low) {
        strip_metadata(&mut document);
    }
    if quality == Quality::Low {
        let recoded = downsample_jpegs(&mut document);
        debug!(recoded, "JPEG images re-encoded");
    }

    let pruned = document.prune_objects();
    let emptied = document.delete_zero_length_streams();
    document.renumber_objects();
    document.compress();
    debug!(pruned = pruned.len(), emptied = emptied.len(), "Object graph cleaned");

    let output = save(&mut document)?;
    if output.len() >= pdf.len() {
        info!(input_bytes = pdf.len(), "Compression gained nothing, keeping input");
        return Ok(pdf.to_vec());
    }

    info!(
        input_bytes = pdf.len(),
        output_bytes = output.len(),
        "Compression complete"
    );
    Ok(output)
}

/// Remove metadata that does not affect rendering.
fn strip_metadata(document: &mut Document) {
    document.trailer.remove(b"Info");

    if let Ok(root) = document.trailer.get(b"Root").and_then(Object::as_reference)
        && let Ok(catalog) = document.get_dictionary_mut(root)
    {
        catalog.remove(b"Metadata");
        catalog.remove(b"PieceInfo");
    }

    for page_id in document.get_pages().into_values() {
        if let Ok(page) = document.get_dictionary_mut(page_id) {
            page.remove(b"Thumb");
            page.remove(b"PieceInfo");
            page.remove(b"Metadata");
        }
    }
}

/// Re-encode DCT images in place. Returns how many got smaller.
fn downsample_jpegs(document: &mut Document) -> usize {
    let mut recoded = 0;
    for object in document.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_plain_dct_image(&stream.dict) {
            continue;
        }

        let smaller = ImageProcessor::from_bytes(&stream.content)
            .and_then(|img| img.to_jpeg_bytes(LOW_TIER_JPEG_QUALITY))
            .ok()
            .filter(|jpeg| jpeg.len() < stream.content.len());

        if let Some(jpeg) = smaller {
            stream.set_content(jpeg);
            recoded += 1;
        }
    }
    recoded
}

/// Only 8-bit DeviceRGB/DeviceGray images with a single DCTDecode filter are
/// touched; anything else (CMYK, ICC, masks, chained filters) is left alone.
fn is_plain_dct_image(dict: &lopdf::Dictionary) -> bool {
    let name_is = |key: &[u8], expected: &[u8]| {
        matches!(dict.get(key), Ok(Object::Name(name)) if name.as_slice() == expected)
    };

    let single_dct = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name.as_slice() == b"DCTDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1
                && matches!(&filters[0], Object::Name(name) if name.as_slice() == b"DCTDecode")
        }
        _ => false,
    };

    name_is(b"Subtype", b"Image")
        && single_dct
        && (name_is(b"ColorSpace", b"DeviceRGB") || name_is(b"ColorSpace", b"DeviceGray"))
        && matches!(dict.get(b"BitsPerComponent"), Ok(Object::Integer(8)))
        && !dict.has(b"SMask")
        && !dict.has(b"Mask")
}

#[cfg(test)]
mod tests {
    use lopdf::{Dictionary, Stream, StringFormat};

    use super::*;
    use crate::test_support::{page_texts, photo_jpeg, sample_pdf};

    /// sample_pdf plus an Info dictionary and a large noisy JPEG on page 0.
    fn heavy_pdf() -> Vec<u8> {
        let mut doc = Document::load_mem(&sample_pdf(&["cover", "body"])).unwrap();

        let mut info = Dictionary::new();
        info.set(
            "Producer",
            Object::String(b"x".repeat(4096), StringFormat::Literal),
        );
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut image = Dictionary::new();
        image.set("Type", Object::Name(b"XObject".to_vec()));
        image.set("Subtype", Object::Name(b"Image".to_vec()));
        image.set("Width", Object::Integer(256));
        image.set("Height", Object::Integer(256));
        image.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image.set("BitsPerComponent", Object::Integer(8));
        image.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let image_id = doc.add_object(Stream::new(image, photo_jpeg(256, 256)));

        let page_id = *doc.get_pages().get(&1).unwrap();
        let mut xobjects = Dictionary::new();
        xobjects.set("Im1", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Resources", Object::Dictionary(resources));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn every_tier_is_no_larger_and_keeps_pages() {
        let input = heavy_pdf();
        for quality in [Quality::High, Quality::Medium, Quality::Low] {
            let output = compress(&input, quality).unwrap();
            assert!(output.len() <= input.len(), "{quality:?} grew the file");
            assert_eq!(page_texts(&output), vec!["cover", "body"]);
        }
    }

    #[test]
    fn lower_tiers_are_at_least_as_small() {
        let input = heavy_pdf();
        let high = compress(&input, Quality::High).unwrap();
        let medium = compress(&input, Quality::Medium).unwrap();
        let low = compress(&input, Quality::Low).unwrap();
        assert!(medium.len() < high.len());
        assert!(low.len() < medium.len());
    }

    #[test]
    fn medium_drops_info_dictionary() {
        let output = compress(&heavy_pdf(), Quality::Medium).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        assert!(doc.trailer.get(b"Info").is_err());
    }

    #[test]
    fn only_plain_dct_images_qualify() {
        let mut dict = Dictionary::new();
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("ColorSpace", Object::Name(b"DeviceCMYK".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        assert!(!is_plain_dct_image(&dict));

        dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
        assert!(is_plain_dct_image(&dict));
    }
}
