// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — render plain text or a raster image into a new PDF using
// `printpdf` 0.8.
//
// printpdf 0.8 is data-oriented: pages are `PdfPage` values holding `Vec<Op>`
// operation lists, serialised in one go by `PdfDocument::save()`.

use ephemera_core::PaperSize;
use ephemera_core::error::Result;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;

const FONT_SIZE_PT: f32 = 11.0;
const LINE_HEIGHT_PT: f32 = 14.0;
const TEXT_MARGIN_MM: f32 = 20.0;
const IMAGE_MARGIN_MM: f32 = 15.0;
/// Resolution assumed for images that carry no DPI of their own.
const IMAGE_DPI: f32 = 150.0;

/// Creates new PDF documents from text or images.
pub struct PdfWriter {
    paper_size: PaperSize,
    title: Option<String>,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            title: None,
        }
    }

    /// Title stored in the PDF /Info dictionary.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Lay `text` out top to bottom in Helvetica, wrapping long lines and
    /// breaking pages as needed. Empty text yields one blank page.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn create_from_text(&self, text: &str) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Ephemera Document");
        info!(paper = ?self.paper_size, "Rendering text to PDF");

        let margin_pt = Mm(TEXT_MARGIN_MM).into_pt().0;
        let usable_width_mm = page_w.0 - 2.0 * TEXT_MARGIN_MM;

        // Average Helvetica glyph is about half the font size wide (1 pt = 0.3528 mm).
        let avg_char_width_mm = 0.50 * FONT_SIZE_PT * 0.3528;
        let max_chars_per_line = ((usable_width_mm / avg_char_width_mm) as usize).max(1);

        let wrapped_lines = wrap_text(text, max_chars_per_line);
        let page_h_pt = page_h.into_pt().0;
        let lines_per_page = (((page_h_pt - 2.0 * margin_pt) / LINE_HEIGHT_PT) as usize).max(1);

        let mut pages: Vec<PdfPage> = wrapped_lines
            .chunks(lines_per_page)
            .map(|chunk| {
                let ops = chunk
                    .iter()
                    .enumerate()
                    .flat_map(|(line_idx, line)| {
                        let y_pt = page_h_pt - margin_pt - (line_idx as f32 * LINE_HEIGHT_PT);
                        [
                            Op::StartTextSection,
                            Op::SetTextCursor {
                                pos: Point {
                                    x: Pt(margin_pt),
                                    y: Pt(y_pt),
                                },
                            },
                            Op::SetFontSizeBuiltinFont {
                                size: Pt(FONT_SIZE_PT),
                                font: BuiltinFont::Helvetica,
                            },
                            Op::WriteTextBuiltinFont {
                                items: vec![TextItem::Text(line.clone())],
                                font: BuiltinFont::Helvetica,
                            },
                            Op::EndTextSection,
                        ]
                    })
                    .collect();
                PdfPage::new(page_w, page_h, ops)
            })
            .collect();

        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        debug!(
            total_lines = wrapped_lines.len(),
            pages = pages.len(),
            "Text layout complete"
        );

        let mut doc = PdfDocument::new(title);
        doc.with_pages(pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }

    /// Place one image on a single page, scaled down to fit inside the
    /// margins (never up) and centred.
    #[instrument(skip(self, image_bytes), fields(bytes_len = image_bytes.len()))]
    pub fn create_from_image(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Ephemera Image");
        info!(paper = ?self.paper_size, "Rendering image to PDF");

        let processor = ImageProcessor::from_bytes(image_bytes)?;
        let img_width = processor.width() as usize;
        let img_height = processor.height() as usize;

        let rgb_image = processor.as_dynamic().to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        let usable_w_pt = Mm(page_w.0 - 2.0 * IMAGE_MARGIN_MM).into_pt().0;
        let usable_h_pt = Mm(page_h.0 - 2.0 * IMAGE_MARGIN_MM).into_pt().0;

        let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
        let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;
        let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt).min(1.0);

        let rendered_w_pt = img_w_pt * scale;
        let rendered_h_pt = img_h_pt * scale;
        let margin_pt = Mm(IMAGE_MARGIN_MM).into_pt().0;
        let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
        let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x_offset)),
                translate_y: Some(Pt(y_offset)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        }];

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);
        debug!(rendered_w_pt, rendered_h_pt, scale, "Image placed on page");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }
}

/// Wrap a multi-line string so no line exceeds `max_width` characters.
///
/// Existing newlines are kept; words longer than a line are force-broken on
/// character boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current.is_empty() {
                current.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
                current_len = word_len;
            }
        }

        result.push(current);
    }

    // Trailing blank lines add nothing visible.
    while result.last().is_some_and(|line| line.is_empty()) {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfReader;
    use crate::test_support::photo_jpeg;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_breaks_long_words() {
        let lines = wrap_text("abcdefghijkl", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn wrap_keeps_blank_lines_between_paragraphs() {
        let lines = wrap_text("first\n\nsecond\n\n", 40);
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn long_text_spans_pages() {
        let text = "line\n".repeat(200);
        let pdf = PdfWriter::new(PaperSize::A4).create_from_text(&text).unwrap();
        assert!(PdfReader::from_bytes(&pdf).unwrap().page_count() >= 2);
    }

    #[test]
    fn empty_text_gives_one_blank_page() {
        let pdf = PdfWriter::new(PaperSize::Letter).create_from_text("").unwrap();
        assert_eq!(PdfReader::from_bytes(&pdf).unwrap().page_count(), 1);
    }

    #[test]
    fn image_becomes_single_page() {
        let pdf = PdfWriter::new(PaperSize::A4)
            .create_from_image(&photo_jpeg(64, 48))
            .unwrap();
        assert_eq!(PdfReader::from_bytes(&pdf).unwrap().page_count(), 1);
    }
}
