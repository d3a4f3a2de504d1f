// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode PNG/JPEG payloads and re-encode them, using the
// `image` crate.

use ::image::{DynamicImage, ImageFormat};
use ephemera_core::error::{EphemeraError, Result};
use tracing::{debug, instrument};

/// A single decoded image.
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Decode raw encoded bytes (JPEG, PNG).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = ::image::load_from_memory(data).map_err(|err| {
            EphemeraError::TransformFailed(format!("failed to decode image: {err}"))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether any pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.image.color().has_alpha() && self.image.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Encode as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| EphemeraError::TransformFailed(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Encode as baseline JPEG at `quality` (1-100). Transparency is flattened
    /// onto white, since JPEG has no alpha channel.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = ::image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        let encoded = if self.image.color().has_color() {
            flatten_rgb(&self.image).write_with_encoder(encoder)
        } else {
            self.image.to_luma8().write_with_encoder(encoder)
        };
        encoded
            .map_err(|err| EphemeraError::TransformFailed(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// RGB copy of `image` with alpha composited over white.
fn flatten_rgb(image: &DynamicImage) -> ::image::RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    ::image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
        ::image::Rgb([blend(r), blend(g), blend(b)])
    })
}
