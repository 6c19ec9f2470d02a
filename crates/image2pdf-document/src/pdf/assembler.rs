// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembler — compose one page per image using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: each page is a `PdfPage` holding a
// `Vec<Op>`, images are registered once as XObjects, and the whole document
// is serialised via `PdfDocument::save()`.

use ::image::DynamicImage;
use image2pdf_core::config::AlphaHandling;
use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::{POINTS_PER_INCH, PageSize};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::layout::Placement;

const MM_PER_INCH: f32 = 25.4;

/// Builds a PDF with one image per page, in the order pages are added.
///
/// The assembler is the only writer of the page sequence; callers hand it
/// images strictly in input order.
pub struct PdfAssembler {
    doc: PdfDocument,
    pages: Vec<PdfPage>,
    alpha: AlphaHandling,
}

impl PdfAssembler {
    /// Start an empty document with the given title.
    pub fn new(title: &str, alpha: AlphaHandling) -> Self {
        Self {
            doc: PdfDocument::new(title),
            pages: Vec::new(),
            alpha,
        }
    }

    /// Pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Append a page of size `page` showing `image` at `placement`.
    ///
    /// `index` is the input position, used only to report failures. Returns
    /// the new page's 1-indexed number.
    #[instrument(skip(self, image, placement, page), fields(width = image.width(), height = image.height()))]
    pub fn add_page(
        &mut self,
        index: usize,
        image: DynamicImage,
        placement: &Placement,
        page: PageSize,
    ) -> Result<usize> {
        let serialization = |detail: String| Image2PdfError::Serialization { index, detail };

        let mut processor = ImageProcessor::from_dynamic(image);
        if let Some(window) = placement.source {
            processor = processor
                .crop(window)
                .map_err(|err| serialization(format!("visible window: {err}")))?;
        }
        if processor.as_dynamic().color().has_alpha() {
            match self.alpha {
                AlphaHandling::Flatten => processor = processor.flatten_alpha(),
                AlphaHandling::Reject => {
                    return Err(serialization("image has an alpha channel".into()));
                }
            }
        }

        let sizes = [placement.x, placement.y, placement.width, placement.height];
        if sizes.iter().any(|v| !v.is_finite()) || placement.width <= 0.0 || placement.height <= 0.0
        {
            return Err(serialization(format!("unusable placement {placement:?}")));
        }

        let image = processor.into_dynamic();
        let (px_w, px_h) = (image.width(), image.height());
        let raw = raw_image(image);
        let xobject_id = self.doc.add_image(&raw);

        // At 72 dpi one pixel is one point, so the scale maps pixels onto the
        // placement box directly.
        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x)),
                translate_y: Some(Pt(placement.y)),
                scale_x: Some(placement.width / px_w as f32),
                scale_y: Some(placement.height / px_h as f32),
                dpi: Some(POINTS_PER_INCH),
                rotate: None,
            },
        }];

        self.pages
            .push(PdfPage::new(pt_to_mm(page.width), pt_to_mm(page.height), ops));
        let number = self.pages.len();
        debug!(
            index,
            page = number,
            x = placement.x,
            y = placement.y,
            w = placement.width,
            h = placement.height,
            "Image placed on page"
        );
        Ok(number)
    }

    /// Serialise every page, first-added first, into PDF bytes.
    #[instrument(skip(self), fields(pages = self.pages.len()))]
    pub fn finish(self) -> Result<Vec<u8>> {
        let Self { mut doc, pages, .. } = self;
        if pages.is_empty() {
            return Err(Image2PdfError::InvalidJob(
                "cannot finalize a document without pages".into(),
            ));
        }

        doc.with_pages(pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings while saving");
        }
        info!(bytes = output.len(), "PDF assembled");
        Ok(output)
    }
}

/// Convert an 8-bit image to printpdf's raw form: grey stays single-channel,
/// everything else becomes RGB.
fn raw_image(image: DynamicImage) -> RawImage {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (pixels, data_format) = if image.color().has_color() {
        (image.into_rgb8().into_raw(), RawImageFormat::RGB8)
    } else {
        (image.into_luma8().into_raw(), RawImageFormat::R8)
    };
    RawImage {
        pixels: RawImageData::U8(pixels),
        width,
        height,
        data_format,
        tag: Vec::new(),
    }
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * MM_PER_INCH / POINTS_PER_INCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use image2pdf_core::types::PixelRect;

    fn full_page(page: PageSize) -> Placement {
        Placement {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: page.height,
            source: None,
        }
    }

    fn rgb(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 128, 255])))
    }

    #[test]
    fn pages_are_numbered_in_order() {
        let page = PageSize::new(200.0, 100.0);
        let mut asm = PdfAssembler::new("Test", AlphaHandling::Flatten);
        assert!(asm.is_empty());
        assert_eq!(asm.add_page(0, rgb(20, 10), &full_page(page), page).unwrap(), 1);
        assert_eq!(asm.add_page(1, rgb(10, 20), &full_page(page), page).unwrap(), 2);
        assert_eq!(asm.page_count(), 2);

        let bytes = asm.finish().expect("serialise");
        assert!(bytes.starts_with(b"%PDF"));
        let doc = lopdf::Document::load_mem(&bytes).expect("valid PDF");
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn empty_assembler_cannot_finish() {
        let asm = PdfAssembler::new("Empty", AlphaHandling::Flatten);
        assert!(asm.finish().is_err());
    }

    #[test]
    fn alpha_is_rejected_when_configured() {
        let page = PageSize::new(100.0, 100.0);
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4])));
        let mut asm = PdfAssembler::new("Alpha", AlphaHandling::Reject);
        let err = asm.add_page(3, rgba.clone(), &full_page(page), page).unwrap_err();
        assert!(matches!(err, Image2PdfError::Serialization { index: 3, .. }));
        assert_eq!(asm.page_count(), 0);

        let mut asm = PdfAssembler::new("Alpha", AlphaHandling::Flatten);
        assert!(asm.add_page(0, rgba, &full_page(page), page).is_ok());
    }

    #[test]
    fn gray_embeds_single_channel() {
        let raw = raw_image(DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, Luma([9]))));
        assert!(matches!(raw.data_format, RawImageFormat::R8));
        assert_eq!((raw.width, raw.height), (3, 2));

        let raw = raw_image(rgb(3, 2));
        assert!(matches!(raw.data_format, RawImageFormat::RGB8));
    }

    #[test]
    fn cover_window_outside_image_is_serialization_error() {
        let page = PageSize::new(100.0, 100.0);
        let placement = Placement {
            source: Some(PixelRect::new(0, 0, 50, 50)),
            ..full_page(page)
        };
        let mut asm = PdfAssembler::new("Cover", AlphaHandling::Flatten);
        let err = asm.add_page(0, rgb(10, 10), &placement, page).unwrap_err();
        assert!(matches!(err, Image2PdfError::Serialization { index: 0, .. }));
    }

    #[test]
    fn points_convert_to_millimetres() {
        assert!((pt_to_mm(72.0).0 - 25.4).abs() < 1e-4);
    }
}
