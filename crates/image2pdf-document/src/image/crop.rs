// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop transform — apply a user-selected crop (rotation plus rectangle, or a
// perspective quad) to a decoded image.

use image::DynamicImage;
use image2pdf_core::error::Result;
use image2pdf_core::types::CropShape;
use tracing::instrument;

use super::processor::{ImageProcessor, check_rect, perspective_geometry};

/// Contrast enhancement run after the crop.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Enhancement {
    Equalize,
    Linear(f32),
}

/// Applies an input's crop, plus optional contrast enhancement.
///
/// Pure: the same image and crop always give the same pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropTransform {
    enhancement: Option<Enhancement>,
}

impl CropTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stretch contrast linearly by `factor` after the crop.
    pub fn with_contrast(mut self, factor: f32) -> Self {
        self.enhancement = Some(Enhancement::Linear(factor));
        self
    }

    /// Equalise luminance after the crop.
    pub fn with_equalization(mut self) -> Self {
        self.enhancement = Some(Enhancement::Equalize);
        self
    }

    /// Apply `crop` to `image`. `None` keeps the whole image.
    ///
    /// For a [`CropShape::Region`] the rotation comes first and the rectangle
    /// is read in rotated coordinates. Out-of-bounds or empty rectangles and
    /// degenerate quads fail with `InvalidRegion`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn apply(&self, image: DynamicImage, crop: Option<&CropShape>) -> Result<DynamicImage> {
        let mut processor = ImageProcessor::from_dynamic(image);

        match crop {
            None => {}
            Some(CropShape::Region(region)) => {
                processor = processor.rotate_quarter_turns(region.turns());
                if let Some(rect) = region.rect {
                    processor = processor.crop(rect)?;
                }
            }
            Some(CropShape::Perspective(quad)) => {
                processor = processor.warp_perspective(quad)?;
            }
        }

        processor = match self.enhancement {
            None => processor,
            Some(Enhancement::Equalize) => processor.equalize_luminance(),
            Some(Enhancement::Linear(factor)) => processor.adjust_contrast(factor),
        };
        Ok(processor.into_dynamic())
    }

    /// Size `apply` would produce for a `width` x `height` image, without
    /// touching pixels. Fails exactly where `apply` would.
    pub fn output_size(&self, width: u32, height: u32, crop: Option<&CropShape>) -> Result<(u32, u32)> {
        match crop {
            None => Ok((width, height)),
            Some(CropShape::Region(region)) => {
                let (w, h) = if region.turns() % 2 == 1 {
                    (height, width)
                } else {
                    (width, height)
                };
                match region.rect {
                    Some(rect) => {
                        check_rect(rect, w, h)?;
                        Ok((rect.width, rect.height))
                    }
                    None => Ok((w, h)),
                }
            }
            Some(CropShape::Perspective(quad)) => {
                perspective_geometry(quad, width, height).map(|(_, size)| size)
            }
        }
    }
}
