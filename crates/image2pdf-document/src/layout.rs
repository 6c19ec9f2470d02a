// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page layout — decide each page's size and where its image goes.
//
// All coordinates are PDF points with the origin at the bottom-left of the
// page, matching what the assembler emits.

use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::{FitMode, POINTS_PER_INCH, PageSize, PageSpec, PixelRect};
use serde::Serialize;
use tracing::debug;

/// Where an image lands on its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    /// Left edge in points from the page's left side.
    pub x: f32,
    /// Bottom edge in points from the page's bottom.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Part of the source image to draw. `None` draws all of it; `Cover`
    /// sets this to the centred window that remains visible.
    pub source: Option<PixelRect>,
}

impl Placement {
    /// Whether the placement lies inside the given rectangle, allowing for
    /// float rounding.
    pub fn is_within(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        const EPS: f32 = 1e-3;
        self.x >= x - EPS
            && self.y >= y - EPS
            && self.x + self.width <= x + width + EPS
            && self.y + self.height <= y + height + EPS
    }
}

/// Deterministic page sizing and image placement for one [`PageSpec`].
#[derive(Debug, Clone, Copy)]
pub struct PageLayoutPolicy {
    spec: PageSpec,
}

impl PageLayoutPolicy {
    pub fn new(spec: PageSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &PageSpec {
        &self.spec
    }

    /// Size of an image at its native resolution (`dpi`), in points.
    pub fn native_size(&self, width_px: u32, height_px: u32) -> (f32, f32) {
        let scale = POINTS_PER_INCH / self.spec.dpi;
        (width_px as f32 * scale, height_px as f32 * scale)
    }

    /// The page size used for every page of the job.
    ///
    /// Fixed paper sizes ignore `images`. `FitToLargest` takes the largest
    /// native width and height among `images` and adds the margins.
    pub fn resolve_page_size<I>(&self, images: I) -> Result<PageSize>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let page = match self.spec.paper.dimensions_pt() {
            Some((width, height)) => PageSize::new(width, height),
            None => {
                let (mut max_w, mut max_h) = (0.0f32, 0.0f32);
                let mut any = false;
                for (w, h) in images {
                    let (nw, nh) = self.native_size(w, h);
                    max_w = max_w.max(nw);
                    max_h = max_h.max(nh);
                    any = true;
                }
                if !any {
                    return Err(Image2PdfError::InvalidPageSpec(
                        "cannot size pages to the largest image of an empty set".into(),
                    ));
                }
                PageSize::new(
                    max_w + self.spec.margins.horizontal(),
                    max_h + self.spec.margins.vertical(),
                )
            }
        };
        page.printable_area(&self.spec.margins)?;
        debug!(
            paper = ?self.spec.paper,
            width = page.width,
            height = page.height,
            "Resolved page size"
        );
        Ok(page)
    }

    /// Place a `width_px` x `height_px` image on `page`.
    ///
    /// Every result lies inside the printable area. `Contain` and
    /// `ShrinkToFit` keep the aspect ratio and centre the image; `Stretch`
    /// fills the area; `Cover` fills the area and selects the visible source
    /// window.
    pub fn place(&self, width_px: u32, height_px: u32, page: PageSize) -> Result<Placement> {
        if width_px == 0 || height_px == 0 {
            return Err(Image2PdfError::InvalidRegion(format!(
                "image {width_px}x{height_px} has no pixels"
            )));
        }
        let margins = &self.spec.margins;
        let (area_w, area_h) = page.printable_area(margins)?;
        let (img_w, img_h) = (width_px as f32, height_px as f32);

        let centred = |w: f32, h: f32| Placement {
            x: margins.left + (area_w - w) / 2.0,
            y: margins.bottom + (area_h - h) / 2.0,
            width: w,
            height: h,
            source: None,
        };

        let placement = match self.spec.fit {
            FitMode::Stretch => Placement {
                x: margins.left,
                y: margins.bottom,
                width: area_w,
                height: area_h,
                source: None,
            },
            FitMode::Contain => {
                let scale = (area_w / img_w).min(area_h / img_h);
                centred((img_w * scale).min(area_w), (img_h * scale).min(area_h))
            }
            FitMode::ShrinkToFit => {
                let (native_w, native_h) = self.native_size(width_px, height_px);
                let scale = (area_w / native_w).min(area_h / native_h).min(1.0);
                centred((native_w * scale).min(area_w), (native_h * scale).min(area_h))
            }
            FitMode::Cover => {
                let scale = (area_w / img_w).max(area_h / img_h);
                let visible_w = ((area_w / scale).round() as u32).clamp(1, width_px);
                let visible_h = ((area_h / scale).round() as u32).clamp(1, height_px);
                Placement {
                    x: margins.left,
                    y: margins.bottom,
                    width: area_w,
                    height: area_h,
                    source: Some(PixelRect::new(
                        (width_px - visible_w) / 2,
                        (height_px - visible_h) / 2,
                        visible_w,
                        visible_h,
                    )),
                }
            }
        };
        Ok(placement)
    }
}

impl Default for PageLayoutPolicy {
    fn default() -> Self {
        Self::new(PageSpec::default())
    }
}
