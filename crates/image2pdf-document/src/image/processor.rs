// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — quarter-turn rotation, strict rectangular crop,
// perspective warp, contrast and alpha flattening on in-memory images using
// the `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::{PixelRect, Quad};
use imageproc::contrast::equalize_histogram;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

/// Pixel operations on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor`, so steps
/// chain:
///
/// ```ignore
/// let page = ImageProcessor::from_dynamic(img)
///     .rotate_quarter_turns(1)
///     .crop(PixelRect::new(10, 10, 400, 300))?
///     .flatten_alpha()
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Rotate clockwise by `turns` quarter-turns. Lossless.
    pub fn rotate_quarter_turns(self, turns: u8) -> Self {
        let image = match turns % 4 {
            1 => self.image.rotate90(),
            2 => self.image.rotate180(),
            3 => self.image.rotate270(),
            _ => return self,
        };
        debug!(turns, "Rotated image");
        Self { image }
    }

    /// Cut out `rect` exactly.
    ///
    /// Unlike a clamping crop, a rectangle that is empty or reaches outside
    /// the image is refused with `InvalidRegion`.
    #[instrument(skip(self), fields(x = rect.x, y = rect.y, width = rect.width, height = rect.height))]
    pub fn crop(self, rect: PixelRect) -> Result<Self> {
        check_rect(rect, self.width(), self.height())?;
        let cropped = self.image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok(Self { image: cropped })
    }

    /// Warp the quadrilateral `quad` into an upright rectangle.
    ///
    /// Corners are ordered automatically. The output takes the longer of each
    /// pair of opposite edges as its width and height.
    #[instrument(skip(self, quad))]
    pub fn warp_perspective(self, quad: &Quad) -> Result<Self> {
        let (corners, (out_w, out_h)) = perspective_geometry(quad, self.width(), self.height())?;
        let (w, h) = (out_w as f32, out_h as f32);
        let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let projection = Projection::from_control_points(corners, dest).ok_or_else(|| {
            Image2PdfError::InvalidRegion("perspective quad is degenerate".into())
        })?;

        info!(out_w, out_h, "Applying perspective warp");

        // Warp in the image's own channel layout so grey stays grey.
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => {
                let mut out = GrayImage::new(out_w, out_h);
                warp_into(&gray, &projection, Interpolation::Bilinear, Luma([255]), &mut out);
                DynamicImage::ImageLuma8(out)
            }
            DynamicImage::ImageRgb8(rgb) => {
                let mut out = RgbImage::new(out_w, out_h);
                warp_into(&rgb, &projection, Interpolation::Bilinear, Rgb([255, 255, 255]), &mut out);
                DynamicImage::ImageRgb8(out)
            }
            other => {
                let rgba = other.to_rgba8();
                let mut out = RgbaImage::new(out_w, out_h);
                warp_into(
                    &rgba,
                    &projection,
                    Interpolation::Bilinear,
                    Rgba([255, 255, 255, 255]),
                    &mut out,
                );
                DynamicImage::ImageRgba8(out)
            }
        };
        Ok(Self { image })
    }

    /// Equalise the luminance histogram.
    ///
    /// Grey images are equalised directly. Colour pixels are scaled by the
    /// ratio of new to old luminance, which keeps their hue. Alpha is kept.
    #[instrument(skip(self))]
    pub fn equalize_luminance(self) -> Self {
        info!("Equalising luminance");
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(equalize_histogram(&gray)),
            other => {
                let luma = other.to_luma8();
                let equalized = equalize_histogram(&luma);
                let mut rgba = other.to_rgba8();
                for (x, y, pixel) in rgba.enumerate_pixels_mut() {
                    let before = luma.get_pixel(x, y).0[0];
                    let after = equalized.get_pixel(x, y).0[0];
                    let Rgba([r, g, b, a]) = *pixel;
                    *pixel = if before == 0 {
                        Rgba([after, after, after, a])
                    } else {
                        let ratio = after as f32 / before as f32;
                        let scale = |c: u8| (c as f32 * ratio).round().clamp(0.0, 255.0) as u8;
                        Rgba([scale(r), scale(g), scale(b), a])
                    };
                }
                if other.color().has_alpha() {
                    DynamicImage::ImageRgba8(rgba)
                } else {
                    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
                }
            }
        };
        Self { image }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        info!(factor, "Adjusting contrast");

        let adjust = |channel: u8| -> u8 {
            let val = factor * (channel as f32 - 128.0) + 128.0;
            val.clamp(0.0, 255.0) as u8
        };

        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => {
                let out = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                    Luma([adjust(gray.get_pixel(x, y).0[0])])
                });
                DynamicImage::ImageLuma8(out)
            }
            other => {
                let rgba = other.to_rgba8();
                let out = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                    let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
                    Rgba([adjust(r), adjust(g), adjust(b), a])
                });
                // Keep the original channel layout when there was no alpha.
                if other.color().has_alpha() {
                    DynamicImage::ImageRgba8(out)
                } else {
                    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(out).to_rgb8())
                }
            }
        };
        Self { image }
    }

    /// Composite any alpha channel onto white. Images without alpha pass
    /// through untouched.
    pub fn flatten_alpha(self) -> Self {
        let color = self.image.color();
        if !color.has_alpha() {
            return self;
        }
        debug!(?color, "Flattening alpha onto white");

        let rgba = self.image.to_rgba8();
        let blend = |c: u8, a: u8| -> u8 {
            let a = a as u32;
            ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8
        };
        let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            Rgb([blend(r, a), blend(g, a), blend(b, a)])
        });

        let image = if color.has_color() {
            DynamicImage::ImageRgb8(flat)
        } else {
            DynamicImage::ImageLuma8(DynamicImage::ImageRgb8(flat).to_luma8())
        };
        Self { image }
    }
}

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right
/// has the smallest `y - x`, bottom-left the largest. Points that do not
/// resolve to four distinct corners are rejected.
pub fn order_corners(points: &[(f32, f32); 4]) -> Result<[(f32, f32); 4]> {
    let index_by = |key: &dyn Fn(&(f32, f32)) -> f32, want_max: bool| -> usize {
        let mut best = 0;
        for i in 1..4 {
            let (candidate, current) = (key(&points[i]), key(&points[best]));
            if (want_max && candidate > current) || (!want_max && candidate < current) {
                best = i;
            }
        }
        best
    };

    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;
    let tl = index_by(&sum, false);
    let br = index_by(&sum, true);
    let tr = index_by(&diff, false);
    let bl = index_by(&diff, true);

    let mut seen = [false; 4];
    for i in [tl, tr, br, bl] {
        if seen[i] {
            return Err(Image2PdfError::InvalidRegion(
                "perspective corners are not four distinct points".into(),
            ));
        }
        seen[i] = true;
    }
    Ok([points[tl], points[tr], points[br], points[bl]])
}

/// Output size for ordered corners: the longer of each opposite edge pair.
/// Refuse empty rectangles and rectangles outside a `width` x `height` image.
pub fn check_rect(rect: PixelRect, width: u32, height: u32) -> Result<()> {
    if rect.is_empty() {
        return Err(Image2PdfError::InvalidRegion(format!(
            "crop {}x{} has zero area",
            rect.width, rect.height
        )));
    }
    if !rect.fits_within(width, height) {
        return Err(Image2PdfError::InvalidRegion(format!(
            "crop {}x{}+{}+{} exceeds image bounds {}x{}",
            rect.width, rect.height, rect.x, rect.y, width, height
        )));
    }
    Ok(())
}

/// Ordered corners of `quad` and the size of the straightened output, for a
/// `width` x `height` source image.
pub fn perspective_geometry(
    quad: &Quad,
    width: u32,
    height: u32,
) -> Result<([(f32, f32); 4], (u32, u32))> {
    let (img_w, img_h) = (width as f32, height as f32);
    for &(x, y) in &quad.points {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 || x > img_w || y > img_h {
            return Err(Image2PdfError::InvalidRegion(format!(
                "corner ({x}, {y}) lies outside the {img_w}x{img_h} image"
            )));
        }
    }

    let corners = order_corners(&quad.points)?;
    let (out_w, out_h) = warped_size(&corners);
    if out_w == 0 || out_h == 0 {
        return Err(Image2PdfError::InvalidRegion(
            "perspective quad collapses to a line".into(),
        ));
    }
    Ok((corners, (out_w, out_h)))
}

fn warped_size(corners: &[(f32, f32); 4]) -> (u32, u32) {
    let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let [tl, tr, br, bl] = *corners;
    let width = dist(tl, tr).max(dist(bl, br));
    let height = dist(tl, bl).max(dist(tr, br));
    (width.round() as u32, height.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ColorType;

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        }))
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let p = ImageProcessor::from_dynamic(rgb(30, 10));
        assert_eq!(p.rotate_quarter_turns(1).width(), 10);
        let p = ImageProcessor::from_dynamic(rgb(30, 10)).rotate_quarter_turns(2);
        assert_eq!((p.width(), p.height()), (30, 10));
        let p = ImageProcessor::from_dynamic(rgb(30, 10)).rotate_quarter_turns(7);
        assert_eq!((p.width(), p.height()), (10, 30));
    }

    #[test]
    fn clockwise_rotation_moves_top_left_to_top_right() {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let rotated = ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
            .rotate_quarter_turns(1)
            .into_dynamic()
            .to_rgb8();
        // 4x2 becomes 2x4; the old top-left corner is now at the top right.
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn crop_yields_exact_size() {
        let cropped = ImageProcessor::from_dynamic(rgb(100, 80))
            .crop(PixelRect::new(10, 20, 50, 40))
            .expect("crop within bounds");
        assert_eq!((cropped.width(), cropped.height()), (50, 40));
        let px = cropped.into_dynamic().to_rgb8();
        assert_eq!(px.get_pixel(0, 0), &Rgb([10, 20, 0]));
    }

    #[test]
    fn crop_touching_edges_is_allowed() {
        let cropped = ImageProcessor::from_dynamic(rgb(100, 80))
            .crop(PixelRect::new(0, 0, 100, 80))
            .expect("full-frame crop");
        assert_eq!((cropped.width(), cropped.height()), (100, 80));
    }

    #[test]
    fn crop_out_of_bounds_is_refused() {
        let err = ImageProcessor::from_dynamic(rgb(100, 80))
            .crop(PixelRect::new(60, 0, 50, 10))
            .err()
            .expect("out of bounds");
        assert!(matches!(err, Image2PdfError::InvalidRegion(_)));

        let err = ImageProcessor::from_dynamic(rgb(100, 80))
            .crop(PixelRect::new(0, 0, 0, 10))
            .err()
            .expect("empty");
        assert!(matches!(err, Image2PdfError::InvalidRegion(_)));
    }

    #[test]
    fn corners_are_ordered_from_any_permutation() {
        let ordered = order_corners(&[(90.0, 85.0), (5.0, 10.0), (8.0, 80.0), (95.0, 5.0)])
            .expect("distinct corners");
        assert_eq!(ordered, [(5.0, 10.0), (95.0, 5.0), (90.0, 85.0), (8.0, 80.0)]);
    }

    #[test]
    fn repeated_corner_is_refused() {
        let err = order_corners(&[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, Image2PdfError::InvalidRegion(_)));
    }

    #[test]
    fn perspective_output_uses_longest_edges() {
        let quad = Quad::new([(10.0, 10.0), (110.0, 10.0), (120.0, 60.0), (0.0, 60.0)]);
        let warped = ImageProcessor::from_dynamic(rgb(200, 100))
            .warp_perspective(&quad)
            .expect("valid quad");
        assert_eq!(warped.width(), 120);
        assert_eq!(warped.height(), 51);
        assert_eq!(warped.as_dynamic().color(), ColorType::Rgb8);
    }

    #[test]
    fn perspective_corner_outside_image_is_refused() {
        let quad = Quad::new([(0.0, 0.0), (250.0, 0.0), (200.0, 100.0), (0.0, 100.0)]);
        let err = ImageProcessor::from_dynamic(rgb(200, 100))
            .warp_perspective(&quad)
            .err()
            .expect("outside");
        assert!(matches!(err, Image2PdfError::InvalidRegion(_)));
    }

    #[test]
    fn collinear_quad_is_refused() {
        let quad = Quad::new([(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        assert!(ImageProcessor::from_dynamic(rgb(50, 50)).warp_perspective(&quad).is_err());
    }

    #[test]
    fn contrast_keeps_channel_layout() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([100])));
        let out = ImageProcessor::from_dynamic(gray).adjust_contrast(2.0).into_dynamic();
        assert_eq!(out.color(), ColorType::L8);
        assert_eq!(out.to_luma8().get_pixel(0, 0).0[0], 72);

        let out = ImageProcessor::from_dynamic(rgb(2, 2)).adjust_contrast(1.5).into_dynamic();
        assert_eq!(out.color(), ColorType::Rgb8);
    }

    #[test]
    fn equalization_spreads_a_flat_histogram() {
        let mut gray = GrayImage::from_pixel(10, 10, Luma([128]));
        for y in 3..7 {
            for x in 3..7 {
                gray.put_pixel(x, y, Luma([140]));
            }
        }
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(gray))
            .equalize_luminance()
            .into_dynamic();
        assert_eq!(out.color(), ColorType::L8);
        let out = out.to_luma8();
        let (lo, hi) = (out.get_pixel(0, 0).0[0], out.get_pixel(4, 4).0[0]);
        assert!(hi > lo);
        assert!(hi - lo > 30, "spread {lo}..{hi}");
    }

    #[test]
    fn equalization_keeps_colour_layout_and_hue() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([120, 60, 60]));
        img.put_pixel(0, 0, Rgb([130, 65, 65]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
            .equalize_luminance()
            .into_dynamic();
        assert_eq!(out.color(), ColorType::Rgb8);
        let Rgb([r, g, b]) = *out.to_rgb8().get_pixel(1, 1);
        assert!(r > g && g == b, "hue lost: {r},{g},{b}");
    }

    #[test]
    fn alpha_is_flattened_onto_white() {
        let rgba = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let flat = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(rgba))
            .flatten_alpha()
            .into_dynamic();
        assert_eq!(flat.color(), ColorType::Rgb8);
        let px = flat.to_rgb8();
        assert_eq!(px.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(px.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn gray_alpha_flattens_to_gray() {
        let la = image::GrayAlphaImage::from_pixel(1, 1, image::LumaA([0, 128]));
        let flat = ImageProcessor::from_dynamic(DynamicImage::ImageLumaA8(la))
            .flatten_alpha()
            .into_dynamic();
        assert_eq!(flat.color(), ColorType::L8);
        assert_eq!(flat.to_luma8().get_pixel(0, 0).0[0], 127);
    }
}
