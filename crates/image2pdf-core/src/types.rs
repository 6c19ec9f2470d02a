// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Image2PDF conversion jobs.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Image2PdfError, Result};

/// PostScript points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Crop geometry ------------------------------------------------------------

/// Axis-aligned rectangle in pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle has zero width or height.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= width as u64 && bottom <= height as u64
    }
}

/// User-selected crop: an optional rectangle plus a clockwise rotation in
/// quarter-turns.
///
/// The rotation is applied first, so `rect` is expressed in the coordinate
/// space of the rotated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub rect: Option<PixelRect>,
    #[serde(default)]
    pub quarter_turns: u8,
}

impl CropRegion {
    /// Crop to a rectangle with no rotation.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            rect: Some(PixelRect::new(x, y, width, height)),
            quarter_turns: 0,
        }
    }

    /// Rotate only, keeping the whole image.
    pub fn rotation_only(quarter_turns: u8) -> Self {
        Self {
            rect: None,
            quarter_turns: quarter_turns % 4,
        }
    }

    /// Add a clockwise rotation applied before the rectangle.
    pub fn with_rotation(mut self, quarter_turns: u8) -> Self {
        self.quarter_turns = quarter_turns % 4;
        self
    }

    /// Rotation normalised to 0..=3.
    pub fn turns(&self) -> u8 {
        self.quarter_turns % 4
    }
}

/// Four corner points (pixel coordinates) of a quadrilateral to be warped
/// into an upright rectangle. Order is arbitrary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub points: [(f32, f32); 4],
}

impl Quad {
    pub fn new(points: [(f32, f32); 4]) -> Self {
        Self { points }
    }
}

/// How an input image should be cut before layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropShape {
    Region(CropRegion),
    Perspective(Quad),
}

// -- Image description --------------------------------------------------------

/// Channel layout of a decoded image, narrowed to 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::GrayAlpha | Self::Rgba)
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray | Self::GrayAlpha)
    }
}

// -- Page geometry ------------------------------------------------------------

/// Paper sizes offered for output pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    /// Size every page to the largest image in the job (plus margins).
    FitToLargest,
    Custom { width_pt: f32, height_pt: f32 },
}

impl PaperSize {
    /// Dimensions in points (width, height), or `None` for sizes that depend
    /// on the job's images.
    pub fn dimensions_pt(&self) -> Option<(f32, f32)> {
        match self {
            Self::A4 => Some((595.28, 841.89)),
            Self::A3 => Some((841.89, 1190.55)),
            Self::A5 => Some((419.53, 595.28)),
            Self::Letter => Some((612.0, 792.0)),
            Self::Legal => Some((612.0, 1008.0)),
            Self::FitToLargest => None,
            Self::Custom {
                width_pt,
                height_pt,
            } => Some((*width_pt, *height_pt)),
        }
    }

    /// Names accepted by [`PaperSize::from_str`].
    pub fn names() -> &'static [&'static str] {
        &["a4", "a3", "a5", "letter", "legal", "fit"]
    }
}

impl FromStr for PaperSize {
    type Err = Image2PdfError;

    /// Parse a paper name or an explicit `WIDTHxHEIGHT` in points.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "a3" => Ok(Self::A3),
            "a5" => Ok(Self::A5),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            "fit" | "fit-to-largest" | "largest" => Ok(Self::FitToLargest),
            other => {
                let (w, h) = other.split_once('x').ok_or_else(|| {
                    Image2PdfError::InvalidPageSpec(format!("unknown paper size '{s}'"))
                })?;
                let parse = |v: &str| {
                    v.trim().parse::<f32>().map_err(|_| {
                        Image2PdfError::InvalidPageSpec(format!("bad dimension '{v}' in '{s}'"))
                    })
                };
                Ok(Self::Custom {
                    width_pt: parse(w)?,
                    height_pt: parse(h)?,
                })
            }
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|m| m.is_finite() && *m >= 0.0)
    }
}

impl Default for Margins {
    fn default() -> Self {
        MarginPreset::Normal.margins()
    }
}

/// Named margin presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginPreset {
    None,
    Narrow,
    Normal,
    Wide,
    /// Use the explicit margins from the configuration.
    Custom,
}

impl MarginPreset {
    /// Uniform margins for the preset. `Custom` yields the `Normal` value;
    /// callers resolve it against their own custom margins.
    pub fn margins(&self) -> Margins {
        match self {
            Self::None => Margins::uniform(0.0),
            Self::Narrow => Margins::uniform(14.0),
            Self::Normal | Self::Custom => Margins::uniform(28.0),
            Self::Wide => Margins::uniform(56.0),
        }
    }
}

impl FromStr for MarginPreset {
    type Err = Image2PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "narrow" => Ok(Self::Narrow),
            "normal" => Ok(Self::Normal),
            "wide" => Ok(Self::Wide),
            "custom" => Ok(Self::Custom),
            _ => Err(Image2PdfError::InvalidPageSpec(format!(
                "unknown margin preset '{s}'"
            ))),
        }
    }
}

/// Policy for scaling an image into a page's printable area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Preserve aspect ratio, fit inside the printable area, centre.
    Contain,
    /// Preserve aspect ratio, fill the printable area, crop the overflow.
    Cover,
    /// Fill the printable area exactly, ignoring aspect ratio.
    Stretch,
    /// Native size at the page DPI, shrunk proportionally only if too large.
    ShrinkToFit,
}

impl FromStr for FitMode {
    type Err = Image2PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "contain" => Ok(Self::Contain),
            "cover" => Ok(Self::Cover),
            "stretch" => Ok(Self::Stretch),
            "shrink" | "shrink-to-fit" | "original" => Ok(Self::ShrinkToFit),
            _ => Err(Image2PdfError::InvalidPageSpec(format!(
                "unknown fit mode '{s}'"
            ))),
        }
    }
}

/// Target page configuration for a job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub paper: PaperSize,
    pub margins: Margins,
    pub fit: FitMode,
    /// Pixel density used to size images at their native size.
    pub dpi: f32,
}

impl PageSpec {
    pub fn new(paper: PaperSize, margins: Margins, fit: FitMode) -> Self {
        Self {
            paper,
            margins,
            fit,
            dpi: 300.0,
        }
    }

    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Check the invariants that do not depend on the job's images.
    pub fn validate(&self) -> Result<()> {
        if !self.margins.is_valid() {
            return Err(Image2PdfError::InvalidPageSpec(
                "margins must be finite and non-negative".into(),
            ));
        }
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(Image2PdfError::InvalidPageSpec(format!(
                "dpi must be positive, got {}",
                self.dpi
            )));
        }
        if let Some((w, h)) = self.paper.dimensions_pt() {
            PageSize::new(w, h).printable_area(&self.margins)?;
        }
        Ok(())
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::new(PaperSize::A4, Margins::default(), FitMode::Contain)
    }
}

/// A concrete page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Printable width and height once margins are removed.
    ///
    /// Fails unless the page and the remaining area are strictly positive.
    pub fn printable_area(&self, margins: &Margins) -> Result<(f32, f32)> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(Image2PdfError::InvalidPageSpec(format!(
                "page size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let w = self.width - margins.horizontal();
        let h = self.height - margins.vertical();
        if w <= 0.0 || h <= 0.0 {
            return Err(Image2PdfError::InvalidPageSpec(format!(
                "margins leave no printable area on a {}x{} pt page",
                self.width, self.height
            )));
        }
        Ok((w, h))
    }
}

// -- Jobs ---------------------------------------------------------------------

/// Document information written to the PDF /Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

impl DocumentMetadata {
    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: &DocumentMetadata) -> Self {
        Self {
            title: self.title.or_else(|| defaults.title.clone()),
            author: self.author.or_else(|| defaults.author.clone()),
            subject: self.subject.or_else(|| defaults.subject.clone()),
            creator: self.creator.or_else(|| defaults.creator.clone()),
        }
    }
}

/// One image of a job together with its optional crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    pub path: PathBuf,
    pub crop: Option<CropShape>,
}

impl JobInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            crop: None,
        }
    }

    pub fn with_region(mut self, region: CropRegion) -> Self {
        self.crop = Some(CropShape::Region(region));
        self
    }

    pub fn with_perspective(mut self, quad: Quad) -> Self {
        self.crop = Some(CropShape::Perspective(quad));
        self
    }
}

/// An ordered image-to-PDF conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    pub inputs: Vec<JobInput>,
    pub page: PageSpec,
    pub output: PathBuf,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl ConversionJob {
    pub fn new(inputs: Vec<JobInput>, page: PageSpec, output: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            inputs,
            page,
            output: output.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check the job invariants: at least one input, a valid page spec, and
    /// an output path whose directory exists.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(Image2PdfError::InvalidJob("no input images".into()));
        }
        self.page.validate()?;
        if self.output.file_name().is_none() {
            return Err(Image2PdfError::InvalidJob(format!(
                "output path '{}' has no file name",
                self.output.display()
            )));
        }
        let parent = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => std::path::Path::new("."),
        };
        if !parent.is_dir() {
            return Err(Image2PdfError::InvalidJob(format!(
                "output directory '{}' does not exist",
                parent.display()
            )));
        }
        Ok(())
    }
}

// -- Results ------------------------------------------------------------------

/// Serialisable classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NotFound,
    Decode,
    InvalidRegion,
    Serialization,
    Io,
    InvalidJob,
}

/// Lifecycle states of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Not yet run.
    Pending,
    /// At least one page written; output file in place.
    Completed,
    /// Every input failed; nothing written.
    FailedEmpty,
    /// A systemic error stopped the job; nothing written.
    Aborted,
}

/// Outcome of a single input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    /// Converted into the given 1-indexed page.
    Converted { page: usize },
    Failed { kind: FailureKind, reason: String },
}

/// Per-input entry of a [`ConversionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub index: usize,
    pub path: PathBuf,
    pub status: ItemStatus,
}

/// Job-level failure detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Index of the input that triggered the failure, when known.
    pub index: Option<usize>,
}

/// Facts about a written output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSummary {
    pub path: PathBuf,
    pub page_count: usize,
    pub bytes: u64,
    /// SHA-256 of the written PDF as lowercase hex.
    pub sha256: String,
}

/// Report produced by exactly one run of a [`ConversionJob`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub items: Vec<ItemReport>,
    pub output: Option<OutputSummary>,
    pub error: Option<JobFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionResult {
    /// A fresh report with every input pending.
    pub fn pending(job: &ConversionJob) -> Self {
        Self {
            job_id: job.id,
            status: JobStatus::Pending,
            items: job
                .inputs
                .iter()
                .enumerate()
                .map(|(index, input)| ItemReport {
                    index,
                    path: input.path.clone(),
                    status: ItemStatus::Pending,
                })
                .collect(),
            output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Pages written, 0 unless completed.
    pub fn page_count(&self) -> usize {
        self.output.as_ref().map_or(0, |o| o.page_count)
    }

    /// Items that failed, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_size_parsing() {
        assert_eq!("A4".parse::<PaperSize>().unwrap(), PaperSize::A4);
        assert_eq!("fit".parse::<PaperSize>().unwrap(), PaperSize::FitToLargest);
        assert_eq!(
            "400x300".parse::<PaperSize>().unwrap(),
            PaperSize::Custom {
                width_pt: 400.0,
                height_pt: 300.0
            }
        );
        assert!("tabloid".parse::<PaperSize>().is_err());
        assert!("axb".parse::<PaperSize>().is_err());
    }

    #[test]
    fn crop_rect_bounds() {
        let rect = PixelRect::new(10, 10, 90, 40);
        assert!(rect.fits_within(100, 50));
        assert!(!rect.fits_within(99, 50));
        assert!(PixelRect::new(0, 0, 0, 5).is_empty());
        // No overflow on huge coordinates.
        assert!(!PixelRect::new(u32::MAX, 0, 2, 1).fits_within(100, 100));
    }

    #[test]
    fn rotation_is_normalised() {
        assert_eq!(CropRegion::rotation_only(5).turns(), 1);
        assert_eq!(CropRegion::new(0, 0, 1, 1).with_rotation(6).turns(), 2);
    }

    #[test]
    fn page_spec_rejects_oversized_margins() {
        let spec = PageSpec::new(
            PaperSize::Custom {
                width_pt: 100.0,
                height_pt: 100.0,
            },
            Margins::uniform(50.0),
            FitMode::Contain,
        );
        assert!(matches!(
            spec.validate(),
            Err(Image2PdfError::InvalidPageSpec(_))
        ));
    }

    #[test]
    fn page_spec_rejects_non_positive_size() {
        let spec = PageSpec::new(
            PaperSize::Custom {
                width_pt: 0.0,
                height_pt: 100.0,
            },
            Margins::uniform(0.0),
            FitMode::Stretch,
        );
        assert!(spec.validate().is_err());
        // FitToLargest cannot be checked until the images are known.
        let fit = PageSpec::new(PaperSize::FitToLargest, Margins::uniform(0.0), FitMode::Contain);
        assert!(fit.validate().is_ok());
    }

    #[test]
    fn job_requires_inputs() {
        let job = ConversionJob::new(Vec::new(), PageSpec::default(), "out.pdf");
        assert!(matches!(job.validate(), Err(Image2PdfError::InvalidJob(_))));
    }

    #[test]
    fn job_requires_existing_output_dir() {
        let job = ConversionJob::new(
            vec![JobInput::new("a.png")],
            PageSpec::default(),
            "/definitely/not/here/out.pdf",
        );
        assert!(job.validate().is_err());
    }

    #[test]
    fn metadata_defaults_fill_gaps() {
        let defaults = DocumentMetadata {
            creator: Some("Image2PDF".into()),
            author: Some("nobody".into()),
            ..Default::default()
        };
        let merged = DocumentMetadata {
            author: Some("K. T.".into()),
            ..Default::default()
        }
        .or(&defaults);
        assert_eq!(merged.author.as_deref(), Some("K. T."));
        assert_eq!(merged.creator.as_deref(), Some("Image2PDF"));
        assert!(merged.title.is_none());
    }
}
