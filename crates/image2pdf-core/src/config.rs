// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Converter configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Image2PdfError, Result};
use crate::types::{DocumentMetadata, FitMode, MarginPreset, Margins, PageSpec, PaperSize};

/// Margin used when a configured custom margin is out of range.
const FALLBACK_MARGIN_PT: f32 = 28.0;
/// Largest accepted custom margin.
const MAX_MARGIN_PT: f32 = 200.0;
const DEFAULT_DPI: f32 = 300.0;

/// What to do with images that carry an alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaHandling {
    /// Composite onto a white background before embedding.
    Flatten,
    /// Refuse to embed; the job aborts with a serialization error.
    Reject,
}

/// How `enhance_contrast` boosts contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastMethod {
    /// Histogram equalisation of luminance; hue is kept.
    Equalize,
    /// Linear stretch around mid-grey by `contrast_factor`.
    Linear,
}

/// Settings injected into the conversion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Paper size for new jobs.
    pub paper_size: PaperSize,
    /// Margin preset; `Custom` selects `custom_margins`.
    pub margin_preset: MarginPreset,
    /// Margins (top, right, bottom, left) used with `MarginPreset::Custom`.
    pub custom_margins: Margins,
    pub fit_mode: FitMode,
    /// Pixel density used to size images natively.
    pub dpi: f32,
    pub alpha: AlphaHandling,
    /// Boost contrast after cropping.
    pub enhance_contrast: bool,
    pub contrast_method: ContrastMethod,
    /// Only used by `ContrastMethod::Linear`.
    pub contrast_factor: f32,
    /// Compress PDF streams in the post-processing pass.
    pub compress: bool,
    /// Threads used to decode and crop images. Page order is unaffected.
    pub workers: usize,
    /// Metadata applied when a job leaves a field unset.
    pub metadata: DocumentMetadata,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            margin_preset: MarginPreset::Normal,
            custom_margins: Margins::uniform(FALLBACK_MARGIN_PT),
            fit_mode: FitMode::Contain,
            dpi: DEFAULT_DPI,
            alpha: AlphaHandling::Flatten,
            enhance_contrast: false,
            contrast_method: ContrastMethod::Equalize,
            contrast_factor: 1.4,
            compress: true,
            workers: 1,
            metadata: DocumentMetadata {
                creator: Some("Image2PDF".into()),
                ..Default::default()
            },
        }
    }
}

impl ConverterConfig {
    /// Read a JSON settings file and repair any invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Image2PdfError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let mut config: Self = serde_json::from_str(&raw)?;
        let repaired = config.validate();
        debug!(path = %path.display(), repaired, "Configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Replace out-of-range values with defaults. Returns how many values
    /// were repaired.
    pub fn validate(&mut self) -> usize {
        let mut repaired = 0;

        let mut fix_margin = |value: &mut f32, side: &str| {
            if !value.is_finite() || *value < 0.0 || *value > MAX_MARGIN_PT {
                warn!(side, value = *value, "Invalid custom margin replaced");
                *value = FALLBACK_MARGIN_PT;
                repaired += 1;
            }
        };
        fix_margin(&mut self.custom_margins.top, "top");
        fix_margin(&mut self.custom_margins.right, "right");
        fix_margin(&mut self.custom_margins.bottom, "bottom");
        fix_margin(&mut self.custom_margins.left, "left");

        if !(self.dpi.is_finite() && (72.0..=1200.0).contains(&self.dpi)) {
            warn!(dpi = self.dpi, "Invalid dpi replaced");
            self.dpi = DEFAULT_DPI;
            repaired += 1;
        }
        if !(self.contrast_factor.is_finite() && self.contrast_factor > 0.0) {
            warn!(factor = self.contrast_factor, "Invalid contrast factor replaced");
            self.contrast_factor = 1.4;
            repaired += 1;
        }
        if self.workers == 0 {
            self.workers = 1;
            repaired += 1;
        }
        repaired
    }

    /// Margins after resolving the preset.
    pub fn margins(&self) -> Margins {
        match self.margin_preset {
            MarginPreset::Custom => self.custom_margins,
            preset => preset.margins(),
        }
    }

    /// Page specification for a new job.
    pub fn page_spec(&self) -> PageSpec {
        PageSpec::new(self.paper_size, self.margins(), self.fit_mode).with_dpi(self.dpi)
    }
}
