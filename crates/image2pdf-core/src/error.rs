// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Image2PDF.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::FailureKind;

/// Top-level error type for all Image2PDF operations.
#[derive(Debug, Error)]
pub enum Image2PdfError {
    // -- Per-image errors (recovered by the pipeline) --
    #[error("image file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot decode {}: {detail}", path.display())]
    Decode { path: PathBuf, detail: String },

    #[error("unsupported image format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid crop region: {0}")]
    InvalidRegion(String),

    // -- Job-level errors --
    #[error("invalid page specification: {0}")]
    InvalidPageSpec(String),

    #[error("invalid conversion job: {0}")]
    InvalidJob(String),

    #[error("cannot embed image #{index}: {detail}")]
    Serialization { index: usize, detail: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Image2PdfError {
    /// Coarse, serialisable classification used in conversion reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Decode { .. } | Self::UnsupportedFormat { .. } => FailureKind::Decode,
            Self::InvalidRegion(_) => FailureKind::InvalidRegion,
            Self::Serialization { .. } | Self::PdfError(_) => FailureKind::Serialization,
            Self::Io(_) => FailureKind::Io,
            Self::InvalidPageSpec(_) | Self::InvalidJob(_) | Self::Config(_) | Self::Json(_) => {
                FailureKind::InvalidJob
            }
        }
    }

    /// Whether the pipeline may skip the offending image and keep going.
    ///
    /// Anything else indicates a systemic problem and aborts the job.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Decode { .. }
                | Self::UnsupportedFormat { .. }
                | Self::InvalidRegion(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Image2PdfError>;
