// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for whoever drives the converter (CLI or GUI).
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how a front end presents it.

use crate::error::Image2PdfError;
use crate::types::{FailureKind, ItemReport, ItemStatus};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Disk blip or locked file; trying again may work.
    Transient,
    /// The user must change something (pick another file, fix the crop).
    ActionRequired,
    /// The file itself cannot be used.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether simply retrying might help.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert an `Image2PdfError` into a `HumanError`.
pub fn humanize_error(err: &Image2PdfError) -> HumanError {
    match err {
        Image2PdfError::NotFound { path } => HumanError {
            message: "An image file couldn't be found.".into(),
            suggestion: format!(
                "It may have been moved or deleted. Try adding it again. ({})",
                path.display()
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::Decode { path, .. } => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: format!(
                "The image may be damaged. Try opening it in another program and saving it as JPEG or PNG. ({})",
                path.display()
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        Image2PdfError::UnsupportedFormat { path } => HumanError {
            message: "This type of image isn't supported.".into(),
            suggestion: format!(
                "Supported formats are JPEG, PNG, BMP, TIFF, GIF and WebP. ({})",
                path.display()
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        Image2PdfError::InvalidRegion(detail) => HumanError {
            message: "The selected crop area doesn't fit the image.".into(),
            suggestion: format!("Select the crop area again inside the picture. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::InvalidPageSpec(detail) => HumanError {
            message: "The page settings don't work together.".into(),
            suggestion: format!("Try smaller margins or a larger paper size. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::InvalidJob(detail) => HumanError {
            message: "There's nothing to convert yet.".into(),
            suggestion: format!("Add at least one image and choose where to save the PDF. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::Serialization { index, .. } => HumanError {
            message: format!("Image number {} couldn't be put into the PDF.", index + 1),
            suggestion: "Images with transparency can be flattened automatically. Turn on alpha flattening in Settings, or remove the image.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it in a PDF viewer first to check it works.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        Image2PdfError::Config(_) | Image2PdfError::Json(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Reset the settings to their defaults and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        Image2PdfError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to save there.".into(),
                    suggestion: "Choose a different folder, such as Documents or Desktop.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }
    }
}

/// Plain-language summary of one failed item from a conversion report.
///
/// Returns `None` for items that did not fail.
pub fn humanize_item(item: &ItemReport) -> Option<HumanError> {
    let ItemStatus::Failed { kind, reason } = &item.status else {
        return None;
    };
    let name = item
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.path.display().to_string());

    let (message, suggestion, severity) = match kind {
        FailureKind::NotFound => (
            format!("{name} couldn't be found and was skipped."),
            "Check the file still exists, then convert again.".to_string(),
            Severity::ActionRequired,
        ),
        FailureKind::Decode => (
            format!("{name} couldn't be read and was skipped."),
            "Save the image as JPEG or PNG and add it again.".to_string(),
            Severity::Permanent,
        ),
        FailureKind::InvalidRegion => (
            format!("The crop area for {name} was outside the picture."),
            "Select the crop area again.".to_string(),
            Severity::ActionRequired,
        ),
        _ => (
            format!("{name} couldn't be converted."),
            reason.clone(),
            Severity::Transient,
        ),
    };

    Some(HumanError {
        message,
        suggestion,
        retriable: severity == Severity::Transient,
        severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_file_is_action_required() {
        let err = Image2PdfError::NotFound {
            path: PathBuf::from("/photos/a.jpg"),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("a.jpg"));
        assert!(!human.retriable);
    }

    #[test]
    fn corrupt_image_is_permanent() {
        let err = Image2PdfError::Decode {
            path: PathBuf::from("broken.png"),
            detail: "bad CRC".into(),
        };
        assert_eq!(humanize_error(&err).severity, Severity::Permanent);
    }

    #[test]
    fn serialization_names_one_based_image() {
        let err = Image2PdfError::Serialization {
            index: 0,
            detail: "alpha".into(),
        };
        assert!(humanize_error(&err).message.contains("number 1"));
    }

    #[test]
    fn disk_error_is_transient() {
        let err = Image2PdfError::Io(std::io::Error::other("no space left"));
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn humanize_item_only_for_failures() {
        let ok = ItemReport {
            index: 0,
            path: PathBuf::from("a.png"),
            status: ItemStatus::Converted { page: 1 },
        };
        assert!(humanize_item(&ok).is_none());

        let failed = ItemReport {
            index: 1,
            path: PathBuf::from("/tmp/b.png"),
            status: ItemStatus::Failed {
                kind: FailureKind::Decode,
                reason: "truncated".into(),
            },
        };
        let human = humanize_item(&failed).expect("failure is humanized");
        assert!(human.message.starts_with("b.png"));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
