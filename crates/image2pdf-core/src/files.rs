// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-name helpers: supported image extensions, safe output names, and
// human-readable sizes.

use std::path::Path;

/// Image file extensions the converter accepts, lowercase without the dot.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "webp"];

/// Characters Windows refuses in file names.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows reserves regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_FILENAME_LEN: usize = 250;

/// Extensions accepted by [`is_supported_image`].
pub fn supported_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

/// Whether `path` has an image extension the converter accepts.
///
/// This only filters file pickers; decoding selects the format from the
/// file contents.
pub fn is_supported_image(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Make `filename` safe to create on any desktop platform.
pub fn sanitize_filename(filename: &str) -> String {
    let mut cleaned: String = filename
        .chars()
        .filter(|c| (*c as u32) >= 32)
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if RESERVED_NAMES.contains(&cleaned.to_ascii_uppercase().as_str()) {
        cleaned.insert(0, '_');
    }

    if cleaned.chars().count() > MAX_FILENAME_LEN {
        let path = Path::new(&cleaned);
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stem: String = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let keep = MAX_FILENAME_LEN.saturating_sub(ext.chars().count());
        cleaned = stem.chars().take(keep).collect::<String>() + &ext;
    }

    cleaned
}

/// Sanitise `filename` and make sure it ends in `.pdf`.
pub fn validate_pdf_filename(filename: &str) -> String {
    let mut name = sanitize_filename(filename);
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

/// Format a byte count as "1.5 KB", "3.2 MB", etc.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".into();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
