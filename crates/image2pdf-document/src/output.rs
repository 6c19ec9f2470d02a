// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output files — atomic writes and content fingerprints.

use std::io::Write;
use std::path::Path;

use image2pdf_core::error::{Image2PdfError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// SHA-256 of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write `dest` atomically and return the number of bytes written.
///
/// `write` fills a temporary file in the destination's directory, which is
/// then renamed over `dest`. If `write` fails, or the rename does, the
/// temporary file is removed and `dest` is left as it was.
#[instrument(skip(write), fields(dest = %dest.display()))]
pub fn write_atomically<F>(dest: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".image2pdf-")
        .suffix(".part")
        .tempfile_in(dir)?;
    write(&mut tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    let bytes = tmp.as_file().metadata()?.len();
    tmp.persist(dest).map_err(|err| Image2PdfError::Io(err.error))?;
    debug!(bytes, "Output persisted");
    Ok(bytes)
}
