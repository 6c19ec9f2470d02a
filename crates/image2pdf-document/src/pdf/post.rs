// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF post-processing — document information and stream compression applied
// to assembled bytes with `lopdf`.

use chrono::{DateTime, Utc};
use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::DocumentMetadata;
use lopdf::{Dictionary, Document, Object, StringFormat};
use tracing::{debug, instrument};

/// Value written to /Producer.
pub const PRODUCER: &str = concat!("Image2PDF ", env!("CARGO_PKG_VERSION"));

/// Rewrites the /Info dictionary and optionally compresses streams.
#[derive(Debug, Clone)]
pub struct PdfPostProcessor {
    metadata: DocumentMetadata,
    compress: bool,
    created: DateTime<Utc>,
}

impl PdfPostProcessor {
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            compress: true,
            created: Utc::now(),
        }
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Fix the /CreationDate instead of using the current time.
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Apply metadata and compression to `pdf`, returning new bytes.
    #[instrument(skip_all, fields(bytes_in = pdf.len(), compress = self.compress))]
    pub fn process(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf).map_err(|err| {
            Image2PdfError::PdfError(format!("failed to reload assembled PDF: {}", err))
        })?;

        let mut entries: Vec<(&str, Object)> = Vec::new();
        let fields = [
            ("Title", &self.metadata.title),
            ("Author", &self.metadata.author),
            ("Subject", &self.metadata.subject),
            ("Creator", &self.metadata.creator),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                entries.push((key, text_string(value)));
            }
        }
        entries.push(("Producer", text_string(PRODUCER)));
        let date = Object::string_literal(self.created.format("D:%Y%m%d%H%M%SZ").to_string());
        entries.push(("CreationDate", date.clone()));
        entries.push(("ModDate", date));

        let existing = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok();
        let info = existing
            .and_then(|id| doc.get_object_mut(id).ok())
            .and_then(|obj| obj.as_dict_mut().ok());
        match info {
            Some(dict) => {
                for (key, value) in entries {
                    dict.set(key, value);
                }
            }
            None => {
                let mut dict = Dictionary::new();
                for (key, value) in entries {
                    dict.set(key, value);
                }
                let id = doc.add_object(Object::Dictionary(dict));
                doc.trailer.set("Info", Object::Reference(id));
            }
        }

        if self.compress {
            doc.compress();
        }

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            Image2PdfError::PdfError(format!("failed to serialise PDF: {}", err))
        })?;
        debug!(bytes_out = output.len(), "Post-processing complete");
        Ok(output)
    }
}

/// Encode `text` as a PDF text string: a literal for ASCII, UTF-16BE with a
/// byte-order mark otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string written either as UTF-16BE with BOM or as
/// single-byte text.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
