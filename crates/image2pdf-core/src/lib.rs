// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image2PDF — Core types, configuration and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod files;
pub mod human_errors;
pub mod types;

pub use config::{AlphaHandling, ContrastMethod, ConverterConfig};
pub use error::{Image2PdfError, Result};
pub use types::*;
