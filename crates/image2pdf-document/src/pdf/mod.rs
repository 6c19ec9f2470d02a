// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — assembling image pages, post-processing, inspecting and
// merging PDFs.

pub mod assembler;
pub mod inspector;
pub mod post;

pub use assembler::PdfAssembler;
pub use inspector::{PdfInfo, PdfInspector, PdfMetadata, merge_files};
pub use post::PdfPostProcessor;
