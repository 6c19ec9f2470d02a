// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// image2pdf-document — Image decoding, cropping, page layout and PDF assembly
// for Image2PDF.
//
// Provides the image stages (signature-selected decoding, EXIF orientation,
// rotation, crop, perspective warp), the page layout policy, PDF assembly and
// post-processing, PDF inspection and merging, and the conversion pipeline
// that ties them together.

pub mod image;
pub mod layout;
pub mod output;
pub mod pdf;
pub mod pipeline;

// Re-export the primary structs so callers can use `image2pdf_document::ConversionPipeline` etc.
pub use crate::image::{
    CropTransform, Decoder, ImageDescriptor, ImageHeader, ImageInfo, ImageProcessor, ImageSource,
};
pub use crate::layout::{PageLayoutPolicy, Placement};
pub use crate::pdf::{PdfAssembler, PdfInfo, PdfInspector, PdfMetadata, PdfPostProcessor, merge_files};
pub use crate::pipeline::{ConversionPipeline, ProgressObserver};
