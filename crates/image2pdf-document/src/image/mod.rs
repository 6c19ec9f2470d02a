// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decoding, cropping and pixel processing.

pub mod crop;
pub mod processor;
pub mod source;

pub use crop::CropTransform;
pub use processor::ImageProcessor;
pub use source::{Decoder, ImageDescriptor, ImageHeader, ImageInfo, ImageSource};
