// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image source — read an image file, pick a decoder from its signature, and
// normalise orientation and channel depth so every later stage sees upright
// 8-bit pixels.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::ColorMode;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Number of leading bytes needed to recognise every supported signature.
const SIGNATURE_LEN: usize = 12;

/// Image decoders, one per supported container format.
///
/// Chosen from the file's magic bytes; file extensions are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Decoder {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl Decoder {
    /// Identify the decoder for data starting with `bytes`.
    pub fn from_signature(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'B', b'M', ..] => Some(Self::Bmp),
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some(Self::Tiff),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::WebP),
            _ => None,
        }
    }

    /// Short lowercase name, e.g. `"jpeg"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// Decode `bytes`, returning the pixels and the embedded orientation.
    ///
    /// Formats without orientation metadata report `NoTransforms`.
    pub fn decode(&self, bytes: &[u8]) -> image::ImageResult<(DynamicImage, Orientation)> {
        let reader = ImageReader::with_format(Cursor::new(bytes), self.image_format());
        let mut decoder = reader.into_decoder()?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let image = DynamicImage::from_decoder(decoder)?;
        Ok((image, orientation))
    }

    /// Read the header of the image in `reader`: size, colour type and
    /// orientation. No pixels are decoded.
    pub fn header<R: std::io::BufRead + Seek>(&self, reader: R) -> image::ImageResult<ImageHeader> {
        let mut decoder = ImageReader::with_format(reader, self.image_format()).into_decoder()?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let (width, height) = decoder.dimensions();
        Ok(ImageHeader {
            width,
            height,
            color: decoder.color_type(),
            orientation,
        })
    }
}

/// What an image file's header says, before any pixels are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Stored width, before orientation.
    pub width: u32,
    /// Stored height, before orientation.
    pub height: u32,
    pub color: ColorType,
    pub orientation: Orientation,
}

impl ImageHeader {
    /// Size once `orientation` has been applied.
    pub fn upright_dimensions(&self) -> (u32, u32) {
        match self.orientation {
            Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}

/// A decoded, upright, 8-bit image together with where it came from.
///
/// Owned exclusively by the pipeline until its page has been emitted.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub path: PathBuf,
    pub format: Decoder,
    /// EXIF orientation tag (1-8) found in the file; 1 when absent.
    pub orientation: u8,
    image: DynamicImage,
}

impl ImageDescriptor {
    pub fn new(path: PathBuf, format: Decoder, orientation: u8, image: DynamicImage) -> Self {
        Self {
            path,
            format,
            orientation,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn color(&self) -> ColorMode {
        color_mode(self.image.color())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Replace the pixel buffer, keeping the provenance.
    pub fn map_image<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage>,
    {
        let image = f(self.image)?;
        Ok(Self { image, ..self })
    }
}

/// Facts about an image file, without keeping its pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub format: Decoder,
    /// Upright width after orientation is applied.
    pub width: u32,
    /// Upright height after orientation is applied.
    pub height: u32,
    pub color: ColorMode,
    pub orientation: u8,
    pub file_size: u64,
}

/// Loads images from storage.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource {
    /// Apply the EXIF orientation tag to the pixels.
    apply_orientation: bool,
}

impl Default for ImageSource {
    fn default() -> Self {
        Self {
            apply_orientation: true,
        }
    }
}

impl ImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep raw sensor orientation instead of honouring EXIF.
    pub fn ignore_orientation(mut self) -> Self {
        self.apply_orientation = false;
        self
    }

    /// Read and decode the image at `path`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ImageDescriptor> {
        let path = path.as_ref();
        let bytes = read_input(path)?;
        let descriptor = self.decode(path, &bytes)?;
        info!(
            format = descriptor.format.name(),
            width = descriptor.width(),
            height = descriptor.height(),
            orientation = descriptor.orientation,
            "Image loaded"
        );
        Ok(descriptor)
    }

    /// Decode already-read file contents. `path` is used for reporting only.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> Result<ImageDescriptor> {
        let head = &bytes[..bytes.len().min(SIGNATURE_LEN)];
        let decoder = Decoder::from_signature(head).ok_or_else(|| {
            Image2PdfError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
        })?;

        let (mut image, orientation) =
            decoder.decode(bytes).map_err(|err| Image2PdfError::Decode {
                path: path.to_path_buf(),
                detail: err.to_string(),
            })?;

        if self.apply_orientation && orientation != Orientation::NoTransforms {
            debug!(?orientation, "Applying EXIF orientation");
            image.apply_orientation(orientation);
        }

        Ok(ImageDescriptor::new(
            path.to_path_buf(),
            decoder,
            orientation.to_exif(),
            narrow_to_8bit(image),
        ))
    }

    /// Size of the image at `path` as `load` would return it, read from the
    /// file header without decoding pixels.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn dimensions(&self, path: impl AsRef<Path>) -> Result<(u32, u32)> {
        let path = path.as_ref();
        let (_, header, _) = self.read_header(path)?;
        Ok(self.upright(&header))
    }

    /// Inspect an image file: format, upright size, colour mode, file size.
    /// Only the header is decoded.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn probe(&self, path: impl AsRef<Path>) -> Result<ImageInfo> {
        let path = path.as_ref();
        let (format, header, file_size) = self.read_header(path)?;
        let (width, height) = self.upright(&header);
        Ok(ImageInfo {
            path: path.to_path_buf(),
            format,
            width,
            height,
            color: color_mode(header.color),
            orientation: header.orientation.to_exif(),
            file_size,
        })
    }

    fn upright(&self, header: &ImageHeader) -> (u32, u32) {
        if self.apply_orientation {
            header.upright_dimensions()
        } else {
            (header.width, header.height)
        }
    }

    /// Open `path`, pick its decoder and read the header. Also returns the
    /// file size.
    fn read_header(&self, path: &Path) -> Result<(Decoder, ImageHeader, u64)> {
        let mut file = File::open(path).map_err(|err| input_error(path, err))?;
        let file_size = file.metadata().map_err(|err| input_error(path, err))?.len();

        let mut head = Vec::with_capacity(SIGNATURE_LEN);
        (&mut file)
            .take(SIGNATURE_LEN as u64)
            .read_to_end(&mut head)
            .map_err(|err| input_error(path, err))?;
        let decoder = Decoder::from_signature(&head).ok_or_else(|| {
            Image2PdfError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
        })?;
        file.rewind().map_err(|err| input_error(path, err))?;

        let header = decoder
            .header(BufReader::new(file))
            .map_err(|err| Image2PdfError::Decode {
                path: path.to_path_buf(),
                detail: err.to_string(),
            })?;
        debug!(format = decoder.name(), ?header, "Header read");
        Ok((decoder, header, file_size))
    }
}

/// Read an input file, distinguishing "missing" from "unreadable".
fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| input_error(path, err))
}

fn input_error(path: &Path, err: std::io::Error) -> Image2PdfError {
    match err.kind() {
        std::io::ErrorKind::NotFound => Image2PdfError::NotFound {
            path: path.to_path_buf(),
        },
        _ => Image2PdfError::Decode {
            path: path.to_path_buf(),
            detail: format!("cannot read file: {err}"),
        },
    }
}

/// Collapse 16-bit and float buffers to 8 bits per channel.
fn narrow_to_8bit(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => image,
        ColorType::L16 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La16 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        color if color.has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Map an `image` colour type onto the converter's colour modes.
pub fn color_mode(color: ColorType) -> ColorMode {
    match (color.has_color(), color.has_alpha()) {
        (false, false) => ColorMode::Gray,
        (false, true) => ColorMode::GrayAlpha,
        (true, false) => ColorMode::Rgb,
        (true, true) => ColorMode::Rgba,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
        let path = dir.join(name);
        image.save_with_format(&path, ImageFormat::Png).expect("write fixture");
        path
    }

    #[test]
    fn signatures_select_decoders() {
        assert_eq!(Decoder::from_signature(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(Decoder::Jpeg));
        assert_eq!(
            Decoder::from_signature(b"\x89PNG\r\n\x1a\n...."),
            Some(Decoder::Png)
        );
        assert_eq!(Decoder::from_signature(b"GIF89a"), Some(Decoder::Gif));
        assert_eq!(Decoder::from_signature(b"BM\x00\x00"), Some(Decoder::Bmp));
        assert_eq!(Decoder::from_signature(b"II*\x00"), Some(Decoder::Tiff));
        assert_eq!(Decoder::from_signature(b"MM\x00*"), Some(Decoder::Tiff));
        assert_eq!(Decoder::from_signature(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some(Decoder::WebP));
        assert_eq!(Decoder::from_signature(b"RIFF\x10\x00\x00\x00WAVE"), None);
        assert_eq!(Decoder::from_signature(b"%PDF-1.7"), None);
        assert_eq!(Decoder::from_signature(&[]), None);
    }

    #[test]
    fn loads_png_regardless_of_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([10, 20, 30])));
        // Misleading extension: the signature decides.
        let path = write_png(dir.path(), "photo.jpg", &img);

        let loaded = ImageSource::new().load(&path).expect("load");
        assert_eq!(loaded.format, Decoder::Png);
        assert_eq!(loaded.dimensions(), (40, 20));
        assert_eq!(loaded.color(), ColorMode::Rgb);
        assert_eq!(loaded.orientation, 1);
    }

    /// A `width` x `height` JPEG carrying an Exif APP1 segment with the
    /// given Orientation tag.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let mut plain = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50])))
            .write_to(&mut Cursor::new(&mut plain), ImageFormat::Jpeg)
            .expect("encode jpeg");

        // Big-endian TIFF header, one IFD entry: 0x0112 SHORT x1.
        let mut exif = b"Exif\0\0MM\0\x2A\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01".to_vec();
        exif.extend_from_slice(&orientation.to_be_bytes());
        exif.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&exif);
        out.extend_from_slice(&plain[2..]);
        out
    }

    #[test]
    fn exif_orientation_turns_the_image_upright() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("portrait.jpg");
        std::fs::write(&path, jpeg_with_orientation(40, 20, 6)).expect("write");

        let loaded = ImageSource::new().load(&path).expect("load");
        assert_eq!(loaded.format, Decoder::Jpeg);
        assert_eq!(loaded.orientation, 6);
        assert_eq!(loaded.dimensions(), (20, 40));

        let raw = ImageSource::new().ignore_orientation().load(&path).expect("load raw");
        assert_eq!(raw.dimensions(), (40, 20));
    }

    #[test]
    fn header_dimensions_honour_orientation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("portrait.jpg");
        std::fs::write(&path, jpeg_with_orientation(40, 20, 6)).expect("write");

        assert_eq!(ImageSource::new().dimensions(&path).unwrap(), (20, 40));
        assert_eq!(
            ImageSource::new().ignore_orientation().dimensions(&path).unwrap(),
            (40, 20)
        );
        let info = ImageSource::new().probe(&path).expect("probe");
        assert_eq!((info.width, info.height, info.orientation), (20, 40, 6));

        let upside_down = dir.path().join("flipped.jpg");
        std::fs::write(&upside_down, jpeg_with_orientation(40, 20, 3)).expect("write");
        assert_eq!(ImageSource::new().dimensions(&upside_down).unwrap(), (40, 20));
    }

    #[test]
    fn header_read_reports_missing_and_unknown_files() {
        let err = ImageSource::new().dimensions("/no/such/image.png").unwrap_err();
        assert!(matches!(err, Image2PdfError::NotFound { .. }));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"plain text").expect("write");
        let err = ImageSource::new().probe(&path).unwrap_err();
        assert!(matches!(err, Image2PdfError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ImageSource::new().load("/no/such/image.png").unwrap_err();
        assert!(matches!(err, Image2PdfError::NotFound { .. }));
    }

    #[test]
    fn garbage_is_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"just some text, not an image").expect("write");
        let err = ImageSource::new().load(&path).unwrap_err();
        assert!(matches!(err, Image2PdfError::UnsupportedFormat { .. }));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([200, 0, 0])));
        let good = write_png(dir.path(), "good.png", &img);
        let bytes = std::fs::read(&good).expect("read");
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, &bytes[..bytes.len() / 3]).expect("write");

        let err = ImageSource::new().load(&bad).unwrap_err();
        assert!(matches!(err, Image2PdfError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn sixteen_bit_is_narrowed() {
        let img = DynamicImage::ImageLuma16(image::ImageBuffer::from_pixel(4, 4, Luma([65535u16])));
        let narrowed = narrow_to_8bit(img);
        assert_eq!(narrowed.color(), ColorType::L8);
        assert_eq!(narrowed.to_luma8().get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn colour_modes_are_detected() {
        assert_eq!(color_mode(ColorType::L8), ColorMode::Gray);
        assert_eq!(color_mode(ColorType::La8), ColorMode::GrayAlpha);
        assert_eq!(color_mode(ColorType::Rgb8), ColorMode::Rgb);
        assert_eq!(color_mode(ColorType::Rgba16), ColorMode::Rgba);
    }

    #[test]
    fn probe_reports_file_facts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 5, Rgba([1, 2, 3, 128])));
        let path = write_png(dir.path(), "alpha.png", &img);

        let info = ImageSource::new().probe(&path).expect("probe");
        assert_eq!(info.format, Decoder::Png);
        assert_eq!((info.width, info.height), (8, 5));
        assert_eq!(info.color, ColorMode::Rgba);
        assert_eq!(info.file_size, std::fs::metadata(&path).unwrap().len());

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([7])));
        let gray_path = write_png(dir.path(), "gray.png", &gray);
        assert_eq!(ImageSource::new().probe(&gray_path).unwrap().color, ColorMode::Gray);
    }
}
