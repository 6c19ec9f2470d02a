// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and the parsers for the compact per-image options
// (`--crop 2:10,10,400,300`, `--rotate 1:3`, `--quad ...`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use image2pdf_core::types::{
    CropRegion, CropShape, FitMode, JobInput, MarginPreset, PaperSize, PixelRect, Quad,
};

/// Convert photos and scans into a single multi-page PDF.
#[derive(Parser, Debug)]
#[command(
    name = "image2pdf",
    version,
    about = "Convert photos and scans into a single multi-page PDF",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true, env = "IMAGE2PDF_VERBOSE")]
    pub verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert images, in the order given, into one PDF.
    Convert(ConvertArgs),
    /// Show page count and document information of a PDF.
    Info {
        pdf: PathBuf,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Merge PDFs, in the order given, into one file.
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show format, size and colour mode of images without converting them.
    Probe {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Images to convert; each becomes one page.
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Output PDF path. `.pdf` is appended when missing.
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON settings file.
    #[arg(long, env = "IMAGE2PDF_CONFIG")]
    pub config: Option<PathBuf>,

    /// a4, a3, a5, letter, legal, fit, or WIDTHxHEIGHT in points.
    #[arg(long)]
    pub paper: Option<PaperSize>,

    /// contain, cover, stretch or shrink.
    #[arg(long)]
    pub fit: Option<FitMode>,

    /// none, narrow, normal, wide, or a uniform margin in points.
    #[arg(long)]
    pub margin: Option<MarginArg>,

    /// Pixel density for native image size (72-1200).
    #[arg(long)]
    pub dpi: Option<f32>,

    /// Crop image N (1-based) to a rectangle: N:X,Y,WIDTH,HEIGHT.
    #[arg(long, value_name = "N:X,Y,W,H", value_parser = parse_crop)]
    pub crop: Vec<(usize, PixelRect)>,

    /// Rotate image N clockwise by quarter-turns before cropping: N:TURNS.
    #[arg(long, value_name = "N:TURNS", value_parser = parse_rotate)]
    pub rotate: Vec<(usize, u8)>,

    /// Straighten image N from four corner points: N:X1,Y1,X2,Y2,X3,Y3,X4,Y4.
    #[arg(long, value_name = "N:POINTS", value_parser = parse_quad)]
    pub quad: Vec<(usize, Quad)>,

    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub subject: Option<String>,

    /// Threads used to decode images.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Fail instead of flattening images with transparency.
    #[arg(long)]
    pub reject_alpha: bool,

    /// Boost contrast after cropping.
    #[arg(long)]
    pub enhance: bool,

    /// Leave PDF streams uncompressed.
    #[arg(long)]
    pub no_compress: bool,

    /// Print the conversion report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ConvertArgs {
    /// Pair every image with the crop options that name it.
    pub fn job_inputs(&self) -> Result<Vec<JobInput>, String> {
        let count = self.images.len();
        let check = |n: usize, flag: &str| {
            if n == 0 || n > count {
                Err(format!("{flag} refers to image {n}, but {count} image(s) were given"))
            } else {
                Ok(n - 1)
            }
        };

        let mut regions: BTreeMap<usize, CropRegion> = BTreeMap::new();
        for &(n, rect) in &self.crop {
            let index = check(n, "--crop")?;
            regions.entry(index).or_insert(CropRegion::rotation_only(0)).rect = Some(rect);
        }
        for &(n, turns) in &self.rotate {
            let index = check(n, "--rotate")?;
            let region = regions.entry(index).or_insert(CropRegion::rotation_only(0));
            *region = region.with_rotation(turns);
        }
        let mut quads: BTreeMap<usize, Quad> = BTreeMap::new();
        for &(n, quad) in &self.quad {
            let index = check(n, "--quad")?;
            if regions.contains_key(&index) {
                return Err(format!("image {n} has both --quad and --crop/--rotate"));
            }
            quads.insert(index, quad);
        }

        Ok(self
            .images
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let crop = match (regions.get(&index), quads.get(&index)) {
                    (Some(region), _) => Some(CropShape::Region(*region)),
                    (None, Some(quad)) => Some(CropShape::Perspective(*quad)),
                    (None, None) => None,
                };
                JobInput {
                    path: path.clone(),
                    crop,
                }
            })
            .collect())
    }
}

/// `--margin` value: a named preset or explicit points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginArg {
    Preset(MarginPreset),
    Points(f32),
}

impl FromStr for MarginArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(points) = s.parse::<f32>() {
            if points.is_finite() && points >= 0.0 {
                return Ok(Self::Points(points));
            }
            return Err(format!("margin must be a non-negative number, got {s}"));
        }
        match s.parse::<MarginPreset>() {
            Ok(MarginPreset::Custom) | Err(_) => Err(format!(
                "expected none, narrow, normal, wide or points, got '{s}'"
            )),
            Ok(preset) => Ok(Self::Preset(preset)),
        }
    }
}

/// Split `N:rest` into the image number and the remainder.
fn split_index(s: &str) -> Result<(usize, &str), String> {
    let (n, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("expected N:..., got '{s}'"))?;
    let n = n
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("bad image number '{n}'"))?;
    Ok((n, rest))
}

fn numbers<T: FromStr>(s: &str, expected: usize) -> Result<Vec<T>, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<T>().map_err(|_| format!("bad number '{v}'")))
        .collect::<Result<Vec<T>, String>>()?;
    if values.len() != expected {
        return Err(format!("expected {expected} numbers, got {}", values.len()));
    }
    Ok(values)
}

pub fn parse_crop(s: &str) -> Result<(usize, PixelRect), String> {
    let (n, rest) = split_index(s)?;
    let v: Vec<u32> = numbers(rest, 4)?;
    Ok((n, PixelRect::new(v[0], v[1], v[2], v[3])))
}

pub fn parse_rotate(s: &str) -> Result<(usize, u8), String> {
    let (n, rest) = split_index(s)?;
    let turns = rest
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("bad quarter-turn count '{rest}'"))?;
    Ok((n, turns % 4))
}

pub fn parse_quad(s: &str) -> Result<(usize, Quad), String> {
    let (n, rest) = split_index(s)?;
    let v: Vec<f32> = numbers(rest, 8)?;
    Ok((
        n,
        Quad::new([(v[0], v[1]), (v[2], v[3]), (v[4], v[5]), (v[6], v[7])]),
    ))
}
