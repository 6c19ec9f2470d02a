// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the image2pdf-document crate: page layout, crop
// transforms and single-page assembly on synthetic images.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use image2pdf_core::config::AlphaHandling;
use image2pdf_core::types::{CropRegion, CropShape, FitMode, Margins, PageSpec, PaperSize, Quad};
use image2pdf_document::{CropTransform, PageLayoutPolicy, PdfAssembler};

/// A 1200x900 gradient, large enough for the pixel loops to dominate.
fn sample_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(1200, 900, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_place");
    for fit in [FitMode::Contain, FitMode::Cover, FitMode::Stretch, FitMode::ShrinkToFit] {
        let policy = PageLayoutPolicy::new(PageSpec::new(PaperSize::A4, Margins::uniform(28.0), fit));
        let page = policy
            .resolve_page_size(std::iter::empty())
            .expect("A4 has a fixed size");
        group.bench_function(format!("{fit:?}"), |b| {
            b.iter(|| black_box(policy.place(black_box(4032), black_box(3024), page)));
        });
    }
    group.finish();
}

fn bench_crop(c: &mut Criterion) {
    let image = sample_image();
    let transform = CropTransform::new();

    let region = CropShape::Region(CropRegion::new(100, 100, 600, 800).with_rotation(1));
    c.bench_function("crop_rotate_region (1200x900)", |b| {
        b.iter(|| black_box(transform.apply(image.clone(), Some(&region))));
    });

    let quad = CropShape::Perspective(Quad::new([
        (80.0, 60.0),
        (1100.0, 40.0),
        (1150.0, 860.0),
        (50.0, 880.0),
    ]));
    c.bench_function("crop_perspective (1200x900)", |b| {
        b.iter(|| black_box(transform.apply(image.clone(), Some(&quad))));
    });
}

fn bench_assemble(c: &mut Criterion) {
    let image = sample_image();
    let policy = PageLayoutPolicy::default();
    let page = policy
        .resolve_page_size(std::iter::empty())
        .expect("A4 has a fixed size");
    let placement = policy.place(image.width(), image.height(), page).expect("placement");

    c.bench_function("assemble_single_page (1200x900)", |b| {
        b.iter(|| {
            let mut assembler = PdfAssembler::new("bench", AlphaHandling::Flatten);
            assembler
                .add_page(0, image.clone(), &placement, page)
                .expect("add page");
            black_box(assembler.finish().expect("finish"));
        });
    });
}

criterion_group!(benches, bench_layout, bench_crop, bench_assemble);
criterion_main!(benches);
