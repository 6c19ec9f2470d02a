// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image2PDF — command-line front end.
//
// Entry point. Initialises logging, maps flags onto `ConverterConfig`, runs
// the conversion pipeline and reports the result. Exits 0 when the job
// completed (even if some images were skipped), 1 otherwise.

mod args;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use image2pdf_core::config::{AlphaHandling, ConverterConfig};
use image2pdf_core::error::Image2PdfError;
use image2pdf_core::files::{format_file_size, validate_pdf_filename};
use image2pdf_core::human_errors::{humanize_error, humanize_item};
use image2pdf_core::types::{ConversionJob, ConversionResult, JobStatus, MarginPreset, Margins};
use image2pdf_document::{ConversionPipeline, ImageSource, PdfInspector, ProgressObserver, merge_files};
use tracing_subscriber::EnvFilter;

use args::{Cli, Command, ConvertArgs, MarginArg};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let json = match &cli.command {
        Command::Convert(args) => args.json,
        Command::Info { json, .. } | Command::Probe { json, .. } => *json,
        Command::Merge { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || json {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Convert(args) => convert(args, cli.quiet).await,
        Command::Info { pdf, json } => info(&pdf, json),
        Command::Merge { inputs, output } => merge(&inputs, &output, cli.quiet),
        Command::Probe { images, json } => probe(&images, json),
    }
}

// -- convert ------------------------------------------------------------------

/// Prints one line per image to stderr as the job progresses.
struct CliProgress {
    total: usize,
}

impl ProgressObserver for CliProgress {
    fn item_converted(&self, index: usize, page: usize) {
        eprintln!("[{}/{}] page {page}", index + 1, self.total);
    }

    fn item_failed(&self, index: usize, error: &Image2PdfError) {
        let human = humanize_error(error);
        eprintln!("[{}/{}] skipped: {}", index + 1, self.total, human.message);
    }
}

async fn convert(args: ConvertArgs, quiet: bool) -> Result<ExitCode> {
    let config = build_config(&args)?;
    let inputs = args.job_inputs().map_err(anyhow::Error::msg)?;
    let output = output_path(&args.output);

    let mut pipeline = ConversionPipeline::new(config);
    if !quiet && !args.json {
        pipeline = pipeline.with_observer(Arc::new(CliProgress {
            total: inputs.len(),
        }));
    }

    let mut job: ConversionJob = pipeline.new_job(inputs, &output);
    for (field, value) in [
        (&mut job.metadata.title, &args.title),
        (&mut job.metadata.author, &args.author),
        (&mut job.metadata.subject, &args.subject),
    ] {
        if value.is_some() {
            field.clone_from(value);
        }
    }

    let result = pipeline.run_async(job).await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise report")?
        );
    } else if !quiet {
        print_report(&result);
    }

    Ok(if result.status == JobStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Settings file (if any) overridden by flags.
fn build_config(args: &ConvertArgs) -> Result<ConverterConfig> {
    let mut config = match &args.config {
        Some(path) => ConverterConfig::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ConverterConfig::default(),
    };

    if let Some(paper) = args.paper {
        config.paper_size = paper;
    }
    if let Some(fit) = args.fit {
        config.fit_mode = fit;
    }
    match args.margin {
        Some(MarginArg::Preset(preset)) => config.margin_preset = preset,
        Some(MarginArg::Points(points)) => {
            config.margin_preset = MarginPreset::Custom;
            config.custom_margins = Margins::uniform(points);
        }
        None => {}
    }
    if let Some(dpi) = args.dpi {
        config.dpi = dpi;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.reject_alpha {
        config.alpha = AlphaHandling::Reject;
    }
    if args.enhance {
        config.enhance_contrast = true;
    }
    if args.no_compress {
        config.compress = false;
    }

    let repaired = config.validate();
    if repaired > 0 {
        tracing::warn!(repaired, "Some settings were out of range and were reset");
    }
    Ok(config)
}

/// `path` with a safe file name ending in `.pdf`.
fn output_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| validate_pdf_filename(&n.to_string_lossy()))
        .unwrap_or_else(|| "output.pdf".into());
    path.with_file_name(name)
}

fn print_report(result: &ConversionResult) {
    for item in &result.items {
        if let Some(human) = humanize_item(item) {
            println!("  ! {}", human.message);
            println!("    {}", human.suggestion);
        }
    }

    match result.status {
        JobStatus::Completed => {
            if let Some(out) = &result.output {
                println!(
                    "Wrote {} ({} page{}, {})",
                    out.path.display(),
                    out.page_count,
                    if out.page_count == 1 { "" } else { "s" },
                    format_file_size(out.bytes)
                );
            }
        }
        JobStatus::FailedEmpty => println!("No images could be converted; nothing was written."),
        JobStatus::Aborted | JobStatus::Pending => {
            if let Some(failure) = &result.error {
                println!("Conversion stopped: {}", failure.message);
            }
        }
    }
}

// -- info / merge / probe -----------------------------------------------------

fn info(pdf: &Path, json: bool) -> Result<ExitCode> {
    let info = PdfInspector::open(pdf)
        .with_context(|| format!("Failed to open {}", pdf.display()))?
        .info();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("File:      {}", pdf.display());
    println!("Pages:     {}", info.page_count);
    println!("Size:      {}", format_file_size(info.file_size));
    let meta = &info.metadata;
    for (label, value) in [
        ("Title:", &meta.title),
        ("Author:", &meta.author),
        ("Subject:", &meta.subject),
        ("Creator:", &meta.creator),
        ("Producer:", &meta.producer),
        ("Created:", &meta.creation_date),
    ] {
        if let Some(value) = value {
            println!("{label:<10} {value}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn merge(inputs: &[PathBuf], output: &Path, quiet: bool) -> Result<ExitCode> {
    let output = output_path(output);
    let summary = merge_files(inputs, &output).context("Failed to merge PDFs")?;
    if !quiet {
        println!(
            "Wrote {} ({} pages, {})",
            summary.path.display(),
            summary.page_count,
            format_file_size(summary.bytes)
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn probe(images: &[PathBuf], json: bool) -> Result<ExitCode> {
    let source = ImageSource::new();
    let mut infos = Vec::with_capacity(images.len());
    let mut failed = 0;
    for path in images {
        match source.probe(path) {
            Ok(info) => infos.push(info),
            Err(err) => {
                failed += 1;
                eprintln!("{}: {}", path.display(), humanize_error(&err).message);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        for info in &infos {
            println!(
                "{}  {}  {}x{}  {:?}  {}",
                info.path.display(),
                info.format.name(),
                info.width,
                info.height,
                info.color,
                format_file_size(info.file_size)
            );
        }
    }

    if infos.is_empty() {
        bail!("none of the {failed} image(s) could be read");
    }
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
