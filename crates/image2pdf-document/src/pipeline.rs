// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion pipeline — drive a job through decode, crop, layout and PDF
// assembly, recording the outcome of every input.
//
// Images stream through one at a time: each is decoded and cropped, placed,
// handed to the assembler and dropped before later pages arrive. Per-image
// failures (missing, undecodable, bad crop) skip that image and the batch
// continues. Systemic failures abort the job and never leave a partial file
// at the destination.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;

use chrono::Utc;
use image2pdf_core::config::{ContrastMethod, ConverterConfig};
use image2pdf_core::error::{Image2PdfError, Result};
use image2pdf_core::types::{
    ConversionJob, ConversionResult, DocumentMetadata, ItemStatus, JobFailure, JobInput, JobStatus,
    OutputSummary, PageSize, PaperSize,
};
use tracing::{debug, error, info, instrument, warn};

use crate::image::{CropTransform, ImageDescriptor, ImageSource};
use crate::layout::PageLayoutPolicy;
use crate::output::{sha256_hex, write_atomically};
use crate::pdf::{PdfAssembler, PdfPostProcessor};

/// Receives progress events from a running job.
///
/// Events arrive one at a time, in input order for converted and failed
/// items. All methods default to doing nothing.
pub trait ProgressObserver: Send + Sync {
    fn job_started(&self, _job: &ConversionJob) {}
    /// Input `index` became page `page` (1-indexed).
    fn item_converted(&self, _index: usize, _page: usize) {}
    fn item_failed(&self, _index: usize, _error: &Image2PdfError) {}
    fn job_finished(&self, _result: &ConversionResult) {}
}

/// A prepared input, tagged with its position in the job.
type Prepared = (usize, Result<ImageDescriptor>);

/// Decode and crop a single input. Pure apart from reading the file.
#[derive(Debug, Clone, Copy)]
struct Preparer {
    source: ImageSource,
    crop: CropTransform,
}

impl Preparer {
    fn prepare(&self, input: &JobInput) -> Result<ImageDescriptor> {
        let descriptor = self.source.load(&input.path)?;
        descriptor.map_image(|image| self.crop.apply(image, input.crop.as_ref()))
    }

    /// Size `prepare` would produce, from the file header alone.
    fn measure(&self, input: &JobInput) -> Result<(u32, u32)> {
        let (width, height) = self.source.dimensions(&input.path)?;
        self.crop.output_size(width, height, input.crop.as_ref())
    }
}

/// Pages emitted so far for one job.
struct Assembly {
    layout: PageLayoutPolicy,
    /// Resolved up front, or from the first page when nothing could be
    /// measured.
    page: Option<PageSize>,
    assembler: PdfAssembler,
    metadata: DocumentMetadata,
    /// (input index, page number) for every page added.
    pages: Vec<(usize, usize)>,
}

impl Assembly {
    /// Place `descriptor` and add it as the next page. The pixels are moved
    /// into the assembler and the descriptor is gone afterwards.
    fn add(&mut self, index: usize, descriptor: ImageDescriptor) -> Result<usize> {
        let (width, height) = descriptor.dimensions();
        let page = match self.page {
            Some(page) => page,
            None => {
                let page = self.layout.resolve_page_size([(width, height)])?;
                self.page = Some(page);
                page
            }
        };
        let placement = self.layout.place(width, height, page)?;
        let number = self
            .assembler
            .add_page(index, descriptor.into_image(), &placement, page)?;
        self.pages.push((index, number));
        Ok(number)
    }
}

/// Converts ordered image lists into single PDFs.
#[derive(Clone)]
pub struct ConversionPipeline {
    config: ConverterConfig,
    preparer: Preparer,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ConversionPipeline {
    pub fn new(config: ConverterConfig) -> Self {
        let mut crop = CropTransform::new();
        if config.enhance_contrast {
            crop = match config.contrast_method {
                ContrastMethod::Equalize => crop.with_equalization(),
                ContrastMethod::Linear => crop.with_contrast(config.contrast_factor),
            };
        }
        Self {
            config,
            preparer: Preparer {
                source: ImageSource::new(),
                crop,
            },
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// A job over `inputs` using the configured page settings and metadata.
    pub fn new_job(&self, inputs: Vec<JobInput>, output: impl AsRef<Path>) -> ConversionJob {
        ConversionJob::new(inputs, self.config.page_spec(), output.as_ref())
            .with_metadata(self.config.metadata.clone())
    }

    /// Run `job` to completion on the calling thread.
    ///
    /// With `config.workers` above one, up to that many inputs are decoded
    /// ahead on scoped threads. Pages are always emitted in input order.
    #[instrument(skip_all, fields(job = %job.id, inputs = job.inputs.len()))]
    pub fn run(&self, job: &ConversionJob) -> ConversionResult {
        let result = ConversionResult::pending(job);
        self.notify(|o| o.job_started(job));
        if let Err(err) = job.validate() {
            return self.abort(result, err, None);
        }

        info!(output = %job.output.display(), workers = self.config.workers, "Conversion started");
        let window = self.config.workers.max(1);
        if window == 1 {
            let outcomes = job
                .inputs
                .iter()
                .enumerate()
                .map(|(index, input)| (index, self.preparer.prepare(input)));
            return self.consume(job, result, outcomes);
        }

        let preparer = self.preparer;
        let inputs = &job.inputs;
        std::thread::scope(|scope| {
            // Rendezvous channel: a finished image waits for the assembler
            // instead of piling up.
            let (tx, rx) = mpsc::sync_channel::<Prepared>(0);
            scope.spawn(move || {
                let mut in_flight = VecDeque::with_capacity(window);
                let mut queue = inputs.iter().enumerate();
                loop {
                    while in_flight.len() < window {
                        let Some((index, input)) = queue.next() else { break };
                        in_flight.push_back((index, input, scope.spawn(move || preparer.prepare(input))));
                    }
                    let Some((index, input, handle)) = in_flight.pop_front() else { break };
                    let outcome = handle.join().unwrap_or_else(|_| {
                        error!(index, "Preparation worker panicked");
                        Err(worker_failure(&input.path, &"worker panicked"))
                    });
                    if tx.send((index, outcome)).is_err() {
                        debug!("Assembly stopped early; remaining inputs skipped");
                        break;
                    }
                }
            });
            self.consume(job, result, rx)
        })
    }

    /// Run `job` on the tokio runtime.
    ///
    /// Each input is prepared with `spawn_blocking`, at most
    /// `config.workers` at a time, and handles are awaited in input order.
    /// Assembly and the final write run on one blocking thread fed through
    /// a single-slot channel.
    #[instrument(skip_all, fields(job = %job.id, inputs = job.inputs.len()))]
    pub async fn run_async(&self, job: ConversionJob) -> ConversionResult {
        let result = ConversionResult::pending(&job);
        self.notify(|o| o.job_started(&job));
        if let Err(err) = job.validate() {
            return self.abort(result, err, None);
        }

        info!(output = %job.output.display(), workers = self.config.workers, "Conversion started");
        let inputs = job.inputs.clone();
        let fallback = result.clone();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Prepared>(1);
        let consumer = {
            let pipeline = self.clone();
            tokio::task::spawn_blocking(move || {
                pipeline.consume(&job, result, std::iter::from_fn(move || rx.blocking_recv()))
            })
        };

        let window = self.config.workers.max(1);
        let mut in_flight = VecDeque::with_capacity(window);
        let mut queue = inputs.into_iter().enumerate();
        loop {
            while in_flight.len() < window {
                let Some((index, input)) = queue.next() else { break };
                let preparer = self.preparer;
                let path = input.path.clone();
                let handle = tokio::task::spawn_blocking(move || preparer.prepare(&input));
                in_flight.push_back((index, path, handle));
            }
            let Some((index, path, handle)) = in_flight.pop_front() else { break };
            let outcome = handle
                .await
                .unwrap_or_else(|err| Err(worker_failure(&path, &err)));
            if tx.send((index, outcome)).await.is_err() {
                debug!("Assembly stopped early; remaining inputs skipped");
                break;
            }
        }
        drop(tx);

        match consumer.await {
            Ok(result) => result,
            Err(err) => self.abort(
                fallback,
                Image2PdfError::Io(std::io::Error::other(format!("assembly task failed: {err}"))),
                None,
            ),
        }
    }

    /// Take prepared inputs in order, turn each into a page as it arrives,
    /// then write the PDF.
    fn consume<I>(&self, job: &ConversionJob, mut result: ConversionResult, outcomes: I) -> ConversionResult
    where
        I: IntoIterator<Item = Prepared>,
    {
        let mut assembly = match self.start_assembly(job) {
            Ok(assembly) => assembly,
            Err(err) => return self.abort(result, err, None),
        };

        for (index, outcome) in outcomes {
            let descriptor = match outcome {
                Ok(descriptor) => descriptor,
                Err(err) if err.is_per_item() => {
                    warn!(index, %err, "Skipping image");
                    result.items[index].status = ItemStatus::Failed {
                        kind: err.kind(),
                        reason: err.to_string(),
                    };
                    self.notify(|o| o.item_failed(index, &err));
                    continue;
                }
                Err(err) => return self.abort(result, err, Some(index)),
            };
            match assembly.add(index, descriptor) {
                Ok(page) => {
                    debug!(index, page, "Page added");
                    self.notify(|o| o.item_converted(index, page));
                }
                Err(err) => return self.abort(result, err, Some(index)),
            }
        }

        if assembly.pages.is_empty() {
            warn!("Every image failed; no output written");
            result.status = JobStatus::FailedEmpty;
            return self.finish(result);
        }

        let pages = assembly.pages.clone();
        match self.write(job, assembly) {
            Ok(summary) => {
                for (index, page) in pages {
                    result.items[index].status = ItemStatus::Converted { page };
                }
                info!(
                    pages = summary.page_count,
                    bytes = summary.bytes,
                    failed = result.failures().count(),
                    "Conversion completed"
                );
                result.output = Some(summary);
                result.status = JobStatus::Completed;
                self.finish(result)
            }
            Err(err) => self.abort(result, err, None),
        }
    }

    /// Layout, metadata and an empty assembler for `job`.
    ///
    /// `FitToLargest` pages are sized from image headers, so no pixels are
    /// held while the page size is worked out.
    fn start_assembly(&self, job: &ConversionJob) -> Result<Assembly> {
        let layout = PageLayoutPolicy::new(job.page);
        let page = if job.page.paper == PaperSize::FitToLargest {
            let sizes: Vec<(u32, u32)> = job
                .inputs
                .iter()
                .enumerate()
                .filter_map(|(index, input)| match self.preparer.measure(input) {
                    Ok(size) => Some(size),
                    Err(err) => {
                        debug!(index, %err, "Cannot measure image; it will fail when prepared");
                        None
                    }
                })
                .collect();
            if sizes.is_empty() {
                None
            } else {
                Some(layout.resolve_page_size(sizes)?)
            }
        } else {
            Some(layout.resolve_page_size(std::iter::empty())?)
        };

        let metadata = job.metadata.clone().or(&self.config.metadata);
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| default_title(&job.output));
        Ok(Assembly {
            layout,
            page,
            assembler: PdfAssembler::new(&title, self.config.alpha),
            metadata,
            pages: Vec::new(),
        })
    }

    /// Serialise, post-process and atomically write the assembled pages.
    fn write(&self, job: &ConversionJob, assembly: Assembly) -> Result<OutputSummary> {
        let page_count = assembly.assembler.page_count();
        let assembled = assembly.assembler.finish()?;
        let pdf = PdfPostProcessor::new(assembly.metadata)
            .compress(self.config.compress)
            .process(&assembled)?;
        let bytes = write_atomically(&job.output, |w| Ok(w.write_all(&pdf)?))?;

        Ok(OutputSummary {
            path: job.output.clone(),
            page_count,
            bytes,
            sha256: sha256_hex(&pdf),
        })
    }

    fn abort(
        &self,
        mut result: ConversionResult,
        err: Image2PdfError,
        index: Option<usize>,
    ) -> ConversionResult {
        let index = match &err {
            Image2PdfError::Serialization { index, .. } => Some(*index),
            _ => index,
        };
        error!(%err, ?index, "Conversion aborted");
        result.status = JobStatus::Aborted;
        result.error = Some(JobFailure {
            kind: err.kind(),
            message: err.to_string(),
            index,
        });
        self.finish(result)
    }

    fn finish(&self, mut result: ConversionResult) -> ConversionResult {
        result.finished_at = Some(Utc::now());
        self.notify(|o| o.job_finished(&result));
        result
    }

    fn notify(&self, event: impl FnOnce(&dyn ProgressObserver)) {
        if let Some(observer) = &self.observer {
            event(observer.as_ref());
        }
    }
}

/// Title used when the job sets none: the output file's stem.
fn default_title(output: &Path) -> String {
    output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Image2PDF".into())
}

fn worker_failure(path: &Path, err: &dyn std::fmt::Display) -> Image2PdfError {
    Image2PdfError::Decode {
        path: path.to_path_buf(),
        detail: format!("preparation failed: {err}"),
    }
}
