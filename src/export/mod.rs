//! Run orchestration: archive traversal, per-message isolation and reporting.
//!
//! A run moves through
//! `Idle → Opening → Traversing → (Normalizing → Planning → Writing)* → Reporting → Closed`.
//! Folders are visited depth-first in archive order; within a folder its
//! messages come before its child folders. That order decides which of
//! several colliding messages keeps the bare file name.

pub mod report;

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, info, warn};

use crate::archive::{self, Archive, FolderSource, RawMessage};
use crate::error::{ExtractError, Result};
use crate::normalize;
use crate::plan::{NameRegistry, PathPlanner, DEFAULT_MAX_SUBJECT_BYTES};
use crate::write::{OutputFormat, PdfStyle, Writer};

pub use report::{DegradedMessage, Failure, RunReport, RunStatus};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_root: PathBuf,
    pub formats: OutputFormat,
    /// Plan everything, write nothing.
    pub preview: bool,
    /// Offset for the calendar date in file names and PDF headers.
    pub utc_offset: FixedOffset,
    pub max_subject_bytes: usize,
    pub pdf: PdfStyle,
}

impl ExportOptions {
    pub fn new(output_root: impl Into<PathBuf>, formats: OutputFormat) -> Self {
        Self {
            output_root: output_root.into(),
            formats,
            preview: false,
            utc_offset: Utc.fix(),
            max_subject_bytes: DEFAULT_MAX_SUBJECT_BYTES,
            pdf: PdfStyle::default(),
        }
    }
}

/// Progress after each message.
#[derive(Debug)]
pub struct Progress<'a> {
    /// Archive folder path of the message, `/`-separated.
    pub folder: &'a str,
    pub report: &'a RunReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Opening,
    Traversing,
    Normalizing,
    Planning,
    Writing,
    Reporting,
    Closed,
}

/// Extracts archives according to [`ExportOptions`].
#[derive(Debug, Clone)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Open the archive at `path` and export it.
    pub fn run(&self, path: &Path) -> Result<RunReport> {
        self.run_with_progress(path, &|_| {})
    }

    /// [`Exporter::run`] with a callback invoked after every message.
    pub fn run_with_progress(
        &self,
        path: &Path,
        progress: &dyn Fn(&Progress<'_>),
    ) -> Result<RunReport> {
        let mut run = Run::new(&self.options, path, progress);
        run.enter(Phase::Opening);
        let archive = archive::open(path)?;
        info!(path = %archive.path().display(), "Opened archive");
        let report = run.execute(archive.as_ref());
        drop(archive);
        run.enter(Phase::Closed);
        report
    }

    /// Export an already opened archive.
    pub fn run_archive(
        &self,
        archive: &dyn Archive,
        progress: &dyn Fn(&Progress<'_>),
    ) -> Result<RunReport> {
        let mut run = Run::new(&self.options, archive.path(), progress);
        let report = run.execute(archive);
        run.enter(Phase::Closed);
        report
    }
}

/// State of one run. The name registry lives and dies with it.
struct Run<'a> {
    options: &'a ExportOptions,
    planner: PathPlanner,
    writer: Writer,
    registry: NameRegistry,
    report: RunReport,
    phase: Phase,
    progress: &'a dyn Fn(&Progress<'_>),
}

impl<'a> Run<'a> {
    fn new(options: &'a ExportOptions, archive: &Path, progress: &'a dyn Fn(&Progress<'_>)) -> Self {
        let planner = PathPlanner::new(options.formats)
            .with_utc_offset(options.utc_offset)
            .with_max_subject_bytes(options.max_subject_bytes);
        let writer = Writer::new(PdfStyle {
            utc_offset: options.utc_offset,
            ..options.pdf.clone()
        });
        Self {
            options,
            planner,
            writer,
            registry: NameRegistry::new(),
            report: RunReport {
                archive: archive.to_path_buf(),
                output_root: options.output_root.clone(),
                preview: options.preview,
                ..RunReport::default()
            },
            phase: Phase::Idle,
            progress,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Phase transition");
        self.phase = phase;
    }

    fn execute(&mut self, archive: &dyn Archive) -> Result<RunReport> {
        let root = &self.options.output_root;
        if !self.options.preview {
            std::fs::create_dir_all(root).map_err(|source| ExtractError::OutputRoot {
                path: root.clone(),
                source,
            })?;
        }

        self.enter(Phase::Traversing);
        self.visit(archive.root(), root, "");

        self.enter(Phase::Reporting);
        info!(
            processed = self.report.processed,
            skipped = self.report.skipped,
            failed = self.report.failed,
            preview = self.options.preview,
            "Run finished"
        );
        Ok(std::mem::take(&mut self.report))
    }

    /// Export `folder` into `out_dir`: its messages, then its children.
    fn visit(&mut self, folder: &dyn FolderSource, out_dir: &Path, label: &str) {
        for item in folder.messages() {
            match item {
                Ok(raw) => self.process(raw, out_dir, label),
                Err(e) => {
                    warn!(folder = label, error = %e, "Cannot read message");
                    self.report.record_failure(display_label(label), e);
                }
            }
            (self.progress)(&Progress {
                folder: label,
                report: &self.report,
            });
            self.enter(Phase::Traversing);
        }

        for child in folder.children() {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!(folder = label, error = %e, "Cannot list child folders");
                    self.report.record_failure(display_label(label), e);
                    continue;
                }
            };
            let child_label = if label.is_empty() {
                child.name().to_string()
            } else {
                format!("{label}/{}", child.name())
            };
            let child_dir = self
                .planner
                .plan_folder(out_dir, child.name(), &mut self.registry);
            if !self.options.preview {
                if let Err(e) = std::fs::create_dir_all(&child_dir) {
                    warn!(path = %child_dir.display(), error = %e, "Cannot create folder");
                    self.report
                        .record_failure(child_label, format!("cannot create {}: {e}", child_dir.display()));
                    continue;
                }
            }
            debug!(folder = %child_label, path = %child_dir.display(), "Entering folder");
            self.visit(child.as_ref(), &child_dir, &child_label);
        }
    }

    fn process(&mut self, raw: RawMessage, out_dir: &Path, label: &str) {
        let source = format!("{} [{}]", display_label(label), raw.id);
        if !normalize::is_mail_item(&raw) {
            debug!(source = %source, class = ?raw.message_class, "Skipping non-mail item");
            self.report.skipped += 1;
            return;
        }

        self.enter(Phase::Normalizing);
        let normalized = normalize::normalize(raw);
        if !normalized.degradations.is_empty() {
            for note in &normalized.degradations {
                info!(source = %source, "{note}");
            }
            self.report.degraded.push(DegradedMessage {
                source: source.clone(),
                notes: normalized.degradations,
            });
        }
        let message = normalized.message;

        self.enter(Phase::Planning);
        let plan = self.planner.plan(&message, out_dir, &mut self.registry);

        if self.options.preview {
            self.report
                .outputs
                .extend(plan.all_paths().map(Path::to_path_buf));
            self.report.processed += 1;
            return;
        }

        self.enter(Phase::Writing);
        match self.writer.write(&message, &plan) {
            Ok(summary) => {
                self.report.processed += 1;
                self.report.attachments_written += summary.attachments.len();
                self.report.bytes_written += summary.bytes;
                self.report.outputs.extend(summary.files);
                self.report.outputs.extend(summary.attachments);
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Cannot write message");
                self.report.record_failure(source, e);
            }
        }
    }
}

fn display_label(label: &str) -> String {
    if label.is_empty() {
        "/".to_string()
    } else {
        label.to_string()
    }
}
