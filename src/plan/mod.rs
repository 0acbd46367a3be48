//! Destination planning: folder mirroring, file naming and duplicate suffixes.
//!
//! Every message becomes `[YYYY-MM-DD] - <subject>.<ext>` inside the mirrored
//! folder. Names already handed out during the run, or already present on
//! disk, push later messages to ` (2)`, ` (3)`, … in traversal order.

pub mod sanitize;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::model::message::CanonicalMessage;
use crate::write::{FileKind, OutputFormat};

pub use sanitize::sanitize_component;

/// Directory holding a folder's attachments. Reserved in every output directory.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Placeholder stem for messages without a subject.
pub const NO_SUBJECT: &str = "No Subject";

/// Placeholder for folders whose name sanitizes to nothing.
pub const UNNAMED_FOLDER: &str = "Unnamed Folder";

/// Default byte budget for the subject part of a file name.
pub const DEFAULT_MAX_SUBJECT_BYTES: usize = 120;

const MAX_FOLDER_BYTES: usize = 120;
const MAX_ATTACHMENT_BYTES: usize = 150;

/// Names handed out during one run, per output directory.
///
/// Append-only and case-insensitive. A fresh registry already holds the
/// reserved `attachments` entry for every directory.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashMap<PathBuf, HashSet<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `name` was already claimed in `dir` (or is reserved).
    pub fn is_taken(&self, dir: &Path, name: &str) -> bool {
        let key = name.to_lowercase();
        key == ATTACHMENTS_DIR
            || self
                .taken
                .get(dir)
                .is_some_and(|names| names.contains(&key))
    }

    /// Record `name` in `dir`. Returns `false` if it was already taken.
    pub fn claim(&mut self, dir: &Path, name: &str) -> bool {
        if self.is_taken(dir, name) {
            return false;
        }
        self.taken
            .entry(dir.to_path_buf())
            .or_default()
            .insert(name.to_lowercase())
    }
}

/// One output file of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub kind: FileKind,
    pub path: PathBuf,
}

/// Where everything belonging to one message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationPlan {
    /// Mirrored output folder of the message.
    pub folder: PathBuf,
    /// Date-prefixed, sanitized, deduplicated file stem.
    pub stem: String,
    /// One entry per requested format, sharing `stem`.
    pub files: Vec<PlannedFile>,
    /// Shared attachments directory of `folder`.
    pub attachments_dir: PathBuf,
    /// One path per attachment, in message order.
    pub attachments: Vec<PathBuf>,
}

impl DestinationPlan {
    /// Every planned path: message files first, then attachments.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .map(|f| f.path.as_path())
            .chain(self.attachments.iter().map(PathBuf::as_path))
    }
}

/// Turns canonical messages into destination plans.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    formats: OutputFormat,
    offset: FixedOffset,
    max_subject_bytes: usize,
}

impl PathPlanner {
    pub fn new(formats: OutputFormat) -> Self {
        Self {
            formats,
            offset: Utc.fix(),
            max_subject_bytes: DEFAULT_MAX_SUBJECT_BYTES,
        }
    }

    /// Take the calendar date of the prefix in this offset instead of UTC.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_max_subject_bytes(mut self, max: usize) -> Self {
        self.max_subject_bytes = max.max(1);
        self
    }

    /// Output directory mirroring archive folder `name` under `parent`.
    ///
    /// Sibling folders that sanitize to the same name get ` (n)` suffixes.
    /// Only the run registry is consulted, so a second run over the same
    /// output root merges into the existing tree.
    pub fn plan_folder(&self, parent: &Path, name: &str, registry: &mut NameRegistry) -> PathBuf {
        let base = sanitize_component(name, MAX_FOLDER_BYTES, UNNAMED_FOLDER);
        let chosen = (1..)
            .map(|n| with_suffix(&base, n))
            .find(|candidate| registry.claim(parent, candidate))
            .unwrap_or(base);
        parent.join(chosen)
    }

    /// Plan every output path of `message` inside `folder`.
    pub fn plan(
        &self,
        message: &CanonicalMessage,
        folder: &Path,
        registry: &mut NameRegistry,
    ) -> DestinationPlan {
        let subject = sanitize_component(&message.subject, self.max_subject_bytes, NO_SUBJECT);
        let base = format!("{} - {subject}", message.date.filename_prefix(self.offset));
        let kinds = self.formats.kinds();

        let stem = (1..)
            .map(|n| with_suffix(&base, n))
            .find(|candidate| {
                kinds.iter().all(|kind| {
                    let name = format!("{candidate}.{}", kind.extension());
                    !registry.is_taken(folder, &name) && !folder.join(&name).exists()
                })
            })
            .unwrap_or(base);

        let files = kinds
            .iter()
            .map(|&kind| {
                let name = format!("{stem}.{}", kind.extension());
                registry.claim(folder, &name);
                PlannedFile {
                    kind,
                    path: folder.join(name),
                }
            })
            .collect();

        let attachments_dir = folder.join(ATTACHMENTS_DIR);
        let attachments = message
            .attachments
            .iter()
            .enumerate()
            .map(|(i, attachment)| {
                let fallback = format!("attachment-{}.{}", i + 1, attachment.fallback_extension());
                let name = attachment
                    .filename
                    .as_deref()
                    .map(|f| sanitize_component(f, MAX_ATTACHMENT_BYTES, &fallback))
                    .unwrap_or(fallback);
                attachments_dir.join(unique_file_name(&attachments_dir, &name, registry))
            })
            .collect();

        DestinationPlan {
            folder: folder.to_path_buf(),
            stem,
            files,
            attachments_dir,
            attachments,
        }
    }
}

/// First free variant of `name` in `dir`, checking the run and the disk.
/// The suffix goes before the extension: `report (2).pdf`.
fn unique_file_name(dir: &Path, name: &str, registry: &mut NameRegistry) -> String {
    let (stem, ext) = sanitize::split_extension(name);
    (1..)
        .map(|n| match ext {
            Some(ext) => format!("{}.{ext}", with_suffix(stem, n)),
            None => with_suffix(stem, n),
        })
        .find(|candidate| !dir.join(candidate).exists() && registry.claim(dir, candidate))
        .unwrap_or_else(|| name.to_string())
}

/// `base` for the first occurrence, `base (n)` afterwards.
fn with_suffix(base: &str, n: u32) -> String {
    if n == 1 {
        base.to_string()
    } else {
        format!("{base} ({n})")
    }
}
