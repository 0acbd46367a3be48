//! Serializing canonical messages to disk.
//!
//! [`Writer::write`] materializes one [`DestinationPlan`]: the message in each
//! planned format plus its attachments. Existing files are never opened for
//! writing; every output is created fresh.

pub mod attachment;
pub mod eml;
pub mod pdf;

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WriteError;
use crate::model::message::CanonicalMessage;
use crate::plan::DestinationPlan;

pub use pdf::PdfStyle;

/// Formats requested for a run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// RFC 5322 message files.
    #[default]
    Eml,
    /// Paginated PDF documents.
    Pdf,
    /// One `.eml` and one `.pdf` per message.
    Both,
}

impl OutputFormat {
    /// Concrete file kinds, in output order.
    pub fn kinds(self) -> &'static [FileKind] {
        match self {
            Self::Eml => &[FileKind::Eml],
            Self::Pdf => &[FileKind::Pdf],
            Self::Both => &[FileKind::Eml, FileKind::Pdf],
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eml => "eml",
            Self::Pdf => "pdf",
            Self::Both => "both",
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eml" => Ok(Self::Eml),
            "pdf" => Ok(Self::Pdf),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown format '{other}' (expected eml, pdf or both)")),
        }
    }
}

/// One on-disk file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Eml,
    Pdf,
}

impl FileKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Eml => "eml",
            Self::Pdf => "pdf",
        }
    }
}

/// What one successful [`Writer::write`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Message files, in plan order.
    pub files: Vec<PathBuf>,
    /// Attachment files, in message order.
    pub attachments: Vec<PathBuf>,
    /// Total bytes written.
    pub bytes: u64,
}

/// Writes messages according to their destination plans.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    pdf: PdfStyle,
}

impl Writer {
    pub fn new(pdf: PdfStyle) -> Self {
        Self { pdf }
    }

    /// Write every file of `plan`.
    ///
    /// On error, files already created for this message stay on disk.
    pub fn write(
        &self,
        message: &CanonicalMessage,
        plan: &DestinationPlan,
    ) -> Result<WriteSummary, WriteError> {
        std::fs::create_dir_all(&plan.folder).map_err(|e| WriteError::io(&plan.folder, e))?;

        let attachment_names: Vec<String> = plan
            .attachments
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let mut summary = WriteSummary::default();
        for file in &plan.files {
            let bytes = match file.kind {
                FileKind::Eml => eml::render(message)?,
                FileKind::Pdf => pdf::render(message, &attachment_names, &self.pdf)?,
            };
            create_new(&file.path, &bytes)?;
            tracing::debug!(path = %file.path.display(), bytes = bytes.len(), "Wrote message file");
            summary.bytes += bytes.len() as u64;
            summary.files.push(file.path.clone());
        }

        let written = attachment::write_all(message, plan)?;
        summary.bytes += written.iter().map(|(_, size)| size).sum::<u64>();
        summary.attachments = written.into_iter().map(|(path, _)| path).collect();

        Ok(summary)
    }
}

/// Create `path` and write `bytes`, failing if it already exists.
pub(crate) fn create_new(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| WriteError::io(path, e))?;
    file.write_all(bytes).map_err(|e| WriteError::io(path, e))?;
    file.sync_data().map_err(|e| WriteError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::AttachmentDescriptor;
    use crate::plan::{NameRegistry, PathPlanner};

    fn sample() -> CanonicalMessage {
        CanonicalMessage {
            source_id: "m1".into(),
            subject: "Quarterly report".into(),
            body: "See attached.".into(),
            attachments: vec![AttachmentDescriptor {
                filename: Some("data.bin".into()),
                content_type: "application/octet-stream".into(),
                data: (0..=255u8).collect(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_format_kinds() {
        assert_eq!(OutputFormat::Eml.kinds(), &[FileKind::Eml]);
        assert_eq!(OutputFormat::Both.kinds(), &[FileKind::Eml, FileKind::Pdf]);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert!("docx".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Inbox");
        let message = sample();
        let plan = PathPlanner::new(OutputFormat::Both).plan(
            &message,
            &folder,
            &mut NameRegistry::new(),
        );

        let summary = Writer::default().write(&message, &plan).unwrap();
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.attachments.len(), 1);
        assert!(summary.files.iter().all(|p| p.is_file()));

        let pdf = std::fs::read(&summary.files[1]).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        let written = std::fs::read(&summary.attachments[0]).unwrap();
        assert_eq!(written, message.attachments[0].data);
    }

    #[test]
    fn test_write_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let message = sample();
        let plan = PathPlanner::new(OutputFormat::Eml).plan(
            &message,
            dir.path(),
            &mut NameRegistry::new(),
        );
        std::fs::write(&plan.files[0].path, b"existing").unwrap();

        let err = Writer::default().write(&message, &plan).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert_eq!(std::fs::read(&plan.files[0].path).unwrap(), b"existing");
    }
}
