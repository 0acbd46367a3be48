//! Run outcome.

use std::path::PathBuf;

use serde::Serialize;

use crate::normalize::Degradation;

/// Overall result of a run that got past opening the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every mail item was written (or planned, in preview).
    Success,
    /// At least one message or folder failed.
    PartialFailure,
}

/// One message or folder that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Folder path and, for messages, the archive identifier.
    pub source: String,
    pub reason: String,
}

/// A message exported with substituted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedMessage {
    pub source: String,
    pub notes: Vec<Degradation>,
}

/// Counts, failures and produced paths of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub archive: PathBuf,
    pub output_root: PathBuf,
    /// `true` when nothing was written.
    pub preview: bool,
    pub processed: usize,
    /// Non-mail items (contacts, appointments, …).
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    pub degraded: Vec<DegradedMessage>,
    /// Files produced, or that would be produced in preview.
    pub outputs: Vec<PathBuf>,
    pub attachments_written: usize,
    pub bytes_written: u64,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    pub(crate) fn record_failure(&mut self, source: String, reason: impl ToString) {
        self.failed += 1;
        self.failures.push(Failure {
            source,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_failures() {
        let mut report = RunReport::default();
        assert_eq!(report.status(), RunStatus::Success);
        report.record_failure("Inbox [1]".into(), "boom");
        assert_eq!(report.status(), RunStatus::PartialFailure);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].reason, "boom");
    }

    #[test]
    fn test_serializes_to_json() {
        let report = RunReport {
            processed: 2,
            degraded: vec![DegradedMessage {
                source: "Inbox [7]".into(),
                notes: vec![Degradation::UnknownDate],
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processed"], 2);
        assert_eq!(json["degraded"][0]["notes"][0]["kind"], "unknown_date");
    }
}
