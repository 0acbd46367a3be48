//! Attachment payloads, written byte-for-byte.

use std::path::PathBuf;

use crate::error::WriteError;
use crate::model::message::CanonicalMessage;
use crate::plan::DestinationPlan;

/// Write every attachment of `message` to its planned path.
///
/// Returns `(path, size)` per written file. The attachments directory is
/// only created when there is something to put in it.
pub fn write_all(
    message: &CanonicalMessage,
    plan: &DestinationPlan,
) -> Result<Vec<(PathBuf, u64)>, WriteError> {
    if message.attachments.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(&plan.attachments_dir)
        .map_err(|e| WriteError::io(&plan.attachments_dir, e))?;

    let mut written = Vec::with_capacity(message.attachments.len());
    for (attachment, path) in message.attachments.iter().zip(&plan.attachments) {
        super::create_new(path, &attachment.data)?;
        tracing::debug!(
            path = %path.display(),
            size = attachment.size(),
            "Wrote attachment"
        );
        written.push((path.clone(), attachment.size()));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::AttachmentDescriptor;
    use crate::plan::{NameRegistry, PathPlanner};
    use crate::write::OutputFormat;

    #[test]
    fn test_no_attachments_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let message = CanonicalMessage::default();
        let plan =
            PathPlanner::new(OutputFormat::Eml).plan(&message, dir.path(), &mut NameRegistry::new());
        assert!(write_all(&message, &plan).unwrap().is_empty());
        assert!(!plan.attachments_dir.exists());
    }

    #[test]
    fn test_payload_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        let message = CanonicalMessage {
            attachments: vec![AttachmentDescriptor {
                filename: Some("blob.bin".into()),
                content_type: "application/octet-stream".into(),
                data: payload.clone(),
            }],
            ..Default::default()
        };
        let plan =
            PathPlanner::new(OutputFormat::Eml).plan(&message, dir.path(), &mut NameRegistry::new());

        let written = write_all(&message, &plan).unwrap();
        assert_eq!(written[0].1, 4096);
        assert_eq!(std::fs::read(&written[0].0).unwrap(), payload);
    }
}
