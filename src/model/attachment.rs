//! Attachment descriptors.

/// An attachment as it will be materialized.
///
/// Descriptors only exist for attachments whose payload passed the size check;
/// corrupt ones are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Filename recorded in the archive. `None` when the record has no name.
    pub filename: Option<String>,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded payload bytes.
    pub data: Vec<u8>,
}

impl AttachmentDescriptor {
    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Filename extension derived from the content type, used when the
    /// archive does not record a filename.
    pub fn fallback_extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => "pdf",
            "application/zip" => "zip",
            "application/msword" => "doc",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
            "application/vnd.ms-excel" => "xls",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "text/plain" => "txt",
            "text/html" => "html",
            "text/calendar" => "ics",
            "message/rfc822" => "eml",
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(content_type: &str) -> AttachmentDescriptor {
        AttachmentDescriptor {
            filename: None,
            content_type: content_type.to_string(),
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_fallback_extension_known_types() {
        assert_eq!(descriptor("application/pdf").fallback_extension(), "pdf");
        assert_eq!(descriptor("IMAGE/JPEG; name=x").fallback_extension(), "jpg");
    }

    #[test]
    fn test_fallback_extension_unknown_type() {
        assert_eq!(descriptor("application/x-weird").fallback_extension(), "bin");
        assert_eq!(descriptor("").fallback_extension(), "bin");
    }

    #[test]
    fn test_size() {
        assert_eq!(descriptor("text/plain").size(), 3);
    }
}
