//! Read-only access to mail archives.
//!
//! An archive is a tree of folders. Each folder lists its child folders and
//! its messages as lazy sequences; calling [`FolderSource::children`] or
//! [`FolderSource::messages`] again restarts the enumeration from the
//! beginning. Nothing here ever writes to the archive.

pub mod mbox;
pub mod memory;

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{ExtractError, Result, SourceError};
use crate::model::message::RecipientKind;

/// Lazy sequence of child folders.
pub type Children<'a> =
    Box<dyn Iterator<Item = std::result::Result<Box<dyn FolderSource + 'a>, SourceError>> + 'a>;

/// Lazy sequence of message records.
pub type Messages<'a> =
    Box<dyn Iterator<Item = std::result::Result<RawMessage, SourceError>> + 'a>;

/// An opened archive.
///
/// Dropping the value releases every handle it holds.
pub trait Archive {
    /// Path the archive was opened from.
    fn path(&self) -> &Path;

    /// Root of the folder tree. The root itself is not mirrored; its
    /// children become the top-level output directories.
    fn root(&self) -> &dyn FolderSource;
}

/// One folder of an archive.
pub trait FolderSource {
    /// Display name as recorded in the archive (may be empty).
    fn name(&self) -> &str;

    /// Child folders in archive order.
    fn children(&self) -> Children<'_>;

    /// Messages in archive order.
    fn messages(&self) -> Messages<'_>;
}

impl<T: FolderSource + ?Sized> FolderSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn children(&self) -> Children<'_> {
        (**self).children()
    }

    fn messages(&self) -> Messages<'_> {
        (**self).messages()
    }
}

/// Character set declared for a piece of archived text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharsetHint {
    /// A MIME / WHATWG label such as `"iso-8859-1"`.
    Label(String),
    /// A Windows code page number such as `1252`.
    CodePage(u16),
}

/// Archived text: raw bytes plus whatever the archive says about their encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawText {
    pub bytes: Vec<u8>,
    pub charset: Option<CharsetHint>,
}

impl RawText {
    /// Text with no declared charset.
    pub fn undeclared(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            charset: None,
        }
    }

    /// Text with a declared charset label.
    pub fn labeled(bytes: impl Into<Vec<u8>>, label: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            charset: Some(CharsetHint::Label(label.into())),
        }
    }

    /// UTF-8 text.
    pub fn utf8(text: impl Into<String>) -> Self {
        Self::labeled(text.into().into_bytes(), "utf-8")
    }
}

/// A structured recipient entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecipient {
    pub kind: RecipientKind,
    pub display_name: Option<String>,
    pub address: Option<String>,
}

/// An attachment record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttachment {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Size recorded by the archive, when it records one.
    pub declared_size: Option<u64>,
    pub data: Vec<u8>,
}

/// A message record with raw field access.
///
/// Every field is optional because archives routinely omit them; the
/// normalizer decides what to fall back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// Archive-native identifier (record id, byte offset, …).
    pub id: String,
    /// Item class such as `IPM.Note`; `None` means mail.
    pub message_class: Option<String>,
    pub subject: Option<RawText>,
    pub sender_name: Option<RawText>,
    pub sender_address: Option<String>,
    pub recipients: Vec<RawRecipient>,
    /// The internet transport headers, unparsed.
    pub transport_headers: Option<RawText>,
    pub sent_time: Option<DateTime<Utc>>,
    pub received_time: Option<DateTime<Utc>>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub plain_body: Option<RawText>,
    pub html_body: Option<RawText>,
    pub attachments: Vec<RawAttachment>,
}

/// Open the archive at `path`, choosing the reader from the file's signature.
///
/// Fails with [`ExtractError::UnsupportedArchive`] for known formats without a
/// built-in reader and [`ExtractError::UnrecognizedArchive`] for anything else.
pub fn open(path: &Path) -> Result<Box<dyn Archive>> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::ArchiveNotFound(path.to_path_buf())
        } else {
            ExtractError::io(path, e)
        }
    })?;
    if !metadata.is_file() {
        return Err(ExtractError::UnrecognizedArchive(path.to_path_buf()));
    }

    if mbox::has_signature(path)? {
        return Ok(Box::new(mbox::MboxArchive::open(path)?));
    }
    if has_pst_signature(path)? {
        return Err(ExtractError::UnsupportedArchive {
            path: path.to_path_buf(),
            format: "Outlook PST/OST",
        });
    }

    Err(ExtractError::UnrecognizedArchive(path.to_path_buf()))
}

const PST_MAGIC: &[u8; 4] = b"!BDN";

/// Outlook personal folders files start with `!BDN`.
fn has_pst_signature(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = std::fs::File::open(path).map_err(|e| ExtractError::io(path, e))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == PST_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ExtractError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(&dir.path().join("nope.mbox")).err().unwrap();
        assert!(matches!(err, ExtractError::ArchiveNotFound(_)));
    }

    #[test]
    fn test_open_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(dir.path()).err().unwrap();
        assert!(matches!(err, ExtractError::UnrecognizedArchive(_)));
    }

    #[test]
    fn test_open_names_pst_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.pst");
        std::fs::write(&path, b"!BDN\x00\x01\x02\x03SM\x17\x00").unwrap();
        let err = open(&path).err().unwrap();
        assert!(matches!(
            err,
            ExtractError::UnsupportedArchive { format: "Outlook PST/OST", .. }
        ));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.pst");
        std::fs::write(&path, b"\x00\x01garbage that is no mail store").unwrap();
        let err = open(&path).err().unwrap();
        assert!(matches!(err, ExtractError::UnrecognizedArchive(_)));
    }
}
