//! The canonical message produced by normalization.

use chrono::{DateTime, FixedOffset, Utc};

use super::address::EmailAddress;
use super::attachment::AttachmentDescriptor;

/// Filename prefix used for messages without any resolvable timestamp.
///
/// Sorts after every `[YYYY-MM-DD]` prefix because `u` > any ASCII digit.
pub const UNKNOWN_DATE_PREFIX: &str = "[unknown date]";

/// The authoritative timestamp of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageDate {
    /// Resolved from the sent, received or delivery time.
    Known(DateTime<Utc>),
    /// No timestamp could be resolved.
    #[default]
    Unknown,
}

impl MessageDate {
    /// The instant, if known.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Known(dt) => Some(*dt),
            Self::Unknown => None,
        }
    }

    /// `[YYYY-MM-DD]` in the given offset, or [`UNKNOWN_DATE_PREFIX`].
    pub fn filename_prefix(&self, offset: FixedOffset) -> String {
        match self {
            Self::Known(dt) => format!("[{}]", dt.with_timezone(&offset).format("%Y-%m-%d")),
            Self::Unknown => UNKNOWN_DATE_PREFIX.to_string(),
        }
    }
}

/// Which header a recipient belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

/// One recipient of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub kind: RecipientKind,
    pub address: EmailAddress,
}

/// A message with every field decoded and resolved.
///
/// Values are semantic, not filesystem- or format-safe: the planner and the
/// writers sanitize what they need.
#[derive(Debug, Clone, Default)]
pub struct CanonicalMessage {
    /// Archive-native identifier, used in reports.
    pub source_id: String,

    /// Decoded subject, empty if absent.
    pub subject: String,

    /// Resolved timestamp.
    pub date: MessageDate,

    /// Sender; may be empty.
    pub from: EmailAddress,

    /// To/Cc/Bcc recipients, unique by [`EmailAddress::key`], first seen wins.
    pub recipients: Vec<Recipient>,

    /// `Message-ID` without angle brackets, if known.
    pub message_id: Option<String>,

    /// Plain-text body.
    pub body: String,

    /// Attachments that passed the integrity check.
    pub attachments: Vec<AttachmentDescriptor>,
}

impl CanonicalMessage {
    /// Recipients of one kind, in order.
    pub fn recipients_of(&self, kind: RecipientKind) -> impl Iterator<Item = &EmailAddress> {
        self.recipients
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| &r.address)
    }
}
