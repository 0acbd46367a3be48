//! Raw archive records → [`CanonicalMessage`].
//!
//! Normalization is total: a field that cannot be resolved degrades to a
//! documented fallback and a [`Degradation`] note, never to an error.

pub mod body;
pub mod encoding;
pub mod header;

use std::collections::HashSet;

use tracing::warn;

use crate::archive::{RawAttachment, RawMessage, RawText};
use crate::model::address::EmailAddress;
use crate::model::attachment::AttachmentDescriptor;
use crate::model::message::{CanonicalMessage, MessageDate, Recipient, RecipientKind};

use self::encoding::{DecodeMethod, Decoded};
use self::header::Headers;

/// Content type assumed when an attachment does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Item classes that are not mail and are skipped by the exporter.
const NON_MAIL_CLASSES: [&str; 7] = [
    "ipm.contact",
    "ipm.distlist",
    "ipm.appointment",
    "ipm.task",
    "ipm.stickynote",
    "ipm.activity",
    "ipm.journal",
];

/// A field that fell back to a substitute value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// No sent, received or delivery time.
    UnknownDate,
    /// No subject in the record or the headers.
    MissingSubject,
    /// The field's encoding was guessed.
    DetectedEncoding {
        field: &'static str,
        encoding: &'static str,
    },
    /// The field was decoded with substitution characters.
    SubstitutedCharacters { field: &'static str },
    /// Only an HTML body existed; it was converted to text.
    HtmlOnlyBody,
    /// Payload size does not match the recorded size; the attachment was dropped.
    CorruptAttachment {
        name: String,
        declared: u64,
        actual: u64,
    },
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownDate => write!(f, "no timestamp, using the unknown-date placeholder"),
            Self::MissingSubject => write!(f, "no subject"),
            Self::DetectedEncoding { field, encoding } => {
                write!(f, "{field}: undeclared encoding, detected {encoding}")
            }
            Self::SubstitutedCharacters { field } => {
                write!(f, "{field}: undecodable bytes replaced")
            }
            Self::HtmlOnlyBody => write!(f, "HTML-only body converted to text"),
            Self::CorruptAttachment {
                name,
                declared,
                actual,
            } => write!(
                f,
                "attachment '{name}' skipped: {actual} bytes, archive records {declared}"
            ),
        }
    }
}

/// Result of normalizing one record.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub message: CanonicalMessage,
    pub degradations: Vec<Degradation>,
}

/// `true` unless the record's class marks it as a contact, appointment or other non-mail item.
pub fn is_mail_item(raw: &RawMessage) -> bool {
    let Some(class) = raw.message_class.as_deref() else {
        return true;
    };
    let class = class.trim().to_ascii_lowercase();
    !NON_MAIL_CLASSES
        .iter()
        .any(|c| class == *c || class.starts_with(&format!("{c}.")))
}

/// Normalize one record.
pub fn normalize(raw: RawMessage) -> Normalized {
    let mut notes = Vec::new();

    let headers = raw
        .transport_headers
        .as_ref()
        .map(|h| Headers::parse(&decode_field(h, "headers", &mut notes)))
        .unwrap_or_default();

    let subject = resolve_subject(&raw, &headers, &mut notes);
    let date = resolve_date(&raw, &headers, &mut notes);
    let from = resolve_sender(&raw, &headers, &mut notes);
    let recipients = resolve_recipients(&raw, &headers);
    let body = resolve_body(&raw, &mut notes);
    let attachments = raw
        .attachments
        .into_iter()
        .enumerate()
        .filter_map(|(i, a)| check_attachment(i, a, &mut notes))
        .collect();

    Normalized {
        message: CanonicalMessage {
            source_id: raw.id,
            subject,
            date,
            from,
            recipients,
            message_id: headers.message_id(),
            body,
            attachments,
        },
        degradations: notes,
    }
}

fn decode_field(raw: &RawText, field: &'static str, notes: &mut Vec<Degradation>) -> String {
    let Decoded { text, method } = encoding::decode(raw);
    match method {
        DecodeMethod::Detected(encoding) => {
            notes.push(Degradation::DetectedEncoding { field, encoding })
        }
        DecodeMethod::Lossy => notes.push(Degradation::SubstitutedCharacters { field }),
        DecodeMethod::Declared(_) | DecodeMethod::Utf8 => {}
    }
    text
}

fn resolve_subject(raw: &RawMessage, headers: &Headers, notes: &mut Vec<Degradation>) -> String {
    let structured = raw
        .subject
        .as_ref()
        .map(|s| strip_subject_prefix(&decode_field(s, "subject", notes)).trim().to_string())
        .filter(|s| !s.is_empty());
    let subject = structured.or_else(|| headers.get_decoded("subject").map(|s| s.trim().to_string()));
    subject.unwrap_or_else(|| {
        notes.push(Degradation::MissingSubject);
        String::new()
    })
}

/// Desktop stores may prefix subjects with `U+0001` and a length character.
fn strip_subject_prefix(subject: &str) -> &str {
    let mut chars = subject.chars();
    if chars.next() == Some('\u{1}') {
        chars.next();
        chars.as_str()
    } else {
        subject
    }
}

fn resolve_date(raw: &RawMessage, headers: &Headers, notes: &mut Vec<Degradation>) -> MessageDate {
    let resolved = raw
        .sent_time
        .or_else(|| headers.date())
        .or(raw.received_time)
        .or_else(|| headers.received())
        .or(raw.delivery_time);
    match resolved {
        Some(dt) => MessageDate::Known(dt),
        None => {
            notes.push(Degradation::UnknownDate);
            MessageDate::Unknown
        }
    }
}

fn resolve_sender(raw: &RawMessage, headers: &Headers, notes: &mut Vec<Degradation>) -> EmailAddress {
    let name = raw
        .sender_name
        .as_ref()
        .map(|n| decode_field(n, "sender", notes))
        .unwrap_or_default();
    let structured = EmailAddress::new(name, raw.sender_address.as_deref().unwrap_or(""));
    let from_header = headers
        .get_decoded("from")
        .map(|v| EmailAddress::parse(&v))
        .unwrap_or_default();

    EmailAddress {
        display_name: if structured.display_name.is_empty() {
            from_header.display_name
        } else {
            structured.display_name
        },
        address: if structured.address.is_empty() {
            from_header.address
        } else {
            structured.address
        },
    }
}

fn resolve_recipients(raw: &RawMessage, headers: &Headers) -> Vec<Recipient> {
    let structured = raw.recipients.iter().map(|r| Recipient {
        kind: r.kind,
        address: EmailAddress::new(
            r.display_name.as_deref().unwrap_or(""),
            r.address.as_deref().unwrap_or(""),
        ),
    });

    let from_headers = [
        ("to", RecipientKind::To),
        ("cc", RecipientKind::Cc),
        ("bcc", RecipientKind::Bcc),
    ]
    .into_iter()
    .flat_map(|(name, kind)| {
        headers
            .get_all(name)
            .flat_map(|v| EmailAddress::parse_list(&header::decode_encoded_words(v)))
            .map(move |address| Recipient { kind, address })
            .collect::<Vec<_>>()
    });

    let mut seen = HashSet::new();
    structured
        .chain(from_headers)
        .filter(|r| !r.address.is_empty() && seen.insert(r.address.key()))
        .collect()
}

fn resolve_body(raw: &RawMessage, notes: &mut Vec<Degradation>) -> String {
    if let Some(plain) = &raw.plain_body {
        let text = decode_field(plain, "body", notes);
        if !text.trim().is_empty() {
            return text;
        }
    }
    if let Some(html) = &raw.html_body {
        let text = body::html_to_text(&decode_field(html, "html body", notes));
        if !text.is_empty() {
            notes.push(Degradation::HtmlOnlyBody);
            return text;
        }
    }
    String::new()
}

fn check_attachment(
    index: usize,
    raw: RawAttachment,
    notes: &mut Vec<Degradation>,
) -> Option<AttachmentDescriptor> {
    let filename = raw
        .filename
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let actual = raw.data.len() as u64;
    if let Some(declared) = raw.declared_size.filter(|&d| d != actual) {
        let name = filename
            .clone()
            .unwrap_or_else(|| format!("attachment #{}", index + 1));
        warn!(attachment = %name, declared, actual, "Attachment size mismatch, skipping");
        notes.push(Degradation::CorruptAttachment {
            name,
            declared,
            actual,
        });
        return None;
    }

    Some(AttachmentDescriptor {
        filename,
        content_type: raw
            .content_type
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        data: raw.data,
    })
}
