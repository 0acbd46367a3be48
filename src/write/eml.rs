//! `.eml` output built with `mail-builder`.

use mail_builder::encoders::encode::rfc2047_encode;
use mail_builder::headers::address::Address;
use mail_builder::headers::date::Date;
use mail_builder::headers::raw::Raw;
use mail_builder::headers::HeaderType;
use mail_builder::MessageBuilder;

use crate::error::WriteError;
use crate::model::address::EmailAddress;
use crate::model::message::{CanonicalMessage, RecipientKind};

/// `Date:` written for messages whose date is unknown: the Unix epoch.
const UNKNOWN_DATE_TIMESTAMP: i64 = 0;

/// Serialize `message` as RFC 5322 bytes.
///
/// Headers with no value (no sender, no Cc, …) are left out. Parties known
/// only by name are written as empty groups (`All Staff:;`).
pub fn render(message: &CanonicalMessage) -> Result<Vec<u8>, WriteError> {
    let mut builder = MessageBuilder::new().subject(message.subject.as_str());

    if let Some(from) = parties_header(std::iter::once(&message.from))? {
        builder = builder.header("From", from);
    }
    for (name, kind) in [
        ("To", RecipientKind::To),
        ("Cc", RecipientKind::Cc),
        ("Bcc", RecipientKind::Bcc),
    ] {
        if let Some(header) = parties_header(message.recipients_of(kind))? {
            builder = builder.header(name, header);
        }
    }
    let timestamp = message
        .date
        .instant()
        .map_or(UNKNOWN_DATE_TIMESTAMP, |instant| instant.timestamp());
    builder = builder.date(Date::new(timestamp));
    if let Some(id) = &message.message_id {
        builder = builder.message_id(id.as_str());
    }

    builder = builder.text_body(message.body.as_str());
    for (i, attachment) in message.attachments.iter().enumerate() {
        let name = attachment
            .filename
            .clone()
            .unwrap_or_else(|| format!("attachment-{}.{}", i + 1, attachment.fallback_extension()));
        builder = builder.attachment(
            attachment.content_type.as_str(),
            name,
            attachment.data.as_slice(),
        );
    }

    builder
        .write_to_vec()
        .map_err(|e| WriteError::Eml(e.to_string()))
}

/// An address header for `parties`, or `None` when there is nobody to name.
///
/// mail-builder cannot write an empty group, so a list holding a name-only
/// party is rendered by hand.
fn parties_header<'a>(
    parties: impl Iterator<Item = &'a EmailAddress>,
) -> Result<Option<HeaderType<'a>>, WriteError> {
    let parties: Vec<&EmailAddress> = parties.filter(|p| !p.is_empty()).collect();
    if parties.is_empty() {
        return Ok(None);
    }

    if parties.iter().all(|p| !p.address.is_empty()) {
        let list = parties
            .into_iter()
            .map(|p| {
                let name = (!p.display_name.is_empty()).then_some(p.display_name.as_str());
                Address::new_address(name, p.address.as_str())
            })
            .collect();
        return Ok(Some(Address::new_list(list).into()));
    }

    let rendered = parties
        .into_iter()
        .map(render_party)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Raw::new(rendered.join(", ")).into()))
}

/// `"Name" <addr>`, `<addr>`, or the empty group `"Name":;`.
fn render_party(party: &EmailAddress) -> Result<String, WriteError> {
    if party.display_name.is_empty() {
        return Ok(format!("<{}>", party.address));
    }
    let mut name = Vec::new();
    rfc2047_encode(&party.display_name, &mut name).map_err(|e| WriteError::Eml(e.to_string()))?;
    let name = String::from_utf8_lossy(&name);
    Ok(if party.address.is_empty() {
        format!("{name}:;")
    } else {
        format!("{name} <{}>", party.address)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mail_parser::{MessageParser, MimeHeaders};

    use crate::model::attachment::AttachmentDescriptor;
    use crate::model::message::{MessageDate, Recipient};

    fn sample() -> CanonicalMessage {
        CanonicalMessage {
            source_id: "m1".into(),
            subject: "Résumé du projet".into(),
            date: MessageDate::Known(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()),
            from: EmailAddress::new("Alice", "alice@example.com"),
            recipients: vec![
                Recipient {
                    kind: RecipientKind::To,
                    address: EmailAddress::new("Bob", "bob@example.com"),
                },
                Recipient {
                    kind: RecipientKind::Cc,
                    address: EmailAddress::new("", "carol@example.com"),
                },
            ],
            message_id: Some("abc@example.com".into()),
            body: "Hello Bob,\nsee the report.".into(),
            attachments: vec![AttachmentDescriptor {
                filename: Some("report.pdf".into()),
                content_type: "application/pdf".into(),
                data: b"%PDF-1.4 fake".to_vec(),
            }],
        }
    }

    #[test]
    fn test_render_parses_back() {
        let bytes = render(&sample()).unwrap();
        let parsed = MessageParser::default().parse(&bytes).unwrap();

        assert_eq!(parsed.subject(), Some("Résumé du projet"));
        assert_eq!(parsed.message_id(), Some("abc@example.com"));
        let from = parsed.from().and_then(|a| a.first()).unwrap();
        assert_eq!(from.address(), Some("alice@example.com"));
        let cc = parsed.cc().and_then(|a| a.first()).unwrap();
        assert_eq!(cc.address(), Some("carol@example.com"));
        assert_eq!(
            parsed.date().map(|d| d.to_timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap().timestamp())
        );
        assert!(parsed
            .body_text(0)
            .is_some_and(|b| b.contains("see the report")));
    }

    #[test]
    fn test_attachment_roundtrips_bytes() {
        let message = sample();
        let bytes = render(&message).unwrap();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        let attachment = parsed.attachments().next().unwrap();
        assert_eq!(attachment.attachment_name(), Some("report.pdf"));
        assert_eq!(attachment.contents(), message.attachments[0].data.as_slice());
    }

    #[test]
    fn test_missing_sender_is_omitted() {
        let mut message = sample();
        message.from = EmailAddress::default();
        let bytes = render(&message).unwrap();
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert!(parsed.from().is_none());
    }

    #[test]
    fn test_name_only_parties_become_empty_groups() {
        let mut message = sample();
        message.from = EmailAddress::parse("Finance Team");
        message.recipients = vec![Recipient {
            kind: RecipientKind::To,
            address: EmailAddress::parse("All Staff"),
        }];
        let text = String::from_utf8(render(&message).unwrap()).unwrap();

        assert!(text.contains("From: \"Finance Team\":;\r\n"));
        assert!(text.contains("To: \"All Staff\":;\r\n"));
    }

    #[test]
    fn test_mixed_recipients_keep_order() {
        let mut message = sample();
        message.recipients = vec![
            Recipient {
                kind: RecipientKind::To,
                address: EmailAddress::new("Bob", "bob@example.com"),
            },
            Recipient {
                kind: RecipientKind::To,
                address: EmailAddress::parse("Hélène Martin"),
            },
        ];
        let bytes = render(&message).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("To: \"Bob\" <bob@example.com>, \"=?utf-8?"));
        assert!(text.contains("?=\":;"));

        let parsed = MessageParser::default().parse(&bytes).unwrap();
        let to = parsed.to().and_then(|a| a.first()).unwrap();
        assert_eq!(to.address(), Some("bob@example.com"));
    }

    #[test]
    fn test_unknown_date_is_fixed() {
        let mut message = sample();
        message.date = MessageDate::Unknown;
        let date_line = |bytes: Vec<u8>| {
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .find(|l| l.starts_with("Date: "))
                .map(str::to_string)
        };

        let first = date_line(render(&message).unwrap());
        let second = date_line(render(&message).unwrap());
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("Date: Thu, 1 Jan 1970 00:00:00 +0000"));
    }
}
