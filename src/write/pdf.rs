//! `.pdf` output: a plain, paginated rendering of one message.
//!
//! Pages are US Letter with the standard Type 1 fonts (Helvetica for the
//! header block, Courier for the body), so no font data is embedded. Text is
//! encoded as WinAnsi; characters outside that set print as `?`.

use chrono::{FixedOffset, Offset, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::WriteError;
use crate::model::message::{CanonicalMessage, MessageDate, RecipientKind};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 50;

/// Layout settings for PDF output.
#[derive(Debug, Clone)]
pub struct PdfStyle {
    /// Header block size in points; the title is four points larger.
    pub font_size: u16,
    /// Body size in points.
    pub body_font_size: u16,
    /// Offset used to print the message date.
    pub utc_offset: FixedOffset,
}

impl Default for PdfStyle {
    fn default() -> Self {
        Self {
            font_size: 11,
            body_font_size: 10,
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Mono => "F3",
        }
    }

    /// Average glyph width in thousandths of the font size.
    fn average_width(self) -> i64 {
        match self {
            Self::Regular => 520,
            Self::Bold => 580,
            Self::Mono => 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    font: Font,
    size: i64,
    text: String,
}

/// Render `message` as a complete PDF file.
///
/// `attachment_names` are the file names the attachments are saved under, in
/// message order; attachments past the end of the slice use their own names.
pub fn render(
    message: &CanonicalMessage,
    attachment_names: &[String],
    style: &PdfStyle,
) -> Result<Vec<u8>, WriteError> {
    let lines = layout(message, attachment_names, style);
    let pages = paginate(&lines);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = standard_font(&mut doc, "Helvetica");
    let bold = standard_font(&mut doc, "Helvetica-Bold");
    let mono = standard_font(&mut doc, "Courier");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular,
            Font::Bold.resource() => bold,
            Font::Mono.resource() => mono,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in &pages {
        let content = page_content(page);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| WriteError::Pdf(e.to_string()))?;
    Ok(bytes)
}

fn standard_font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Every line of the document in reading order, already wrapped.
fn layout(message: &CanonicalMessage, attachment_names: &[String], style: &PdfStyle) -> Vec<Line> {
    let header_size = i64::from(style.font_size.max(4));
    let body_size = i64::from(style.body_font_size.max(4));
    let mut lines = Vec::new();

    let title = if message.subject.trim().is_empty() {
        "(no subject)"
    } else {
        message.subject.as_str()
    };
    push_wrapped(&mut lines, Font::Bold, header_size + 4, title);

    let date = match message.date {
        MessageDate::Known(dt) => dt
            .with_timezone(&style.utc_offset)
            .format("%a, %d %b %Y %H:%M:%S %z")
            .to_string(),
        MessageDate::Unknown => "unknown".to_string(),
    };
    let mut header = |label: &str, value: String| {
        if !value.is_empty() {
            push_wrapped(&mut lines, Font::Regular, header_size, &format!("{label}: {value}"));
        }
    };
    header("Date", date);
    header("From", message.from.display());
    for (label, kind) in [
        ("To", RecipientKind::To),
        ("Cc", RecipientKind::Cc),
        ("Bcc", RecipientKind::Bcc),
    ] {
        let joined = message
            .recipients_of(kind)
            .map(|a| a.display())
            .collect::<Vec<_>>()
            .join(", ");
        header(label, joined);
    }

    lines.push(blank(header_size));
    for paragraph in message.body.lines() {
        push_wrapped(&mut lines, Font::Mono, body_size, &paragraph.replace('\t', "    "));
    }

    if !message.attachments.is_empty() {
        lines.push(blank(body_size));
        push_wrapped(
            &mut lines,
            Font::Bold,
            header_size,
            &format!("Attachments: {} file(s)", message.attachments.len()),
        );
        for (i, att) in message.attachments.iter().enumerate() {
            let name = attachment_names
                .get(i)
                .or(att.filename.as_ref())
                .cloned()
                .unwrap_or_else(|| format!("attachment-{}", i + 1));
            let size = humansize::format_size(att.size(), humansize::BINARY);
            push_wrapped(
                &mut lines,
                Font::Regular,
                header_size,
                &format!("  - {name} ({}, {size})", att.content_type),
            );
        }
    }

    lines
}

fn blank(size: i64) -> Line {
    Line {
        font: Font::Regular,
        size,
        text: String::new(),
    }
}

/// Append `text` split into lines that fit the printable width.
fn push_wrapped(lines: &mut Vec<Line>, font: Font, size: i64, text: &str) {
    let columns = ((PAGE_WIDTH - 2 * MARGIN) * 1000 / (font.average_width() * size)).max(10);
    for text in wrap(text, columns as usize) {
        lines.push(Line { font, size, text });
    }
}

/// Greedy word wrap by character count. Words longer than a line are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split(' ') {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(columns);
            out.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > columns {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    out.push(current);
    out
}

/// Split lines into pages by vertical space.
fn paginate(lines: &[Line]) -> Vec<Vec<&Line>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;
    for line in lines {
        let height = leading(line.size);
        if used + height > usable && used > 0 {
            pages.push(Vec::new());
            used = 0;
        }
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
        used += height;
    }
    pages
}

fn leading(size: i64) -> i64 {
    size * 6 / 5 + 1
}

fn page_content(lines: &[&Line]) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 5);
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        y -= leading(line.size);
        if line.text.is_empty() {
            continue;
        }
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![line.font.resource().into(), line.size.into()],
        ));
        operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(win_ansi(&line.text))],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Encode text for the standard fonts. Unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if c.is_ascii() {
            out.push(if c.is_ascii_control() { b' ' } else { c as u8 });
            continue;
        }
        let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf));
        match (had_errors, bytes.as_ref()) {
            (false, [b]) => out.push(*b),
            _ => out.push(b'?'),
        }
    }
    out
}
