//! Thunderbird-style mail stores.
//!
//! Every folder is an mbox file; the children of folder `X` live in the
//! sibling directory `X.sbd/`. `.msf` summary files are ignored.
//!
//! Messages are streamed line by line with a 1 MB buffer, so a folder is
//! never loaded into memory as a whole. The reader is tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - Truncated messages at EOF
//! - A UTF-8 BOM at the start of the file

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::decoders::{base64::base64_decode, quoted_printable::quoted_printable_decode};
use mail_parser::{MessageParser, MessagePart, MimeHeaders};
use tracing::{debug, warn};

use super::{
    Archive, CharsetHint, Children, FolderSource, Messages, RawAttachment, RawMessage, RawText,
};
use crate::error::{ExtractError, Result, SourceError};

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Maximum message size in bytes (256 MB); longer bodies are truncated.
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Bytes inspected by the signature check.
const SIGNATURE_BYTES: usize = 1024;

/// `true` if the file starts with an mbox `From ` separator (after an optional BOM).
pub fn has_signature(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|e| ExtractError::io(path, e))?;
    let mut head = Vec::with_capacity(SIGNATURE_BYTES);
    file.take(SIGNATURE_BYTES as u64)
        .read_to_end(&mut head)
        .map_err(|e| ExtractError::io(path, e))?;
    Ok(is_mbox_separator(&head))
}

/// A mail store opened from its top-level mbox file.
pub struct MboxArchive {
    path: PathBuf,
    root: MboxRoot,
}

impl MboxArchive {
    /// Open the store rooted at `path`.
    ///
    /// The file must carry the mbox signature; child folders are discovered
    /// lazily during traversal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !has_signature(&path)? {
            return Err(ExtractError::UnrecognizedArchive(path));
        }
        let top = MboxFolder::for_file(&path).ok_or_else(|| ExtractError::CorruptArchive {
            path: path.clone(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;
        debug!(path = %path.display(), folder = %top.name, "Opened mbox store");
        Ok(Self {
            path,
            root: MboxRoot { top },
        })
    }
}

impl Archive for MboxArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn root(&self) -> &dyn FolderSource {
        &self.root
    }
}

/// Synthetic root whose single child is the opened file.
struct MboxRoot {
    top: MboxFolder,
}

impl FolderSource for MboxRoot {
    fn name(&self) -> &str {
        ""
    }

    fn children(&self) -> Children<'_> {
        Box::new(std::iter::once(Ok(
            Box::new(&self.top) as Box<dyn FolderSource + '_>
        )))
    }

    fn messages(&self) -> Messages<'_> {
        Box::new(std::iter::empty())
    }
}

/// One folder: an optional mbox file plus an optional `.sbd` directory.
#[derive(Debug, Clone)]
pub struct MboxFolder {
    name: String,
    mbox: Option<PathBuf>,
    subdir: Option<PathBuf>,
}

impl MboxFolder {
    fn for_file(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let subdir = path.with_file_name(format!("{name}.sbd"));
        Some(Self {
            name,
            mbox: Some(path.to_path_buf()),
            subdir: subdir.is_dir().then_some(subdir),
        })
    }

    /// List child folders of a `.sbd` directory, sorted by name.
    fn list_children(dir: &Path) -> std::io::Result<Vec<MboxFolder>> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(dir = %dir.display(), "Skipping entry with non-UTF-8 name");
                continue;
            };
            if name.starts_with('.') || name.ends_with(".msf") {
                continue;
            }
            let kind = entry.file_type()?;
            if kind.is_file() {
                files.push(name);
            } else if kind.is_dir() {
                if let Some(base) = name.strip_suffix(".sbd") {
                    dirs.push(base.to_string());
                }
            }
        }

        // A `.sbd` directory without a sibling file is still a folder
        for base in dirs {
            if !files.contains(&base) {
                files.push(base);
            }
        }
        files.sort();

        Ok(files
            .into_iter()
            .map(|name| {
                let file = dir.join(&name);
                let subdir = dir.join(format!("{name}.sbd"));
                MboxFolder {
                    mbox: file.is_file().then_some(file),
                    subdir: subdir.is_dir().then_some(subdir),
                    name,
                }
            })
            .collect())
    }
}

impl FolderSource for MboxFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Children<'_> {
        let Some(dir) = &self.subdir else {
            return Box::new(std::iter::empty());
        };
        match Self::list_children(dir) {
            Ok(children) => Box::new(
                children
                    .into_iter()
                    .map(|c| Ok(Box::new(c) as Box<dyn FolderSource + '_>)),
            ),
            Err(e) => Box::new(std::iter::once(Err(SourceError::io(dir, e)))),
        }
    }

    fn messages(&self) -> Messages<'_> {
        let Some(path) = &self.mbox else {
            return Box::new(std::iter::empty());
        };
        match MboxReader::open(path) {
            Ok(reader) => Box::new(reader.map(|item| {
                item.map(|(offset, bytes)| to_raw_message(offset, &bytes))
            })),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}

/// Streaming reader yielding `(offset, raw_bytes)` per message.
///
/// The raw bytes include the `From ` separator line.
pub struct MboxReader {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    /// Separator line read ahead while finishing the previous message.
    pending: Option<(u64, Vec<u8>)>,
    done: bool,
}

impl MboxReader {
    /// Open an mbox file for sequential reading.
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| SourceError::io(&path, e))?;
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path,
            offset: 0,
            pending: None,
            done: false,
        })
    }

    /// Read one line (including its terminator) into `buf`. Returns 0 at EOF.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> std::result::Result<usize, SourceError> {
        buf.clear();
        let n = self
            .reader
            .read_until(b'\n', buf)
            .map_err(|e| SourceError::io(&self.path, e))?;
        self.offset += n as u64;
        Ok(n)
    }

    fn next_message(&mut self) -> std::result::Result<Option<(u64, Vec<u8>)>, SourceError> {
        let mut line = Vec::with_capacity(4096);

        // Locate the start of the next message
        let (start, mut message) = match self.pending.take() {
            Some(p) => p,
            None => loop {
                let line_start = self.offset;
                if self.read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                if is_mbox_separator(&line) {
                    break (line_start, line.clone());
                }
                if !is_blank_line(&line) {
                    warn!(
                        path = %self.path.display(),
                        offset = line_start,
                        "Skipping data before first 'From ' separator"
                    );
                }
            },
        };

        let mut prev_line_was_empty = false;
        let mut truncated = false;
        loop {
            let line_start = self.offset;
            if self.read_line(&mut line)? == 0 {
                break;
            }
            if is_mbox_separator(&line) {
                if !prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset = line_start,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                self.pending = Some((line_start, line.clone()));
                break;
            }
            prev_line_was_empty = is_blank_line(&line);
            if message.len() + line.len() <= MAX_MESSAGE_SIZE {
                message.extend_from_slice(unescape_from_line(&line));
            } else if !truncated {
                truncated = true;
                warn!(
                    path = %self.path.display(),
                    offset = start,
                    "Message exceeds maximum size, truncating body"
                );
            }
        }

        Ok(Some((start, message)))
    }
}

impl Iterator for MboxReader {
    type Item = std::result::Result<(u64, Vec<u8>), SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(m)) => Some(Ok(m)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Turn one raw mbox message into a record.
///
/// Header fields are left in the transport headers for the normalizer; the
/// separator postmark supplies the delivery time.
pub fn to_raw_message(offset: u64, raw: &[u8]) -> RawMessage {
    let (separator, message) = split_separator(raw);
    let header_end = find_header_end(message).unwrap_or(message.len());
    let headers = &message[..header_end];
    let body = &message[header_end..];
    let body = body
        .strip_prefix(b"\r\n\r\n")
        .or_else(|| body.strip_prefix(b"\n\n"))
        .unwrap_or(body);

    let mut record = RawMessage {
        id: format!("offset {offset}"),
        transport_headers: Some(RawText::undeclared(headers)),
        delivery_time: separator.and_then(parse_postmark),
        ..RawMessage::default()
    };

    if is_undeclared_plain_text(headers) {
        // Keep the bytes untouched so the normalizer can detect their encoding
        record.plain_body = Some(RawText::undeclared(body));
        return record;
    }

    let Some(parsed) = MessageParser::default().parse(message) else {
        warn!(offset, "MIME parse failed, keeping raw body");
        record.plain_body = Some(RawText::undeclared(body));
        return record;
    };

    // mail-parser lists an HTML part as text body when there is no plain
    // one, and a plain part as HTML body when there is no HTML one
    record.plain_body = parsed
        .text_part(0)
        .filter(|part| !part.is_text_html())
        .and_then(|part| text_part_body(message, part));
    record.html_body = parsed
        .html_part(0)
        .filter(|part| part.is_text_html())
        .and_then(|part| text_part_body(message, part));
    record.attachments = parsed
        .attachments()
        .map(|part| {
            let content_type = part.content_type().map(|ct: &mail_parser::ContentType| {
                match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                }
            });
            let declared_size = part
                .content_disposition()
                .and_then(|d| d.attribute("size"))
                .and_then(|s| s.trim().parse().ok());
            RawAttachment {
                filename: part.attachment_name().map(str::to_string),
                content_type,
                declared_size,
                data: part.contents().to_vec(),
            }
        })
        .collect();
    record
}

/// Transfer-decoded bytes of a text part, tagged with its declared charset.
///
/// Charset decoding is left to the normalizer, so a part without a `charset`
/// parameter reaches it as undeclared bytes.
fn text_part_body(message: &[u8], part: &MessagePart<'_>) -> Option<RawText> {
    let charset = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .map(|label| CharsetHint::Label(label.to_string()));

    let Some(encoded) = message.get(part.raw_body_offset()..part.raw_end_offset()) else {
        return part.text_contents().map(RawText::utf8);
    };

    let encoding = part
        .content_transfer_encoding()
        .map(|e| e.trim().to_ascii_lowercase());
    let decoded = match encoding.as_deref() {
        Some("quoted-printable") => quoted_printable_decode(encoded),
        Some("base64") => base64_decode(encoded),
        _ => Some(encoded.to_vec()),
    };
    match decoded {
        Some(bytes) => Some(RawText { bytes, charset }),
        None => {
            warn!("Malformed transfer encoding in text part, using parser output");
            part.text_contents().map(RawText::utf8)
        }
    }
}

/// Split off the `From ` separator line, if present.
fn split_separator(raw: &[u8]) -> (Option<&[u8]>, &[u8]) {
    if !is_mbox_separator(raw) {
        return (None, raw);
    }
    match raw.iter().position(|&b| b == b'\n') {
        Some(pos) => (Some(&raw[..pos]), &raw[pos + 1..]),
        None => (Some(raw), &[]),
    }
}

/// Parse the postmark of a separator line: `From sender Thu Jan  4 10:00:00 2024`.
fn parse_postmark(line: &[u8]) -> Option<DateTime<Utc>> {
    let text = String::from_utf8_lossy(line);
    let tokens: Vec<&str> = text.split_whitespace().skip(2).take(5).collect();
    if tokens.len() < 5 {
        return None;
    }
    let joined = tokens.join(" ");
    NaiveDateTime::parse_from_str(&joined, "%a %b %d %H:%M:%S %Y")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// `true` for single-part text without a declared charset or transfer encoding.
fn is_undeclared_plain_text(headers: &[u8]) -> bool {
    let text = String::from_utf8_lossy(headers).to_lowercase();
    let unfolded = text.replace("\r\n", "\n").replace("\n ", " ").replace("\n\t", " ");
    let field = |name: &str| {
        unfolded
            .lines()
            .find_map(|l| l.strip_prefix(name).map(|v| v.trim().to_string()))
    };
    let content_type = field("content-type:");
    let encoding = field("content-transfer-encoding:");

    let plain = content_type
        .as_deref()
        .map_or(true, |ct| ct.starts_with("text/plain") && !ct.contains("charset"));
    let raw_encoding = encoding
        .as_deref()
        .map_or(true, |enc| matches!(enc, "7bit" | "8bit" | "binary"));
    plain && raw_encoding
}

/// Byte offset where the header block ends (the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    (0..data.len().saturating_sub(1)).find(|&i| {
        (data[i] == b'\n' && data[i + 1] == b'\n') || data[i..].starts_with(b"\r\n\r\n")
    })
}

/// mboxrd quoting: `>From ` in a body line loses one `>`.
fn unescape_from_line(line: &[u8]) -> &[u8] {
    let quotes = line.iter().take_while(|&&b| b == b'>').count();
    if quotes > 0 && line[quotes..].starts_with(b"From ") {
        &line[1..]
    } else {
        line
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
