//! Text decoding for archived fields of unknown or legacy encoding.
//!
//! Resolution order: byte-order mark, declared charset, valid UTF-8,
//! statistical detection, and finally lossy UTF-8 with U+FFFD substitution.

use encoding_rs::Encoding;

use crate::archive::{CharsetHint, RawText};

/// How a piece of text was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMethod {
    /// A byte-order mark or the declared charset decoded cleanly.
    Declared(&'static str),
    /// No usable declaration, but the bytes are valid UTF-8.
    Utf8,
    /// The encoding was guessed from byte statistics.
    Detected(&'static str),
    /// Nothing decoded cleanly; invalid sequences became U+FFFD.
    Lossy,
}

/// Decoded text plus the method that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub method: DecodeMethod,
}

/// Decode archived text.
pub fn decode(raw: &RawText) -> Decoded {
    decode_bytes(&raw.bytes, raw.charset.as_ref())
}

/// Decode bytes with an optional charset hint.
pub fn decode_bytes(bytes: &[u8], hint: Option<&CharsetHint>) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        if let Some(text) = decode_strict(encoding, &bytes[bom_len..]) {
            return Decoded {
                text,
                method: DecodeMethod::Declared(encoding.name()),
            };
        }
    }

    if let Some(encoding) = hint.and_then(encoding_for_hint) {
        if let Some(text) = decode_strict(encoding, bytes) {
            return Decoded {
                text,
                method: DecodeMethod::Declared(encoding.name()),
            };
        }
        tracing::debug!(
            charset = encoding.name(),
            "Declared charset does not fit the bytes, detecting"
        );
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            method: DecodeMethod::Utf8,
        };
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    if let Some(text) = decode_strict(guess, bytes) {
        return Decoded {
            text,
            method: DecodeMethod::Detected(guess.name()),
        };
    }

    Decoded {
        text: String::from_utf8_lossy(bytes).into_owned(),
        method: DecodeMethod::Lossy,
    }
}

/// Decode without replacement; `None` if any sequence is malformed.
fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|cow| cow.into_owned())
}

/// Map a charset hint to an encoding.
pub fn encoding_for_hint(hint: &CharsetHint) -> Option<&'static Encoding> {
    match hint {
        CharsetHint::Label(label) => Encoding::for_label(label.trim().as_bytes()),
        CharsetHint::CodePage(cp) => encoding_for_code_page(*cp),
    }
}

/// Windows code page numbers as recorded by desktop mail clients.
fn encoding_for_code_page(cp: u16) -> Option<&'static Encoding> {
    let label: &[u8] = match cp {
        65001 => b"utf-8",
        1200 => b"utf-16le",
        1201 => b"utf-16be",
        20127 => b"us-ascii",
        28591 => b"iso-8859-1",
        28592 => b"iso-8859-2",
        28595 => b"iso-8859-5",
        28597 => b"iso-8859-7",
        28605 => b"iso-8859-15",
        874 => b"windows-874",
        1250..=1258 => return Encoding::for_label(format!("windows-{cp}").as_bytes()),
        932 => b"shift_jis",
        936 => b"gbk",
        949 => b"euc-kr",
        950 => b"big5",
        866 => b"ibm866",
        20866 => b"koi8-r",
        21866 => b"koi8-u",
        50220 | 50221 | 50222 => b"iso-2022-jp",
        51932 => b"euc-jp",
        54936 => b"gb18030",
        _ => return None,
    };
    Encoding::for_label(label)
}
