//! Filesystem-safe name components.

/// Characters rejected by at least one common filesystem.
const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file stems.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make `name` usable as a single path component.
///
/// - control characters become spaces; `< > : " / \ | ? *` are removed
/// - whitespace runs collapse to one space; leading whitespace and trailing
///   dots and spaces are trimmed
/// - Windows device names (`CON`, `LPT1.txt`, …) get `_` after the stem
/// - the result is cut to at most `max_bytes` bytes on a character boundary
/// - an empty result becomes `fallback`, cut to the same budget
///
/// The function is idempotent: `sanitize(sanitize(x)) == sanitize(x)` as long
/// as `fallback` is itself a sanitized name.
pub fn sanitize_component(name: &str, max_bytes: usize, fallback: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.chars() {
        if c.is_control() || c.is_whitespace() {
            pending_space = !cleaned.is_empty();
            continue;
        }
        if ILLEGAL_CHARS.contains(&c) {
            continue;
        }
        if pending_space {
            cleaned.push(' ');
            pending_space = false;
        }
        cleaned.push(c);
    }

    let mut cleaned = truncate_to_bytes(trim_trailing(&cleaned), max_bytes).to_string();
    cleaned.truncate(trim_trailing(&cleaned).len());

    if is_reserved(&cleaned) {
        let stem_end = cleaned.find('.').unwrap_or(cleaned.len());
        cleaned.insert(stem_end, '_');
        let fitted = trim_trailing(truncate_to_bytes(&cleaned, max_bytes)).len();
        cleaned.truncate(fitted);
        // Budget too small to append: overwrite the last character instead
        if is_reserved(&cleaned) {
            cleaned.pop();
            cleaned.push('_');
        }
    }

    if cleaned.is_empty() {
        trim_trailing(truncate_to_bytes(fallback, max_bytes)).to_string()
    } else {
        cleaned
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
pub fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn trim_trailing(s: &str) -> &str {
    s.trim_end_matches(['.', ' '])
}

fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem))
}

/// Split `name` into stem and extension at the last dot.
///
/// A leading dot (`.profile`) is part of the stem, not an extension marker.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(name: &str) -> String {
        sanitize_component(name, 60, "fallback")
    }

    #[test]
    fn test_removes_illegal_characters() {
        assert_eq!(s("Re: Q3 <draft> \"final\"?"), "Re Q3 draft final");
        assert_eq!(s("a/b\\c|d*e"), "abcde");
    }

    #[test]
    fn test_controls_and_whitespace_collapse() {
        assert_eq!(s("  line one\r\n\tline\u{7}two  "), "line one line two");
    }

    #[test]
    fn test_trailing_dots_and_spaces() {
        assert_eq!(s("Meeting notes... "), "Meeting notes");
        assert_eq!(s("..."), "fallback");
    }

    #[test]
    fn test_reserved_device_names() {
        assert_eq!(s("con"), "con_");
        assert_eq!(s("LPT1.txt"), "LPT1_.txt");
        assert_eq!(s("con.txt"), "con_.txt");
        assert_eq!(split_extension(&s("con.txt")).1, Some("txt"));
        assert_eq!(sanitize_component("con.txt", 5, "x"), "con_");
        assert_eq!(sanitize_component("LPT1", 4, "x"), "LPT_");
        assert_eq!(s("CONSOLE"), "CONSOLE");
    }

    #[test]
    fn test_empty_uses_fallback() {
        assert_eq!(s(""), "fallback");
        assert_eq!(s("???"), "fallback");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        // 'é' is two bytes; 7 bytes would split the fourth one
        let out = sanitize_component("éééé", 7, "x");
        assert_eq!(out, "ééé");
        assert!(out.len() <= 7);
    }

    #[test]
    fn test_truncation_retrims() {
        assert_eq!(sanitize_component("abc. def", 5, "x"), "abc");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Re: Status",
            "  lots   of   space  ",
            "CON",
            "trailing dots...",
            "日本語のメール件名はとても長いのでここで切られる可能性があります",
            "tab\tand\nnewline",
            "",
            "a.b.c.",
            "LPT1.txt",
            "con.txt",
            "nul",
        ];
        for input in inputs {
            for max in [3, 4, 5, 16, 60] {
                let once = sanitize_component(input, max, "No Subject");
                let twice = sanitize_component(&once, max, "No Subject");
                assert_eq!(once, twice, "not idempotent for {input:?} at {max}");
            }
        }
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.pdf"), ("report", Some("pdf")));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_extension(".profile"), (".profile", None));
        assert_eq!(split_extension("README"), ("README", None));
        assert_eq!(split_extension("odd."), ("odd.", None));
    }
}
