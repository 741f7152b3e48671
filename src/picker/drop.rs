//! Terminals deliver a dropped file as pasted text. The exact shape depends
//! on the emulator: bare, quoted, backslash-escaped or a `file://` URI.

use std::path::{Path, PathBuf};

/// Like [`parse_drop`], but a payload that already names an existing file is
/// taken verbatim (some terminals paste unescaped paths with spaces).
pub fn resolve_drop(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    if !trimmed.is_empty() && Path::new(trimmed).exists() {
        return Some(PathBuf::from(trimmed));
    }
    parse_drop(text)
}

/// First path in a drop payload, if any.
pub fn parse_drop(text: &str) -> Option<PathBuf> {
    let text = text.trim_start();
    let first = match text.chars().next()? {
        quote @ ('\'' | '"') => {
            let rest = &text[1..];
            let end = rest.find(quote)?;
            rest[..end].to_string()
        }
        _ => unescape_until_space(text),
    };

    if first.starts_with("file://") {
        // Only local files; a remote host has no local path
        return url::Url::parse(&first).ok()?.to_file_path().ok();
    }

    if first.is_empty() {
        None
    } else {
        Some(PathBuf::from(first))
    }
}

fn unescape_until_space(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            c if c.is_whitespace() => break,
            c => out.push(c),
        }
    }
    out
}
