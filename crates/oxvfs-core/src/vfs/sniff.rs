//! Content-type detection for newly written files.
//!
//! The first [`SNIFF_LEN`] bytes are matched against known file signatures
//! with `infer`. When the content is inconclusive the file name extension is
//! looked up with `mime_guess`, and as a last resort the bytes are classified
//! as UTF-8 text or `application/octet-stream`.

use std::str;

use mime::Mime;

pub const SNIFF_LEN: usize = 512;

/// Guess the media type of a file named `name` that starts with `data`.
/// Returns `None` for empty input.
pub fn detect_content_type(name: &str, data: &[u8]) -> Option<Mime> {
    if data.is_empty() {
        return None;
    }
    let head = &data[..data.len().min(SNIFF_LEN)];

    if let Some(mime) = infer::get(head).and_then(|kind| kind.mime_type().parse().ok()) {
        return Some(mime);
    }
    if let Some(mime) = mime_guess::from_path(name).first() {
        return Some(mime);
    }

    if is_text(head) {
        Some(mime::TEXT_PLAIN_UTF_8)
    } else {
        Some(mime::APPLICATION_OCTET_STREAM)
    }
}

/// Valid UTF-8, allowing a character cut off at the end of the head, and no
/// control bytes other than TAB, LF, FF, CR and ESC.
fn is_text(head: &[u8]) -> bool {
    let utf8 = match str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    utf8 && !head
        .iter()
        .any(|b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f))
}
