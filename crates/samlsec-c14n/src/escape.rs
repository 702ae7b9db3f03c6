#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! Text: `&`, `<`, `>` and `\r`. Attribute values: `&`, `<`, `"`, `\t`,
//! `\n` and `\r`. Processing-instruction data: `\r` only.

/// Append escaped text content to `out`.
pub fn push_text(out: &mut Vec<u8>, s: &str) {
    for &b in s.as_bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'\r' => out.extend_from_slice(b"&#xD;"),
            _ => out.push(b),
        }
    }
}

/// Append an escaped attribute value to `out`.
pub fn push_attr(out: &mut Vec<u8>, s: &str) {
    for &b in s.as_bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            b'\t' => out.extend_from_slice(b"&#x9;"),
            b'\n' => out.extend_from_slice(b"&#xA;"),
            b'\r' => out.extend_from_slice(b"&#xD;"),
            _ => out.push(b),
        }
    }
}

pub fn push_pi(out: &mut Vec<u8>, s: &str) {
    for &b in s.as_bytes() {
        if b == b'\r' {
            out.extend_from_slice(b"&#xD;");
        } else {
            out.push(b);
        }
    }
}
