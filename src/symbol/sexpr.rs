//! Span scanning over KiCad s-expression text.
//!
//! The symbol library is never parsed into a tree here. Callers locate an
//! opening parenthesis with a regex and ask this module where the matching
//! close is, so everything outside the touched span stays byte-for-byte
//! intact.
//!
//! Quoted strings are skipped as opaque tokens (with `\"` and `\\` escapes),
//! so parentheses inside property values do not unbalance the scan.

/// Returns the byte offset just past the `)` that closes the list opened at
/// `open`.
///
/// Returns `None` when `open` does not point at `(` or the list is never
/// closed before the end of `text`.
#[must_use]
pub fn list_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the leading whitespace of the line containing byte offset `at`.
#[must_use]
pub fn line_indent(text: &str, at: usize) -> &str {
    let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..at];
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}
