/*!
Wikilink (`[[...]]`) parsing for infobox values.

This module implements:
- `Link` data type with `display()`.
- `parse_internal_link_at(input, start)` for `[[...]]` style links (supports nesting).
- `resolve_wikilinks(text)` replacing every link with its display text.
*/

/// Internal link `[[target|label]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
    /// Text after the last pipe, if there was a pipe.
    pub label: Option<String>,
}

impl Link {
    pub fn new<S: Into<String>>(target: S, label: Option<S>) -> Self {
        Self {
            target: target.into(),
            label: label.map(Into::into),
        }
    }

    /// What a reader sees: the label when present, else the bare target.
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }
}

/// Parse an internal link `[[...]]` starting at `start` in `input`.
///
/// Returns Some((consumed_bytes, Link)) on success, or None if parse failed.
///
/// Nested `[[` / `]]` pairs (images with linked captions) are counted so the
/// outer link is consumed whole. The label is the text after the LAST pipe,
/// which for `[[File:x.png|thumb|Caption]]` is the caption.
pub fn parse_internal_link_at(input: &str, start: usize) -> Option<(usize, Link)> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    if start + 1 >= len || bytes[start] != b'[' || bytes[start + 1] != b'[' {
        return None;
    }

    let mut idx = start + 2;
    let mut depth: usize = 1;
    let mut closed = false;
    let mut content = String::new();

    while idx < len {
        if idx + 1 < len && bytes[idx] == b'[' && bytes[idx + 1] == b'[' {
            depth += 1;
            content.push_str("[[");
            idx += 2;
            continue;
        }
        if idx + 1 < len && bytes[idx] == b']' && bytes[idx + 1] == b']' {
            depth -= 1;
            idx += 2;
            if depth == 0 {
                closed = true;
                break;
            }
            content.push_str("]]");
            continue;
        }
        let ch = input[idx..].chars().next()?;
        content.push(ch);
        idx += ch.len_utf8();
    }

    if !closed || content.trim().is_empty() {
        return None;
    }

    // nested links inside the label collapse to their own display text
    let content = resolve_wikilinks(&content);
    let link = match content.rsplit_once('|') {
        Some((target, label)) => {
            let target = target.split('|').next().unwrap_or(target);
            Link::new(target.trim(), Some(label.trim()))
        }
        None => Link::new(content.trim(), None),
    };
    Some((idx - start, link))
}

/// Replace every `[[...]]` in `text` with its display text.
pub fn resolve_wikilinks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut idx = 0usize;
    while let Some(found) = text[idx..].find("[[") {
        let start = idx + found;
        out.push_str(&text[idx..start]);
        match parse_internal_link_at(text, start) {
            Some((consumed, link)) => {
                out.push_str(link.display());
                idx = start + consumed;
            }
            None => {
                out.push_str("[[");
                idx = start + 2;
            }
        }
    }
    out.push_str(&text[idx..]);
    out
}
