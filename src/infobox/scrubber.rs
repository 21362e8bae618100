//! Locating the infobox in page wikitext and stripping markup noise from it.
//!
//! [`isolate_infobox`] returns the scrubbed `{{Infobox ...}}` block ready for
//! [`extract_fields`](super::fields::extract_fields). The block is found with a
//! brace-depth scanner ([`IsolationMode::Balanced`]); the older behaviour of
//! capturing through the last `}}` in the text is kept as
//! [`IsolationMode::Greedy`] for callers relying on it.

use itertools::Itertools;
use lazy_regex::regex;

use crate::{
    errors::{Result, WikiError},
    infobox::templates::{find_template_end, positional_args, remove_templates, replace_templates},
};

/// How the end of the infobox template is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Count `{{` / `}}` pairs and stop where the infobox itself closes.
    #[default]
    Balanced,
    /// Capture through the last `}}` in the remaining text. Over-captures
    /// anything that follows the infobox in the same section.
    Greedy,
}

/// Isolate and scrub the first infobox in `wikitext` using [`IsolationMode::Balanced`].
pub fn isolate_infobox(wikitext: &str) -> Result<String> {
    isolate_infobox_with(wikitext, IsolationMode::default())
}

/// Isolate and scrub the first infobox in `wikitext`.
///
/// # Returns
/// - Ok(String) -> scrubbed block, starting with `{{Infobox`.
/// - Err(WikiError::InfoboxNotFound) -> no infobox in the text.
pub fn isolate_infobox_with(wikitext: &str, mode: IsolationMode) -> Result<String> {
    let start = regex!(r"(?i)\{\{\s*infobox")
        .find(wikitext)
        .map(|m| m.start())
        .ok_or(WikiError::InfoboxNotFound)?;

    let block = match mode {
        IsolationMode::Balanced => match find_template_end(wikitext, start) {
            Some(end) => &wikitext[start..end],
            None => {
                log::warn!("Infobox never closes, taking the rest of the text");
                &wikitext[start..]
            }
        },
        IsolationMode::Greedy => match wikitext[start..].rfind("}}") {
            Some(end) => &wikitext[start..start + end + 2],
            None => &wikitext[start..],
        },
    };

    Ok(scrub(block))
}

/// Strip comments, references, HTML tags and footnotes, then flatten the
/// multi-line and single-purpose templates that would otherwise break line
/// splitting.
///
/// Running `scrub` on its own output changes nothing.
pub fn scrub(text: &str) -> String {
    let text = regex!(r"(?s)<!--.*?-->").replace_all(text, "");
    let text = regex!(r"(?is)<ref[^>]*?/>|<ref(\s[^>]*)?>.*?</ref\s*>").replace_all(&text, "");
    let text = regex!(r"<[^>]+>").replace_all(&text, "");
    let text = remove_templates(&text, &["refn"]);
    let text = flatten_lists(&text);
    let text = resolve_url_and_dates(&text);
    text.trim().to_string()
}

/// Multi-line `{{bulleted list}}`-style templates become one comma-joined line.
fn flatten_lists(text: &str) -> String {
    replace_templates(text, |name, args| {
        let inner = args.join("|");
        if !inner.contains('\n') {
            return None;
        }
        match name {
            "bulleted list" | "unbulleted list" | "ordered list" | "pagelist" => Some(
                positional_args(args)
                    .into_iter()
                    .filter(|a| !a.is_empty())
                    .join(", "),
            ),
            _ => None,
        }
    })
}

/// `{{URL|...}}` keeps its last argument, `{{Start date|Y|M|D}}` becomes `Y/M/D`.
fn resolve_url_and_dates(text: &str) -> String {
    replace_templates(text, |name, args| match name {
        "url" => Some(match args {
            [_, .., last] => last.trim().to_string(),
            _ => String::new(),
        }),
        "start date" => Some(
            positional_args(args)
                .into_iter()
                .filter(|a| !a.is_empty())
                .join("/"),
        ),
        _ => None,
    })
}
