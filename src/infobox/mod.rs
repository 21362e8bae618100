//! Infobox wikitext to structured data.
//!
//! The pipeline is [`isolate_infobox`] (find and scrub the block), then
//! [`extract_fields`] (split into a [`FieldMap`]). Post-processing happens on
//! lookup: [`parse_coordinates`] and the derived-field [`resolve`]r.

pub mod coordinates;
pub mod derived;
pub mod fields;
pub mod links;
pub mod scrubber;
pub mod templates;

pub use coordinates::{
    Coordinate, CoordinateFormat, Coordinates, NO_COORDINATES, dms_to_decimal, parse_coordinates,
};
pub use derived::{DerivedField, resolve, resolve_at};
pub use fields::{FieldMap, FieldValue, extract_fields, normalize_key};
pub use scrubber::{IsolationMode, isolate_infobox, isolate_infobox_with, scrub};

use lazy_regex::regex_is_match;

use crate::errors::{Result, WikiError};

/// Whether revision content is a redirect page (`#REDIRECT [[Target]]`).
pub fn is_redirect(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| regex_is_match!(r"(?i)^#\s*redirect\b", line))
}

/// Parse the infobox of one revision's content.
///
/// # Returns
/// - Ok(FieldMap) -> the infobox fields.
/// - Err(WikiError::RedirectDetected) -> `content` is a redirect page.
/// - Err(WikiError::InfoboxNotFound) -> no infobox in `content`.
pub fn parse_infobox(content: &str) -> Result<FieldMap> {
    parse_infobox_with(content, IsolationMode::default())
}

/// [`parse_infobox`] with an explicit [`IsolationMode`].
pub fn parse_infobox_with(content: &str, mode: IsolationMode) -> Result<FieldMap> {
    if is_redirect(content) {
        return Err(WikiError::redirect(content));
    }
    let block = isolate_infobox_with(content, mode)?;
    Ok(extract_fields(&block))
}
