//! Splitting a scrubbed infobox block into `name = value` fields and
//! flattening each value to plain text.

use std::collections::{BTreeMap, btree_map};
use std::fmt;

use itertools::Itertools;
use lazy_regex::regex;
use serde::{Deserialize, Serialize};

use crate::infobox::{
    derived::resolve,
    links::resolve_wikilinks,
    templates::{find_template_end, positional_args, remove_templates, replace_templates},
};

/// A single infobox value as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Flat infobox data: field name to plain-text value.
///
/// Keys are stored as written in the wikitext (trimmed). [`FieldMap::get`]
/// falls back to a normalised comparison so `alterEgo`, `alter_ego` and
/// `alter ego` all find the same field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

/// Lower-case and drop separators, for loose key comparison.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. A repeated name replaces the earlier value.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Look a field up by exact name, then by normalised name.
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        let wanted = normalize_key(key);
        self.0
            .iter()
            .find(|(k, _)| normalize_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field value if present, otherwise a derived value (such as `age`).
    pub fn lookup(&self, key: &str) -> Option<FieldValue> {
        match self.get(key) {
            Some(value) => Some(FieldValue::Text(value.to_string())),
            None => resolve(key, self),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Split a scrubbed infobox block into fields.
///
/// A field starts on a line whose first non-blank character is `|` at the
/// infobox's own nesting level. The name is the text before the first `=`, the
/// value the text after it up to the end of that line. Values are flattened by
/// [`resolve_value`]; empty values are not recorded. When a name repeats the
/// last non-empty value wins.
pub fn extract_fields(scrubbed: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    for segment in split_field_lines(scrubbed) {
        let Some((name, raw)) = segment.split_once('=') else {
            continue;
        };
        // the first field may share its line with the template name
        let name = name.rsplit('|').next().unwrap_or(name).trim();
        if name.is_empty() || name.contains("{{") || name.contains('\n') {
            continue;
        }
        let raw = unwrap_broken_wrappers(raw.trim());
        let raw = raw.split('\n').next().unwrap_or(&raw);
        let value = resolve_value(raw);
        if value.is_empty() {
            continue;
        }
        fields.insert(name, value);
    }
    fields
}

/// Drop `{{nowrap|` / `{{small|` openers whose template runs past the first
/// line (or never closes), together with their closing braces, so the line
/// cut keeps the wrapped text instead of a bare opener.
fn unwrap_broken_wrappers(raw: &str) -> String {
    let mut text = raw.to_string();
    let mut from = 0usize;
    while let Some(opener) = regex!(r"(?i)\{\{\s*(?:nowrap|small)\s*\|").find_at(&text, from) {
        let (start, open_end) = (opener.start(), opener.end());
        match find_template_end(&text, start) {
            Some(end) if !text[start..end].contains('\n') => from = open_end,
            Some(end) => {
                text.replace_range(end - 2..end, "");
                text.replace_range(start..open_end, "");
                from = start;
            }
            None => {
                text.replace_range(start..open_end, "");
                from = start;
            }
        }
    }
    text
}

/// Cut the block at every line-leading `|` that belongs to the outer template.
fn split_field_lines(block: &str) -> Vec<&str> {
    let bytes = block.as_bytes();
    let mut segments = Vec::new();
    let mut depth_brace = 0usize;
    let mut depth_bracket = 0usize;
    let mut at_line_start = true;
    let mut seg_start = 0usize;

    let mut idx = 0usize;
    while idx < bytes.len() {
        let pair = bytes.get(idx..idx + 2);
        match pair {
            Some(b"{{") => {
                depth_brace += 1;
                idx += 2;
                at_line_start = false;
                continue;
            }
            Some(b"}}") => {
                depth_brace = depth_brace.saturating_sub(1);
                idx += 2;
                at_line_start = false;
                continue;
            }
            Some(b"[[") => {
                depth_bracket += 1;
                idx += 2;
                at_line_start = false;
                continue;
            }
            Some(b"]]") => {
                depth_bracket = depth_bracket.saturating_sub(1);
                idx += 2;
                at_line_start = false;
                continue;
            }
            _ => {}
        }
        match bytes[idx] {
            b'\n' => at_line_start = true,
            b' ' | b'\t' | b'\r' => {}
            b'|' if at_line_start && depth_brace <= 1 && depth_bracket == 0 => {
                segments.push(&block[seg_start..idx]);
                seg_start = idx + 1;
                at_line_start = false;
            }
            _ => at_line_start = false,
        }
        idx += 1;
    }
    segments.push(&block[seg_start..]);
    segments
}

/// List templates flattened to comma-joined text.
const LIST_TEMPLATES: &[&str] = &[
    "hlist",
    "flatlist",
    "unbulleted list",
    "ubl",
    "vunblist",
    "bulleted list",
    "ordered list",
];

/// Flatten one raw value. Each step works on the previous step's output:
/// 1. wikilinks become their display text
/// 2. `{{nowrap|X}}` / `{{small|X}}` become `X`
/// 3. `{{native name|lang|NAME}}` becomes `NAME`
/// 4. list templates without nested templates become `a,b,c`
/// 5. `{{efn|...}}` footnotes are dropped
/// 6. `&nbsp` becomes a space and a dangling `}}` is cut
pub fn resolve_value(raw: &str) -> String {
    let text = resolve_wikilinks(raw);
    let text = replace_templates(&text, |name, args| {
        matches!(name, "nowrap" | "small").then(|| args[1..].join("|"))
    });
    let text = replace_templates(&text, |name, args| {
        name.starts_with("native")
            .then(|| args.get(2).map(|a| a.trim().to_string()).unwrap_or_default())
    });
    let text = replace_templates(&text, |name, args| {
        if !LIST_TEMPLATES.contains(&name) || args.iter().skip(1).any(|a| a.contains("{{")) {
            return None;
        }
        Some(
            positional_args(args)
                .into_iter()
                .filter(|a| !a.is_empty())
                .join(","),
        )
    });
    let text = remove_templates(&text, &["efn"]);
    let text = text.replace("&nbsp;", " ").replace("&nbsp", " ");
    strip_dangling_close(text.trim()).trim().to_string()
}

/// The last field of a block can carry the infobox's own closing `}}`.
fn strip_dangling_close(value: &str) -> &str {
    let opens = value.matches("{{").count();
    let closes = value.matches("}}").count();
    if closes > opens {
        value.strip_suffix("}}").unwrap_or(value)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dublin_scenario() {
        let fields = extract_fields("{{Infobox x\n|name = Dublin\n|population = 554554\n}}");
        let expected: FieldMap = [("name", "Dublin"), ("population", "554554")]
            .into_iter()
            .collect();
        assert_eq!(fields, expected);
    }

    #[test]
    fn last_occurrence_wins() {
        let fields = extract_fields("{{Infobox x\n|name = First\n|other = 1\n|name = Second\n}}");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("name"), Some("Second"));
    }

    #[test]
    fn empty_values_are_dropped() {
        let fields = extract_fields("{{Infobox x\n| image = \n| caption =\n| name = X\n}}");
        assert_eq!(fields.len(), 1);
        assert!(!fields.contains_key("image"));
    }

    #[test]
    fn inline_first_field_and_dangling_close() {
        let fields = extract_fields("{{Infobox person | name = Luke\n| gender = Male}}");
        assert_eq!(fields.get("name"), Some("Luke"));
        assert_eq!(fields.get("gender"), Some("Male"));
    }

    #[test]
    fn nested_template_lines_do_not_split() {
        let block = "{{Infobox x\n| coordinates = {{coord|38|54|N|16|36|E}}\n| box = {{Other\n|inner = no}}\n}}";
        let fields = extract_fields(block);
        assert_eq!(fields.get("coordinates"), Some("{{coord|38|54|N|16|36|E}}"));
        assert!(!fields.contains_key("inner"));
    }

    #[test]
    fn value_stops_at_newline() {
        let fields = extract_fields("{{Infobox x\n| motto = Line one\nstray text\n| next = 2\n}}");
        assert_eq!(fields.get("motto"), Some("Line one"));
        assert_eq!(fields.get("next"), Some("2"));
    }

    #[test]
    fn links_resolve_to_display_text() {
        assert_eq!(resolve_value("[[Human]]"), "Human");
        assert_eq!(resolve_value("[[Shmi Skywalker|Shmi]] (mother)"), "Shmi (mother)");
    }

    #[test]
    fn wrappers_and_native_names() {
        assert_eq!(resolve_value("{{nowrap|{{small|554,554}}}}"), "554,554");
        assert_eq!(
            resolve_value("{{native name|fr|République française|italics=off}}"),
            "République française"
        );
    }

    #[test]
    fn list_templates_join() {
        assert_eq!(resolve_value("{{hlist|[[Irish]]|English}}"), "Irish,English");
        assert_eq!(resolve_value("{{unbulleted list|a|b|class=x}}"), "a,b");
        assert_eq!(resolve_value("{{vunblist|a|b}}"), "a,b");
        assert_eq!(
            resolve_value("{{vunblist|{{flag|Ireland}}|b}}"),
            "{{vunblist|{{flag|Ireland}}|b}}"
        );
    }

    #[test]
    fn lone_small_unwraps() {
        assert_eq!(resolve_value("{{small|(2016)}}"), "(2016)");
        assert_eq!(resolve_value("{{Small|X}}"), "X");
    }

    #[test]
    fn wrapper_across_line_break() {
        let fields = extract_fields("{{Infobox x\n| population = {{nowrap|554,554\n}}\n| name = Dublin\n}}");
        assert_eq!(fields.get("population"), Some("554,554"));
        assert_eq!(fields.get("name"), Some("Dublin"));
        let fields = extract_fields("{{Infobox x\n| name = Dublin\n| population = {{nowrap|554,554\n");
        assert_eq!(fields.get("population"), Some("554,554"));
    }

    #[test]
    fn closed_wrappers_survive_line_cut() {
        let fields = extract_fields("{{Infobox x\n| population = {{nowrap|554,554}}\n}}");
        assert_eq!(fields.get("population"), Some("554,554"));
    }

    #[test]
    fn footnotes_and_entities() {
        assert_eq!(resolve_value("554,554{{efn|Census 2016}}"), "554,554");
        assert_eq!(resolve_value("117.8&nbsp;km2"), "117.8 km2");
        assert_eq!(resolve_value("5&nbspkm"), "5 km");
    }

    #[test]
    fn normalised_lookup() {
        let fields: FieldMap = [("alter_ego", "Bruce Wayne"), ("latNS", "S")]
            .into_iter()
            .collect();
        assert_eq!(fields.get("alterEgo"), Some("Bruce Wayne"));
        assert_eq!(fields.get("alter ego"), Some("Bruce Wayne"));
        assert_eq!(fields.get("latNs"), Some("S"));
        assert_eq!(fields.get("missing"), None);
    }

    #[test]
    fn lookup_prefers_real_fields() {
        let fields: FieldMap = [("age", "42")].into_iter().collect();
        assert_eq!(fields.lookup("age"), Some(FieldValue::Text("42".into())));
        assert_eq!(fields.lookup("unknown"), None);
    }
}
