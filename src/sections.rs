//! Plain-text page extracts split into a tree of sections.

use lazy_regex::regex;
use serde::{Deserialize, Serialize};

/// One `== Heading ==` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
    /// Sub-sections; absent when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Section>>,
}

struct Heading<'a> {
    level: usize,
    title: &'a str,
    start: usize,
    end: usize,
}

fn headings(source: &str) -> Vec<Heading<'_>> {
    regex!(r"(?m)^[ \t]*(==+)[ \t]*(.+?)[ \t]*==+[ \t]*$")
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Heading {
                level: caps.get(1)?.as_str().len(),
                title: caps.get(2)?.as_str(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Split an extract into sections. Levels are relative to the shallowest
/// heading; a deeper section nests under the closest preceding shallower one.
/// Text before the first heading is not part of any section.
pub fn parse_content(source: &str) -> Vec<Section> {
    let headings = headings(source);
    let Some(min_level) = headings.iter().map(|h| h.level).min() else {
        return Vec::new();
    };

    let mut root = Vec::new();
    let mut open: Vec<(usize, Section)> = Vec::new();
    for (i, heading) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(source.len(), |next| next.start);
        let level = heading.level - min_level;
        let section = Section {
            title: heading.title.trim().to_string(),
            content: source[heading.end..end].trim().to_string(),
            items: None,
        };

        while let Some((top, _)) = open.last() {
            if *top < level {
                break;
            }
            if let Some((_, done)) = open.pop() {
                attach(&mut open, &mut root, done);
            }
        }
        open.push((level, section));
    }
    while let Some((_, done)) = open.pop() {
        attach(&mut open, &mut root, done);
    }
    root
}

fn attach(open: &mut [(usize, Section)], root: &mut Vec<Section>, done: Section) {
    match open.last_mut() {
        Some((_, parent)) => parent.items.get_or_insert_with(Vec::new).push(done),
        None => root.push(done),
    }
}
