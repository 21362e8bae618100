//! Brace-aware scanning helpers for `{{Name|arg|...}}` templates.
//!
//! Everything here counts `{{` / `}}` pairs instead of pattern matching, so
//! nested templates are captured as a whole. Positions are byte offsets and
//! always land on char boundaries (the delimiters are ASCII).

/// Length in bytes of the char starting at `idx`.
fn char_len_at(input: &str, idx: usize) -> usize {
    input[idx..].chars().next().map_or(1, char::len_utf8)
}

/// Given `start` pointing at `{{`, return the byte offset just past the
/// matching `}}`, or `None` if the template never closes.
pub fn find_template_end(input: &str, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    if start + 1 >= len || bytes[start] != b'{' || bytes[start + 1] != b'{' {
        return None;
    }

    let mut idx = start + 2;
    let mut depth = 1usize;
    while idx < len {
        if idx + 1 < len && bytes[idx] == b'{' && bytes[idx + 1] == b'{' {
            depth += 1;
            idx += 2;
        } else if idx + 1 < len && bytes[idx] == b'}' && bytes[idx + 1] == b'}' {
            depth -= 1;
            idx += 2;
            if depth == 0 {
                return Some(idx);
            }
        } else {
            idx += char_len_at(input, idx);
        }
    }
    None
}

/// Split by `sep` only at top level (not inside nested `{{ }}` or `[[ ]]`).
pub fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut depth_brace = 0usize;
    let mut depth_bracket = 0usize;

    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        let doubled = chars.peek() == Some(&ch);
        match ch {
            '{' if doubled => {
                depth_brace += 1;
                cur.push_str("{{");
                chars.next();
            }
            '}' if doubled => {
                depth_brace = depth_brace.saturating_sub(1);
                cur.push_str("}}");
                chars.next();
            }
            '[' if doubled => {
                depth_bracket += 1;
                cur.push_str("[[");
                chars.next();
            }
            ']' if doubled => {
                depth_bracket = depth_bracket.saturating_sub(1);
                cur.push_str("]]");
                chars.next();
            }
            c if c == sep && depth_brace == 0 && depth_bracket == 0 => {
                parts.push(std::mem::take(&mut cur));
            }
            c => cur.push(c),
        }
    }
    parts.push(cur);
    parts
}

/// Name of the template whose body starts at `body` (text after `{{`).
fn template_name(body: &str) -> String {
    let end = body.find(['|', '}', '\n']).unwrap_or(body.len());
    body[..end].trim().to_lowercase()
}

/// Walk every template in `input` and let `replace` decide what to do with it.
///
/// `replace` receives the lower-cased template name and its top-level
/// arguments (the name itself is element 0). Returning `Some(text)` swaps the
/// whole template for `text`; scanning then starts over from the beginning, so
/// templates nested inside the replacement are visited too, as are enclosing
/// templates whose name or shape the replacement completed. Returning `None`
/// leaves the template alone and scanning descends into it. The result is a
/// fixed point: running the same rewrite again changes nothing.
pub fn replace_templates<F>(input: &str, mut replace: F) -> String
where
    F: FnMut(&str, &[String]) -> Option<String>,
{
    let mut text = input.to_string();
    let mut idx = 0usize;
    while let Some(found) = text[idx..].find("{{") {
        let start = idx + found;
        let Some(end) = find_template_end(&text, start) else {
            // unclosed opener, look for complete templates inside it
            idx = start + 2;
            continue;
        };
        let inner = &text[start + 2..end - 2];
        let name = template_name(inner);
        let args = split_top_level(inner, '|');
        match replace(&name, &args) {
            Some(replacement) => {
                text.replace_range(start..end, &replacement);
                idx = 0;
            }
            None => idx = start + 2,
        }
    }
    text
}

/// Remove every template whose name starts with one of `prefixes`.
pub fn remove_templates(input: &str, prefixes: &[&str]) -> String {
    replace_templates(input, |name, _| {
        prefixes
            .iter()
            .any(|p| name.starts_with(p))
            .then(String::new)
    })
}

/// Positional (unnamed) arguments of a template, trimmed, skipping the name.
pub fn positional_args(args: &[String]) -> Vec<String> {
    args.iter()
        .skip(1)
        .filter(|a| !is_named_arg(a))
        .map(|a| a.trim().to_string())
        .collect()
}

/// `key=value` style argument at top level.
fn is_named_arg(arg: &str) -> bool {
    let parts = split_top_level(arg, '=');
    parts.len() > 1 && {
        let key = parts[0].trim();
        !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ' ')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_end_counts_nesting() {
        let s = "{{a|{{b|c}}|d}} tail";
        assert_eq!(find_template_end(s, 0), Some(15));
        assert_eq!(&s[..15], "{{a|{{b|c}}|d}}");
        assert_eq!(find_template_end("{{open|{{x}}", 0), None);
        assert_eq!(find_template_end("no braces", 0), None);
    }

    #[test]
    fn split_top_level_ignores_nested_pipes() {
        let parts = split_top_level("hlist|[[A|B]]|{{x|y}}|z", '|');
        assert_eq!(parts, vec!["hlist", "[[A|B]]", "{{x|y}}", "z"]);
    }

    #[test]
    fn replace_visits_nested_templates() {
        let out = replace_templates("{{nowrap|{{small|tiny}}}} and {{keep|me}}", |name, args| {
            matches!(name, "nowrap" | "small").then(|| args[1..].join("|"))
        });
        assert_eq!(out, "tiny and {{keep|me}}");
    }

    #[test]
    fn remove_by_prefix() {
        let out = remove_templates("a{{efn|note {{nested}}}}b{{Refn|x}}c", &["efn", "refn"]);
        assert_eq!(out, "abc");
    }

    #[test]
    fn removal_reaches_templates_formed_by_removal() {
        let once = remove_templates("a{{re{{refn|x}}fn|y}}b", &["refn"]);
        assert_eq!(once, "ab");
        assert_eq!(remove_templates(&once, &["refn"]), once);
    }

    #[test]
    fn positional_args_drop_named() {
        let args = split_top_level("hlist|one| two |class=inline", '|');
        assert_eq!(positional_args(&args), vec!["one", "two"]);
    }

    #[test]
    fn multibyte_text_is_safe() {
        let out = remove_templates("République{{efn|é}} française", &["efn"]);
        assert_eq!(out, "République française");
    }
}
