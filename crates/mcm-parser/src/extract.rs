//! Attribute extraction from comment-encoded text blocks.

use indexmap::IndexMap;
use mcm_core::{AttributeBlock, AttributeValue, EngineConfig, StyleMap};
use serde::Serialize;
use tracing::warn;

use crate::coerce::parse_value;
use crate::lexer::{LineKind, lex};

/// Marker separating the inline comment from an attribute value.
pub(crate) const INLINE_COMMENT: &str = "//";

/// Separator line between an element's title and its description.
pub const TITLE_SEPARATOR: &str = "--";

/// Attributes, style map and body of one node or relation text block.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Extraction {
    pub attributes: AttributeBlock,
    pub styles: StyleMap,
}

pub(crate) fn split_inline_comment(rest: &str) -> (&str, Option<String>) {
    match rest.split_once(INLINE_COMMENT) {
        Some((value, comment)) => {
            let comment = comment.trim();
            (value, (!comment.is_empty()).then(|| comment.to_string()))
        }
        None => (rest, None),
    }
}

/// Parses the text after a comment prefix into key, value and inline
/// comment. Malformed lines are dropped.
fn parse_comment(
    line: &str,
    config: &EngineConfig,
) -> Option<(String, AttributeValue, Option<String>)> {
    let Some((key, rest)) = line.split_once(':') else {
        warn!(line, "comment line has no `:` separator");
        return None;
    };
    let key = key.trim();
    if key.is_empty() {
        warn!(line, "comment line has an empty key");
        return None;
    }

    let (value, comment) = split_inline_comment(rest);
    let value = value.trim();
    if value.is_empty() {
        warn!(key, "no value found for key");
        return None;
    }
    Some((key.to_string(), parse_value(key, value, config), comment))
}

fn push_body_line(body: &mut String, line: &str) {
    body.push_str(line);
    body.push('\n');
}

#[must_use]
pub fn extract(text: &str) -> Extraction {
    extract_with_config(text, &EngineConfig::default())
}

/// Node and relation variant: `key=value` lines go to the style map.
#[must_use]
pub fn extract_with_config(text: &str, config: &EngineConfig) -> Extraction {
    let mut extraction = Extraction::default();
    for line in lex(text) {
        match line {
            LineKind::Comment(comment) => {
                if let Some((key, value, inline)) = parse_comment(comment, config) {
                    extraction
                        .attributes
                        .insert_with_comment(key, value, inline);
                }
            }
            LineKind::KeyEquals { key, value } => {
                extraction
                    .styles
                    .insert(key.to_string(), value.to_string());
            }
            LineKind::Plain(plain) => push_body_line(&mut extraction.attributes.body, plain),
        }
    }
    extraction
}

#[must_use]
pub fn extract_model(text: &str) -> AttributeBlock {
    extract_model_with_config(text, &EngineConfig::default())
}

/// Model variant: only comment lines carry attributes and no style map is
/// produced, so `key=value` lines stay part of the body.
#[must_use]
pub fn extract_model_with_config(text: &str, config: &EngineConfig) -> AttributeBlock {
    let mut block = AttributeBlock::new();
    for line in lex(text) {
        match line {
            LineKind::Comment(comment) => {
                if let Some((key, value, inline)) = parse_comment(comment, config) {
                    block.insert_with_comment(key, value, inline);
                }
            }
            LineKind::KeyEquals { .. } | LineKind::Plain(_) => {}
        }
    }
    block.body = text
        .lines()
        .filter(|line| !line.starts_with(INLINE_COMMENT))
        .fold(String::new(), |mut body, line| {
            push_body_line(&mut body, line);
            body
        });
    block
}

/// Only the attribute map of [`extract`].
#[must_use]
pub fn extract_attributes_from_comments(text: &str) -> IndexMap<String, AttributeValue> {
    extract(text).attributes.values
}

/// Splits body text into title and description. The title is everything
/// before the first `--` line; without one it is the first non-empty line.
#[must_use]
pub fn split_title(body: &str) -> (String, String) {
    let lines: Vec<&str> = body.lines().collect();
    if let Some(separator) = lines
        .iter()
        .position(|line| line.trim() == TITLE_SEPARATOR)
    {
        let title = lines[..separator].join("\n").trim().to_string();
        let description = lines[separator + 1..].join("\n").trim().to_string();
        return (title, description);
    }

    match lines.iter().position(|line| !line.trim().is_empty()) {
        Some(first) => (
            lines[first].trim().to_string(),
            lines[first + 1..].join("\n").trim().to_string(),
        ),
        None => (String::new(), String::new()),
    }
}

/// Inverse of [`split_title`].
#[must_use]
pub fn join_title(title: &str, description: &str) -> String {
    let mut body = String::new();
    if !title.is_empty() {
        push_body_line(&mut body, title);
    }
    if !description.is_empty() || title.contains('\n') {
        push_body_line(&mut body, TITLE_SEPARATOR);
    }
    if !description.is_empty() {
        push_body_line(&mut body, description);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_reserved_example() {
        let extraction = extract("// id: \"1\"\n// tags: \"a\",\"b\"\ntext\n");
        let attributes = extraction.attributes;
        assert_eq!(attributes.get("id"), Some(&AttributeValue::string("1")));
        assert_eq!(
            attributes.get("tags"),
            Some(&AttributeValue::List(vec![
                AttributeValue::string("a"),
                AttributeValue::string("b"),
            ]))
        );
        assert_eq!(attributes.body, "text\n");
    }

    #[test]
    fn extracts_integer_lists() {
        let values = extract_attributes_from_comments("// x: 1,2,3\n");
        assert_eq!(
            values.get("x"),
            Some(&AttributeValue::List(vec![
                AttributeValue::Integer(1),
                AttributeValue::Integer(2),
                AttributeValue::Integer(3),
            ]))
        );
    }

    #[test]
    fn inline_comments_are_kept_per_key() {
        let extraction = extract("// weight: 4.5 // in kg\n// name: \"x\"\n");
        let attributes = extraction.attributes;
        assert_eq!(attributes.get("weight"), Some(&AttributeValue::Float(4.5)));
        assert_eq!(attributes.comment("weight"), Some("in kg"));
        assert_eq!(attributes.comment("name"), None);
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let extraction = extract("// no separator here\n// : 5\n// empty:\n// ok: 1\n");
        let keys: Vec<_> = extraction.attributes.values.keys().cloned().collect();
        assert_eq!(keys, vec!["ok".to_string()]);
    }

    #[test]
    fn style_lines_stay_strings() {
        let extraction = extract("bg=12\nfg=red\nlabel\n");
        assert_eq!(extraction.styles.get("bg").map(String::as_str), Some("12"));
        assert_eq!(extraction.styles.get("fg").map(String::as_str), Some("red"));
        assert_eq!(extraction.attributes.body, "label\n");
    }

    #[test]
    fn model_variant_keeps_style_lines_in_body() {
        let block = extract_model("// id: \"m\"\nbg=red\ntitle\n");
        assert_eq!(block.get("id"), Some(&AttributeValue::string("m")));
        assert_eq!(block.body, "bg=red\ntitle\n");
    }

    #[test]
    fn title_and_description_split() {
        assert_eq!(
            split_title("Title\n--\nline one\nline two\n"),
            ("Title".to_string(), "line one\nline two".to_string())
        );
        assert_eq!(
            split_title("\n  Name  \nmore\n"),
            ("Name".to_string(), "more".to_string())
        );
        assert_eq!(split_title(""), (String::new(), String::new()));
    }

    #[test]
    fn join_title_roundtrips() {
        for (title, description) in [("T", ""), ("T", "d\ne"), ("", "only"), ("a\nb", "")] {
            let body = join_title(title, description);
            assert_eq!(
                split_title(&body),
                (title.to_string(), description.to_string())
            );
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_extraction_is_total(input in "(//)?.{0,128}(\n(//)?.{0,64}){0,6}") {
            let extraction = extract(&input);
            for key in extraction.attributes.values.keys() {
                prop_assert!(!key.is_empty());
                prop_assert!(!key.contains(':'));
            }
        }

        #[test]
        fn prop_plain_lines_form_the_body(lines in prop::collection::vec("[a-z ]{0,16}", 0..6)) {
            let text: String = lines.iter().map(|line| format!("{line}\n")).collect();
            prop_assert_eq!(extract(&text).attributes.body, text);
        }
    }
}
