//! Token coercion into typed attribute values.

use mcm_core::{AttributeValue, EngineConfig, ListSplitting};

const QUOTE_DELIMITERS: [char; 2] = ['"', '`'];

fn strip_quotes(token: &str) -> Option<&str> {
    QUOTE_DELIMITERS.iter().find_map(|&delimiter| {
        if token.len() > 1 && token.starts_with(delimiter) && token.ends_with(delimiter) {
            Some(&token[1..token.len() - 1])
        } else {
            None
        }
    })
}

/// Quoted tokens become strings with the quotes removed; otherwise integer,
/// then float, then the raw token as a string. Never fails.
#[must_use]
pub fn coerce(token: &str) -> AttributeValue {
    if let Some(unquoted) = strip_quotes(token) {
        return AttributeValue::string(unquoted);
    }
    if let Ok(integer) = token.parse::<i64>() {
        return AttributeValue::Integer(integer);
    }
    // Words such as `inf` or `nan` stay strings.
    if token.bytes().any(|byte| byte.is_ascii_digit())
        && let Ok(float) = token.parse::<f64>()
    {
        return AttributeValue::Float(float);
    }
    AttributeValue::string(token)
}

/// Splits a raw list value on commas; `None` when the value holds no
/// separator. Trailing empty items are dropped.
#[must_use]
pub fn split_list(raw: &str, mode: ListSplitting) -> Option<Vec<&str>> {
    let mut items = match mode {
        ListSplitting::Naive => raw.split(',').collect::<Vec<_>>(),
        ListSplitting::QuoteAware => split_outside_quotes(raw),
    };
    if items.len() < 2 {
        return None;
    }
    while items.last().is_some_and(|item| item.trim().is_empty()) {
        items.pop();
    }
    Some(items)
}

fn split_outside_quotes(raw: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut open_quote: Option<char> = None;
    let mut start = 0;

    for (index, ch) in raw.char_indices() {
        match open_quote {
            Some(quote) if ch == quote => open_quote = None,
            Some(_) => {}
            None if QUOTE_DELIMITERS.contains(&ch) => open_quote = Some(ch),
            None if ch == ',' => {
                items.push(&raw[start..index]);
                start = index + 1;
            }
            None => {}
        }
    }
    items.push(&raw[start..]);
    items
}

/// Coerces the value part of an attribute line. A value containing a comma
/// becomes a list; a scalar for a listable key is wrapped into a list.
#[must_use]
pub fn parse_value(key: &str, raw: &str, config: &EngineConfig) -> AttributeValue {
    let raw = raw.trim();
    if let Some(items) = split_list(raw, config.list_splitting) {
        return AttributeValue::List(items.into_iter().map(|item| coerce(item.trim())).collect());
    }

    let value = coerce(raw);
    if config.is_listable(key) {
        AttributeValue::List(vec![value])
    } else {
        value
    }
}
