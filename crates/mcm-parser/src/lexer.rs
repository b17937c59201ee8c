//! Line classification for comment-encoded element text.

use tracing::trace;

/// One classified line of an element text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `// key: value` line; holds the text after the `//` prefix, trimmed.
    Comment(&'a str),
    /// `key=value` styling line with exactly one `=`.
    KeyEquals { key: &'a str, value: &'a str },
    Plain(&'a str),
}

const COMMENT_PREFIX: &str = "//";

/// Comment lines this short after the prefix are separators such as `// ---`.
const MIN_COMMENT_LEN: usize = 3;

/// Classifies a single line. Separator comments yield `None`.
#[must_use]
pub fn classify_line(line: &str) -> Option<LineKind<'_>> {
    if let Some(rest) = line.strip_prefix(COMMENT_PREFIX) {
        let rest = rest.trim();
        if rest.chars().count() <= MIN_COMMENT_LEN {
            trace!(line, "skipping separator comment");
            return None;
        }
        return Some(LineKind::Comment(rest));
    }

    let mut parts = line.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => Some(LineKind::KeyEquals { key, value }),
        _ => Some(LineKind::Plain(line)),
    }
}

/// Lazy iterator over the classified lines of a text block.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LineKind<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            if let Some(kind) = classify_line(line) {
                return Some(kind);
            }
        }
    }
}

/// Classifies every line of `text`. The iterator borrows the text and can be
/// recreated at any time.
#[must_use]
pub fn lex(text: &str) -> Lexer<'_> {
    Lexer {
        lines: text.lines(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_comment_style_and_plain_lines() {
        let lines: Vec<_> = lex("// id: \"1\"\nbg=red\nsome text\n").collect();
        assert_eq!(
            lines,
            vec![
                LineKind::Comment("id: \"1\""),
                LineKind::KeyEquals {
                    key: "bg",
                    value: "red"
                },
                LineKind::Plain("some text"),
            ]
        );
    }

    #[test]
    fn short_comments_are_separators() {
        assert_eq!(classify_line("// ---"), None);
        assert_eq!(classify_line("//"), None);
        assert_eq!(classify_line("//  ab  "), None);
        assert_eq!(classify_line("// abcd"), Some(LineKind::Comment("abcd")));
    }

    #[test]
    fn multiple_equals_signs_stay_plain() {
        assert_eq!(classify_line("a=b=c"), Some(LineKind::Plain("a=b=c")));
        assert_eq!(classify_line("a == b"), Some(LineKind::Plain("a == b")));
    }

    #[test]
    fn comment_with_equals_is_still_a_comment() {
        assert_eq!(
            classify_line("// expr: a=b"),
            Some(LineKind::Comment("expr: a=b"))
        );
    }

    #[test]
    fn lexer_is_restartable() {
        let text = "// key: 1\nbody\n";
        let first: Vec<_> = lex(text).collect();
        let second: Vec<_> = lex(text).collect();
        assert_eq!(first, second);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_lexer_never_yields_more_than_input_lines(input in ".{0,256}") {
            prop_assert!(lex(&input).count() <= input.lines().count());
        }
    }
}
