//! Escaping for text interpolated into query strings
//!
//! Two layers apply to every user-supplied literal:
//! 1. regex metacharacters are escaped before text becomes part of a pattern
//! 2. backslashes and double quotes are escaped for the string-literal syntax
//!
//! Skipping either is an injection defect.

/// Escape `text` for use inside a `"..."` string literal
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Escape regex metacharacters so `text` matches literally
pub fn regex_literal(text: &str) -> String {
    regex::escape(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_escapes_quotes_and_backslashes() {
        assert_eq!(string_literal("plain"), r#""plain""#);
        assert_eq!(string_literal(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(string_literal(r"a\b"), r#""a\\b""#);
        assert_eq!(string_literal("line\nbreak"), r#""line\nbreak""#);
    }

    #[test]
    fn test_regex_literal_escapes_metacharacters() {
        let escaped = regex_literal("a.b*(c)|d");
        let re = regex::Regex::new(&escaped).unwrap();
        assert!(re.is_match("a.b*(c)|d"));
        assert!(!re.is_match("axbbbcd"));
    }

    #[test]
    fn test_injection_attempt_stays_inside_literal() {
        let hostile = r#"x"] [(= 1 1)] ["#;
        let literal = string_literal(hostile);
        assert!(literal.starts_with('"') && literal.ends_with('"'));
        assert_eq!(literal.matches("\\\"").count(), 2);
    }
}
