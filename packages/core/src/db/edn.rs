//! Minimal EDN reader for query text, built on `nom`
//!
//! Covers the subset the query compiler emits: vectors, lists, strings,
//! keywords, symbols, integers, booleans and `nil`. Commas are whitespace and
//! `;` starts a line comment.

use crate::db::BackendError;
use nom::branch::alt;
use nom::bytes::complete::{is_not, take_while1};
use nom::character::complete::{char as pchar, multispace1, not_line_ending};
use nom::combinator::{cut, map, value};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Edn {
    Vector(Vec<Edn>),
    List(Vec<Edn>),
    Str(String),
    Keyword(String),
    Symbol(String),
    Integer(i64),
    Bool(bool),
    Nil,
}

impl Edn {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Edn::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Edn::Keyword(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Edn::Symbol(s) if s.starts_with('?'))
    }
}

/// Read exactly one form from `text`
pub fn read(text: &str) -> Result<Edn, BackendError> {
    let (rest, form) = form(text).map_err(|e| to_backend_error(text, e))?;
    let (rest, _) = whitespace(rest).map_err(|e| to_backend_error(text, e))?;
    if !rest.is_empty() {
        return Err(BackendError::parse(
            offset(text, rest),
            "trailing input after query form",
        ));
    }
    Ok(form)
}

/// Parse failure: the input left at the failure point, plus the innermost
/// context message
#[derive(Debug, PartialEq)]
struct ReadError<'a> {
    input: &'a str,
    message: Option<&'static str>,
}

impl<'a> ParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            message: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for ReadError<'a> {
    fn add_context(_input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.message.get_or_insert(ctx);
        other
    }
}

type ReadResult<'a, T> = IResult<&'a str, T, ReadError<'a>>;

fn offset(text: &str, rest: &str) -> usize {
    text.len() - rest.len()
}

fn to_backend_error(text: &str, err: nom::Err<ReadError<'_>>) -> BackendError {
    match err {
        nom::Err::Incomplete(_) => BackendError::parse(text.len(), "unexpected end of input"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let message = match e.message {
                Some(message) => message,
                None if e.input.is_empty() => "unexpected end of input",
                None => "unexpected input",
            };
            BackendError::parse(offset(text, e.input), message)
        }
    }
}

/// Whitespace, commas and `;` line comments
fn whitespace(input: &str) -> ReadResult<'_, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pchar(',')),
            value((), pair(pchar(';'), not_line_ending)),
        ))),
    )(input)
}

fn is_token_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | ';' | '[' | ']' | '(' | ')' | '"' | '{' | '}')
}

fn token(input: &str) -> ReadResult<'_, &str> {
    take_while1(is_token_char)(input)
}

fn form(input: &str) -> ReadResult<'_, Edn> {
    preceded(
        whitespace,
        alt((vector, list, string, keyword, map(token, atom))),
    )(input)
}

fn sequence<'a>(
    close: char,
    expected: &'static str,
) -> impl FnMut(&'a str) -> ReadResult<'a, Vec<Edn>> {
    cut(context(
        expected,
        terminated(many0(form), preceded(whitespace, pchar(close))),
    ))
}

fn vector(input: &str) -> ReadResult<'_, Edn> {
    map(preceded(pchar('['), sequence(']', "expected ']'")), Edn::Vector)(input)
}

fn list(input: &str) -> ReadResult<'_, Edn> {
    map(preceded(pchar('('), sequence(')', "expected ')'")), Edn::List)(input)
}

fn escape(input: &str) -> ReadResult<'_, &str> {
    preceded(
        pchar('\\'),
        cut(context(
            "unsupported escape",
            alt((
                value("\"", pchar('"')),
                value("\\", pchar('\\')),
                value("\n", pchar('n')),
                value("\t", pchar('t')),
                value("\r", pchar('r')),
            )),
        )),
    )(input)
}

fn string(input: &str) -> ReadResult<'_, Edn> {
    let body = fold_many0(
        alt((is_not("\\\""), escape)),
        String::new,
        |mut acc, piece| {
            acc.push_str(piece);
            acc
        },
    );
    map(
        delimited(pchar('"'), body, cut(context("unterminated string", pchar('"')))),
        Edn::Str,
    )(input)
}

fn keyword(input: &str) -> ReadResult<'_, Edn> {
    map(
        preceded(pchar(':'), cut(context("empty keyword", token))),
        |name| Edn::Keyword(name.to_string()),
    )(input)
}

fn atom(token: &str) -> Edn {
    match token {
        "nil" => return Edn::Nil,
        "true" => return Edn::Bool(true),
        "false" => return Edn::Bool(false),
        _ => {}
    }
    let digits = token
        .strip_prefix('-')
        .or_else(|| token.strip_prefix('+'))
        .unwrap_or(token);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = token.parse::<i64>() {
            return Edn::Integer(n);
        }
    }
    Edn::Symbol(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_query_shape() {
        let form = read(r#"[:find ?uid :where [?b :block/uid ?uid] [(re-pattern "(?i)a\\.b") ?re]]"#)
            .unwrap();
        let Edn::Vector(items) = form else {
            panic!("expected vector");
        };
        assert_eq!(items[0], Edn::Keyword("find".into()));
        assert!(items[1].is_variable());
        assert_eq!(items[2].as_keyword(), Some("where"));
        let Edn::Vector(binding) = &items[4] else {
            panic!("expected function binding");
        };
        assert_eq!(
            binding[0],
            Edn::List(vec![
                Edn::Symbol("re-pattern".into()),
                Edn::Str(r"(?i)a\.b".into())
            ])
        );
    }

    #[test]
    fn test_atoms() {
        assert_eq!(read("42").unwrap(), Edn::Integer(42));
        assert_eq!(read("-7").unwrap(), Edn::Integer(-7));
        assert_eq!(read("-").unwrap(), Edn::Symbol("-".into()));
        assert_eq!(read("nil").unwrap(), Edn::Nil);
        assert_eq!(read("true").unwrap(), Edn::Bool(true));
        assert_eq!(
            read("clojure.string/includes?").unwrap(),
            Edn::Symbol("clojure.string/includes?".into())
        );
        assert_eq!(read(r#""say \"hi\"""#).unwrap(), Edn::Str("say \"hi\"".into()));
    }

    #[test]
    fn test_parse_errors_carry_offsets() {
        assert!(matches!(
            read("[:find ?x"),
            Err(BackendError::Parse { position: 9, .. })
        ));
        assert_eq!(
            read("\"open"),
            Err(BackendError::parse(5, "unterminated string"))
        );
        assert_eq!(
            read(r#""a\q""#),
            Err(BackendError::parse(3, "unsupported escape"))
        );
        assert_eq!(read(""), Err(BackendError::parse(0, "unexpected end of input")));
        assert!(matches!(read("[a] b"), Err(BackendError::Parse { position: 4, .. })));
        assert!(matches!(read(")"), Err(BackendError::Parse { position: 0, .. })));
    }

    #[test]
    fn test_commas_and_comments_are_whitespace() {
        let form = read("[1, 2 ; trailing\n 3]").unwrap();
        assert_eq!(
            form,
            Edn::Vector(vec![Edn::Integer(1), Edn::Integer(2), Edn::Integer(3)])
        );
    }
}
