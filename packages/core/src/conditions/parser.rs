//! Expression Parser
//!
//! Compatibility path for the string mini-language, built on `nom`:
//!
//! ```text
//! (Alpha|"Project Alpha") >> -text:done
//! ref:Roadmap <=> regex:/q[1-4]/i
//! ```
//!
//! ```text
//! expression := group (operator group)?
//! group      := item (('|' | '+') item)*
//! item       := term | '(' group ')'
//! term       := piece+
//! ```
//!
//! - Hierarchy operators are tested longest symbol first
//!   (`<<=>>`, `<=>`, `<<=`, `=>>`, `>>`, `<<`, `=>`, `<=`, `>`, `<`)
//! - Parentheses group; `|` is OR, `+` is AND; mixing both at one level
//!   without parentheses is rejected as ambiguous
//! - Operator characters are literal inside `"..."`, inside `'...'` opened at
//!   the start of a word, and inside `[...]` or a parenthesized run within a term
//! - Term prefixes: `ref:` (page reference), `regex:` (regular expression),
//!   `text:` (plain text); `[[Title]]`, `#Tag` and `((uid))` are also understood
//! - A leading `-` negates a term; surrounding quote pairs are stripped
//!
//! The output is canonicalized with the same routine as structured input, so
//! both paths produce identical trees for equivalent semantics.

use crate::conditions::normalize::canonicalize;
use crate::models::{
    CombineMode, Condition, HierarchyCondition, HierarchyOperator, SearchCondition,
};
use crate::services::error::{Result, SearchError};
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_till, take_while1};
use nom::character::complete::{char as pchar, multispace0, multispace1, one_of, satisfy};
use nom::combinator::{consumed, map, not, opt, recognize};
use nom::error::{Error, ErrorKind};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;
use regex::Regex;
use std::sync::OnceLock;

const BLOCK_REF_PATTERN: &str = r"^\(\(([\w-]+)\)\)$";

/// Result of parsing an expression string
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedExpression {
    Hierarchy(HierarchyCondition),
    Condition(Condition),
}

/// Operand syntax, borrowed from the input
#[derive(Debug)]
enum Operand<'a> {
    Term(&'a str),
    Group {
        text: &'a str,
        items: Vec<Operand<'a>>,
        separators: Vec<char>,
    },
}

type Parsed<'a> = (Operand<'a>, Option<(HierarchyOperator, Operand<'a>)>);

/// Parse an expression that may or may not contain a hierarchy operator
pub fn parse_expression(input: &str) -> Result<ParsedExpression> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SearchError::validation("expression is empty"));
    }

    let (rest, (left, relation)) = match expression(input) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            return Err(syntax_error(input, e.input, false))
        }
        Err(nom::Err::Incomplete(_)) => return Err(syntax_error(input, "", false)),
    };
    if !rest.trim_start().is_empty() {
        return Err(syntax_error(input, rest, relation.is_some()));
    }

    let left = canonicalize(&to_condition(left)?)?;
    match relation {
        Some((operator, right)) => Ok(ParsedExpression::Hierarchy(HierarchyCondition {
            operator,
            left,
            right: canonicalize(&to_condition(right)?)?,
            max_depth: None,
        })),
        None => Ok(ParsedExpression::Condition(left)),
    }
}

/// Parse an expression that must contain a hierarchy operator
pub fn parse_hierarchy_expression(
    input: &str,
    max_depth: Option<usize>,
) -> Result<HierarchyCondition> {
    match parse_expression(input)? {
        ParsedExpression::Hierarchy(mut hierarchy) => {
            hierarchy.max_depth = max_depth;
            Ok(hierarchy)
        }
        ParsedExpression::Condition(_) => Err(SearchError::validation(format!(
            "expression '{}' contains no hierarchy operator",
            input.trim()
        ))),
    }
}

fn syntax_error(input: &str, at: &str, has_operator: bool) -> SearchError {
    let at = at.trim_start();
    let message = match operator(at) {
        Ok((_, extra)) if has_operator => format!(
            "expression '{}' uses more than one hierarchy operator (extra '{}')",
            input, extra
        ),
        Ok((_, op)) => format!("operator '{}' needs an operand on both sides", op),
        Err(_) => match at.chars().next() {
            None => format!("expression '{}' ends unexpectedly", input),
            Some('|' | '+') => format!("empty operand in expression '{}'", input),
            Some(c) => format!(
                "unexpected '{}' at offset {} in expression '{}'",
                c,
                input.len() - at.len(),
                input
            ),
        },
    };
    SearchError::validation(message)
}

fn expression(input: &str) -> IResult<&str, Parsed<'_>> {
    pair(
        preceded(multispace0, group),
        opt(pair(
            preceded(multispace0, operator),
            preceded(multispace0, group),
        )),
    )(input)
}

fn operator(input: &str) -> IResult<&str, HierarchyOperator> {
    HierarchyOperator::BY_SYMBOL_LENGTH
        .into_iter()
        .find_map(|op| input.strip_prefix(op.symbol()).map(|rest| (rest, op)))
        .ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn group(input: &str) -> IResult<&str, Operand<'_>> {
    map(
        consumed(pair(item, many0(pair(separator, item)))),
        |(text, (first, rest))| {
            if rest.is_empty() {
                return first;
            }
            let (separators, tail): (Vec<char>, Vec<Operand>) = rest.into_iter().unzip();
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(first);
            items.extend(tail);
            Operand::Group {
                text: text.trim(),
                items,
                separators,
            }
        },
    )(input)
}

fn separator(input: &str) -> IResult<&str, char> {
    delimited(multispace0, one_of("|+"), multispace0)(input)
}

fn item(input: &str) -> IResult<&str, Operand<'_>> {
    alt((term, parenthesized_group))(input)
}

fn parenthesized_group(input: &str) -> IResult<&str, Operand<'_>> {
    delimited(
        pair(pchar('('), multispace0),
        group,
        pair(multispace0, pchar(')')),
    )(input)
}

/// A term may not open with a bare parenthesis; that starts a group
fn term(input: &str) -> IResult<&str, Operand<'_>> {
    map(
        recognize(pair(
            alt((
                block_ref,
                double_quoted,
                single_quoted,
                bracketed,
                punctuation,
                word,
            )),
            many0(alt((
                multispace1,
                block_ref,
                parenthesized,
                double_quoted,
                single_quoted,
                bracketed,
                punctuation,
                word,
            ))),
        )),
        |text: &str| Operand::Term(text.trim()),
    )(input)
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '|' | '+' | '(' | ')' | '"' | '[' | ']' | '<' | '>' | '-' | ':'
        )
}

/// `'` inside a word is an apostrophe, not a quote
fn word(input: &str) -> IResult<&str, &str> {
    recognize(many1(preceded(not(tag("=>")), satisfy(is_word_char))))(input)
}

/// `-` and `:` end a word so a quote may follow a negation or prefix
fn punctuation(input: &str) -> IResult<&str, &str> {
    recognize(one_of("-:"))(input)
}

fn double_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(pchar('"'), take_till(|c: char| c == '"'), pchar('"')))(input)
}

fn single_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(pchar('\''), take_till(|c: char| c == '\''), pchar('\'')))(input)
}

fn block_ref(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        tag("(("),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
        tag("))"),
    ))(input)
}

fn parenthesized(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        pchar('('),
        many0(alt((parenthesized, double_quoted, is_not("()\"")))),
        pchar(')'),
    ))(input)
}

fn bracketed(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        pchar('['),
        many0(alt((bracketed, is_not("[]")))),
        pchar(']'),
    ))(input)
}

fn to_condition(operand: Operand<'_>) -> Result<Condition> {
    match operand {
        Operand::Term(text) => parse_term(text).map(Condition::Leaf),
        Operand::Group {
            text,
            items,
            separators,
        } => {
            let mode = match (separators.contains(&'|'), separators.contains(&'+')) {
                (true, true) => {
                    return Err(SearchError::validation(format!(
                        "ambiguous expression '{}': mixes '+' and '|' at one level; add parentheses",
                        text
                    )))
                }
                (true, false) => CombineMode::Or,
                _ => CombineMode::And,
            };
            let operands = items
                .into_iter()
                .map(to_condition)
                .collect::<Result<Vec<_>>>()?;
            Ok(Condition::combine(mode, operands))
        }
    }
}

fn block_ref_regex() -> &'static Regex {
    static BLOCK_REF_REGEX: OnceLock<Regex> = OnceLock::new();
    BLOCK_REF_REGEX.get_or_init(|| Regex::new(BLOCK_REF_PATTERN).unwrap())
}

/// Strip matching surrounding quote pairs until none remain
fn strip_quotes(input: &str) -> &str {
    let mut current = input.trim();
    loop {
        let bytes = current.as_bytes();
        if bytes.len() >= 2
            && (bytes[0] == b'"' || bytes[0] == b'\'')
            && bytes[0] == bytes[bytes.len() - 1]
        {
            current = current[1..current.len() - 1].trim();
        } else {
            return current;
        }
    }
}

fn parse_term(input: &str) -> Result<SearchCondition> {
    let mut term = strip_quotes(input);
    let mut negate = false;
    if let Some(rest) = term.strip_prefix('-') {
        negate = true;
        term = strip_quotes(rest);
    }

    let condition = if let Some(rest) = term.strip_prefix("ref:") {
        SearchCondition::page_ref(strip_page_syntax(strip_quotes(rest)))
    } else if let Some(rest) = term.strip_prefix("regex:") {
        parse_regex_term(strip_quotes(rest))
    } else if let Some(rest) = term.strip_prefix("text:") {
        SearchCondition::text(strip_quotes(rest))
    } else if let Some(captures) = block_ref_regex().captures(term) {
        SearchCondition::block_ref(&captures[1])
    } else if is_page_syntax(term) {
        SearchCondition::page_ref(strip_page_syntax(term))
    } else {
        SearchCondition::text(term)
    };

    let condition = if negate { condition.negated() } else { condition };
    if condition.pattern.trim().is_empty() {
        return Err(SearchError::validation(format!(
            "term '{}' has an empty pattern",
            input.trim()
        )));
    }
    Ok(condition)
}

/// `/pattern/` or `/pattern/i`; anything else is taken verbatim
fn parse_regex_term(body: &str) -> SearchCondition {
    if body.len() >= 2 && body.starts_with('/') {
        if let Some(inner) = body.strip_suffix("/i").filter(|s| s.len() > 1) {
            return SearchCondition::regex(format!("(?i){}", &inner[1..]));
        }
        if let Some(inner) = body.strip_suffix('/') {
            return SearchCondition::regex(&inner[1..]);
        }
    }
    SearchCondition::regex(body)
}

fn is_page_syntax(term: &str) -> bool {
    (term.starts_with("[[") && term.ends_with("]]") && term.len() > 4)
        || (term.starts_with('#') && term.len() > 1 && !term.contains(char::is_whitespace))
}

fn strip_page_syntax(term: &str) -> &str {
    let term = term.strip_prefix('#').unwrap_or(term);
    term.strip_prefix("[[")
        .and_then(|t| t.strip_suffix("]]"))
        .unwrap_or(term)
        .trim()
}
