//! Placeholder token parsing.
//!
//! A token is the text between a pair of markers. Value tokens carry an
//! expression with optional filters; block tokens open, split, or close a
//! `for`/`if` block.

use super::filters::{self, FilterCall};
use super::path::{Literal, Path, is_identifier};
use thiserror::Error;

/// Whether a match came from value markers or block-tag markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Value,
    Block,
}

/// Errors raised while parsing a single token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenError {
    #[error("{0}")]
    Syntax(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
}

/// A path with its filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub path: Path,
    pub filters: Vec<FilterCall>,
}

/// Loop variable(s) of a `for` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Single(String),
    Pair(String, String),
}

impl Binding {
    pub fn names(&self) -> String {
        match self {
            Binding::Single(name) => name.clone(),
            Binding::Pair(key, value) => format!("{}, {}", key, value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
}

/// `[not] expr [(== | !=) literal]`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub expr: Expression,
    pub compare: Option<(Comparison, Literal)>,
}

/// What a token asks the expander to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Value(Expression),
    LoopStart { binding: Binding, iterable: Expression },
    LoopEnd,
    IfStart(Condition),
    Else,
    IfEnd,
}

impl Operation {
    /// Opening tags increase block depth.
    #[inline]
    pub fn opens(&self) -> bool {
        matches!(self, Operation::LoopStart { .. } | Operation::IfStart(_))
    }

    /// Closing tags decrease block depth.
    #[inline]
    pub fn closes(&self) -> bool {
        matches!(self, Operation::LoopEnd | Operation::IfEnd)
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        !matches!(self, Operation::Value(_))
    }
}

/// A parsed placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Full marker text as it appeared in the document.
    pub raw: String,
    pub op: Operation,
}

impl Token {
    /// Parse the inner text of a marker pair.
    pub fn parse(raw: &str, inner: &str, kind: MarkerKind) -> Result<Self, TokenError> {
        let op = match kind {
            MarkerKind::Value => Operation::Value(parse_expression(inner)?),
            MarkerKind::Block => parse_block(inner)?,
        };
        Ok(Self {
            raw: raw.to_string(),
            op,
        })
    }
}

fn parse_block(inner: &str) -> Result<Operation, TokenError> {
    let inner = inner.trim();
    let (keyword, rest) = match inner.find(char::is_whitespace) {
        Some(pos) => (&inner[..pos], inner[pos..].trim()),
        None => (inner, ""),
    };
    let keyword = keyword.to_ascii_lowercase();

    let no_args = |op: Operation| {
        if rest.is_empty() {
            Ok(op)
        } else {
            Err(TokenError::Syntax(format!(
                "'{}' takes no arguments, got '{}'",
                keyword, rest
            )))
        }
    };

    match keyword.as_str() {
        "for" => parse_for(rest),
        "if" => parse_condition(rest).map(Operation::IfStart),
        "else" => no_args(Operation::Else),
        "endfor" => no_args(Operation::LoopEnd),
        "endif" => no_args(Operation::IfEnd),
        "" => Err(TokenError::Syntax("empty block tag".to_string())),
        other => Err(TokenError::Syntax(format!("unknown block keyword '{}'", other))),
    }
}

fn parse_for(rest: &str) -> Result<Operation, TokenError> {
    let (binding, iterable) = split_keyword(rest, "in")
        .ok_or_else(|| TokenError::Syntax(format!("expected 'for <name> in <expr>', got 'for {}'", rest)))?;

    let names: Vec<&str> = binding.split(',').map(str::trim).collect();
    let valid = |name: &str| is_identifier(name) && !name.starts_with(|c: char| c.is_ascii_digit());
    let binding = match names.as_slice() {
        [name] if valid(name) => Binding::Single(name.to_string()),
        [key, value] if valid(key) && valid(value) => Binding::Pair(key.to_string(), value.to_string()),
        _ => return Err(TokenError::Syntax(format!("invalid loop binding '{}'", binding))),
    };

    Ok(Operation::LoopStart {
        binding,
        iterable: parse_expression(iterable)?,
    })
}

fn parse_condition(rest: &str) -> Result<Condition, TokenError> {
    let mut text = rest.trim();
    let mut negated = false;
    if let Some((word, after)) = text.split_once(char::is_whitespace)
        && word.eq_ignore_ascii_case("not")
    {
        negated = true;
        text = after.trim();
    }
    if text.is_empty() {
        return Err(TokenError::Syntax("missing condition".to_string()));
    }

    let (expr, compare) = match find_comparison(text) {
        Some((pos, op)) => {
            let literal = text[pos + 2..].trim();
            if literal.is_empty() {
                return Err(TokenError::Syntax(format!("missing literal in '{}'", text)));
            }
            (&text[..pos], Some((op, Literal::parse(literal))))
        },
        None => (text, None),
    };

    Ok(Condition {
        negated,
        expr: parse_expression(expr)?,
        compare,
    })
}

/// Position of a top-level `==` or `!=`.
fn find_comparison(text: &str) -> Option<(usize, Comparison)> {
    let bytes = text.as_bytes();
    let mut quote = None;
    let mut depth = 0usize;
    for i in 0..bytes.len() {
        let b = bytes[i];
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {},
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'[' | b'(') => depth += 1,
            (None, b']' | b')') => depth = depth.saturating_sub(1),
            (None, b'=' | b'!') if depth == 0 && bytes.get(i + 1) == Some(&b'=') => {
                let op = if b == b'=' { Comparison::Eq } else { Comparison::Ne };
                return Some((i, op));
            },
            _ => {},
        }
    }
    None
}

/// Split `a <keyword> b` on the first whole-word keyword, case-insensitively.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find(keyword) {
        let start = from + pos;
        let end = start + keyword.len();
        let before = lower[..start].chars().next_back();
        let after = lower[end..].chars().next();
        if before.is_some_and(char::is_whitespace) && after.is_some_and(char::is_whitespace) {
            let left = text[..start].trim();
            let right = text[end..].trim();
            if left.is_empty() || right.is_empty() {
                return None;
            }
            return Some((left, right));
        }
        from = end;
    }
    None
}

/// Parse `path | filter | filter(args)`.
pub fn parse_expression(text: &str) -> Result<Expression, TokenError> {
    let mut parts = split_pipes(text)?.into_iter();
    let head = parts.next().unwrap_or_default();
    let path = Path::parse(head).map_err(TokenError::Syntax)?;

    let mut filter_calls = Vec::new();
    for part in parts {
        let call = FilterCall::parse(part).map_err(TokenError::Syntax)?;
        if !filters::is_known(&call.name) {
            return Err(TokenError::UnknownFilter(call.name));
        }
        filter_calls.push(call);
    }
    Ok(Expression {
        path,
        filters: filter_calls,
    })
}

fn split_pipes(text: &str) -> Result<Vec<&str>, TokenError> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '|') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    if quote.is_some() {
        return Err(TokenError::Syntax(format!("unterminated string in '{}'", text.trim())));
    }
    parts.push(&text[start..]);
    Ok(parts)
}
