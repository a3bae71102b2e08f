//! Dotted/bracketed context paths.
//!
//! Grammar: `segment ('.' segment | '[' index_or_key ']')*`. Bracket contents
//! are an integer index, a quoted or bare key, or comma-separated
//! `field=literal` conditions that filter a sequence. A segment after the
//! leading name may carry call arguments (`total(2023, 'net')`), and a name
//! such as `owner__email` walks `owner` then `email` when the object has no
//! field by that exact name.

use super::value::Value;
use smallvec::SmallVec;
use std::fmt;

/// One step of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Identifier after a dot (or the leading name).
    Name(String),
    /// `[3]`, `[-1]`
    Index(i64),
    /// `['key']`, `["key"]`, `[key]`
    Key(String),
    /// `[field=literal, ...]`; an item is kept when every condition holds.
    Where(Vec<Selector>),
    /// `name(arg, ...)`
    Call { name: String, args: Vec<Literal> },
}

/// One `field=literal` condition of a sequence selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub field: String,
    pub expected: Literal,
}

impl Selector {
    pub fn new(field: impl Into<String>, expected: Literal) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }

    /// Whether `item` has the field and it equals the expected literal.
    pub fn matches(&self, item: &Value) -> bool {
        item.get(&Segment::Name(self.field.clone()))
            .is_some_and(|actual| self.expected.matches(&actual))
    }
}

/// A literal in a condition, selector, or filter argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// Parse a literal; unquoted text that is not a keyword or number is a string.
    pub fn parse(text: &str) -> Literal {
        let text = text.trim();
        if let Some(inner) = unquote(text) {
            return Literal::Str(inner.to_string());
        }
        match text.to_ascii_lowercase().as_str() {
            "true" => return Literal::Bool(true),
            "false" => return Literal::Bool(false),
            "none" | "null" => return Literal::None,
            _ => {},
        }
        if let Ok(i) = text.parse::<i64>() {
            return Literal::Int(i);
        }
        if text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
            && let Ok(f) = fast_float2::parse::<f64, _>(text)
        {
            return Literal::Float(f);
        }
        Literal::Str(text.to_string())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::String(s.clone()),
        }
    }

    /// Equality against a context value, comparing numbers by value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Str(expected), Value::String(actual)) => expected == actual,
            // unquoted selector values are compared by their text form as well
            (Literal::Str(expected), other) => expected == &other.to_text(),
            _ => self.to_value() == *value,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(v) => f.write_str(&super::value::format_float(*v)),
            Literal::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Strip matching single or double quotes.
pub(crate) fn unquote(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// A parsed context path.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    segments: SmallVec<[Segment; 4]>,
}

impl Path {
    /// Parse a path expression.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err("empty expression".to_string());
        }

        let mut segments = SmallVec::new();
        let mut rest = expr;
        let mut expect_name = true;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = find_closing(after, ']')
                    .ok_or_else(|| format!("unmatched '[' in '{}'", expr))?;
                segments.push(parse_bracket(after[..close].trim(), expr)?);
                rest = &after[close + 1..];
                expect_name = false;
            } else if let Some(after) = rest.strip_prefix('.') {
                if expect_name {
                    return Err(format!("unexpected '.' in '{}'", expr));
                }
                rest = after;
                expect_name = true;
                if rest.is_empty() {
                    return Err(format!("trailing '.' in '{}'", expr));
                }
            } else {
                if !expect_name {
                    return Err(format!("expected '.' or '[' in '{}'", expr));
                }
                let end = rest
                    .find(|c: char| c == '.' || c == '[' || c == '(')
                    .unwrap_or(rest.len());
                let name = &rest[..end];
                if !is_identifier(name) {
                    return Err(format!("invalid segment '{}' in '{}'", name, expr));
                }
                rest = &rest[end..];
                expect_name = false;

                if let Some(after) = rest.strip_prefix('(') {
                    let close = find_closing(after, ')')
                        .ok_or_else(|| format!("unmatched '(' in '{}'", expr))?;
                    let args = split_top_level(&after[..close])
                        .ok_or_else(|| format!("unterminated string in '{}'", expr))?
                        .into_iter()
                        .filter(|arg| !arg.trim().is_empty())
                        .map(Literal::parse)
                        .collect();
                    segments.push(Segment::Call {
                        name: name.to_string(),
                        args,
                    });
                    rest = &after[close + 1..];
                } else {
                    segments.push(Segment::Name(name.to_string()));
                }
            }
        }

        if !matches!(segments.first(), Some(Segment::Name(_))) {
            return Err(format!("expression '{}' must start with a name", expr));
        }
        Ok(Self { segments })
    }

    /// Leading name, looked up in the scope stack.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Name(name)) => name,
            _ => "",
        }
    }

    /// Segments after the leading name.
    pub fn rest(&self) -> &[Segment] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Name(name) if i == 0 => f.write_str(name)?,
                Segment::Name(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Key(key) => write!(f, "[\"{}\"]", key)?,
                Segment::Where(selectors) => {
                    f.write_str("[")?;
                    for (n, selector) in selectors.iter().enumerate() {
                        if n > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}={}", selector.field, selector.expected)?;
                    }
                    f.write_str("]")?;
                },
                Segment::Call { name, args } => {
                    write!(f, ".{}(", name)?;
                    for (n, arg) in args.iter().enumerate() {
                        if n > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(")")?;
                },
            }
        }
        Ok(())
    }
}

/// Identifiers: letters, digits and underscores (digits allowed first so that
/// `items.0` indexes a sequence).
pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn find_closing(text: &str, close: char) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, c) if c == close => return Some(i),
            _ => {},
        }
    }
    None
}

/// Split on commas outside quotes; `None` if a quote is left open.
fn split_top_level(text: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&text[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    if quote.is_some() {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

fn parse_bracket(inner: &str, expr: &str) -> Result<Segment, String> {
    if inner.is_empty() {
        return Err(format!("empty brackets in '{}'", expr));
    }
    if let Some(key) = unquote(inner) {
        return Ok(Segment::Key(key.to_string()));
    }
    if let Ok(index) = inner.parse::<i64>() {
        return Ok(Segment::Index(index));
    }
    if inner.contains('=') {
        let conditions = split_top_level(inner)
            .ok_or_else(|| format!("unterminated string in '{}'", expr))?;
        let mut selectors = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let Some((field, value)) = condition.split_once('=') else {
                return Err(format!("expected 'field=value' but found '{}' in '{}'", condition.trim(), expr));
            };
            let field = field.trim();
            let value = value.strip_prefix('=').unwrap_or(value);
            if !is_identifier(field) {
                return Err(format!("invalid selector field '{}' in '{}'", field, expr));
            }
            selectors.push(Selector::new(field, Literal::parse(value)));
        }
        return Ok(Segment::Where(selectors));
    }
    if is_identifier(inner) {
        return Ok(Segment::Key(inner.to_string()));
    }
    Err(format!("invalid index '{}' in '{}'", inner, expr))
}
