//! Placeholder filters (`{{ value | upper }}`).
//!
//! Filters are looked up in a static table, so an unknown name is detected
//! when the placeholder is parsed, before any context is consulted.

use super::format::{self, Locale};
use super::path::{Literal, unquote};
use super::value::Value;
use phf::phf_map;
use smallvec::SmallVec;

/// A filter invocation as written in a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: SmallVec<[Literal; 2]>,
}

/// Formatting environment passed to every filter.
#[derive(Debug, Clone, Copy)]
pub struct FilterEnv<'a> {
    pub locale: &'a Locale,
    pub delimiter: &'a str,
}

impl Default for FilterEnv<'_> {
    fn default() -> Self {
        Self {
            locale: &format::C_LOCALE,
            delimiter: ", ",
        }
    }
}

type FilterFn = fn(&Value, &[Literal], &FilterEnv<'_>) -> Result<Value, String>;

static FILTERS: phf::Map<&'static str, FilterFn> = phf_map! {
    "upper" => upper as FilterFn,
    "lower" => lower as FilterFn,
    "title" => title as FilterFn,
    "capitalize" => capitalize as FilterFn,
    "trim" => trim as FilterFn,
    "length" => length as FilterFn,
    "default" => default as FilterFn,
    "join" => join as FilterFn,
    "first" => first as FilterFn,
    "last" => last as FilterFn,
    "round" => round as FilterFn,
    "number" => number as FilterFn,
    "date" => date as FilterFn,
};

/// Whether a filter with this name exists.
#[inline]
pub fn is_known(name: &str) -> bool {
    FILTERS.contains_key(name)
}

impl FilterCall {
    /// Parse `name`, `name(arg, ...)`, or a bare quoted date pattern.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty filter".to_string());
        }
        if let Some(pattern) = unquote(text) {
            return Ok(Self {
                name: "date".to_string(),
                args: SmallVec::from_iter([Literal::Str(pattern.to_string())]),
            });
        }

        let (name, args) = match text.split_once('(') {
            Some((name, rest)) => {
                let inner = rest
                    .strip_suffix(')')
                    .ok_or_else(|| format!("unbalanced parentheses in filter '{}'", text))?;
                (name.trim(), split_args(inner)?)
            },
            None => (text, SmallVec::new()),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("invalid filter name '{}'", name));
        }
        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Apply the filter; unknown names are reported as errors too.
    pub fn apply(&self, value: &Value, env: &FilterEnv<'_>) -> Result<Value, String> {
        let f = FILTERS
            .get(self.name.as_str())
            .ok_or_else(|| format!("unknown filter '{}'", self.name))?;
        f(value, &self.args, env)
    }
}

fn split_args(inner: &str) -> Result<SmallVec<[Literal; 2]>, String> {
    let mut args = SmallVec::new();
    if inner.trim().is_empty() {
        return Ok(args);
    }
    let mut quote = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                args.push(Literal::parse(&inner[start..i]));
                start = i + 1;
            },
            (None, '(' | ')') => return Err(format!("unexpected '{}' in filter arguments", c)),
            _ => {},
        }
    }
    if quote.is_some() {
        return Err("unterminated string in filter arguments".to_string());
    }
    args.push(Literal::parse(&inner[start..]));
    Ok(args)
}

fn scalar_text(value: &Value, filter: &str) -> Result<String, String> {
    match value {
        Value::Seq(_) | Value::Map(_) | Value::Object(_) => {
            Err(format!("'{}' expects a scalar, got {}", filter, value.kind()))
        },
        other => Ok(other.to_text()),
    }
}

fn numeric(value: &Value, filter: &str) -> Result<f64, String> {
    match value {
        Value::String(s) => fast_float2::parse::<f64, _>(s.trim())
            .map_err(|_| format!("'{}' expects a number, got '{}'", filter, s)),
        other => other
            .as_f64()
            .ok_or_else(|| format!("'{}' expects a number, got {}", filter, other.kind())),
    }
}

fn arg_usize(args: &[Literal], index: usize, filter: &str) -> Result<Option<usize>, String> {
    match args.get(index) {
        None | Some(Literal::None) => Ok(None),
        Some(Literal::Int(i)) if *i >= 0 => Ok(Some(*i as usize)),
        Some(other) => Err(format!("'{}' expects a non-negative integer, got {:?}", filter, other)),
    }
}

fn arg_locale<'a>(
    args: &[Literal],
    index: usize,
    env: &FilterEnv<'a>,
) -> Result<&'a Locale, String> {
    match args.get(index).and_then(Literal::as_str) {
        Some(tag) => format::find_locale(tag).ok_or_else(|| format!("unknown locale '{}'", tag)),
        None => Ok(env.locale),
    }
}

fn upper(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    Ok(Value::String(scalar_text(value, "upper")?.to_uppercase()))
}

fn lower(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    Ok(Value::String(scalar_text(value, "lower")?.to_lowercase()))
}

fn title(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    let text = scalar_text(value, "title")?;
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    Ok(Value::String(out))
}

fn capitalize(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    let text = scalar_text(value, "capitalize")?;
    let mut chars = text.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    Ok(Value::String(out))
}

fn trim(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    Ok(Value::String(scalar_text(value, "trim")?.trim().to_string()))
}

fn length(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    match value {
        Value::Seq(items) => Ok(Value::from(items.len())),
        Value::Map(map) => Ok(Value::from(map.len())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        other => Err(format!("'length' expects a collection, got {}", other.kind())),
    }
}

fn default(value: &Value, args: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    if value.truthy() {
        return Ok(value.clone());
    }
    Ok(args.first().map_or(Value::String(String::new()), Literal::to_value))
}

fn join(value: &Value, args: &[Literal], env: &FilterEnv<'_>) -> Result<Value, String> {
    let Value::Seq(_) = value else {
        return Err(format!("'join' expects a sequence, got {}", value.kind()));
    };
    let sep = match args.first() {
        Some(Literal::Str(sep)) => sep.as_str(),
        Some(other) => return Err(format!("'join' expects a string separator, got {:?}", other)),
        None => env.delimiter,
    };
    Ok(Value::String(value.to_text_with(sep)))
}

fn first(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    match value {
        Value::Seq(items) => Ok(items.first().cloned().unwrap_or_default()),
        Value::String(s) => Ok(s.chars().next().map(String::from).map_or(Value::None, Value::String)),
        other => Err(format!("'first' expects a sequence, got {}", other.kind())),
    }
}

fn last(value: &Value, _: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    match value {
        Value::Seq(items) => Ok(items.last().cloned().unwrap_or_default()),
        Value::String(s) => Ok(s.chars().last().map(String::from).map_or(Value::None, Value::String)),
        other => Err(format!("'last' expects a sequence, got {}", other.kind())),
    }
}

fn round(value: &Value, args: &[Literal], _: &FilterEnv<'_>) -> Result<Value, String> {
    let digits = arg_usize(args, 0, "round")?.unwrap_or(0);
    if let Value::Int(_) = value {
        return Ok(value.clone());
    }
    let n = numeric(value, "round")?;
    let factor = 10f64.powi(digits.min(format::MAX_DECIMALS) as i32);
    Ok(Value::Float((n * factor).round() / factor))
}

fn number(value: &Value, args: &[Literal], env: &FilterEnv<'_>) -> Result<Value, String> {
    let decimals = arg_usize(args, 0, "number")?;
    let locale = arg_locale(args, 1, env)?;
    let n = numeric(value, "number")?;
    Ok(Value::String(format::format_number(n, decimals, locale)))
}

fn date(value: &Value, args: &[Literal], env: &FilterEnv<'_>) -> Result<Value, String> {
    let pattern = match args.first() {
        Some(Literal::Str(p)) => p.as_str(),
        Some(other) => return Err(format!("'date' expects a pattern string, got {:?}", other)),
        None => "YYYY-MM-dd",
    };
    let locale = arg_locale(args, 1, env)?;
    let formatted = match value {
        Value::Date(d) => format::format_date(d, pattern, locale)?,
        Value::DateTime(dt) => format::format_datetime(dt, pattern, locale)?,
        Value::String(s) => {
            let dt = format::parse_datetime(s)
                .ok_or_else(|| format!("'date' cannot parse '{}' as a date", s))?;
            format::format_datetime(&dt, pattern, locale)?
        },
        other => return Err(format!("'date' expects a date, got {}", other.kind())),
    };
    Ok(Value::String(formatted))
}
