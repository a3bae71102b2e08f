//! Context values.
//!
//! A [`Value`] is what placeholders resolve to: scalars, sequences, ordered
//! mappings, or caller-defined objects exposing named fields through
//! [`Resolvable`]. Values deserialize from any serde format, so contexts can be
//! loaded from YAML or JSON documents.

use super::path::{Literal, Segment};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Ordered mapping used for context objects.
pub type Map = IndexMap<String, Value>;

/// An attribute-bearing object that can be placed in a context.
///
/// Implement this for domain types that should be reachable from templates
/// without converting them to a [`Map`] first.
///
/// # Examples
///
/// ```
/// use office_templates::template::{Resolvable, Value};
///
/// #[derive(Debug)]
/// struct Invoice { number: u32, paid: bool }
///
/// impl Resolvable for Invoice {
///     fn attr(&self, name: &str) -> Option<Value> {
///         match name {
///             "number" => Some(Value::from(self.number)),
///             "paid" => Some(Value::from(self.paid)),
///             _ => None,
///         }
///     }
/// }
///
/// let value = Value::object(Invoice { number: 7, paid: false });
/// assert!(value.truthy());
/// ```
pub trait Resolvable: fmt::Debug + Send + Sync {
    /// Look up a named field.
    fn attr(&self, name: &str) -> Option<Value>;

    /// String form used when the object itself is substituted.
    fn display(&self) -> Option<String> {
        None
    }

    /// Truthiness used by `if` blocks.
    fn truthy(&self) -> bool {
        true
    }

    /// Invoke a method written as `name(args)` in a path.
    fn call(&self, name: &str, _args: &[Value]) -> Result<Value, String> {
        Err(format!("'{}' is not callable", name))
    }
}

/// Decides which context objects the reader of a rendered document may see.
///
/// Attach one with [`RenderOptions::with_viewer`](super::RenderOptions::with_viewer).
/// Hidden objects render blank, are left out of sequences, and are reported
/// as [`IssueKind::PermissionDenied`](super::IssueKind::PermissionDenied).
/// Scalars and mappings are always visible.
pub trait Viewer: fmt::Debug + Send + Sync {
    fn can_view(&self, object: &dyn Resolvable) -> bool;
}

/// A context value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Seq(Vec<Value>),
    Map(Map),
    Object(Arc<dyn Resolvable>),
}

impl Value {
    /// Wrap a [`Resolvable`] object.
    pub fn object<T: Resolvable + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Short name of the value's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Object(_) => "object",
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Empty collections and strings, `None`, `false` and zero are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::DateTime(_) => true,
            Value::Seq(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(obj) => obj.truthy(),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Resolve one path segment against this value.
    ///
    /// Strategies are tried in a fixed order: mapping key, sequence index,
    /// object attribute. A name applied to a sequence maps over its items.
    pub fn get(&self, segment: &Segment) -> Option<Cow<'_, Value>> {
        match segment {
            Segment::Name(name) => self.get_name(name),
            Segment::Index(index) => self.get_index(*index),
            Segment::Key(key) => self.get_key(key),
            Segment::Where(selectors) => match self {
                Value::Seq(items) => {
                    let selected = items
                        .iter()
                        .filter(|item| selectors.iter().all(|selector| selector.matches(item)))
                        .cloned()
                        .collect();
                    Some(Cow::Owned(Value::Seq(selected)))
                },
                _ => None,
            },
            Segment::Call { name, args } => self.call(name, args).ok().map(Cow::Owned),
        }
    }

    /// Call a method on an object, or on every item of a sequence.
    pub fn call(&self, name: &str, args: &[Literal]) -> Result<Value, String> {
        match self {
            Value::Object(obj) => {
                let args: Vec<Value> = args.iter().map(Literal::to_value).collect();
                obj.call(name, &args)
            },
            Value::Seq(items) => items
                .iter()
                .map(|item| item.call(name, args))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq),
            other => Err(format!("'{}' cannot be called on {}", name, other.kind())),
        }
    }

    /// `a__b__c` walks `a`, then `b`, then `c`.
    fn get_chained(&self, name: &str) -> Option<Cow<'_, Value>> {
        let (head, tail) = name.split_once("__")?;
        if head.is_empty() || tail.is_empty() {
            return None;
        }
        match self.get_name(head)? {
            Cow::Borrowed(inner) => inner.get_name(tail),
            Cow::Owned(inner) => inner.get_name(tail).map(|v| Cow::Owned(v.into_owned())),
        }
    }

    fn get_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Map(map) => map
                .get(name)
                .map(Cow::Borrowed)
                .or_else(|| self.get_chained(name)),
            Value::Seq(items) => {
                if let Ok(index) = name.parse::<i64>() {
                    return self.get_index(index);
                }
                let collected: Vec<Value> = items
                    .iter()
                    .filter_map(|item| item.get_name(name).map(Cow::into_owned))
                    .collect();
                if collected.is_empty() && !items.is_empty() {
                    None
                } else {
                    Some(Cow::Owned(Value::Seq(collected)))
                }
            },
            Value::Object(obj) => obj
                .attr(name)
                .map(Cow::Owned)
                .or_else(|| self.get_chained(name)),
            _ => None,
        }
    }

    fn get_key(&self, key: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Map(map) => map.get(key).map(Cow::Borrowed),
            Value::Object(obj) => obj.attr(key).map(Cow::Owned),
            _ => None,
        }
    }

    fn get_index(&self, index: i64) -> Option<Cow<'_, Value>> {
        match self {
            Value::Seq(items) => {
                let len = items.len() as i64;
                let pos = if index < 0 { len + index } else { index };
                if (0..len).contains(&pos) {
                    items.get(pos as usize).map(Cow::Borrowed)
                } else {
                    None
                }
            },
            Value::Map(map) => map.get(itoa::Buffer::new().format(index)).map(Cow::Borrowed),
            Value::Object(obj) => obj.attr(itoa::Buffer::new().format(index)).map(Cow::Owned),
            _ => None,
        }
    }

    /// Plain string form with the default list delimiter.
    pub fn to_text(&self) -> String {
        self.to_text_with(", ")
    }

    /// Plain string form; sequences are joined with `delimiter`, skipping `None` items.
    pub fn to_text_with(&self, delimiter: &str) -> String {
        match self {
            Value::None => String::new(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(i) => itoa::Buffer::new().format(*i).to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Seq(items) => items
                .iter()
                .filter(|item| !item.is_none())
                .map(|item| item.to_text_with(delimiter))
                .collect::<Vec<_>>()
                .join(delimiter),
            Value::Map(map) => {
                let body = map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.to_text_with(delimiter)))
                    .collect::<Vec<_>>()
                    .join(delimiter);
                format!("{{{}}}", body)
            },
            Value::Object(obj) => obj.display().unwrap_or_default(),
        }
    }
}

/// Shortest round-trip form; integral floats keep a `.0` suffix.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() {
        ryu::Buffer::new().format_finite(f).to_string()
    } else if f.is_nan() {
        "NaN".to_string()
    } else if f > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            },
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            },
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a template context value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<Value, Value>()? {
            map.insert(key.to_text(), value);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
