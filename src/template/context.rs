//! Scope stack used while rendering.
//!
//! The root scope borrows the caller's context; every loop iteration pushes a
//! child scope holding its bindings. Lookups walk the chain innermost-first
//! and never mutate caller data.

use super::path::{Path, Segment};
use super::value::{Value, Viewer};
use smallvec::SmallVec;
use std::borrow::Cow;

/// Name resolved to the current local time when no scope defines it.
pub const NOW: &str = "now";

/// One frame of the scope stack.
#[derive(Debug)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    context: Option<&'a Value>,
    bindings: SmallVec<[(String, Value); 2]>,
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub found: bool,
    /// Path prefix (as written) at which resolution stopped.
    pub missing: Option<String>,
    /// Why a method call in the path failed.
    pub error: Option<String>,
    /// Path prefix at which objects were hidden from the viewer.
    pub withheld: Option<String>,
}

impl Resolved {
    fn found(value: Value, withheld: Option<String>) -> Self {
        Self {
            value,
            found: true,
            missing: None,
            error: None,
            withheld,
        }
    }

    fn missing(at: String) -> Self {
        Self {
            value: Value::None,
            found: false,
            missing: Some(at),
            error: None,
            withheld: None,
        }
    }

    fn failed(at: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::missing(at)
        }
    }
}

impl<'a> Scope<'a> {
    /// Root scope over a caller-owned context value.
    pub fn new(context: &'a Value) -> Self {
        Self {
            parent: None,
            context: Some(context),
            bindings: SmallVec::new(),
        }
    }

    /// Push a child scope.
    pub fn child(&self) -> Scope<'_> {
        Scope {
            parent: Some(self),
            context: None,
            bindings: SmallVec::new(),
        }
    }

    /// Bind a name in this scope, shadowing outer scopes.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.bindings.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name, value)),
        }
    }

    /// Number of frames from this scope to the root.
    pub fn depth(&self) -> usize {
        self.parent.map_or(0, |parent| parent.depth() + 1)
    }

    /// Look up a leading name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some((_, value)) = current.bindings.iter().find(|(key, _)| key == name) {
                return Some(Cow::Borrowed(value));
            }
            if let Some(context) = current.context
                && let Some(value) = context.get(&Segment::Name(name.to_string()))
            {
                return Some(value);
            }
            scope = current.parent;
        }
        // `item__name` where `item` is a loop binding
        if let Some((head, tail)) = name.split_once("__")
            && !head.is_empty()
            && !tail.is_empty()
            && let Some(base) = self.lookup(head)
        {
            return base
                .get(&Segment::Name(tail.to_string()))
                .map(|value| Cow::Owned(value.into_owned()));
        }
        if name == NOW {
            return Some(Cow::Owned(Value::DateTime(chrono::Local::now().naive_local())));
        }
        None
    }

    /// Resolve a full path; a missing segment yields `found == false`.
    pub fn resolve(&self, path: &Path) -> Resolved {
        self.resolve_as(path, None)
    }

    /// Resolve a full path, hiding objects `viewer` may not see.
    ///
    /// A hidden object ends resolution with a blank value; hidden items of a
    /// sequence are dropped. Either way `withheld` names the path prefix.
    pub fn resolve_as(&self, path: &Path, viewer: Option<&dyn Viewer>) -> Resolved {
        let Some(mut current) = self.lookup(path.root()) else {
            return Resolved::missing(path.root().to_string());
        };

        let mut walked = path.root().to_string();
        let mut withheld = None;
        if let Some(viewer) = viewer {
            match restrict(current, viewer, &walked, &mut withheld) {
                Some(value) => current = value,
                None => return Resolved::found(Value::None, withheld),
            }
        }

        for segment in path.rest() {
            append_segment(&mut walked, segment);
            let next = match segment {
                Segment::Call { name, args } => match current.call(name, args) {
                    Ok(value) => Some(Cow::Owned(value)),
                    Err(message) => return Resolved::failed(walked, message),
                },
                _ => match &current {
                    Cow::Borrowed(value) => value.get(segment),
                    Cow::Owned(value) => value.get(segment).map(|v| Cow::Owned(v.into_owned())),
                },
            };
            let Some(next) = next else {
                return Resolved::missing(walked);
            };
            current = match viewer {
                Some(viewer) => match restrict(next, viewer, &walked, &mut withheld) {
                    Some(value) => value,
                    None => return Resolved::found(Value::None, withheld),
                },
                None => next,
            };
        }
        Resolved::found(current.into_owned(), withheld)
    }
}

fn is_hidden(value: &Value, viewer: &dyn Viewer) -> bool {
    matches!(value, Value::Object(obj) if !viewer.can_view(&**obj))
}

/// `None` when `value` itself is hidden; otherwise `value` without its hidden items.
fn restrict<'v>(
    value: Cow<'v, Value>,
    viewer: &dyn Viewer,
    at: &str,
    withheld: &mut Option<String>,
) -> Option<Cow<'v, Value>> {
    if is_hidden(&value, viewer) {
        withheld.get_or_insert_with(|| at.to_string());
        return None;
    }
    if let Value::Seq(items) = value.as_ref()
        && items.iter().any(|item| is_hidden(item, viewer))
    {
        withheld.get_or_insert_with(|| at.to_string());
        let visible = items
            .iter()
            .filter(|item| !is_hidden(item, viewer))
            .cloned()
            .collect();
        return Some(Cow::Owned(Value::Seq(visible)));
    }
    Some(value)
}

fn append_segment(out: &mut String, segment: &Segment) {
    match segment {
        Segment::Name(name) => {
            out.push('.');
            out.push_str(name);
        },
        Segment::Index(index) => {
            out.push('[');
            out.push_str(itoa::Buffer::new().format(*index));
            out.push(']');
        },
        Segment::Key(key) => {
            out.push_str("[\"");
            out.push_str(key);
            out.push_str("\"]");
        },
        Segment::Where(selectors) => {
            out.push('[');
            for (n, selector) in selectors.iter().enumerate() {
                if n > 0 {
                    out.push_str(", ");
                }
                out.push_str(&selector.field);
                out.push_str("=...");
            }
            out.push(']');
        },
        Segment::Call { name, .. } => {
            out.push('.');
            out.push_str(name);
            out.push_str("(...)");
        },
    }
}
