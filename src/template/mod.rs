//! Template resolution engine.
//!
//! This module holds everything that is independent of the document format:
//! the context model ([`Value`], [`Scope`]), placeholder parsing, the
//! block expander, and the [`Dialect`]/[`XmlWalker`] pair used by the OOXML
//! adapters to expose their parts as levels of structural units.
//!
//! # Placeholder syntax
//!
//! ```text
//! {{ user.name | upper }}            value with filters
//! {{ orders[0].total | number(2) }}  indexing
//! {% for row in rows %} ... {% endfor %}
//! {% for key, value in totals %} ... {% endfor %}
//! {% if row.active %} ... {% else %} ... {% endif %}
//! ```
//!
//! # Example
//!
//! ```
//! use office_templates::template::{self, RenderOptions, Value};
//!
//! let context: Value = serde_json::from_str(r#"{"user": {"name": "ana"}}"#).unwrap();
//! let (text, report) =
//!     template::render_str("Hello {{ user.name | upper }}", &context, &RenderOptions::default()).unwrap();
//! assert_eq!(text, "Hello ANA");
//! assert!(report.is_empty());
//! ```

pub mod adapter;
pub mod context;
pub mod engine;
pub mod error;
pub mod filters;
pub mod format;
pub mod options;
pub mod path;
pub mod report;
pub mod scanner;
pub mod token;
pub mod value;

pub use adapter::{Dialect, XmlWalker};
pub use context::Scope;
pub use engine::{Renderer, TextOutcome, Walk};
pub use error::{RenderError, Result};
pub use options::{ConfigError, OnError, RenderOptions, ViewerHandle};
pub use report::{Element, Issue, IssueKind, Location, LoopStep, Part, Report};
pub use value::{Map, Resolvable, Value, Viewer};

use token::TokenError;

/// Resolve a path expression (with optional filters) against `context`.
///
/// Returns the value and whether the path was found. Filters run only on
/// found values.
///
/// ```
/// use office_templates::template::{resolve, Value};
///
/// let context: Value = serde_json::from_str(r#"{"users": [{"email": "a@x"}, {"email": "b@x"}]}"#).unwrap();
/// let (value, found) = resolve("users[-1].email | upper", &context).unwrap();
/// assert!(found);
/// assert_eq!(value, Value::from("B@X"));
/// assert_eq!(resolve("users[5]", &context).unwrap(), (Value::None, false));
/// ```
pub fn resolve(expr: &str, context: &Value) -> Result<(Value, bool)> {
    let parsed = token::parse_expression(expr).map_err(|err| match err {
        TokenError::Syntax(message) => RenderError::Parse {
            message,
            raw: expr.to_string(),
            location: Location::default(),
        },
        TokenError::UnknownFilter(name) => RenderError::UnknownFilter {
            name,
            raw: expr.to_string(),
            location: Location::default(),
        },
    })?;

    let resolved = Scope::new(context).resolve(&parsed.path);
    if !resolved.found {
        return Ok((Value::None, false));
    }
    let env = filters::FilterEnv::default();
    let mut value = resolved.value;
    for filter in &parsed.filters {
        value = filter
            .apply(&value, &env)
            .map_err(|message| RenderError::FilterApplication {
                message,
                raw: expr.to_string(),
                location: Location::default(),
            })?;
    }
    Ok((value, true))
}

/// Render placeholders and inline blocks in a plain string.
pub fn render_str(text: &str, context: &Value, options: &RenderOptions) -> Result<(String, Report)> {
    let mut renderer = Renderer::new(options)?;
    let rendered = renderer.render_string(text, &Scope::new(context))?;
    Ok((rendered, renderer.finish()))
}
