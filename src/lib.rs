//! Office Templates - populate PowerPoint and Excel templates with data
//!
//! Templates are ordinary `.pptx` / `.xlsx` files whose text carries
//! placeholders. Rendering resolves them against a context value and mutates
//! the document in place: values are substituted, loops repeat slides, shapes,
//! paragraphs, table rows, sheets or worksheet rows, and conditionals keep or
//! drop them.
//!
//! # Features
//!
//! - **Placeholders**: `{{ user.name | upper }}`, indexing (`rows[0]`,
//!   `rows[-1]`), filters (`upper`, `number(2)`, `date("dd MMM YYYY")`, ...)
//! - **Blocks**: `{% for row in rows %}`, `{% for key, value in totals %}`,
//!   `{% if row.active %}` / `{% else %}`, at any structural level or inline
//!   within one paragraph or cell
//! - **Paths**: selectors (`users[active=true, role=admin]`), method calls on
//!   [`Resolvable`](template::Resolvable) objects (`report.total(2023)`) and
//!   chained names (`owner__email`)
//! - **Permissions**: a [`Viewer`](template::Viewer) hides objects the reader
//!   may not see
//! - **Split runs**: placeholders broken across formatting runs are found
//!   and replaced in the first run
//! - **Reports**: missing values and filter failures are collected with their
//!   slide/shape or sheet/cell location, or abort the render in fail-fast mode
//!
//! # Example - Rendering a presentation
//!
//! ```no_run
//! use office_templates::ooxml::pptx::PresentationTemplate;
//! use office_templates::template::{RenderOptions, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut deck = PresentationTemplate::open("template.pptx")?;
//! let context: Value = serde_json::from_str(r#"{"user": {"name": "ana"}}"#)?;
//!
//! let report = deck.render(&context, &RenderOptions::default())?;
//! for issue in &report {
//!     eprintln!("{}", issue);
//! }
//! deck.save("hello.pptx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Options from YAML
//!
//! ```no_run
//! use office_templates::ooxml::xlsx::WorkbookTemplate;
//! use office_templates::template::{RenderOptions, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = RenderOptions::from_yaml_file("render.yaml")?;
//! let context: Value = serde_saphyr::from_str(&std::fs::read_to_string("context.yaml")?)?;
//!
//! let mut book = WorkbookTemplate::open("template.xlsx")?;
//! book.render(&context, &options)?;
//! book.save("filled.xlsx")?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod common;
pub mod ooxml;
pub mod template;

pub use ooxml::pptx::PresentationTemplate;
pub use ooxml::xlsx::WorkbookTemplate;
pub use template::{RenderError, RenderOptions, Report, Value};
