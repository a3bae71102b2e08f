//! PowerPoint (.pptx) templates.
//!
//! [`PresentationTemplate`] renders a deck in place. The slide list is the
//! outermost structural level, followed by each slide's shape tree, group
//! shapes, tables and text bodies; paragraphs are rendered inline.
//!
//! ```rust,no_run
//! use office_templates::ooxml::pptx::PresentationTemplate;
//! use office_templates::template::{RenderOptions, Value};
//!
//! let mut deck = PresentationTemplate::open("template.pptx")?;
//! let context: Value = serde_json::from_str(r#"{"rows": [{"name": "A", "active": true}]}"#)?;
//! deck.render(&context, &RenderOptions::default())?;
//! deck.save("out.pptx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod dialect;
pub mod package;

pub use dialect::SlideDialect;
pub use package::{PresentationTemplate, SLIDE_NUMBER};
