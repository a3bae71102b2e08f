//! Office Open XML (OOXML) template documents.
//!
//! The module is organized in two layers:
//!
//! 1. **OPC Layer** (`opc`): the ZIP package, part names, relationships and
//!    content types
//! 2. **Format-Specific Modules**:
//!    - `pptx`: PowerPoint presentation templates
//!    - `xlsx`: Excel workbook templates
//!
//! Both formats plug into the template engine through a
//! [`Dialect`](crate::template::Dialect) describing which elements form
//! structural levels and which hold text.
//!
//! # Example
//!
//! ```rust,no_run
//! use office_templates::ooxml::xlsx::WorkbookTemplate;
//! use office_templates::template::{RenderOptions, Value};
//!
//! let mut book = WorkbookTemplate::open("template.xlsx")?;
//! let context: Value = serde_saphyr::from_str("title: Sales\nrows: [1, 2, 3]\n")?;
//! let report = book.render(&context, &RenderOptions::default())?;
//! println!("{} issues", report.len());
//! book.save("sales.xlsx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod opc;
pub mod pptx;
pub mod xlsx;

pub use error::{OoxmlError, Result};
pub use opc::{OpcPackage, PackURI};
pub use pptx::PresentationTemplate;
pub use xlsx::WorkbookTemplate;
