//! Excel (.xlsx) templates.
//!
//! [`WorkbookTemplate`] renders a workbook in place. Shared strings that hold
//! template markup are inlined into their cells first, so rendering one cell
//! never changes another. Rows of `sheetData` are the structural level; a
//! cell holding a single placeholder takes the type of its value.

pub mod cell;
pub mod dialect;
pub mod rows;
pub mod shared_strings;
pub mod workbook;

pub use dialect::SheetDialect;
pub use shared_strings::SharedStrings;
pub use workbook::{MAX_SHEET_NAME, WorkbookTemplate};
