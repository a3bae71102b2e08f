/// Open Packaging Conventions (OPC) layer.
///
/// Reads a ZIP package into memory, exposes its parts, relationships and
/// content types for editing, and writes it back.
pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod rel;

pub use content_types::ContentTypes;
pub use error::OpcError;
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use rel::{Relationship, Relationships};
