//! Common utilities shared across the package layer and the template engine.

pub mod xml;

pub use xml::{XmlDocument, XmlElement, XmlNode};
