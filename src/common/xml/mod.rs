//! XML helpers shared by the package layer and the template adapters.

mod dom;
mod escape;

pub use dom::{XmlDocument, XmlElement, XmlError, XmlNode};
pub use escape::{escape_attr, escape_text, resolve_entity, unescape_xml};
