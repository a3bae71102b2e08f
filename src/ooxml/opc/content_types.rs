/// The `[Content_Types].xml` part.
///
/// Maps part names to content types through extension defaults and per-part
/// overrides. Overrides win over defaults.
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_MEMBER, PackURI};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Lower-cased extension -> content type
    defaults: IndexMap<String, String>,
    /// Part name -> content type
    overrides: IndexMap<String, String>,
}

impl ContentTypes {
    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(bytes).map_err(|source| OpcError::Xml {
            part: CONTENT_TYPES_MEMBER.to_string(),
            source,
        })?;

        let mut types = Self::default();
        for el in doc.root.elements() {
            match (el.local_name(), el.attr("ContentType")) {
                ("Default", Some(ct)) => {
                    if let Some(ext) = el.attr("Extension") {
                        types.defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                },
                ("Override", Some(ct)) => {
                    if let Some(name) = el.attr("PartName") {
                        types.overrides.insert(name.to_string(), ct.to_string());
                    }
                },
                _ => {},
            }
        }
        Ok(types)
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = XmlElement::new("Types");
        root.set_attr("xmlns", namespace::OPC_CONTENT_TYPES);
        for (ext, ct) in &self.defaults {
            let mut el = XmlElement::new("Default");
            el.set_attr("Extension", ext.as_str());
            el.set_attr("ContentType", ct.as_str());
            root.push_element(el);
        }
        for (name, ct) in &self.overrides {
            let mut el = XmlElement::new("Override");
            el.set_attr("PartName", name.as_str());
            el.set_attr("ContentType", ct.as_str());
            root.push_element(el);
        }
        XmlDocument::new(root).to_bytes()
    }

    /// Content type of a part, looking at overrides first.
    pub fn get(&self, partname: &PackURI) -> Option<&str> {
        self.overrides
            .get(partname.as_str())
            .or_else(|| self.defaults.get(&partname.ext().to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn add_default(&mut self, ext: &str, content_type: &str) {
        self.defaults
            .insert(ext.to_ascii_lowercase(), content_type.to_string());
    }

    pub fn add_override(&mut self, partname: &PackURI, content_type: &str) {
        self.overrides
            .insert(partname.as_str().to_string(), content_type.to_string());
    }

    pub fn remove_override(&mut self, partname: &PackURI) -> Option<String> {
        self.overrides.shift_remove(partname.as_str())
    }

    /// Part names overridden with `content_type`, in document order.
    pub fn parts_of_type<'a>(&'a self, content_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.overrides
            .iter()
            .filter(move |(_, ct)| ct.as_str() == content_type)
            .map(|(name, _)| name.as_str())
    }
}
