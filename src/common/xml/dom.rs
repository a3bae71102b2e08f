//! Owned XML tree for rendering parts in place.
//!
//! Template parts have to be cloned, spliced and rewritten, which the streaming
//! readers used elsewhere cannot do. This module parses a part into a small owned
//! tree with `quick-xml` and writes it back with the same element names, attribute
//! order and whitespace, so untouched markup survives a render byte-for-byte modulo
//! entity normalization.

use super::escape::{escape_attr, escape_text, resolve_entity, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as FmtWrite;
use thiserror::Error;

/// Errors raised while reading an XML part.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("XML part has no root element")]
    MissingRoot,

    #[error("Unbalanced XML: unexpected end tag </{0}>")]
    UnexpectedEnd(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, XmlError>;

/// A node of the owned tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
}

impl XmlNode {
    /// The element, if this node is one.
    #[inline]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its qualified name, attributes in document order, and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Name without namespace prefix (`a:t` -> `t`).
    #[inline]
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix of the qualified name, if any.
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    #[inline]
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(pos).1)
    }

    #[inline]
    pub fn push_element(&mut self, el: XmlElement) {
        self.children.push(XmlNode::Element(el));
    }

    /// Iterate over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is(local))
    }

    /// First descendant (depth-first, pre-order) with the given local name.
    pub fn descendant(&self, local: &str) -> Option<&XmlElement> {
        for el in self.elements() {
            if el.is(local) {
                return Some(el);
            }
            if let Some(found) = el.descendant(local) {
                return Some(found);
            }
        }
        None
    }

    /// Visit every descendant element mutably, parents before children.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut XmlElement)) {
        for el in self.elements_mut() {
            f(el);
            el.visit_mut(f);
        }
    }

    /// Concatenated character data of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(el) => el.collect_text(out),
                _ => {},
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Append the serialized form of this element to `out`.
    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(el) => el.write_to(out),
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
                XmlNode::CData(t) => {
                    let _ = write!(out, "<![CDATA[{}]]>", t);
                },
                XmlNode::Comment(t) => {
                    let _ = write!(out, "<!--{}-->", t);
                },
                XmlNode::Instruction(t) => {
                    let _ = write!(out, "<?{}?>", t);
                },
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// A parsed XML part: optional declaration plus the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Declaration content between `<?` and `?>`, e.g. `xml version="1.0"`.
    pub declaration: Option<String>,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(
                r#"xml version="1.0" encoding="UTF-8" standalone="yes""#.to_string(),
            ),
            root,
        }
    }

    /// Parse a part into an owned tree, preserving whitespace in character data.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| XmlError::Syntax {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
            match event {
                Event::Decl(decl) => {
                    declaration = Some(std::str::from_utf8(&decl)?.to_string());
                },
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let el = element_from_start(&start)?;
                    attach(&mut stack, &mut root, XmlNode::Element(el));
                },
                Event::End(end) => {
                    let el = stack.pop().ok_or_else(|| {
                        XmlError::UnexpectedEnd(String::from_utf8_lossy(end.name().as_ref()).into())
                    })?;
                    attach(&mut stack, &mut root, XmlNode::Element(el));
                },
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(text.as_ref())?;
                        push_text(parent, &unescape_xml(raw));
                    }
                },
                Event::GeneralRef(reference) => {
                    if let Some(parent) = stack.last_mut() {
                        let name = std::str::from_utf8(&reference)?;
                        match resolve_entity(name) {
                            Some(ch) => push_text(parent, ch.encode_utf8(&mut [0; 4])),
                            None => push_text(parent, &format!("&{};", name)),
                        }
                    }
                },
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(data.as_ref())?;
                        parent.children.push(XmlNode::CData(raw.to_string()));
                    }
                },
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(comment.as_ref())?;
                        parent.children.push(XmlNode::Comment(raw.to_string()));
                    }
                },
                Event::PI(pi) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(pi.as_ref())?;
                        parent.children.push(XmlNode::Instruction(raw.to_string()));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        let root = root.ok_or(XmlError::MissingRoot)?;
        Ok(Self { declaration, root })
    }

    /// Serialize back to XML text.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        if let Some(decl) = &self.declaration {
            let _ = write!(out, "<?{}?>\n", decl);
        }
        self.root.write_to(&mut out);
        out
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let raw = std::str::from_utf8(&attr.value)?;
        attrs.push((key, unescape_xml(raw)));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if let XmlNode::Element(el) = node
                && root.is_none()
            {
                *root = Some(el);
            }
        },
    }
}

fn push_text(parent: &mut XmlElement, text: &str) {
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>Q&amp;A </a:t></a:r><a:r><a:t>time</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_parse_and_navigate() {
        let doc = XmlDocument::parse(SLIDE.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "p:sld");
        assert_eq!(doc.root.local_name(), "sld");
        assert_eq!(doc.root.prefix(), Some("p"));
        assert_eq!(doc.root.text(), "Q&A time");

        let rpr = doc.root.descendant("rPr").unwrap();
        assert_eq!(rpr.attr("b"), Some("1"));
        assert!(rpr.children.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_markup() {
        let doc = XmlDocument::parse(SLIDE.as_bytes()).unwrap();
        let xml = doc.to_xml();
        assert!(xml.contains(r#"<a:rPr lang="en-US" b="1"/>"#));
        assert!(xml.contains("<a:t>Q&amp;A </a:t>"));

        let again = XmlDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_attribute_editing() {
        let mut el = XmlElement::new("row");
        el.set_attr("r", "1");
        el.set_attr("spans", "1:3");
        el.set_attr("r", "7");
        assert_eq!(el.attrs[0], ("r".to_string(), "7".to_string()));
        assert_eq!(el.remove_attr("spans").as_deref(), Some("1:3"));
        assert_eq!(el.attr("spans"), None);
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        assert!(XmlDocument::parse(b"<a><b></a>").is_err());
        assert!(matches!(
            XmlDocument::parse(b"   ").unwrap_err(),
            XmlError::MissingRoot
        ));
    }
}
