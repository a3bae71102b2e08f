/// Relationships between parts of an OPC package.
///
/// Each part may own a `.rels` part listing its outgoing relationships. The
/// collection keeps document order so a rewritten `.rels` part diffs cleanly
/// against the original.
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::opc::constants::{RTM_EXTERNAL, namespace};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub r_id: String,
    /// Relationship type URI
    pub reltype: String,
    /// Part reference relative to the source part, or an external URL
    pub target_ref: String,
    pub is_external: bool,
}

impl Relationship {
    /// Absolute part name of an internal target.
    pub fn target_partname(&self, base_uri: &str) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(format!(
                "{} targets external resource '{}'",
                self.r_id, self.target_ref
            )));
        }
        PackURI::from_rel_ref(base_uri, &self.target_ref)
    }
}

/// Relationships owned by one source part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the content of a `.rels` part.
    pub fn from_xml(bytes: &[u8], partname: &str) -> Result<Self> {
        let doc = XmlDocument::parse(bytes).map_err(|source| OpcError::Xml {
            part: partname.to_string(),
            source,
        })?;

        let mut rels = Vec::new();
        for el in doc.root.elements().filter(|el| el.is("Relationship")) {
            let (Some(r_id), Some(reltype), Some(target)) =
                (el.attr("Id"), el.attr("Type"), el.attr("Target"))
            else {
                return Err(OpcError::InvalidRelationship(format!(
                    "incomplete relationship in {}",
                    partname
                )));
            };
            rels.push(Relationship {
                r_id: r_id.to_string(),
                reltype: reltype.to_string(),
                target_ref: target.to_string(),
                is_external: el.attr("TargetMode") == Some(RTM_EXTERNAL),
            });
        }
        Ok(Self { rels })
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = XmlElement::new("Relationships");
        root.set_attr("xmlns", namespace::OPC_RELATIONSHIPS);
        for rel in &self.rels {
            let mut el = XmlElement::new("Relationship");
            el.set_attr("Id", rel.r_id.as_str());
            el.set_attr("Type", rel.reltype.as_str());
            el.set_attr("Target", rel.target_ref.as_str());
            if rel.is_external {
                el.set_attr("TargetMode", RTM_EXTERNAL);
            }
            root.push_element(el);
        }
        XmlDocument::new(root).to_bytes()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    pub fn of_type<'a>(&'a self, reltype: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.rels.iter().filter(move |rel| rel.reltype == reltype)
    }

    /// First relationship of `reltype`.
    pub fn part_with_reltype(&self, reltype: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.reltype == reltype)
    }

    /// Lowest `rIdN` not yet in use.
    pub fn next_r_id(&self) -> String {
        let mut n = self.rels.len() + 1;
        for candidate in 1..=self.rels.len() + 1 {
            let id = format!("rId{}", candidate);
            if self.get(&id).is_none() {
                n = candidate;
                break;
            }
        }
        format!("rId{}", n)
    }

    /// Add an internal relationship and return its ID.
    pub fn add(&mut self, reltype: &str, target_ref: &str) -> String {
        let r_id = self.next_r_id();
        self.rels.push(Relationship {
            r_id: r_id.clone(),
            reltype: reltype.to_string(),
            target_ref: target_ref.to_string(),
            is_external: false,
        });
        r_id
    }

    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|rel| rel.r_id == r_id)?;
        Some(self.rels.remove(pos))
    }

    /// Keep only the relationships for which `f` returns true.
    pub fn retain(&mut self, f: impl FnMut(&Relationship) -> bool) {
        self.rels.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as RT;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId1" Type="http://example.com/link" Target="https://example.com" TargetMode="External"/></Relationships>"#;

    #[test]
    fn test_parse_and_lookup() {
        let rels = Relationships::from_xml(RELS.as_bytes(), "/ppt/_rels/presentation.xml.rels").unwrap();
        assert_eq!(rels.len(), 2);
        let slide = rels.part_with_reltype(RT::SLIDE).unwrap();
        assert_eq!(slide.r_id, "rId2");
        assert_eq!(slide.target_partname("/ppt").unwrap().as_str(), "/ppt/slides/slide1.xml");
        assert!(rels.get("rId1").unwrap().is_external);
        assert!(rels.get("rId1").unwrap().target_partname("/ppt").is_err());
    }

    #[test]
    fn test_add_fills_gaps_and_serializes() {
        let mut rels = Relationships::from_xml(RELS.as_bytes(), "x").unwrap();
        assert_eq!(rels.add(RT::SLIDE, "slides/slide2.xml"), "rId3");
        rels.remove("rId1");
        assert_eq!(rels.next_r_id(), "rId1");

        let reparsed = Relationships::from_xml(&rels.to_xml(), "x").unwrap();
        assert_eq!(reparsed, rels);
    }

    #[test]
    fn test_incomplete_relationship_is_rejected() {
        let xml = r#"<Relationships><Relationship Id="rId1" Target="a.xml"/></Relationships>"#;
        assert!(matches!(
            Relationships::from_xml(xml.as_bytes(), "x"),
            Err(OpcError::InvalidRelationship(_))
        ));
    }
}
