/// PresentationML traversal rules.
use crate::common::xml::XmlElement;
use crate::template::{Dialect, Element};
use std::collections::HashSet;

/// Shapes that carry a `cNvPr` name.
const NAMED_SHAPES: [&str; 5] = ["sp", "graphicFrame", "grpSp", "cxnSp", "pic"];

/// Element classification for slide parts.
///
/// Shape trees, group shapes, tables and text bodies each form a structural
/// level; paragraphs are rendered inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideDialect;

impl Dialect for SlideDialect {
    fn is_unit_container(&self, el: &XmlElement) -> bool {
        matches!(el.local_name(), "spTree" | "grpSp" | "tbl" | "txBody")
    }

    fn is_text_block(&self, el: &XmlElement) -> bool {
        el.is("p")
    }

    fn is_text_unit(&self, el: &XmlElement) -> bool {
        el.is("t")
    }

    fn is_run(&self, el: &XmlElement) -> bool {
        matches!(el.local_name(), "r" | "fld")
    }

    fn label(&self, el: &XmlElement) -> Option<Element> {
        if !NAMED_SHAPES.contains(&el.local_name()) {
            return None;
        }
        el.descendant("cNvPr")
            .and_then(|pr| pr.attr("name"))
            .map(|name| Element::Shape(name.to_string()))
    }
}

/// Give every text body that lost all its paragraphs an empty one.
pub(crate) fn ensure_paragraphs(root: &mut XmlElement) {
    root.visit_mut(&mut |el| {
        if el.is("txBody") && el.child("p").is_none() {
            el.push_element(XmlElement::new("a:p"));
        }
    });
}

/// Give every repeated `cNvPr` id a fresh number above the slide's highest.
///
/// The first element with a given id keeps it, so connectors and animations
/// that point at template shapes stay attached to them.
pub(crate) fn renumber_shape_ids(root: &mut XmlElement) {
    let mut max = 0u32;
    root.visit_mut(&mut |el| {
        if el.is("cNvPr")
            && let Some(id) = el.attr("id").and_then(|id| id.parse::<u32>().ok())
        {
            max = max.max(id);
        }
    });

    let mut seen = HashSet::new();
    let mut next = max.saturating_add(1);
    root.visit_mut(&mut |el| {
        if !el.is("cNvPr") {
            return;
        }
        let Some(id) = el.attr("id") else {
            return;
        };
        if seen.insert(id.to_string()) {
            return;
        }
        el.set_attr("id", itoa::Buffer::new().format(next));
        next = next.saturating_add(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;
    use crate::template::adapter::block_text;

    const SHAPE: &str = r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/></p:nvSpPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>Hello </a:t></a:r><a:fld id="x" type="slidenum"><a:t>3</a:t></a:fld></a:p></p:txBody></p:sp>"#;

    #[test]
    fn test_shape_label_and_text() {
        let doc = XmlDocument::parse(SHAPE.as_bytes()).unwrap();
        assert_eq!(SlideDialect.label(&doc.root), Some(Element::Shape("Title 1".into())));
        assert_eq!(block_text(&SlideDialect, &doc.root), "Hello 3");
        let body = doc.root.child("txBody").unwrap();
        assert!(SlideDialect.is_unit_container(body));
        assert!(SlideDialect.is_text_block(body.child("p").unwrap()));
    }

    #[test]
    fn test_ensure_paragraphs() {
        let mut doc = XmlDocument::parse(b"<p:sld><p:sp><p:txBody><a:bodyPr/></p:txBody></p:sp></p:sld>").unwrap();
        ensure_paragraphs(&mut doc.root);
        let mut out = String::new();
        doc.root.write_to(&mut out);
        assert_eq!(out, "<p:sld><p:sp><p:txBody><a:bodyPr/><a:p/></p:txBody></p:sp></p:sld>");
    }

    #[test]
    fn test_renumber_shape_ids() {
        let mut doc = XmlDocument::parse(
            br#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/></p:nvGrpSpPr><p:sp><p:nvSpPr><p:cNvPr id="3" name="A"/></p:nvSpPr></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="A"/></p:nvSpPr></p:sp><p:grpSp><p:nvGrpSpPr><p:cNvPr id="5" name="G"/></p:nvGrpSpPr><p:sp><p:nvSpPr><p:cNvPr id="3" name="A"/></p:nvSpPr></p:sp></p:grpSp></p:spTree>"#,
        )
        .unwrap();
        renumber_shape_ids(&mut doc.root);

        let mut ids = Vec::new();
        doc.root.visit_mut(&mut |el| {
            if el.is("cNvPr") {
                ids.push(el.attr("id").unwrap_or_default().to_string());
            }
        });
        assert_eq!(ids, ["1", "3", "6", "5", "7"]);
    }
}
