//! SpreadsheetML traversal rules.

use crate::common::xml::{XmlElement, XmlNode};
use crate::ooxml::xlsx::shared_strings::qualified;
use crate::template::{Dialect, Element, Value};

/// Element classification for worksheet parts.
///
/// Rows of `sheetData` form the structural level; each cell is rendered
/// inline. Only inline-string cells carry text units, so numeric and formula
/// cells pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetDialect;

impl Dialect for SheetDialect {
    fn is_unit_container(&self, el: &XmlElement) -> bool {
        el.is("sheetData")
    }

    fn is_text_block(&self, el: &XmlElement) -> bool {
        el.is("c")
    }

    fn is_text_unit(&self, el: &XmlElement) -> bool {
        el.is("t")
    }

    fn is_run(&self, el: &XmlElement) -> bool {
        el.is("r")
    }

    fn is_opaque(&self, el: &XmlElement) -> bool {
        el.is("rPh")
    }

    fn label(&self, el: &XmlElement) -> Option<Element> {
        if !el.is("c") {
            return None;
        }
        el.attr("r").map(|r| Element::Cell(r.to_string()))
    }

    /// A cell that held nothing but one placeholder takes the type of its
    /// value: numbers become numeric cells, booleans boolean cells.
    fn finish_text_block(&self, cell: &mut XmlElement, sole: Option<&Value>) {
        if cell.attr("t") != Some("inlineStr") {
            return;
        }
        let (cell_type, text) = match sole {
            Some(Value::Int(n)) => (None, itoa::Buffer::new().format(*n).to_string()),
            Some(Value::Float(f)) if f.is_finite() => (None, Value::Float(*f).to_text()),
            Some(Value::Bool(b)) => (Some("b"), if *b { "1" } else { "0" }.to_string()),
            _ => return,
        };

        cell.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if el.is("is")));
        match cell_type {
            Some(cell_type) => cell.set_attr("t", cell_type),
            None => {
                cell.remove_attr("t");
            },
        }
        let mut v = XmlElement::new(qualified(cell, "v"));
        v.set_text(text);
        cell.push_element(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;

    fn finish(xml: &str, sole: Option<Value>) -> String {
        let mut doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        SheetDialect.finish_text_block(&mut doc.root, sole.as_ref());
        let mut out = String::new();
        doc.root.write_to(&mut out);
        out
    }

    const CELL: &str = r#"<c r="B2" s="1" t="inlineStr"><is><t>12.5</t></is></c>"#;

    #[test]
    fn test_typed_cells() {
        assert_eq!(finish(CELL, Some(Value::from(12.5))), r#"<c r="B2" s="1"><v>12.5</v></c>"#);
        assert_eq!(finish(CELL, Some(Value::Int(-3))), r#"<c r="B2" s="1"><v>-3</v></c>"#);
        assert_eq!(finish(CELL, Some(Value::Bool(true))), r#"<c r="B2" s="1" t="b"><v>1</v></c>"#);
    }

    #[test]
    fn test_strings_stay_inline() {
        assert_eq!(finish(CELL, Some(Value::from("x"))), CELL);
        assert_eq!(finish(CELL, None), CELL);
        assert_eq!(finish(CELL, Some(Value::Float(f64::NAN))), CELL);
    }

    #[test]
    fn test_cell_label() {
        let doc = XmlDocument::parse(CELL.as_bytes()).unwrap();
        assert_eq!(SheetDialect.label(&doc.root), Some(Element::Cell("B2".into())));
    }
}
