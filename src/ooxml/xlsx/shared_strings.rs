//! Shared strings table for Excel files.
//!
//! Template cells usually reference `xl/sharedStrings.xml`. Rendering one
//! cell must not change other cells sharing the same string, so cells whose
//! string holds template markup are converted to inline rich strings first.
//! The items are kept as elements so the inlined cell keeps its runs.

use crate::common::xml::{XmlDocument, XmlElement, XmlError, XmlNode};
use crate::ooxml::xlsx::dialect::SheetDialect;
use crate::template::adapter::block_text;

/// String items (`si`) of the shared strings part.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    items: Vec<XmlElement>,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let doc = XmlDocument::parse(bytes)?;
        let items = doc
            .root
            .elements()
            .filter(|el| el.is("si"))
            .cloned()
            .collect();
        Ok(Self { items })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&XmlElement> {
        self.items.get(index)
    }

    /// Plain text of an item, without phonetic runs.
    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index).map(|si| block_text(&SheetDialect, si))
    }

    /// Item referenced by a `t="s"` cell.
    fn item_for(&self, cell: &XmlElement) -> Option<&XmlElement> {
        let index = cell.child("v")?.text().trim().parse::<usize>().ok()?;
        self.get(index)
    }

    /// Convert shared-string cells below `root` whose text satisfies
    /// `contains_markup` into inline strings. Returns the number of cells
    /// converted.
    pub fn inline_cells(&self, root: &mut XmlElement, contains_markup: impl Fn(&str) -> bool) -> usize {
        let mut converted = 0;
        root.visit_mut(&mut |cell| {
            if !cell.is("c") || cell.attr("t") != Some("s") {
                return;
            }
            let Some(item) = self.item_for(cell) else {
                return;
            };
            if !contains_markup(&block_text(&SheetDialect, item)) {
                return;
            }

            let mut inline = XmlElement::new(qualified(cell, "is"));
            inline.children = item.children.clone();
            for node in cell.children.iter_mut() {
                if matches!(node, XmlNode::Element(el) if el.is("v")) {
                    *node = XmlNode::Element(std::mem::take(&mut inline));
                    break;
                }
            }
            cell.set_attr("t", "inlineStr");
            converted += 1;
        });
        converted
    }
}

/// `local` with the prefix of `sibling`, so inserted elements share its namespace.
pub(crate) fn qualified(sibling: &XmlElement, local: &str) -> String {
    match sibling.prefix() {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}
