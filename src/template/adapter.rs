//! Generic traversal of an XML part.
//!
//! A [`Dialect`] tells the walker which elements hold a structural level,
//! which are text blocks rendered inline, and which carry the text itself.
//! [`XmlWalker`] then drives the engine over the part without knowing the
//! document format.

use super::context::Scope;
use super::engine::{Renderer, Walk};
use super::error::Result;
use super::report::Element;
use super::value::Value;
use crate::common::xml::{XmlElement, XmlNode};

/// Format-specific classification of elements.
pub trait Dialect {
    /// Elements whose children form one structural level (shape tree, table,
    /// text body, sheet data).
    fn is_unit_container(&self, el: &XmlElement) -> bool;

    /// Elements rendered inline as one text (paragraph, cell).
    fn is_text_block(&self, el: &XmlElement) -> bool;

    /// Leaf elements holding character data.
    fn is_text_unit(&self, el: &XmlElement) -> bool;

    /// Formatting runs, removed when a placeholder leaves them empty.
    fn is_run(&self, el: &XmlElement) -> bool;

    /// Subtrees that are neither rendered nor read for text.
    fn is_opaque(&self, _el: &XmlElement) -> bool {
        false
    }

    /// Location label of an element, if it names one.
    fn label(&self, _el: &XmlElement) -> Option<Element> {
        None
    }

    /// Called after a text block was rendered; `sole` holds the value of a
    /// block consisting of one value placeholder.
    fn finish_text_block(&self, _block: &mut XmlElement, _sole: Option<&Value>) {}
}

/// Concatenated text of all text units below `el`.
pub fn block_text<D: Dialect + ?Sized>(dialect: &D, el: &XmlElement) -> String {
    let mut out = String::new();
    push_block_text(dialect, el, &mut out);
    out
}

fn push_block_text<D: Dialect + ?Sized>(dialect: &D, el: &XmlElement, out: &mut String) {
    for child in el.elements() {
        if dialect.is_opaque(child) {
            continue;
        }
        if dialect.is_text_unit(child) {
            out.push_str(&child.text());
        } else {
            push_block_text(dialect, child, out);
        }
    }
}

fn collect_units<'a, D: Dialect + ?Sized>(dialect: &D, el: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in el.elements() {
        if dialect.is_opaque(child) {
            continue;
        }
        if dialect.is_text_unit(child) {
            out.push(child);
        } else {
            collect_units(dialect, child, out);
        }
    }
}

fn collect_units_mut<'a, D: Dialect + ?Sized>(
    dialect: &D,
    el: &'a mut XmlElement,
    out: &mut Vec<&'a mut XmlElement>,
) {
    for child in el.elements_mut() {
        if dialect.is_opaque(child) {
            continue;
        }
        if dialect.is_text_unit(child) {
            out.push(child);
        } else {
            collect_units_mut(dialect, child, out);
        }
    }
}

fn count_units<D: Dialect + ?Sized>(dialect: &D, el: &XmlElement) -> usize {
    let mut units = Vec::new();
    collect_units(dialect, el, &mut units);
    units.len()
}

/// Drop runs whose text units are all in `emptied` (sorted unit indices).
fn prune_runs<D: Dialect + ?Sized>(dialect: &D, el: &mut XmlElement, counter: &mut usize, emptied: &[usize]) {
    el.children.retain_mut(|node| {
        let XmlNode::Element(child) = node else {
            return true;
        };
        if dialect.is_opaque(child) {
            return true;
        }
        if dialect.is_text_unit(child) {
            *counter += 1;
            return true;
        }
        if dialect.is_run(child) {
            let start = *counter;
            let count = count_units(dialect, child);
            *counter += count;
            let empty = count > 0 && (start..start + count).all(|i| emptied.binary_search(&i).is_ok());
            return !empty;
        }
        prune_runs(dialect, child, counter, emptied);
        true
    });
}

/// Walks element trees, treating each unit container's children as a level.
#[derive(Debug)]
pub struct XmlWalker<'d, D: ?Sized> {
    dialect: &'d D,
}

impl<'d, D: Dialect + ?Sized> XmlWalker<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self { dialect }
    }

    /// Render an element and everything below it.
    pub fn render_element(&mut self, el: &mut XmlElement, renderer: &mut Renderer<'_>, scope: &Scope<'_>) -> Result<()> {
        if self.dialect.is_opaque(el) {
            return Ok(());
        }
        let previous = self
            .dialect
            .label(el)
            .map(|label| renderer.set_element(Some(label)));
        let result = if self.dialect.is_text_block(el) {
            self.render_text_block(el, renderer, scope)
        } else if self.dialect.is_unit_container(el) {
            renderer.expand(self, &mut el.children, scope)
        } else {
            el.elements_mut()
                .try_for_each(|child| self.render_element(child, renderer, scope))
        };
        if let Some(previous) = previous {
            renderer.set_element(previous);
        }
        result
    }

    fn render_text_block(&self, block: &mut XmlElement, renderer: &mut Renderer<'_>, scope: &Scope<'_>) -> Result<()> {
        let texts: Vec<String> = {
            let mut units = Vec::new();
            collect_units(self.dialect, block, &mut units);
            units.iter().map(|unit| unit.text()).collect()
        };
        let Some(outcome) = renderer.render_text(&texts, scope)? else {
            return Ok(());
        };

        let mut units = Vec::with_capacity(texts.len());
        collect_units_mut(self.dialect, block, &mut units);
        for ((unit, old), new) in units.into_iter().zip(&texts).zip(&outcome.texts) {
            if old != new {
                unit.set_text(new.as_str());
            }
        }
        if !outcome.emptied.is_empty() {
            prune_runs(self.dialect, block, &mut 0, &outcome.emptied);
        }
        self.dialect.finish_text_block(block, outcome.sole.as_ref());
        Ok(())
    }
}

impl<D: Dialect + ?Sized> Walk<XmlNode> for XmlWalker<'_, D> {
    fn unit_text(&self, unit: &XmlNode) -> String {
        match unit {
            XmlNode::Element(el) if !self.dialect.is_opaque(el) => block_text(self.dialect, el),
            _ => String::new(),
        }
    }

    fn render_unit(&mut self, unit: &mut XmlNode, renderer: &mut Renderer<'_>, scope: &Scope<'_>) -> Result<()> {
        match unit {
            XmlNode::Element(el) => self.render_element(el, renderer, scope),
            _ => Ok(()),
        }
    }
}
