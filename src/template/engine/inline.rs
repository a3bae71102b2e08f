//! Placeholder substitution inside one text block (paragraph or cell).

use super::Renderer;
use super::expand::block_end;
use crate::template::context::Scope;
use crate::template::error::Result;
use crate::template::scanner::{RawMatch, VirtualText, scan};
use crate::template::token::{MarkerKind, Operation, Token};
use crate::template::value::Value;
use std::ops::Range;
use tracing::{debug, trace};

/// Rendered text of a block's units.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    /// New text for every unit, in the order given.
    pub texts: Vec<String>,
    /// Units that held part of a placeholder and are now empty.
    pub emptied: Vec<usize>,
    /// Value of a block whose whole text was a single value placeholder.
    pub sole: Option<Value>,
}

#[derive(Debug)]
struct Edit {
    span: Range<usize>,
    text: String,
    value: Option<Value>,
}

impl Renderer<'_> {
    /// Render the placeholders of a text block split into units.
    ///
    /// Returns `None` when the block contains no placeholder. Each
    /// placeholder's output is written into the first unit it touches; the
    /// rest of its span is cut from the following units.
    pub fn render_text<S: AsRef<str>>(&mut self, units: &[S], scope: &Scope<'_>) -> Result<Option<TextOutcome>> {
        let vt = VirtualText::new(units);
        let text = vt.as_str();
        let matches = scan(text, &self.markers).map_err(|err| self.scan_error(err))?;
        if matches.is_empty() {
            return Ok(None);
        }

        let edits = self.plan(text, &matches, scope)?;

        let sole = match (matches.as_slice(), edits.as_slice()) {
            ([only], [edit]) if only.kind == MarkerKind::Value && &text[only.span.clone()] == text.trim() => {
                edit.value.clone()
            },
            _ => None,
        };

        let mut texts: Vec<String> = units.iter().map(|u| u.as_ref().to_string()).collect();
        let mut touched = vec![false; texts.len()];
        for edit in edits.iter().rev() {
            let Some(spanned) = vt.units_spanned(&edit.span) else {
                continue;
            };
            let (first, last) = (spanned.start, spanned.end - 1);
            for flag in &mut touched[spanned] {
                *flag = true;
            }

            let first_start = vt.unit_range(first).start;
            let local_start = edit.span.start - first_start;
            if first == last {
                texts[first].replace_range(local_start..edit.span.end - first_start, &edit.text);
            } else {
                let last_start = vt.unit_range(last).start;
                texts[last].replace_range(..edit.span.end - last_start, "");
                for middle in &mut texts[first + 1..last] {
                    middle.clear();
                }
                texts[first].replace_range(local_start.., &edit.text);
            }
        }

        let emptied = (0..texts.len())
            .filter(|&i| touched[i] && texts[i].is_empty() && !units[i].as_ref().is_empty())
            .collect();
        Ok(Some(TextOutcome { texts, emptied, sole }))
    }

    /// Render placeholders in a plain string.
    pub fn render_string(&mut self, text: &str, scope: &Scope<'_>) -> Result<String> {
        let matches = scan(text, &self.markers).map_err(|err| self.scan_error(err))?;
        if matches.is_empty() {
            return Ok(text.to_string());
        }
        let edits = self.plan(text, &matches, scope)?;
        let mut out = text.to_string();
        for edit in edits.iter().rev() {
            out.replace_range(edit.span.clone(), &edit.text);
        }
        Ok(out)
    }

    /// Work out the replacement for every top-level placeholder.
    fn plan(&mut self, text: &str, matches: &[RawMatch], scope: &Scope<'_>) -> Result<Vec<Edit>> {
        let tokens = matches
            .iter()
            .map(|m| self.token(&text[m.span.clone()], &text[m.inner.clone()], m.kind))
            .collect::<Result<Vec<Token>>>()?;
        let ops: Vec<Option<&Operation>> = tokens.iter().map(|t| Some(&t.op)).collect();
        let options = self.options;
        let delimiter = options.list_delimiter.as_str();

        let mut edits = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if let Operation::Value(expr) = &token.op {
                let value = self.evaluate(expr, &token.raw, scope)?;
                let rendered = value
                    .as_ref()
                    .map(|v| v.to_text_with(delimiter))
                    .unwrap_or_default();
                trace!(raw = %token.raw, value = %rendered, "substituted");
                edits.push(Edit {
                    span: matches[i].span.clone(),
                    text: rendered,
                    value,
                });
                i += 1;
                continue;
            }

            if !token.op.opens() {
                return Err(self.unmatched(&token.raw, "no opening tag in this text block"));
            }
            let (else_at, end) = block_end(&ops, i).map_err(|(at, message)| self.unmatched(&tokens[at].raw, message))?;
            let between = |from: usize, to: usize| &text[matches[from].span.end..matches[to].span.start];

            let rendered = match &token.op {
                Operation::LoopStart { binding, iterable } => {
                    let frames = self.iterate(binding, iterable, &token.raw, scope)?;
                    debug!(tag = %token.raw, iterations = frames.len(), "expanding inline loop");
                    let body = between(i, end);
                    let length = frames.len();
                    let mut out = String::new();
                    for (index, frame) in frames.into_iter().enumerate() {
                        let mut child = scope.child();
                        Self::bind_frame(&mut child, frame, index, length);
                        if let Some(piece) = self.iteration(binding, index, |this| this.render_string(body, &child))? {
                            out.push_str(&piece);
                        }
                    }
                    out
                },
                Operation::IfStart(cond) => {
                    let keep = self.condition(cond, &token.raw, scope)?;
                    match (keep, else_at) {
                        (true, Some(at)) => self.render_string(between(i, at), scope)?,
                        (true, None) => self.render_string(between(i, end), scope)?,
                        (false, Some(at)) => self.render_string(between(at, end), scope)?,
                        (false, None) => String::new(),
                    }
                },
                _ => return Err(self.unmatched(&token.raw, "no opening tag in this text block")),
            };

            edits.push(Edit {
                span: matches[i].span.start..matches[end].span.end,
                text: rendered,
                value: None,
            });
            i = end + 1;
        }
        Ok(edits)
    }
}
