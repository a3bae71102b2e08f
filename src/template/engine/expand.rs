//! Block expansion over a level of structural units.
//!
//! A level is an ordered list of units (slides, shapes, rows, paragraphs).
//! Units whose whole text is exactly one block tag are markers; the units
//! between a pair of markers are cloned per loop iteration or kept/dropped
//! per condition, and the markers themselves disappear.

use super::Renderer;
use crate::template::context::Scope;
use crate::template::error::Result;
use crate::template::scanner::scan;
use crate::template::token::{MarkerKind, Operation, Token};
use smallvec::SmallVec;
use tracing::debug;

/// Format-specific access to one level of units.
pub trait Walk<U> {
    /// Full text of a unit, used to recognize block markers.
    fn unit_text(&self, unit: &U) -> String;

    /// Render a unit that is not a marker.
    fn render_unit(&mut self, unit: &mut U, renderer: &mut Renderer<'_>, scope: &Scope<'_>) -> Result<()>;
}

/// Find the tag closing the block opened at `start`, and its top-level `else`.
///
/// On failure returns the index of the offending tag with a message.
pub(super) fn block_end(
    ops: &[Option<&Operation>],
    start: usize,
) -> std::result::Result<(Option<usize>, usize), (usize, &'static str)> {
    let mut stack: SmallVec<[&Operation; 4]> = SmallVec::new();
    let mut else_at = None;
    for (index, op) in ops.iter().enumerate().skip(start) {
        let Some(op) = *op else {
            continue;
        };
        match op {
            Operation::LoopStart { .. } | Operation::IfStart(_) => stack.push(op),
            Operation::Else => match stack.last() {
                Some(Operation::IfStart(_)) if stack.len() > 1 => {},
                Some(Operation::IfStart(_)) if else_at.is_none() => else_at = Some(index),
                Some(Operation::IfStart(_)) => return Err((index, "second 'else' in one 'if' block")),
                _ => return Err((index, "'else' outside an 'if' block")),
            },
            Operation::LoopEnd | Operation::IfEnd => {
                let Some(open) = stack.pop() else {
                    return Err((index, "closing tag without an opening tag"));
                };
                let pairs = matches!(
                    (open, op),
                    (Operation::LoopStart { .. }, Operation::LoopEnd) | (Operation::IfStart(_), Operation::IfEnd)
                );
                if !pairs {
                    return Err((index, "closing tag does not match the open block"));
                }
                if stack.is_empty() {
                    return Ok((else_at, index));
                }
            },
            Operation::Value(_) => {},
        }
    }
    Err((start, "block is never closed"))
}

impl Renderer<'_> {
    /// Recognize a unit whose whole text is one block tag.
    fn block_marker(&self, text: &str) -> Result<Option<Token>> {
        let trimmed = text.trim();
        if !trimmed.starts_with(self.markers.block_open.as_str())
            || !trimmed.ends_with(self.markers.block_close.as_str())
        {
            return Ok(None);
        }
        let Ok(found) = scan(trimmed, &self.markers) else {
            return Ok(None);
        };
        match found.as_slice() {
            [only] if only.kind == MarkerKind::Block && only.span == (0..trimmed.len()) => self
                .token(trimmed, &trimmed[only.inner.clone()], MarkerKind::Block)
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Expand block markers in `units` and render every surviving unit.
    ///
    /// On error the level is left holding what was rendered so far followed
    /// by the untouched remainder.
    pub fn expand<U, W>(&mut self, walker: &mut W, units: &mut Vec<U>, scope: &Scope<'_>) -> Result<()>
    where
        U: Clone,
        W: Walk<U> + ?Sized,
    {
        let markers = units
            .iter()
            .map(|unit| self.block_marker(&walker.unit_text(unit)))
            .collect::<Result<Vec<_>>>()?;

        if markers.iter().all(Option::is_none) {
            for unit in units.iter_mut() {
                walker.render_unit(unit, self, scope)?;
            }
            return Ok(());
        }

        let mut source: Vec<Option<U>> = std::mem::take(units).into_iter().map(Some).collect();
        let result = self.expand_marked(walker, &mut source, &markers, units, scope);
        if result.is_err() {
            units.extend(source.into_iter().flatten());
        }
        result
    }

    fn expand_marked<U, W>(
        &mut self,
        walker: &mut W,
        source: &mut [Option<U>],
        markers: &[Option<Token>],
        out: &mut Vec<U>,
        scope: &Scope<'_>,
    ) -> Result<()>
    where
        U: Clone,
        W: Walk<U> + ?Sized,
    {
        let ops: Vec<Option<&Operation>> = markers.iter().map(|m| m.as_ref().map(|t| &t.op)).collect();

        let mut i = 0;
        while i < source.len() {
            let Some(token) = &markers[i] else {
                if let Some(mut unit) = source[i].take() {
                    let result = walker.render_unit(&mut unit, self, scope);
                    out.push(unit);
                    result?;
                }
                i += 1;
                continue;
            };

            if !token.op.opens() {
                return Err(self.unmatched(&token.raw, "no opening tag at this level"));
            }
            let (else_at, end) = block_end(&ops, i).map_err(|(at, message)| {
                let raw = markers[at].as_ref().map_or("", |t| t.raw.as_str());
                self.unmatched(raw, message)
            })?;

            match &token.op {
                Operation::LoopStart { binding, iterable } => {
                    let frames = self.iterate(binding, iterable, &token.raw, scope)?;
                    let body: Vec<U> = source[i + 1..end].iter().flatten().cloned().collect();
                    debug!(
                        tag = %token.raw,
                        iterations = frames.len(),
                        units = body.len(),
                        location = %self.location,
                        "expanding loop"
                    );
                    let length = frames.len();
                    for (index, frame) in frames.into_iter().enumerate() {
                        let mut child = scope.child();
                        Self::bind_frame(&mut child, frame, index, length);
                        let mut clone = body.clone();
                        let result = self.iteration(binding, index, |this| this.expand(&mut *walker, &mut clone, &child));
                        out.extend(clone);
                        result?;
                    }
                },
                Operation::IfStart(cond) => {
                    let keep = self.condition(cond, &token.raw, scope)?;
                    let branch = match (keep, else_at) {
                        (true, Some(at)) => i + 1..at,
                        (true, None) => i + 1..end,
                        (false, Some(at)) => at + 1..end,
                        (false, None) => end..end,
                    };
                    debug!(tag = %token.raw, keep, location = %self.location, "resolving condition");
                    let mut kept: Vec<U> = source[branch].iter_mut().filter_map(Option::take).collect();
                    let result = self.expand(walker, &mut kept, scope);
                    out.extend(kept);
                    result?;
                },
                _ => return Err(self.unmatched(&token.raw, "no opening tag at this level")),
            }

            for slot in &mut source[i..=end] {
                *slot = None;
            }
            i = end + 1;
        }
        Ok(())
    }
}
