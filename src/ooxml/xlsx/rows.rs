//! Row renumbering after a worksheet was rendered.
//!
//! Rendered rows still carry the `r` attribute of the template row they came
//! from. Renumbering assigns consecutive numbers in document order, keeping
//! blank gaps of the template while closing the space left by removed rows.

use crate::common::xml::{XmlElement, XmlNode};
use crate::ooxml::xlsx::cell::{range_rows, with_row, with_rows};
use std::collections::{BTreeSet, HashMap};

/// Row numbers present in a worksheet's `sheetData`.
pub fn template_rows(worksheet: &XmlElement) -> BTreeSet<u32> {
    let mut rows = BTreeSet::new();
    let mut last = 0;
    if let Some(sheet_data) = worksheet.child("sheetData") {
        for row in sheet_data.elements().filter(|el| el.is("row")) {
            last = row.attr("r").and_then(|r| r.parse().ok()).unwrap_or(last + 1);
            rows.insert(last);
        }
    }
    rows
}

/// Renumber rows and cell references, then fix the ranges that depend on
/// them. Returns the new numbers of every template row.
pub fn renumber(worksheet: &mut XmlElement, template: &BTreeSet<u32>) -> HashMap<u32, Vec<u32>> {
    let mut moved: HashMap<u32, Vec<u32>> = HashMap::new();
    let Some(sheet_data) = worksheet.child_mut("sheetData") else {
        return moved;
    };

    let (mut prev_template, mut prev_new) = (0u32, 0u32);
    for row in sheet_data.elements_mut().filter(|el| el.is("row")) {
        let origin = row
            .attr("r")
            .and_then(|r| r.parse().ok())
            .unwrap_or(prev_template + 1);
        let number = if origin > prev_template {
            let between = template.range(prev_template + 1..origin).count() as u32;
            let blanks = origin - prev_template - 1 - between;
            prev_template = origin;
            prev_new + 1 + blanks
        } else {
            prev_new + 1
        };
        prev_new = number;
        moved.entry(origin).or_default().push(number);

        if origin == number && row.attr("r").is_some() {
            continue;
        }
        row.set_attr("r", itoa::Buffer::new().format(number));
        for cell in row.elements_mut().filter(|el| el.is("c")) {
            if let Some(reference) = cell.attr("r").and_then(|r| with_row(r, number)) {
                cell.set_attr("r", reference);
            }
        }
    }

    let last = prev_new;
    if let Some(dimension) = worksheet.child_mut("dimension")
        && let Some(reference) = dimension.attr("ref")
        && let Some((first, _)) = range_rows(reference)
        && let Some(updated) = with_rows(reference, first.min(last.max(1)), last.max(1))
    {
        dimension.set_attr("ref", updated);
    }
    if let Some(merges) = worksheet.child_mut("mergeCells") {
        remap_merges(merges, &moved);
    }
    moved
}

/// Move merged ranges along with their rows.
fn remap_merges(merges: &mut XmlElement, moved: &HashMap<u32, Vec<u32>>) {
    let mut kept = Vec::new();
    for node in std::mem::take(&mut merges.children) {
        match node {
            XmlNode::Element(merge) => kept.extend(remap_merge(merge, moved).into_iter().map(XmlNode::Element)),
            other => kept.push(other),
        }
    }

    merges.children = kept;
    let count = merges.elements().count();
    if merges.attr("count").is_some() {
        merges.set_attr("count", itoa::Buffer::new().format(count));
    }
}

/// A single-row merge follows every copy of its row. A multi-row merge is
/// kept only when each of its rows was rendered exactly once and the rows
/// are still adjacent; otherwise it is dropped, as are merges over removed
/// rows.
fn remap_merge(merge: XmlElement, moved: &HashMap<u32, Vec<u32>>) -> Vec<XmlElement> {
    let Some(reference) = merge.attr("ref") else {
        return vec![merge];
    };
    let Some((first, last)) = range_rows(reference) else {
        return vec![merge];
    };

    let moved_to = |first: u32, last: u32| {
        with_rows(reference, first, last).map(|updated| {
            let mut copy = merge.clone();
            copy.set_attr("ref", updated);
            copy
        })
    };

    if first == last {
        return moved
            .get(&first)
            .into_iter()
            .flatten()
            .filter_map(|&row| moved_to(row, row))
            .collect();
    }

    let rows: Option<Vec<u32>> = (first..=last)
        .map(|row| match moved.get(&row).map(Vec::as_slice) {
            Some([single]) => Some(*single),
            _ => None,
        })
        .collect();
    match rows.as_deref() {
        Some(rows @ [new_first, .., new_last]) if rows_adjacent(rows) => {
            moved_to(*new_first, *new_last).into_iter().collect()
        },
        _ => Vec::new(),
    }
}

fn rows_adjacent(rows: &[u32]) -> bool {
    rows.windows(2).all(|pair| pair[1] == pair[0] + 1)
}
