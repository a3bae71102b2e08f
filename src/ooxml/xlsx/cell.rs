//! Cell references.
//!
//! Only the row part of a reference ever changes when a template is rendered,
//! so these helpers split `B3` / `$B$3` into column and row and rebuild it.

/// Split a reference into its column part (with any `$` markers) and row.
///
/// ```
/// use office_templates::ooxml::xlsx::cell::split_reference;
///
/// assert_eq!(split_reference("AB12"), Some(("AB", 12)));
/// assert_eq!(split_reference("$C$7"), Some(("$C$", 7)));
/// assert_eq!(split_reference("C"), None);
/// ```
pub fn split_reference(reference: &str) -> Option<(&str, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (column, row) = reference.split_at(split);
    if !column.trim_matches('$').bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some((column, row.parse().ok()?))
}

/// The same reference on another row.
pub fn with_row(reference: &str, row: u32) -> Option<String> {
    let (column, _) = split_reference(reference)?;
    let mut out = String::with_capacity(column.len() + 7);
    out.push_str(column);
    out.push_str(itoa::Buffer::new().format(row));
    Some(out)
}

/// First and last row of a `A1:C4` range (or a single cell).
pub fn range_rows(range: &str) -> Option<(u32, u32)> {
    match range.split_once(':') {
        Some((start, end)) => Some((split_reference(start)?.1, split_reference(end)?.1)),
        None => split_reference(range).map(|(_, row)| (row, row)),
    }
}

/// Move a range to new first and last rows.
pub fn with_rows(range: &str, first: u32, last: u32) -> Option<String> {
    match range.split_once(':') {
        Some((start, end)) => Some(format!("{}:{}", with_row(start, first)?, with_row(end, last)?)),
        None => with_row(range, first),
    }
}
