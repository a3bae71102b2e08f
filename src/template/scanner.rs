//! Marker scanning over text split into runs.
//!
//! Formatting boundaries split a paragraph's text into several units, and a
//! single placeholder may straddle them. [`VirtualText`] concatenates the
//! units and maps offsets back; [`scan`] finds marker pairs in the result.

use super::token::MarkerKind;
use memchr::memmem::Finder;
use std::ops::Range;
use thiserror::Error;

/// Marker strings for value placeholders and block tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub value_open: String,
    pub value_close: String,
    pub block_open: String,
    pub block_close: String,
}

impl Markers {
    /// Derive block markers from the value markers: `{{`/`}}` with `%` gives `{%`/`%}`.
    pub fn new(open: &str, close: &str, prefix: char) -> Self {
        let mut block_open = String::new();
        block_open.extend(open.chars().next());
        block_open.push(prefix);

        let mut block_close = String::new();
        block_close.push(prefix);
        block_close.extend(close.chars().next_back());

        Self {
            value_open: open.to_string(),
            value_close: close.to_string(),
            block_open,
            block_close,
        }
    }

    fn open(&self, kind: MarkerKind) -> &str {
        match kind {
            MarkerKind::Value => &self.value_open,
            MarkerKind::Block => &self.block_open,
        }
    }

    fn close(&self, kind: MarkerKind) -> &str {
        match kind {
            MarkerKind::Value => &self.value_close,
            MarkerKind::Block => &self.block_close,
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new("{{", "}}", '%')
    }
}

/// Scanning failures; both are fatal template errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("opening marker without a closing marker: '{0}'")]
    Unclosed(String),
    #[error("placeholder opened inside another placeholder: '{0}'")]
    Nested(String),
}

/// One marker pair found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub kind: MarkerKind,
    /// From the first byte of the opening marker to the end of the closing one.
    pub span: Range<usize>,
    /// Text between the markers.
    pub inner: Range<usize>,
}

/// Concatenated text of a sequence of units.
#[derive(Debug, Clone, Default)]
pub struct VirtualText {
    text: String,
    /// Byte offset at which each unit starts; sorted, possibly with repeats
    /// for empty units.
    starts: Vec<usize>,
}

impl VirtualText {
    pub fn new<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        let mut starts = Vec::new();
        for unit in units {
            starts.push(text.len());
            text.push_str(unit.as_ref());
        }
        Self { text, starts }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn unit_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte range covered by unit `index`.
    pub fn unit_range(&self, index: usize) -> Range<usize> {
        let start = self.starts[index];
        let end = self.starts.get(index + 1).copied().unwrap_or(self.text.len());
        start..end
    }

    /// Map a byte offset to `(unit, offset within unit)`.
    ///
    /// Offsets are attributed to the last unit starting at or before them, so
    /// empty units never receive a position that a later unit also covers.
    pub fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let unit = self.starts.partition_point(|&start| start <= offset).checked_sub(1)?;
        Some((unit, offset - self.starts[unit]))
    }

    /// Units touched by a non-empty byte span.
    pub fn units_spanned(&self, span: &Range<usize>) -> Option<Range<usize>> {
        if span.is_empty() {
            return None;
        }
        let (first, _) = self.locate(span.start)?;
        let (last, _) = self.locate(span.end - 1)?;
        Some(first..last + 1)
    }
}

fn excerpt(text: &str, start: usize) -> String {
    let rest = &text[start..];
    match rest.char_indices().nth(40) {
        Some((cut, _)) => format!("{}...", &rest[..cut]),
        None => rest.to_string(),
    }
}

/// Find all marker pairs, left to right and non-overlapping.
///
/// Closing markers with no opener are left as literal text.
pub fn scan(text: &str, markers: &Markers) -> Result<Vec<RawMatch>, ScanError> {
    if markers.value_open.is_empty() || markers.value_close.is_empty() {
        return Ok(Vec::new());
    }
    let value_open = Finder::new(markers.value_open.as_bytes());
    let block_open = Finder::new(markers.block_open.as_bytes());
    let bytes = text.as_bytes();

    let next_open = |from: usize| -> Option<(usize, MarkerKind)> {
        let haystack = bytes.get(from..)?;
        let value = value_open.find(haystack).map(|i| i + from);
        let block = block_open.find(haystack).map(|i| i + from);
        match (value, block) {
            (Some(v), Some(b)) if b < v => Some((b, MarkerKind::Block)),
            // on a tie the longer opener wins
            (Some(v), Some(b)) if b == v && markers.block_open.len() > markers.value_open.len() => {
                Some((b, MarkerKind::Block))
            },
            (Some(v), _) => Some((v, MarkerKind::Value)),
            (None, Some(b)) => Some((b, MarkerKind::Block)),
            (None, None) => None,
        }
    };

    let mut matches = Vec::new();
    let mut pos = 0;
    while let Some((start, kind)) = next_open(pos) {
        let inner_start = start + markers.open(kind).len();
        let close = markers.close(kind);
        let Some(close_at) = Finder::new(close.as_bytes())
            .find(&bytes[inner_start..])
            .map(|i| i + inner_start)
        else {
            return Err(ScanError::Unclosed(excerpt(text, start)));
        };
        if let Some((nested, _)) = next_open(inner_start)
            && nested < close_at
        {
            return Err(ScanError::Nested(excerpt(text, start)));
        }
        let end = close_at + close.len();
        matches.push(RawMatch {
            kind,
            span: start..end,
            inner: inner_start..close_at,
        });
        pos = end;
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_block_markers_derive_from_value_markers() {
        let markers = Markers::new("<<", ">>", '#');
        assert_eq!(markers.block_open, "<#");
        assert_eq!(markers.block_close, "#>");
        assert_eq!(Markers::default().block_open, "{%");
    }

    #[test]
    fn test_scan_split_placeholder() {
        let vt = VirtualText::new(["Hello {", "{ user.na", "me }}", "!"]);
        assert_eq!(vt.as_str(), "Hello {{ user.name }}!");
        let found = scan(vt.as_str(), &Markers::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, MarkerKind::Value);
        assert_eq!(&vt.as_str()[found[0].inner.clone()], " user.name ");
        assert_eq!(vt.units_spanned(&found[0].span), Some(0..3));
        assert_eq!(vt.locate(found[0].span.start), Some((0, 6)));
    }

    #[test]
    fn test_scan_mixed_markers() {
        let text = "{% for x in xs %}{{ x }},{% endfor %} }} stray";
        let found = scan(text, &Markers::default()).unwrap();
        let kinds: Vec<_> = found.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, [MarkerKind::Block, MarkerKind::Value, MarkerKind::Block]);
        assert_eq!(&text[found[2].span.clone()], "{% endfor %}");
    }

    #[test]
    fn test_scan_errors() {
        let markers = Markers::default();
        assert!(matches!(scan("a {{ b", &markers), Err(ScanError::Unclosed(_))));
        assert!(matches!(scan("{{ a {{ b }} }}", &markers), Err(ScanError::Nested(_))));
        assert!(matches!(scan("{{ a {% if %} }}", &markers), Err(ScanError::Nested(_))));
        assert!(matches!(scan("{% if x", &markers), Err(ScanError::Unclosed(_))));
    }

    #[test]
    fn test_locate_skips_empty_units() {
        let vt = VirtualText::new(["ab", "", "cd"]);
        assert_eq!(vt.locate(1), Some((0, 1)));
        assert_eq!(vt.locate(2), Some((2, 0)));
        assert_eq!(vt.unit_range(1), 2..2);
        assert_eq!(vt.units_spanned(&(1..3)), Some(0..3));
        assert_eq!(VirtualText::new(Vec::<&str>::new()).locate(0), None);
    }

    proptest! {
        #[test]
        fn prop_locate_inverts_concatenation(units in prop::collection::vec("[a-z ]{0,6}", 1..8)) {
            let vt = VirtualText::new(&units);
            for offset in 0..vt.as_str().len() {
                let (unit, within) = vt.locate(offset).unwrap();
                prop_assert_eq!(
                    units[unit].as_bytes()[within],
                    vt.as_str().as_bytes()[offset]
                );
            }
        }

        #[test]
        fn prop_text_without_markers_has_no_matches(text in "[^{}%]{0,64}") {
            prop_assert!(scan(&text, &Markers::default()).unwrap().is_empty());
        }

        #[test]
        fn prop_each_placeholder_is_found(words in prop::collection::vec("[a-z]{1,8}", 0..6)) {
            let text: String = words.iter().map(|w| format!("{{{{ {} }}}} ", w)).collect();
            let found = scan(&text, &Markers::default()).unwrap();
            prop_assert_eq!(found.len(), words.len());
            for (m, word) in found.iter().zip(&words) {
                prop_assert_eq!(text[m.inner.clone()].trim(), word.as_str());
            }
        }
    }
}
