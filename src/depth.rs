//! Template-depth analysis
//!
//! Templates are peeled off one at a time, always taking the last opening
//! `{{` together with the first `}}` that closes it. The peeled region is
//! masked with `-` so offsets stay valid for the next round, and the extracted
//! ranges are then scanned for containment chains.

use std::ops::Range;

/// Extract template ranges innermost-first.
///
/// The returned ranges are in extraction order: an enclosing template always
/// comes after the ones nested inside it.
pub fn template_ranges(text: &str) -> Vec<Range<usize>> {
    let mut buf: Vec<u8> = text.as_bytes().to_vec();
    let mut ranges = Vec::new();

    while let Some(range) = next_innermost(&buf) {
        for b in &mut buf[range.clone()] {
            *b = b'-';
        }
        ranges.push(range);
    }

    ranges
}

/// Locate the last `{{` and the first `}}` after at least one body byte.
fn next_innermost(buf: &[u8]) -> Option<Range<usize>> {
    let last = buf.windows(2).rposition(|w| w == b"{{")?;

    // "{{{" counts as an opening at the leftmost brace pair
    let start = if last > 0 && buf[last - 1] == b'{' {
        last - 1
    } else {
        last
    };

    let body_start = start + 3;
    if body_start > buf.len() {
        return None;
    }

    let close = buf[body_start..].windows(2).position(|w| w == b"}}")?;
    Some(start..body_start + close + 2)
}

/// Maximum template nesting depth of `text`.
///
/// A range that contains the previously extracted one extends the current
/// chain; any other range starts a new chain at depth 1. Sibling templates
/// nested inside a common parent therefore only count the last sibling.
///
/// # Arguments
///
/// * `text` - Raw page text
///
/// # Returns
///
/// `0` when the text contains no template at all.
pub fn max_template_depth(text: &str) -> usize {
    let mut previous: Option<Range<usize>> = None;
    let mut current = 1usize;
    let mut max = 0usize;

    for range in template_ranges(text) {
        match &previous {
            Some(prev) if range.start <= prev.start && prev.end <= range.end => current += 1,
            _ => current = 1,
        }

        max = max.max(current);
        previous = Some(range);
    }

    max
}

/// Non-overlapping occurrence count of `needle`.
pub fn count_matches(text: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    text.matches(needle).count()
}

/// True when `open` and `close` occur a different number of times.
pub fn has_unpaired_delimiters(text: &str, open: &str, close: &str) -> bool {
    count_matches(text, open) != count_matches(text, close)
}
