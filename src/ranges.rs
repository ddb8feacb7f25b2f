//! Ignored-region scanner
//!
//! Pattern-driven rewrites must never touch text inside comments, `<nowiki>`,
//! `<pre>` and `<code>` bodies, or (for some passes) inside templates, wikitables
//! and references. This module computes those regions as half-open byte ranges
//! and offers replacement helpers that skip any match starting inside them.
//!
//! All offsets are byte offsets into the scanned `&str`; delimiters are ASCII,
//! so every reported boundary falls on a char boundary.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static P_TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t").expect("valid regex"));
static P_MULTISPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));
static P_SPACE_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r" \n").expect("valid regex"));

/// Find balanced, top-level `open`…`close` regions.
///
/// Delimiters met while already inside a region count as nesting and are not
/// reported separately. A region left unclosed at the end of the text is dropped.
pub fn find_ranges(text: &str, open: &str, close: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let (open, close) = (open.as_bytes(), close.as_bytes());
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i..].starts_with(open) {
            if depth == 0 {
                start = i;
            }
            depth += 1;
            i += open.len();
        } else if depth > 0 && bytes[i..].starts_with(close) {
            depth -= 1;
            i += close.len();
            if depth == 0 {
                ranges.push(start..i);
            }
        } else {
            i += 1;
        }
    }

    ranges
}

/// Find non-nesting `open`…`close` regions (the first `close` ends the region).
///
/// With `lazy`, an opening delimiter that is never closed extends its region to
/// the end of the text; otherwise scanning stops there.
pub fn find_flat_ranges(text: &str, open: &str, close: &str, lazy: bool) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut from = 0usize;

    while let Some(offset) = text[from..].find(open) {
        let start = from + offset;

        match text[start + open.len()..].find(close) {
            Some(end_offset) => {
                let end = start + open.len() + end_offset + close.len();
                ranges.push(start..end);
                from = end;
            }
            None => {
                if lazy {
                    ranges.push(start..text.len());
                }
                break;
            }
        }
    }

    ranges
}

/// One range per match of `re`.
pub fn find_pattern_ranges(text: &str, re: &Regex) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.range()).collect()
}

/// Opening and closing patterns of an HTML-like tag, compiled once.
pub struct TagPattern {
    open: Regex,
    close: Regex,
}

impl TagPattern {
    /// Case-insensitive patterns for `<tag …>` and `</tag>`.
    pub fn new(tag: &str) -> Self {
        let tag = regex::escape(tag);
        TagPattern {
            open: Regex::new(&format!(r"(?i)<{}\b[^>]*>", tag)).expect("valid regex"),
            close: Regex::new(&format!(r"(?i)</{}\s*>", tag)).expect("valid regex"),
        }
    }
}

pub static NOWIKI: Lazy<TagPattern> = Lazy::new(|| TagPattern::new("nowiki"));
pub static PRE: Lazy<TagPattern> = Lazy::new(|| TagPattern::new("pre"));
pub static CODE: Lazy<TagPattern> = Lazy::new(|| TagPattern::new("code"));
pub static REF: Lazy<TagPattern> = Lazy::new(|| TagPattern::new("ref"));

/// Find `<tag …>…</tag>` regions, skipping self-closing tags.
pub fn find_tag_ranges(text: &str, tag: &TagPattern) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();

    if !text.contains('<') {
        return ranges;
    }

    let mut from = 0usize;

    while let Some(open) = tag.open.find_at(text, from) {
        if open.as_str().trim_end_matches('>').trim_end().ends_with('/') {
            from = open.end();
            continue;
        }

        match tag.close.find_at(text, open.end()) {
            Some(close) => {
                ranges.push(open.start()..close.end());
                from = close.end();
            }
            None => break,
        }
    }

    ranges
}

/// Union of comments (lazy), `<nowiki>`, `<pre>` and `<code>` bodies.
pub fn standard_ignored_ranges(text: &str) -> Vec<Range<usize>> {
    combine_ranges(vec![
        find_flat_ranges(text, "<!--", "-->", true),
        find_tag_ranges(text, &NOWIKI),
        find_tag_ranges(text, &PRE),
        find_tag_ranges(text, &CODE),
    ])
}

/// Standard ranges plus templates, wikitables and `<ref>` bodies.
pub fn markup_ranges(text: &str) -> Vec<Range<usize>> {
    combine_ranges(vec![
        standard_ignored_ranges(text),
        find_ranges(text, "{{", "}}"),
        find_ranges(text, "{|", "|}"),
        find_tag_ranges(text, &REF),
    ])
}

/// Merge several range lists into one sorted list, dropping ranges that
/// overlap an earlier (already kept) one.
pub fn combine_ranges(lists: Vec<Vec<Range<usize>>>) -> Vec<Range<usize>> {
    let mut all: Vec<Range<usize>> = lists.into_iter().flatten().collect();
    all.sort_by_key(|r| (r.start, std::cmp::Reverse(r.end)));

    let mut combined: Vec<Range<usize>> = Vec::with_capacity(all.len());

    for range in all {
        match combined.last_mut() {
            Some(last) if range.start < last.end => {
                if range.end > last.end {
                    last.end = range.end;
                }
            }
            _ => combined.push(range),
        }
    }

    combined
}

pub fn contained_in_ranges(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

/// Replace every match of `re` whose start lies outside `ranges`.
///
/// The replacer may return `None` to keep a match verbatim.
pub fn replace_with_ignored_ranges<F>(
    text: &str,
    re: &Regex,
    ranges: &[Range<usize>],
    replacer: F,
) -> String
where
    F: FnMut(&Captures) -> Option<String>,
{
    replace_with_ignored_ranges_at(text, re, ranges, |caps| caps.get(0).map_or(0, |m| m.start()), replacer)
}

/// Like [`replace_with_ignored_ranges`], with a custom check position per match
/// (e.g. the start of a capture group instead of the whole match).
pub fn replace_with_ignored_ranges_at<P, F>(
    text: &str,
    re: &Regex,
    ranges: &[Range<usize>],
    position: P,
    mut replacer: F,
) -> String
where
    P: Fn(&Captures) -> usize,
    F: FnMut(&Captures) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };

        if contained_in_ranges(ranges, position(&caps)) {
            continue;
        }

        if let Some(replacement) = replacer(&caps) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&replacement);
            last = m.end();
        }
    }

    out.push_str(&text[last..]);
    out
}

pub fn replace_with_standard_ignored_ranges<F>(text: &str, re: &Regex, replacer: F) -> String
where
    F: FnMut(&Captures) -> Option<String>,
{
    let ranges = standard_ignored_ranges(text);
    replace_with_ignored_ranges(text, re, &ranges, replacer)
}

/// Replace all matches outside the standard ignored ranges with a template
/// string using `$1` / `${name}` group references.
pub fn replace_all_outside(text: &str, re: &Regex, replacement: &str) -> String {
    replace_with_standard_ignored_ranges(text, re, |caps| {
        let mut dst = String::new();
        caps.expand(replacement, &mut dst);
        Some(dst)
    })
}

/// First occurrence of `target` at or after `from` that does not start inside
/// a comment or `<nowiki>` region.
pub fn index_of_ignoring_ranges(text: &str, target: &str, from: usize) -> Option<usize> {
    let ranges = combine_ranges(vec![
        find_flat_ranges(text, "<!--", "-->", true),
        find_tag_ranges(text, &NOWIKI),
    ]);
    let mut from = from;

    while from <= text.len() {
        let index = from + text[from..].find(target)?;

        if !contained_in_ranges(&ranges, index) {
            return Some(index);
        }

        from = index + target.len().max(1);
    }

    None
}

/// Remove comments and `<nowiki>` regions altogether.
pub fn strip_comments_and_nowiki(text: &str) -> String {
    let ranges = combine_ranges(vec![
        find_flat_ranges(text, "<!--", "-->", true),
        find_tag_ranges(text, &NOWIKI),
    ]);

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for range in ranges {
        out.push_str(&text[last..range.start]);
        last = range.end;
    }

    out.push_str(&text[last..]);
    out
}

/// Tabs become spaces, runs of spaces collapse, spaces before a newline are
/// dropped. Ignored regions are left as they are.
pub fn sanitize_whitespaces(text: &str) -> String {
    let text = replace_all_outside(text, &P_TAB, " ");
    let text = replace_all_outside(&text, &P_MULTISPACE, " ");
    replace_all_outside(&text, &P_SPACE_NEWLINE, "\n")
}
