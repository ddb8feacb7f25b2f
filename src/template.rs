//! Template invocations: locating, parsing and re-serializing `{{name|…}}`.
//!
//! Parsing is lossless: names, keys and values keep their original spacing so
//! that an untouched template serializes back byte for byte. Lookups compare
//! trimmed keys and names.

use std::fmt;
use std::ops::Range;

use crate::ranges::{combine_ranges, contained_in_ranges, find_flat_ranges, find_ranges, find_tag_ranges, NOWIKI};

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Unnamed parameter with its 1-based position
    Positional { index: usize, value: String },
    /// `key=value` parameter
    Named { key: String, value: String },
}

impl Param {
    pub fn value(&self) -> &str {
        match self {
            Param::Positional { value, .. } | Param::Named { value, .. } => value,
        }
    }

    /// True when the parameter answers to `key` ("2" matches the second
    /// positional parameter as well as an explicit `2=`).
    pub fn answers_to(&self, key: &str) -> bool {
        let key = key.trim();
        match self {
            Param::Positional { index, .. } => key.parse::<usize>().is_ok_and(|n| n == *index),
            Param::Named { key: k, .. } => k.trim() == key,
        }
    }
}

/// A parsed template invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Raw name, spacing preserved
    pub name: String,
    pub params: Vec<Param>,
}

/// Scanner over the body of a single template invocation.
///
/// Splits on `|` and `=` only at the top level: nested templates, links,
/// comments and `<nowiki>` regions are kept whole.
struct TemplateParser<'a> {
    input: &'a str,
    position: usize,
    ignored: Vec<Range<usize>>,
}

impl<'a> TemplateParser<'a> {
    fn new(input: &'a str) -> Self {
        let ignored = combine_ranges(vec![
            find_flat_ranges(input, "<!--", "-->", true),
            find_tag_ranges(input, &NOWIKI),
        ]);
        TemplateParser {
            input,
            position: 0,
            ignored,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    /// Consumes the current byte and advances the position.
    fn consume(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.position += 1;
        }
        b
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input.as_bytes()[self.position..].starts_with(s.as_bytes())
    }

    /// Read up to the next top-level `stop` byte (or end of input).
    fn parse_balanced_text(&mut self, stops: &[u8]) -> &'a str {
        let start = self.position;
        let mut depth = 0usize;

        while let Some(b) = self.peek() {
            if contained_in_ranges(&self.ignored, self.position) {
                self.consume();
                continue;
            }

            if self.starts_with("{{") || self.starts_with("[[") {
                depth += 1;
                self.position += 2;
                continue;
            }

            if depth > 0 && (self.starts_with("}}") || self.starts_with("]]")) {
                depth -= 1;
                self.position += 2;
                continue;
            }

            if depth == 0 && stops.contains(&b) {
                break;
            }

            self.consume();
        }

        &self.input[start..self.position]
    }

    fn parse(mut self) -> Template {
        let name = self.parse_balanced_text(b"|").to_string();
        let mut params = Vec::new();
        let mut index = 1usize;

        while self.peek() == Some(b'|') {
            self.consume(); // Consume '|'

            let part = self.parse_balanced_text(b"|=");
            if self.peek() == Some(b'=') {
                self.consume(); // Consume '='
                let value = self.parse_balanced_text(b"|");
                params.push(Param::Named {
                    key: part.to_string(),
                    value: value.to_string(),
                });
            } else {
                params.push(Param::Positional {
                    index,
                    value: part.to_string(),
                });
                index += 1;
            }
        }

        Template { name, params }
    }
}

impl Template {
    pub fn new(name: &str) -> Self {
        Template {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    /// Parse a complete invocation. The text must start with `{{` and end with
    /// the matching `}}`.
    pub fn parse(text: &str) -> Option<Template> {
        if text.len() < 4 || !text.starts_with("{{") || !text.ends_with("}}") {
            return None;
        }

        let spans = find_ranges(text, "{{", "}}");
        if spans.first() != Some(&(0..text.len())) {
            return None;
        }

        Some(TemplateParser::new(&text[2..text.len() - 2]).parse())
    }

    /// Trimmed name.
    pub fn name(&self) -> &str {
        self.name.trim()
    }

    pub fn is_named(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Trimmed value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.answers_to(key))
            .map(|p| p.value().trim())
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.iter().any(|p| p.answers_to(key))
    }

    pub fn positional_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| matches!(p, Param::Positional { .. }))
            .count()
    }

    /// Set a named parameter, replacing the value in place or appending it.
    pub fn set_named(&mut self, key: &str, value: &str) {
        match self.params.iter_mut().find(|p| p.answers_to(key)) {
            Some(Param::Named { value: v, .. }) | Some(Param::Positional { value: v, .. }) => {
                *v = value.to_string();
            }
            None => self.params.push(Param::Named {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Insert a named parameter right after the template name (or update it in
    /// place when already present).
    pub fn insert_named_first(&mut self, key: &str, value: &str) {
        if self.has(key) {
            self.set_named(key, value);
        } else {
            self.params.insert(
                0,
                Param::Named {
                    key: key.to_string(),
                    value: value.to_string(),
                },
            );
        }
    }

    /// Set the `n`-th positional parameter.
    ///
    /// Missing positional parameters before `n` are filled with empty values.
    pub fn set_positional(&mut self, n: usize, value: &str) {
        if n == 0 {
            return;
        }

        if let Some(param) = self.params.iter_mut().find(|p| p.answers_to(&n.to_string())) {
            match param {
                Param::Positional { value: v, .. } | Param::Named { value: v, .. } => {
                    *v = value.to_string();
                }
            }
            return;
        }

        let mut count = self.positional_count();
        while count + 1 < n {
            count += 1;
            self.params.push(Param::Positional {
                index: count,
                value: String::new(),
            });
        }

        self.params.push(Param::Positional {
            index: n,
            value: value.to_string(),
        });
    }

    /// Remove a parameter. Removing a positional parameter renumbers the
    /// following ones.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(pos) = self.params.iter().position(|p| p.answers_to(key)) else {
            return false;
        };

        let removed = self.params.remove(pos);
        if let Param::Positional { index: removed_index, .. } = removed {
            for param in &mut self.params {
                if let Param::Positional { index, .. } = param {
                    if *index > removed_index {
                        *index -= 1;
                    }
                }
            }
        }

        true
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}", self.name)?;
        for param in &self.params {
            match param {
                Param::Positional { value, .. } => write!(f, "|{}", value)?,
                Param::Named { key, value } => write!(f, "|{}={}", key, value)?,
            }
        }
        write!(f, "}}}}")
    }
}

/// Canonical comparison form of a template name: trimmed, underscores as
/// spaces, runs of spaces collapsed and the first letter lowercased.
pub fn normalize_name(name: &str) -> String {
    let spaced = name.trim().replace('_', " ");
    let collapsed = spaced.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Spans of every template invocation outside comments and `<nowiki>`,
/// nested ones included, ordered by start offset.
pub fn find_template_spans(text: &str) -> Vec<Range<usize>> {
    let ignored = combine_ranges(vec![
        find_flat_ranges(text, "<!--", "-->", true),
        find_tag_ranges(text, &NOWIKI),
    ]);

    let mut spans = Vec::new();
    collect_spans(text, 0, &ignored, &mut spans);
    spans.sort_by_key(|r| r.start);
    spans
}

fn collect_spans(text: &str, offset: usize, ignored: &[Range<usize>], out: &mut Vec<Range<usize>>) {
    for span in find_ranges(text, "{{", "}}") {
        let absolute = offset + span.start..offset + span.end;
        if contained_in_ranges(ignored, absolute.start) {
            continue;
        }

        // Skip triple-brace parameter references
        if text[span.start..].starts_with("{{{") && text[span.end..].starts_with('}') {
            continue;
        }

        out.push(absolute);

        let inner = span.start + 2..span.end - 2;
        collect_spans(&text[inner.clone()], offset + inner.start, ignored, out);
    }
}

/// Every invocation of `name` in `text`, with its span.
pub fn find_templates(name: &str, text: &str) -> Vec<(Range<usize>, Template)> {
    find_template_spans(text)
        .into_iter()
        .filter_map(|span| {
            let template = Template::parse(&text[span.clone()])?;
            template.is_named(name).then_some((span, template))
        })
        .collect()
}

/// Rewrite every invocation for which `filter` holds.
///
/// The closure returns the replacement text, or `None` to keep the
/// invocation. Invocations nested inside a replaced one are not visited.
pub fn replace_templates<F, R>(text: &str, filter: F, mut replacer: R) -> String
where
    F: Fn(&Template) -> bool,
    R: FnMut(&Template) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for span in find_template_spans(text) {
        if span.start < last {
            continue;
        }

        let Some(template) = Template::parse(&text[span.clone()]) else {
            continue;
        };

        if !filter(&template) {
            continue;
        }

        if let Some(replacement) = replacer(&template) {
            out.push_str(&text[last..span.start]);
            out.push_str(&replacement);
            last = span.end;
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Rewrite every invocation named `name`.
pub fn replace_named_templates<R>(text: &str, name: &str, replacer: R) -> String
where
    R: FnMut(&Template) -> Option<String>,
{
    replace_templates(text, |t| t.is_named(name), replacer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positional_and_named() {
        let template = Template::parse("{{etimología|leng=en|sufijo|-ness}}").unwrap();
        assert_eq!(template.name(), "etimología");
        assert_eq!(template.get("leng"), Some("en"));
        assert_eq!(template.get("1"), Some("sufijo"));
        assert_eq!(template.get("2"), Some("-ness"));
        assert_eq!(template.positional_count(), 2);
    }

    #[test]
    fn test_parse_keeps_nested_markup() {
        let template = Template::parse("{{a|[[b|c]]|d={{e|f=g}}}}").unwrap();
        assert_eq!(template.get("1"), Some("[[b|c]]"));
        assert_eq!(template.get("d"), Some("{{e|f=g}}"));
    }

    #[test]
    fn test_lossless_roundtrip() {
        let text = "{{ lengua | es | escritura = latina }}";
        let template = Template::parse(text).unwrap();
        assert_eq!(template.to_string(), text);
        assert_eq!(template.get("escritura"), Some("latina"));
    }

    #[test]
    fn test_parse_rejects_non_template() {
        assert!(Template::parse("{{a}} {{b}}").is_none());
        assert!(Template::parse("[[a]]").is_none());
    }

    #[test]
    fn test_set_and_insert() {
        let mut template = Template::parse("{{sustantivo|es}}").unwrap();
        template.set_positional(1, "fr");
        template.set_positional(2, "masculino");
        assert_eq!(template.to_string(), "{{sustantivo|fr|masculino}}");

        let mut template = Template::parse("{{etimología|latín|x}}").unwrap();
        template.insert_named_first("leng", "fr");
        assert_eq!(template.to_string(), "{{etimología|leng=fr|latín|x}}");
        template.insert_named_first("leng", "de");
        assert_eq!(template.to_string(), "{{etimología|leng=de|latín|x}}");
    }

    #[test]
    fn test_remove_renumbers() {
        let mut template = Template::parse("{{a|x|y|k=v}}").unwrap();
        assert!(template.remove("1"));
        assert_eq!(template.get("1"), Some("y"));
        assert!(template.remove("k"));
        assert!(!template.remove("k"));
        assert_eq!(template.to_string(), "{{a|y}}");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Trad_arriba "), "trad arriba");
        assert_eq!(normalize_name("Ámbito"), "ámbito");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_find_templates_nested_and_ignored() {
        let text = "{{a|{{b}}}} <!-- {{b}} --> {{B|x}}";
        let found = find_templates("b", text);
        assert_eq!(found.len(), 2);
        assert_eq!(&text[found[0].0.clone()], "{{b}}");
        assert_eq!(found[1].1.get("1"), Some("x"));
    }

    #[test]
    fn test_pipe_inside_comment_not_split() {
        let template = Template::parse("{{a|b<!-- c|d -->}}").unwrap();
        assert_eq!(template.positional_count(), 1);
    }

    #[test]
    fn test_replace_named_templates() {
        let text = "x {{Clear}} y {{clear}} {{otra}}";
        let out = replace_named_templates(text, "clear", |_| Some(String::new()));
        assert_eq!(out, "x  y  {{otra}}");
    }

    #[test]
    fn test_triple_brace_skipped() {
        assert!(find_template_spans("{{{1|}}}").is_empty());
    }
}
