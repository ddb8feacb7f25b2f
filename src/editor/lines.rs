//! Line joining and splitting.
//!
//! Prose wrapped over several source lines is joined back; templates that
//! must stand on a line of their own are split out of running text.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{outcome, Context, Outcome, P_TERM};
use crate::config::Config;
use crate::error::EditorResult;
use crate::ranges::{
    combine_ranges, contained_in_ranges, find_ranges, find_tag_ranges, TagPattern, REF,
    replace_with_standard_ignored_ranges, sanitize_whitespaces, standard_ignored_ranges,
    strip_comments_and_nowiki,
};
use crate::template::{find_template_spans, Template};

/// Templates that must start a line.
pub(crate) const LINE_START_TEMPLATES: &[&str] = &[
    // Pronunciation and spelling
    "pronunciación",
    "pron.la",
    "transliteración",
    "homófono",
    "grafía alternativa",
    "variantes",
    "parónimo",
    "diacrítico",
    "ortografía alternativa",
    // Definition qualifiers
    "ámbito",
    "uso",
    "sinónimo",
    "antónimo",
    "hipónimo",
    "hiperónimo",
    "relacionado",
    "anagrama",
    "derivado",
    "merónimo",
    "holónimo",
    "cohipónimo",
    "t+",
    "descendiente",
    "desc",
    "anotación",
    "ejemplo",
    "ejemplo y trad",
];

/// Templates that must be alone on their line.
static P_OWN_LINE_TEMPLATES: Lazy<Regex> = Lazy::new(|| {
    let literal = [
        "ampliable",
        "creado por bot",
        "definición",
        "discutido",
        "endesarrollo",
        "esbozo",
        "estructura",
        "falta",
        "referencias",
        "revisión",
        "desambiguación",
        "arriba",
        "centro",
        "abajo",
        "escond-arriba",
        "escond-centro",
        "escond-abajo",
        "rel-arriba",
        "rel-centro",
        "rel-abajo",
        "trad-arriba",
        "trad-centro",
        "trad-abajo",
        "rel4-arriba",
        "rel4-centro",
        "clear",
        "derivados",
        "título referencias",
        "pron-graf",
        "imagen",
        "listaref",
    ]
    .iter()
    .map(|name| regex::escape(name))
    .collect::<Vec<_>>()
    .join("|");

    let pattern = format!(
        r"^(?:{}|inflect\.[^ |{{}}]+|[\w-]+\.v\.conj[^ |{{}}]*|comp(?:\.[\w-]+)?)$",
        literal
    );
    Regex::new(&pattern).expect("valid regex")
});

/// Tags whose bodies are never joined.
static BLOCK_TAGS: Lazy<Vec<TagPattern>> = Lazy::new(|| {
    [
        "div", "span", "small", "big", "sup", "sub", "center", "blockquote", "gallery", "math",
        "poem", "references", "table", "timeline", "score",
    ]
    .into_iter()
    .map(TagPattern::new)
    .collect()
});

const FILE_ALIASES: &[&str] = &["file", "image", "archivo", "imagen"];
const CATEGORY_ALIASES: &[&str] = &["category", "categoría"];

static P_PENDING_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}\n:+").expect("valid regex"));

const PENDING_COLON: &str = "\u{E000}";

/// Templates whose placement is managed by [`split_lines`].
pub(crate) fn is_splitter_template(name: &str) -> bool {
    name.starts_with("inflect.")
        || name.starts_with("mutación.")
        || name.starts_with("mutacion.")
        || LINE_START_TEMPLATES.contains(&name)
        || P_OWN_LINE_TEMPLATES.is_match(name)
}

fn is_special_prefix(prefix: &str, config: &Config) -> bool {
    let prefix = prefix.trim().to_lowercase();

    FILE_ALIASES.contains(&prefix.as_str())
        || CATEGORY_ALIASES.contains(&prefix.as_str())
        || config
            .interwiki_prefixes()
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&prefix))
}

/// `[[File:...]]`, `[[Categoría:...]]` and interwiki links.
fn starts_with_special_link(line: &str, config: &Config) -> bool {
    line.strip_prefix("[[")
        .and_then(|rest| rest.split_once(':'))
        .is_some_and(|(prefix, _)| is_special_prefix(prefix, config))
}

fn ends_with_special_link(line: &str, config: &Config) -> bool {
    let line = line.trim_end();
    if !line.ends_with("]]") {
        return false;
    }

    line.rfind("[[")
        .and_then(|open| line[open + 2..].split_once(':'))
        .is_some_and(|(prefix, _)| is_special_prefix(prefix, config))
}

/// Whether the newline between `prev` and `next` may be turned into a space.
fn can_join(prev: &str, next: &str, in_ref: bool, config: &Config) -> bool {
    let Some(last) = prev.chars().last() else {
        return false;
    };

    if last == '>' || last == '=' {
        return false;
    }

    if ["__", "----", "}}", "|}"].iter().any(|end| prev.ends_with(end)) {
        return false;
    }

    if ends_with_special_link(prev, config) {
        return false;
    }

    let markers: &[char] = if in_ref {
        &[':', ';', '*', '#']
    } else {
        &[' ', ':', ';', '*', '#']
    };

    if strip_comments_and_nowiki(prev).starts_with(markers) {
        return false;
    }

    if next.starts_with("<ref ") || next.starts_with("<ref>") {
        return true;
    }

    let Some(first) = next.chars().next() else {
        return false;
    };

    if "\n<:;#*{}|=!".contains(first) {
        return false;
    }

    if first == ' ' && !in_ref {
        return false;
    }

    !starts_with_special_link(next, config)
}

/// Join prose lines broken by a single newline.
pub(crate) fn join_lines(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let ignored = standard_ignored_ranges(text);
    let refs = find_tag_ranges(text, &REF);

    let mut blocking: Vec<_> = BLOCK_TAGS.iter().map(|tag| find_tag_ranges(text, tag)).collect();
    blocking.push(find_ranges(text, "{{", "}}"));
    blocking.push(find_ranges(text, "{|", "|}"));
    let blocked = combine_ranges(blocking);

    let mut joined = String::with_capacity(text.len());
    let mut last = 0usize;

    for (i, _) in text.match_indices('\n') {
        if i == 0 || i < last || contained_in_ranges(&ignored, i) {
            continue;
        }

        let in_ref = contained_in_ranges(&refs, i);
        if !in_ref && contained_in_ranges(&blocked, i) {
            continue;
        }

        let prev_start = text[..i].rfind('\n').map_or(0, |p| p + 1);
        let next_end = text[i + 1..].find('\n').map_or(text.len(), |p| i + 1 + p);
        let next = &text[i + 1..next_end];

        if !can_join(&text[prev_start..i], next, in_ref, ctx.config) {
            continue;
        }

        joined.push_str(&text[last..i]);
        joined.push(' ');
        last = i + 1;

        if in_ref {
            last += next.len() - next.trim_start_matches(' ').len();
        }
    }

    joined.push_str(&text[last..]);

    // ";1 term\n: definition" and ";1 term:\n: definition"
    let formatted = replace_with_standard_ignored_ranges(&joined, &P_TERM, |caps| {
        let whole = caps.get(0)?;
        let colon = caps.get(3)?;
        let definition = caps.get(4)?;

        let mut rewritten = if colon.as_str().contains('\n') {
            format!(
                "{}:{}",
                &joined[whole.start()..colon.start()],
                &joined[colon.end()..whole.end()]
            )
        } else {
            whole.as_str().to_string()
        };

        if definition.as_str().is_empty() && joined[whole.end()..].starts_with("\n:") {
            rewritten.push_str(PENDING_COLON);
        }

        (rewritten != whole.as_str()).then_some(rewritten)
    });

    let formatted = P_PENDING_COLON.replace_all(&formatted, "").replace(PENDING_COLON, "");

    Ok(outcome(text, formatted, Some("uniendo líneas".to_string())))
}

/// Put line-level templates at the start of a line, and block templates on
/// a line of their own.
pub(crate) fn split_lines(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let ignored = standard_ignored_ranges(text);
    let bytes = text.as_bytes();

    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0usize;
    let mut previous_end: Option<usize> = None;

    for span in find_template_spans(text) {
        if span.start < last || contained_in_ranges(&ignored, span.start) {
            continue;
        }

        let Some(template) = Template::parse(&text[span.clone()]) else {
            continue;
        };
        let name = template.name();

        if LINE_START_TEMPLATES.contains(&name) {
            let line_start = text[..span.start].rfind('\n').map_or(0, |i| i + 1);
            let prefix = &text[line_start..span.start];

            if prefix.chars().count() <= 5 && prefix.chars().all(|c| " :;*#".contains(c)) {
                continue;
            }

            out.push_str(&text[last..span.start]);
            out.push('\n');
            out.push_str(&text[span.clone()]);
            last = span.end;
        } else if P_OWN_LINE_TEMPLATES.is_match(name) {
            let mut marker_start = span.start;
            while marker_start > last && b" :;*#".contains(&bytes[marker_start - 1]) {
                marker_start -= 1;
            }

            let after_newline = marker_start > 0 && bytes[marker_start - 1] == b'\n';
            let match_start = if after_newline && marker_start - 1 >= last {
                marker_start - 1
            } else {
                marker_start
            };

            let mut post = span.end;
            while bytes.get(post) == Some(&b' ') {
                post += 1;
            }
            let before_newline = bytes.get(post) == Some(&b'\n');
            let match_end = if before_newline { post + 1 } else { post };

            let at_start = match_start == 0;
            let at_end = match_end == text.len();

            if (at_start || after_newline) && (at_end || before_newline) {
                continue;
            }

            out.push_str(&text[last..match_start]);
            if !at_start && previous_end != Some(match_start) {
                out.push('\n');
            }
            out.push_str(&text[span.clone()]);
            if !at_end {
                out.push('\n');
            }

            last = match_end;
            previous_end = Some(match_end);
        }
    }

    out.push_str(&text[last..]);
    let formatted = sanitize_whitespaces(&out);

    Ok(outcome(text, formatted, Some("dividiendo líneas".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pass: super::super::PassFn, text: &str) -> Option<Outcome> {
        let config = Config::builtin().unwrap();
        let ctx = Context {
            config: &config,
            title: "casa",
            old_structure: false,
        };
        pass(&ctx, text).unwrap()
    }

    #[test]
    fn test_splitter_templates() {
        assert!(is_splitter_template("sinónimo"));
        assert!(is_splitter_template("clear"));
        assert!(is_splitter_template("inflect.es.sust.reg"));
        assert!(is_splitter_template("es.v.conj.ar"));
        assert!(is_splitter_template("comp.es"));
        assert!(!is_splitter_template("lengua"));
        assert!(!is_splitter_template("clearer"));
    }

    #[test]
    fn test_join_lines() {
        let outcome = run(join_lines, "Una casa\nde campo.\n*item").unwrap();
        assert_eq!(outcome.text, "Una casa de campo.\n*item");
        assert_eq!(outcome.summary.as_deref(), Some("uniendo líneas"));

        // Definition lines are never extended
        assert!(run(join_lines, ";1: Casa\nde campo.\n\nOtro párrafo").is_none());
    }

    #[test]
    fn test_join_lines_skips_templates_and_headers() {
        assert!(run(join_lines, "{{a|b\nc}}").is_none());
        assert!(run(join_lines, "==Uso==\ntexto").is_none());
        assert!(run(join_lines, "{{clear}}\ntexto").is_none());
    }

    #[test]
    fn test_join_definition_colon() {
        let outcome = run(join_lines, ";1 {{uso|x}}\n: Edificio.").unwrap();
        assert_eq!(outcome.text, ";1 {{uso|x}}: Edificio.");

        let outcome = run(join_lines, ";1 {{uso|x}}:\n: Edificio.").unwrap();
        assert_eq!(outcome.text, ";1 {{uso|x}}: Edificio.");
    }

    #[test]
    fn test_split_lines() {
        let outcome = run(split_lines, ";1: Edificio. {{sinónimo|hogar}}").unwrap();
        assert_eq!(outcome.text, ";1: Edificio.\n{{sinónimo|hogar}}");

        let outcome = run(split_lines, "texto {{clear}} más").unwrap();
        assert_eq!(outcome.text, "texto\n{{clear}}\nmás");

        assert!(run(split_lines, "texto\n{{clear}}\nmás").is_none());
        assert!(run(split_lines, "*{{sinónimo|hogar}}").is_none());
    }
}
