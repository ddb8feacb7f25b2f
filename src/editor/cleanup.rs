//! Text-level cleanup passes: boilerplate comments, the depth gate,
//! template prefixes and names, links and a bag of minor fixes.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use super::lines::is_splitter_template;
use super::{outcome, Context, Outcome};
use crate::depth::{has_unpaired_delimiters, max_template_depth};
use crate::error::{EditorError, EditorResult};
use crate::ranges::{
    contained_in_ranges, find_flat_ranges, find_tag_ranges, replace_all_outside, NOWIKI,
    replace_with_standard_ignored_ranges, sanitize_whitespaces, standard_ignored_ranges,
    strip_comments_and_nowiki,
};
use crate::template::{find_template_spans, replace_named_templates, Template};

static P_TEMPLATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{([ :]*(?:Template|Plantilla|msg) *: *)").expect("valid regex")
});

static P_HEADER_COMMENTS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"<!-- *tipo de palabra, por ejemplo .*?-->").expect("valid regex"),
        Regex::new(r"<!-- *tipo de palabra \(es=español\): .*?-->").expect("valid regex"),
    ]
});

static P_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

static P_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[:?([^\]|]+)(?:\|((?:\]?[^\]|])*))*\]\]([^\[]*)").expect("valid regex")
});

static P_LINK_TRAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([a-záéíóúñ]+)(.*)$").expect("valid regex"));

static P_FILE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\[ *(File|Image|Archivo|Imagen) *: *").expect("valid regex")
});

static P_STRAY_COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}>").expect("valid regex"));

static P_LONE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\n])\n[.,:;*#]+\n").expect("valid regex"));

static P_LEADING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\n*[.,:;*#]+\n").expect("valid regex"));

static P_EMPTY_LINK_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\* ?\[\[\]\]$").expect("valid regex"));

static P_LONE_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[(){}\[\]]$").expect("valid regex"));

static P_EMPTY_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^; ?[2-9]: ?\.?$").expect("valid regex"));

static P_DEFINITION_NO_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^; ?(\d+)\.?([^:\n]+)$").expect("valid regex"));

static P_PHRASE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\* ?\[\[(?:primera|segunda) locución\]\]$").expect("valid regex")
});

static P_SELF_CLOSING_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<ref ([^>]*?[^ >/])/>").expect("valid regex"));

static P_EMPTY_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<ref\b([^>/]*?[^>/ ]) *>\s*</ref *>").expect("valid regex")
});

/// Whether `re` matches the whole of `text`.
fn matches_whole(re: &Regex, text: &str) -> bool {
    re.find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// Drop boilerplate comments left by the entry creation forms.
pub(crate) fn remove_comments(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let nowiki = find_tag_ranges(text, &NOWIKI);
    let targets: Vec<Range<usize>> = find_flat_ranges(text, "<!--", "-->", true)
        .into_iter()
        .filter(|r| !contained_in_ranges(&nowiki, r.start))
        .filter(|r| {
            ctx.config
                .comment_patterns()
                .iter()
                .any(|re| matches_whole(re, &text[r.clone()]))
        })
        .collect();

    let mut out = text.to_string();

    for range in targets.iter().rev() {
        let line_start = out[..range.start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = out[range.end..]
            .find('\n')
            .map_or(out.len(), |i| range.end + i);

        let alone = out[line_start..range.start].trim_matches(' ').is_empty()
            && out[range.end..line_end].trim_matches(' ').is_empty();

        if !alone {
            out.replace_range(range.clone(), "");
        } else if line_end < out.len() {
            out.replace_range(line_start..line_end + 1, "");
        } else if line_start > 0 {
            out.replace_range(line_start - 1..line_end, "");
        } else {
            out.replace_range(line_start..line_end, "");
        }
    }

    // Header placeholders from the creation forms
    if out.contains("tipo de palabra") {
        let mut page = ctx.parse(&out)?;
        let mut touched = false;

        for id in page.sections().to_vec() {
            let header = page.section(id).header().to_string();
            let mut cleaned = header.clone();
            for re in P_HEADER_COMMENTS.iter() {
                cleaned = re.replace_all(&cleaned, "").into_owned();
            }
            let cleaned = P_SPACES.replace_all(&cleaned, " ").trim().to_string();

            if cleaned != header {
                page.section_mut(id).set_header(&cleaned, ctx.config);
                touched = true;
            }
        }

        if touched {
            out = page.to_string();
        }
    }

    Ok(outcome(text, out, Some("eliminando comentarios".to_string())))
}

/// Refuse pages the rest of the pipeline cannot process safely.
///
/// # Errors
///
/// * `EditorError::MaxTemplateDepthExceeded` when templates nest too deep
/// * `EditorError::UnbalancedDelimiters` when `{{`/`}}` or `[[`/`]]` do not
///   pair up in the page intro or a section intro
pub(crate) fn failsafe(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let limit = ctx.config.settings.max_template_depth;
    let depth = max_template_depth(text);

    if depth > limit {
        warn!("[[{}]] nests templates {} levels deep", ctx.title, depth);
        return Err(EditorError::MaxTemplateDepthExceeded { depth, limit });
    }

    let page = ctx.parse(text)?;
    check_delimiters(page.intro(), "Page intro")?;

    for (i, &id) in page.sections().iter().enumerate() {
        check_delimiters(page.section(id).intro(), &format!("Section intro (#{})", i + 1))?;
    }

    Ok(None)
}

fn check_delimiters(intro: &str, location: &str) -> EditorResult<()> {
    let intro = strip_comments_and_nowiki(intro);

    if has_unpaired_delimiters(&intro, "{{", "}}") {
        return Err(EditorError::UnbalancedDelimiters(format!(
            "Unpaired curly brackets in {}",
            location
        )));
    }

    if has_unpaired_delimiters(&intro, "[[", "]]") {
        return Err(EditorError::UnbalancedDelimiters(format!(
            "Unpaired square brackets in {}",
            location
        )));
    }

    Ok(())
}

/// `{{Plantilla:x}}` → `{{x}}`.
pub(crate) fn remove_template_prefixes(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut prefixes: Vec<String> = Vec::new();

    let formatted = replace_with_standard_ignored_ranges(text, &P_TEMPLATE_PREFIX, |caps| {
        let prefix = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
        Some("{{".to_string())
    });

    let summary = (!prefixes.is_empty()).then(|| format!("eliminando {}", prefixes.join(", ")));
    Ok(outcome(text, formatted, summary))
}

/// Trim template names, pull dangling `}}` lines back and lift line-level
/// templates out of list markup.
pub(crate) fn sanitize_templates(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let ignored = standard_ignored_ranges(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut markers_removed = false;

    for span in find_template_spans(text) {
        if span.start < last || contained_in_ranges(&ignored, span.start) {
            continue;
        }

        let raw = &text[span.clone()];
        let Some(template) = Template::parse(raw) else {
            continue;
        };

        out.push_str(&text[last..span.start]);
        last = span.end;

        if is_splitter_template(template.name()) {
            markers_removed |= strip_list_markers(&mut out);
        }

        let rewritten = trim_template_name(raw, &template);
        out.push_str(&join_closing_braces(&rewritten));
    }

    out.push_str(&text[last..]);

    let summary = markers_removed.then(|| r#""\n[:;*#]{{" → "\n{{""#.to_string());
    Ok(outcome(text, out, summary))
}

fn trim_template_name(raw: &str, template: &Template) -> String {
    let raw_name = template.name.as_str();

    match raw.get(2..).and_then(|rest| rest.strip_prefix(raw_name)) {
        Some(rest) => {
            let trimmed = raw_name.trim_start().trim_end_matches(' ');
            format!("{{{{{}{}", trimmed, rest)
        }
        None => raw.to_string(),
    }
}

fn join_closing_braces(template: &str) -> String {
    let lines: Vec<&str> = template.split('\n').collect();

    match lines.as_slice() {
        [first, second] if second.trim() == "}}" => format!("{}}}}}", first.trim_end()),
        [.., last] if lines.len() > 2 && last.trim() == "}}" && *last != "}}" => {
            let mut lines = lines.clone();
            let n = lines.len();
            lines[n - 1] = "}}";
            lines.join("\n")
        }
        _ => template.to_string(),
    }
}

/// Remove list markers preceding a template on the current line.
fn strip_list_markers(out: &mut String) -> bool {
    let line_start = out.rfind('\n').map_or(0, |i| i + 1);
    let tail = &out[line_start..];

    if tail.is_empty() || !tail.chars().all(|c| " :;*#".contains(c)) {
        return false;
    }

    let had_markers = tail.chars().any(|c| c != ' ');
    out.truncate(line_start);
    had_markers
}

/// Simplify piped links whose label repeats the target.
pub(crate) fn sanitize_links(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut publish = false;

    let formatted = replace_with_standard_ignored_ranges(text, &P_LINK, |caps| {
        let rewritten = rewrite_link(caps)?;
        publish |= rewritten.1;
        Some(rewritten.0)
    });

    let summary = publish.then(|| "revisando enlaces".to_string());
    Ok(outcome(text, formatted, summary))
}

/// New link text plus whether the rewrite deserves a summary.
fn rewrite_link(caps: &Captures) -> Option<(String, bool)> {
    if caps.get(0)?.as_str().starts_with("[[:") {
        return None;
    }

    let target = caps.get(1)?.as_str().trim();
    let trail = caps.get(3).map_or("", |m| m.as_str());

    if target.contains(':') {
        return None;
    }

    let (page, anchor) = target.split_once('#').unwrap_or((target, ""));
    if page.is_empty() && !anchor.is_empty() {
        return None;
    }

    let pipe = caps.get(2)?.as_str().trim();

    if pipe.is_empty() || pipe == target {
        return Some((format!("[[{}]]{}", target, trail), true));
    }

    if anchor.is_empty() {
        if let Some(rest) = pipe.strip_prefix(target) {
            if P_LINK_TRAIL.captures(rest).is_some_and(|c| c.get(2).map_or(true, |m| m.is_empty())) {
                return Some((format!("[[{}]]{}{}", target, rest, trail), false));
            }
        }
    }

    let caps = P_LINK_TRAIL.captures(trail)?;
    let letters = caps.get(1)?.as_str();
    let rest = caps.get(2).map_or("", |m| m.as_str());

    Some((format!("[[{}|{}{}]]{}", target, pipe, letters, rest), false))
}

/// Canonical names for aliased templates.
pub(crate) fn normalize_template_names(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut redirects: Vec<(&str, &str)> = ctx
        .config
        .template_redirects()
        .filter(|(alias, canonical)| alias != canonical)
        .collect();
    redirects.sort_unstable();

    let mut out = text.to_string();
    let mut found: Vec<String> = Vec::new();

    for (alias, canonical) in redirects {
        let next = replace_named_templates(&out, alias, |template| {
            if template.name() == canonical {
                return None;
            }

            let mut template = template.clone();
            template.set_name(canonical);
            Some(template.to_string())
        });

        if next != out {
            found.push(format!("{{{{{}}}}} → {{{{{}}}}}", alias, canonical));
            out = next;
        }
    }

    let summary = (!found.is_empty()).then(|| found.join(", "));
    Ok(outcome(text, out, summary))
}

/// Apply `rewrite` and remember `log` if it changed anything.
fn logged<F>(text: String, logs: &mut Vec<String>, log: &str, rewrite: F) -> String
where
    F: FnOnce(&str) -> String,
{
    let next = rewrite(&text);

    if next != text && !log.is_empty() {
        logs.push(log.to_string());
    }

    next
}

pub(crate) fn minor_sanitizing(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut logs: Vec<String> = Vec::new();

    // File namespace aliases
    let mut aliases: Vec<String> = Vec::new();
    let mut formatted = replace_with_standard_ignored_ranges(text, &P_FILE_PREFIX, |caps| {
        let alias = caps.get(1)?.as_str();
        if caps.get(0)?.as_str() == "[[Archivo:" {
            return None;
        }
        if alias != "Archivo" {
            let alias = format!("{}:", alias);
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        Some("[[Archivo:".to_string())
    });

    if !aliases.is_empty() {
        logs.push(format!("{} → Archivo:", aliases.join(", ")));
    }

    formatted = logged(formatted, &mut logs, r#""-->" → """#, |t| {
        replace_all_outside(t, &P_STRAY_COMMENT_END, "")
    });

    formatted = logged(formatted, &mut logs, r#""^[.,:;*#]$" → """#, |t| {
        let t = replace_all_outside(t, &P_LONE_PUNCTUATION, "${1}\n\n");
        replace_all_outside(&t, &P_LEADING_PUNCTUATION, "")
    });

    formatted = logged(formatted, &mut logs, r#""^* [[]]$" → """#, |t| {
        replace_all_outside(t, &P_EMPTY_LINK_ITEM, "")
    });

    formatted = logged(formatted, &mut logs, r#""^[(){}\[\]]$" → """#, |t| {
        replace_all_outside(t, &P_LONE_BRACKET, "")
    });

    formatted = logged(formatted, &mut logs, r#""^;[2-9]:$" → """#, |t| {
        replace_all_outside(t, &P_EMPTY_DEFINITION, "")
    });

    formatted = logged(formatted, &mut logs, r#""^;\d.+" → ";\d:.+""#, |t| {
        replace_with_standard_ignored_ranges(t, &P_DEFINITION_NO_COLON, |caps| {
            let number = caps.get(1)?.as_str();
            let rest = caps.get(2)?.as_str();
            let head = rest.strip_prefix(' ').unwrap_or(rest);

            if head.starts_with("{{") && !head.starts_with("{{plm|") && !head.starts_with("{{plm}") {
                return None;
            }

            Some(format!(";{}:{}", number, rest))
        })
    });

    formatted = logged(formatted, &mut logs, r#""* [(primera|segunda) locución]" → """#, |t| {
        replace_all_outside(t, &P_PHRASE_PLACEHOLDER, "")
    });

    formatted = replace_all_outside(&formatted, &P_SELF_CLOSING_REF, "<ref ${1} />");
    formatted = replace_all_outside(&formatted, &P_EMPTY_REF, "<ref${1} />");
    formatted = sanitize_whitespaces(&formatted);

    // At most one blank line closes the last section
    let mut page = ctx.parse(&formatted)?;
    if let Some(&last) = page.sections().last() {
        if page.section(last).trailing_newlines() > 1 {
            page.section_mut(last).set_trailing_newlines(1);
            formatted = page.to_string();
        }
    }

    let summary = (!logs.is_empty()).then(|| logs.join(", "));
    Ok(outcome(text, formatted, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

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
    fn test_remove_comments_whole_line() {
        let text = "=={{lengua|es}}==\n<!-- -->\n;1: Edificio.";
        let outcome = run(remove_comments, text).unwrap();
        assert_eq!(outcome.text, "=={{lengua|es}}==\n;1: Edificio.");
        assert_eq!(outcome.summary.as_deref(), Some("eliminando comentarios"));
    }

    #[test]
    fn test_remove_comments_inline() {
        let text = ";1: Edificio. <!-- explicación de lo que significa la palabra -->";
        let outcome = run(remove_comments, text).unwrap();
        assert_eq!(outcome.text, ";1: Edificio. ");
    }

    #[test]
    fn test_remove_comments_keeps_other_comments() {
        assert!(run(remove_comments, "a <!-- nota importante --> b").is_none());
    }

    #[test]
    fn test_failsafe_depth() {
        let config = Config::builtin().unwrap();
        let ctx = Context {
            config: &config,
            title: "casa",
            old_structure: false,
        };
        let err = failsafe(&ctx, "{{a|{{b|{{c}}}}}}").unwrap_err();
        assert_eq!(err, EditorError::MaxTemplateDepthExceeded { depth: 3, limit: 2 });
    }

    #[test]
    fn test_failsafe_unpaired() {
        let config = Config::builtin().unwrap();
        let ctx = Context {
            config: &config,
            title: "casa",
            old_structure: false,
        };
        let err = failsafe(&ctx, "=={{lengua|es}}==\n{{a\n").unwrap_err();
        assert_eq!(
            err,
            EditorError::UnbalancedDelimiters("Unpaired curly brackets in Section intro (#1)".to_string())
        );
        assert!(failsafe(&ctx, "=={{lengua|es}}==\n{{a}} [[b]]").unwrap().is_none());
    }

    #[test]
    fn test_remove_template_prefixes() {
        let outcome = run(remove_template_prefixes, "{{Plantilla:uso|x}} {{Template: clear}}").unwrap();
        assert_eq!(outcome.text, "{{uso|x}} {{clear}}");
        assert_eq!(outcome.summary.as_deref(), Some("eliminando Plantilla:, Template:"));
    }

    #[test]
    fn test_sanitize_templates() {
        let outcome = run(sanitize_templates, "{{ uso|x}}\n*{{sinónimo|y}}\n{{z|a\n}}").unwrap();
        assert_eq!(outcome.text, "{{uso|x}}\n{{sinónimo|y}}\n{{z|a}}");
        assert!(outcome.summary.is_some());

        let outcome = run(sanitize_templates, "{{ uso|x}}").unwrap();
        assert_eq!(outcome.summary, None);
    }

    #[test]
    fn test_sanitize_links() {
        let outcome = run(sanitize_links, "[[casa|casa]] y [[perro|]]").unwrap();
        assert_eq!(outcome.text, "[[casa]] y [[perro]]");
        assert_eq!(outcome.summary.as_deref(), Some("revisando enlaces"));

        let outcome = run(sanitize_links, "[[casa|casas]].").unwrap();
        assert_eq!(outcome.text, "[[casa]]s.");

        let outcome = run(sanitize_links, "[[casa|ca]]sita").unwrap();
        assert_eq!(outcome.text, "[[casa|casita]]");

        assert!(run(sanitize_links, "[[Categoría:X|casa]]").is_none());
        assert!(run(sanitize_links, "[[#es|es]]").is_none());
    }

    #[test]
    fn test_normalize_template_names() {
        let outcome = run(normalize_template_names, "{{sinonimo|x}} {{Clear}}").unwrap();
        assert_eq!(outcome.text, "{{sinónimo|x}} {{clear}}");
        let summary = outcome.summary.unwrap();
        assert!(summary.contains("{{sinonimo}} → {{sinónimo}}"));
        assert!(summary.contains("{{Clear}} → {{clear}}"));
    }

    #[test]
    fn test_minor_sanitizing() {
        let text = "=={{lengua|es}}==\n[[File:x.jpg]]\n;1 Edificio.\n*\n;2:\n<ref name=a/>";
        let outcome = run(minor_sanitizing, text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n[[Archivo:x.jpg]]\n;1: Edificio.\n\n\n<ref name=a />"
        );
        let summary = outcome.summary.unwrap();
        assert!(summary.starts_with("File: → Archivo:"));
    }
}
