//! Migration of pages still using the old `{{ES}}` / `{{XX-ES}}` language
//! header templates to the `{{lengua}}` section layout.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{
    has_template, page_outcome, reduced_section_check, Context, Outcome,
    P_ANY_ETYMOLOGY, P_FLEXIVE_HEADER, RECONSTRUCTED_LANGS, REFERENCES_HEADER,
};
use crate::error::EditorResult;
use crate::page::{Page, SectionId};
use crate::ranges::{contained_in_ranges, standard_ignored_ranges, strip_comments_and_nowiki};
use crate::section::Section;
use crate::template::{find_template_spans, find_templates, Param, Template};

static P_OLD_REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:<small *>)? *[Rr]eferencias.*$").expect("valid regex")
});

static P_ETYM_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ETYM alt-(.*)$").expect("valid regex"));

static P_FIRST_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Ee]timolog[íi]a(?: 1)?$").expect("valid regex"));

static P_PRONUNCIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Pp]ronunciaci[óo]n.*").expect("valid regex"));

static P_NOWIKI_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?nowiki *>").expect("valid regex"));

static P_SELF_CLOSING_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ref [^>]*?/ ?>").expect("valid regex"));

/// Next section sharing the parent of `id`.
fn next_sibling(page: &Page, id: SectionId) -> Option<SectionId> {
    let siblings = page.siblings(id);
    let index = siblings.iter().position(|&s| s == id)?;
    siblings.get(index + 1).copied()
}

/// Language code of `id`, or of the closest language section before it.
fn owning_lang_code(page: &Page, id: SectionId) -> Option<String> {
    let position = page.sections().iter().position(|&s| s == id)?;
    page.sections()[..=position]
        .iter()
        .rev()
        .find_map(|&s| page.section(s).lang_code())
        .map(str::to_string)
}

/// Whether a template name is one of the old language header templates
/// (`{{ES}}`, `{{FR-ES}}`, `{{TRANS}}`, …) or a current one.
fn is_header_template(name: &str) -> bool {
    if matches!(name, "ES" | "TRANS" | "TRANSLIT" | "lengua" | "translit") {
        return true;
    }

    name.strip_suffix("-ES").is_some_and(|prefix| {
        !prefix.is_empty() && prefix.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    })
}

fn is_meaningful_alt(alt: &str, title: &str) -> bool {
    !alt.is_empty()
        && alt != "{{PAGENAME}}"
        && alt.replace('ʼ', "'") != title.replace('ʼ', "'")
        && P_NOWIKI_TAG.replace_all(alt, "") != title
}

/// Turn every old language header template into a level-1 header line:
/// `={{lengua|xx}}=` for a new language, `=ETYM alt-…=` for another
/// etymology group of the language already open.
fn replace_old_structure_templates(title: &str, text: &str) -> String {
    let ignored = standard_ignored_ranges(text);
    let spans = find_template_spans(text);

    let mut current_lang = String::new();
    let mut lines = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end + 1;

        let found = spans.iter().find_map(|span| {
            if span.start < line_start || span.end > line_end {
                return None;
            }
            if contained_in_ranges(&ignored, span.start) {
                return None;
            }
            let template = Template::parse(&text[span.clone()])?;
            is_header_template(template.name()).then(|| (span.clone(), template))
        });

        let Some((span, template)) = found else {
            lines.push(line.to_string());
            continue;
        };

        let name = template.name().to_string();

        if name == "lengua" || name == "translit" {
            if let Some(code) = template.get("1") {
                current_lang = code.to_lowercase();
            }
            lines.push(line.to_string());
            continue;
        }

        // {{Collins-EN-ES}} and the like
        if name != "Chono-ES" && name != name.to_uppercase() {
            lines.push(line.to_string());
            continue;
        }

        let code = match name.as_str() {
            "TRANS" => "trans".to_string(),
            other => other.replace("-ES", "").to_lowercase(),
        };

        let alt = template.get("1").unwrap_or_default().to_string();
        let alt = if is_meaningful_alt(&alt, title) {
            alt
        } else {
            String::new()
        };

        let pre = &text[line_start..span.start];
        let post = text[span.end..line_end].trim_start_matches(' ');

        let pre = if pre.is_empty() || pre.chars().all(|c| ":;*#".contains(c)) {
            String::new()
        } else {
            format!("{}\n", pre)
        };

        let post = if post.is_empty()
            || (post.starts_with("<!--") && post.ends_with("-->") && post.len() > 7)
        {
            String::new()
        } else {
            format!("\n{}", post)
        };

        let header = if current_lang == code {
            format!("ETYM alt-{}", alt)
        } else {
            let mut lengua = Template::new("lengua");
            lengua.set_positional(1, &code);
            for param in &template.params {
                if let Param::Named { key, value } = param {
                    let key = key.trim();
                    if key != "num" && key != "núm" {
                        lengua.set_named(key, value.trim());
                    }
                }
            }
            if !alt.is_empty() {
                lengua.set_named("alt", &alt);
            }
            lengua.to_string()
        };

        lines.push(format!("{}={}={}", pre, header, post));
        current_lang = code;
    }

    lines.join("\n")
}

/// Record an alternative spelling in the section text.
fn extract_alt_parameter(section: &mut Section, alt: &str) {
    let intro = section.intro().to_string();
    let pron = find_templates("pron.la", &intro);

    if let [(span, template)] = pron.as_slice() {
        if !template.has("alt") {
            let mut template = template.clone();
            template.set_named("alt", alt);
            let mut updated = intro.clone();
            updated.replace_range(span.clone(), &template.to_string());
            section.set_intro(&updated);
        }
    } else if !has_template(&intro, "diacrítico") && !intro.contains("Diacrítico:") {
        section.set_intro(&format!("{}\n{{{{diacrítico|{}}}}}.", intro, alt));
    } else {
        section.set_intro(&format!("<!-- NO EDITAR: alt={} -->\n{}", alt, intro));
    }
}

/// Whether the text following an etymology template closes everything it
/// opens, so the whole line can be moved.
fn is_movable_etymology_tail(line: &str) -> bool {
    let closed = |text: &str, open: &str, close: &str| match text.rfind(open) {
        Some(start) => text[start..].contains(close),
        None => true,
    };

    if !closed(line, "<!--", "-->") {
        return false;
    }

    let line = strip_comments_and_nowiki(line);
    let line = P_SELF_CLOSING_REF.replace_all(&line, "");

    [("{{", "}}"), ("{|", "|}"), ("[", "]"), ("<ref", "</ref")]
        .iter()
        .all(|(open, close)| closed(&line, open, close))
}

/// Take the etymology template lines out of `intro`. Returns the remaining
/// text and the lines taken, markers dropped.
fn take_etymology_lines(intro: &str) -> (String, Vec<String>) {
    let ignored = standard_ignored_ranges(intro);
    let bytes = intro.as_bytes();

    let mut remaining = String::with_capacity(intro.len());
    let mut lines = Vec::new();
    let mut last = 0usize;
    let mut outer_end = 0usize;

    for span in find_template_spans(intro) {
        if span.start < outer_end || span.start < last {
            continue;
        }
        outer_end = span.end;

        if contained_in_ranges(&ignored, span.start) {
            continue;
        }

        let Some(template) = Template::parse(&intro[span.clone()]) else {
            continue;
        };

        if !template.is_named("etimología") && !template.is_named("etimología2") {
            continue;
        }

        let line_end = intro[span.end..]
            .find('\n')
            .map_or(intro.len(), |i| span.end + i);
        let tail = &intro[span.end..line_end];

        if !tail.is_empty() && !is_movable_etymology_tail(tail) {
            continue;
        }

        let line_start = intro[..span.start].rfind('\n').map_or(0, |i| i + 1);
        let mut start = span.start;
        while start > line_start.max(last) && b":;*#".contains(&bytes[start - 1]) {
            start -= 1;
        }

        remaining.push_str(&intro[last..start]);
        lines.push(intro[span.start..line_end].to_string());

        last = if start == line_start && line_end < intro.len() {
            line_end + 1
        } else {
            line_end
        };
        outer_end = outer_end.max(last);
    }

    remaining.push_str(&intro[last..]);
    (remaining, lines)
}

/// Move the etymology lines of a language section into its new etymology
/// section.
pub(crate) fn move_etymology_lines(top: &mut Section, etymology: &mut Section) {
    let (remaining, lines) = take_etymology_lines(top.intro());

    if !lines.is_empty() {
        top.set_intro(&remaining);
        let intro = format!("{}\n{}", etymology.intro(), lines.join("\n\n"));
        etymology.set_intro(&intro);
    }
}

/// Intro of an etymology section absorbing the text above it. Etymology
/// template lines go last.
fn merged_etymology_intro(top: &str, etymology: &str) -> String {
    let merged = format!("{}\n{}", top, etymology).trim().to_string();

    if merged.lines().count() < 2 {
        return merged;
    }

    let (remaining, lines) = take_etymology_lines(&merged);

    if lines.is_empty() {
        merged
    } else {
        format!("{}\n{}", remaining.trim(), lines.join("\n\n"))
    }
}

fn merge_into_etymology(page: &mut Page, top: SectionId, etymology: &mut Section) {
    let intro = merged_etymology_intro(page.section(top).intro(), etymology.intro());
    etymology.set_intro(&intro);

    if page.section(top).is_lang_section() {
        let section = page.section_mut(top);
        section.set_intro("");
        section.set_trailing_newlines(1);
    }
}

/// Language sections that never receive an etymology section.
fn is_etymology_exempt(ctx: &Context, page: &Page, id: SectionId) -> bool {
    let section = page.section(id);
    let intro = section.intro();

    if has_template(intro, "etimología") || has_template(intro, "etimología2") {
        return false;
    }

    ctx.title.contains(' ')
        || section
            .lang_code()
            .is_some_and(|code| RECONSTRUCTED_LANGS.contains(&code))
        || reduced_section_check(page, id, ctx.config)
}

fn has_additional_etymology_sections(page: &Page, id: SectionId, etymologies: &[SectionId]) -> bool {
    let (Some(&first), Some(next)) = (etymologies.first(), page.next_section(id)) else {
        return false;
    };

    first != next
        && !P_FIRST_ETYMOLOGY.is_match(&page.section(first).stripped_header())
        && !P_PRONUNCIATION.is_match(page.section(next).header())
}

/// Flag the page with `{{estructura}}` for manual review.
fn flag_structure(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    if has_template(text, "estructura") {
        return Ok(None);
    }

    let mut page = ctx.parse(text)?;
    let intro = if page.intro().is_empty() {
        "{{estructura}}".to_string()
    } else {
        format!("{}\n{{{{estructura}}}}", page.intro())
    };
    page.set_intro(&intro);

    Ok(page_outcome(text, &page, "{{estructura}}"))
}

/// Convert a page using the old language header templates (`{{ES}}`,
/// `{{FR-ES}}`, …) to the current `{{lengua}}` layout with explicit
/// etymology sections.
///
/// Pages with `{{TRANSLIT}}`, `{{TAXO}}` or `{{carácter oriental}}` are left
/// for manual review, as are layouts whose etymology groups cannot be told
/// apart (those get `{{estructura}}`).
pub(crate) fn transform_to_new_structure(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    if !ctx.old_structure {
        return Ok(None);
    }

    let visible = strip_comments_and_nowiki(text);
    if ["TRANSLIT", "TAXO", "carácter oriental"]
        .iter()
        .any(|name| has_template(&visible, name))
    {
        return Ok(None);
    }

    let initial = replace_old_structure_templates(ctx.title, text);
    let mut page = ctx.parse(&initial)?;

    // Step 1: set references aside
    let mut references = Vec::new();
    for id in page.find_sections(&P_OLD_REFERENCES) {
        let mut section = page.section(id).clone();
        section.set_header(REFERENCES_HEADER, ctx.config);
        section.set_level(2)?;
        references.push(section);
        page.detach_only_self(id);
    }

    // Step 2: everything below a language header goes one level down
    for id in page.sections().to_vec() {
        if page.lang_section_parent(id).is_some() {
            continue;
        }
        let level = page.section(id).level();
        if level < 6 {
            page.section_mut(id).set_level(level + 1)?;
        }
    }

    let mut page = ctx.parse(&page.to_string())?;

    // Step 3: alternative spellings
    for id in page.sections().to_vec() {
        let section = page.section(id);
        let alt = match section.lang() {
            Some(lang) => lang.param("alt").map(str::to_string),
            None => P_ETYM_GROUP
                .captures(section.header())
                .map(|caps| caps[1].trim().to_string()),
        };

        let Some(alt) = alt.filter(|a| !a.is_empty()) else {
            continue;
        };

        let section = page.section_mut(id);
        extract_alt_parameter(section, &alt);
        section.remove_lang_param("alt");
    }

    // Step 4: one etymology section per language or etymology group
    let targets: Vec<SectionId> = page
        .sections()
        .iter()
        .copied()
        .filter(|&id| {
            let section = page.section(id);
            section.is_lang_section() || section.header().starts_with("ETYM ")
        })
        .collect();

    for id in targets {
        if !page.is_attached(id) {
            continue;
        }

        let is_lang = page.section(id).is_lang_section();
        let etymologies = page.find_subsections(id, &P_ANY_ETYMOLOGY);

        if etymologies.is_empty() && is_lang && is_etymology_exempt(ctx, &page, id) {
            continue;
        }

        if page.section(id).intro().is_empty() && page.children(id).is_empty() {
            if !is_lang {
                page.detach(id);
            }
            continue;
        }

        let next_is_group = next_sibling(&page, id)
            .is_some_and(|next| page.section(next).header().starts_with("ETYM "));

        if is_lang && page.has_subsection(id, &P_FLEXIVE_HEADER) && !next_is_group {
            continue;
        }

        if etymologies.is_empty() || has_additional_etymology_sections(&page, id, &etymologies) {
            let mut etymology = Section::create("Etimología", 3)?;
            etymology.set_trailing_newlines(1);

            if etymologies.is_empty() && is_lang && !next_is_group {
                move_etymology_lines(page.section_mut(id), &mut etymology);
            } else {
                merge_into_etymology(&mut page, id, &mut etymology);
            }

            if etymology.intro().is_empty() {
                let code = owning_lang_code(&page, id).unwrap_or_else(|| "es".to_string());
                etymology.set_intro(&format!("{{{{etimología|leng={}}}}}.", code));
            }

            let etymology = page.create_section(etymology);
            page.prepend_children(id, &[etymology])?;

            if !is_lang {
                page.detach_only_self(id);
            }
        } else if is_lang {
            if !P_FIRST_ETYMOLOGY.is_match(&page.section(etymologies[0]).stripped_header()) {
                debug!("Ambiguous etymology layout in {}", ctx.title);
                return flag_structure(ctx, text);
            }
        } else {
            let first = etymologies[0];
            page.set_level(first, 3)?;

            let mut etymology = page.section(first).clone();
            merge_into_etymology(&mut page, id, &mut etymology);
            let intro = etymology.intro().to_string();
            page.section_mut(first).set_intro(&intro);

            page.detach_only_self(id);
        }
    }

    // Step 5: drop empty languages and settle levels and numbering
    for id in page.lang_sections() {
        if page.section(id).intro().is_empty() && page.children(id).is_empty() {
            page.detach(id);
        }
    }

    page.normalize_child_levels()?;

    for lang in page.lang_sections() {
        let etymologies = page.find_subsections(lang, &P_ANY_ETYMOLOGY);

        if etymologies.len() == 1 {
            let etymology = etymologies[0];
            for child in page.children(etymology).to_vec() {
                page.push_levels(child, -1)?;
            }
            page.section_mut(etymology).set_header("Etimología", ctx.config);
        } else if etymologies.len() > 1 {
            for child in page.children(lang).to_vec() {
                if !etymologies.contains(&child) {
                    page.push_levels(child, 1)?;
                }
            }
            for (i, &etymology) in etymologies.iter().enumerate() {
                page.section_mut(etymology)
                    .set_header(&format!("Etimología {}", i + 1), ctx.config);
            }
        }
    }

    // Step 6: references go back at the end
    for section in references {
        let id = page.create_section(section);
        page.append_sections(&[id]);
    }

    Ok(page_outcome(text, &page, "conversión a la nueva estructura"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config() -> Config {
        Config::builtin().unwrap()
    }

    fn run(
        pass: fn(&Context, &str) -> EditorResult<Option<Outcome>>,
        title: &str,
        text: &str,
        old_structure: bool,
    ) -> Option<Outcome> {
        let config = config();
        let ctx = Context {
            config: &config,
            title,
            old_structure,
        };
        pass(&ctx, text).unwrap()
    }

    #[test]
    fn test_replace_old_structure_templates() {
        let text = "{{ES}}\n==Sustantivo==\n{{FR-ES|casá}}\n{{ES}}\n{{Collins-EN-ES}}";
        assert_eq!(
            replace_old_structure_templates("casa", text),
            "={{lengua|es}}=\n==Sustantivo==\n={{lengua|fr|alt=casá}}=\n={{lengua|es}}=\n{{Collins-EN-ES}}"
        );

        let text = "{{ES|casa}}\n{{ES}}";
        assert_eq!(
            replace_old_structure_templates("casa", text),
            "={{lengua|es}}=\n=ETYM alt-="
        );
    }

    #[test]
    fn test_movable_etymology_tail() {
        assert!(is_movable_etymology_tail("."));
        assert!(is_movable_etymology_tail(". <ref>a</ref>"));
        assert!(!is_movable_etymology_tail(" <ref>abierto"));
        assert!(!is_movable_etymology_tail(" {{abierta"));
        assert!(!is_movable_etymology_tail(" <!-- sin cerrar"));
    }

    #[test]
    fn test_take_etymology_lines() {
        let (rest, lines) = take_etymology_lines("{{pron-graf}}\n:{{etimología|la|casa}}.\nfin");
        assert_eq!(rest, "{{pron-graf}}\nfin");
        assert_eq!(lines, vec!["{{etimología|la|casa}}."]);
    }

    #[test]
    fn test_transform_single_language() {
        let outcome = run(transform_to_new_structure, "casa", "{{ES}}\n\nfoo", true).unwrap();
        assert_eq!(
            outcome.text.trim_end(),
            "=={{lengua|es}}==\n\nfoo\n=== Etimología ===\n{{etimología|leng=es}}."
        );
        assert_eq!(outcome.summary.as_deref(), Some("conversión a la nueva estructura"));
    }

    #[test]
    fn test_transform_moves_etymology_template() {
        let text = "{{ES}}\n{{pron-graf}}\n:{{etimología|la|casa}}.\n==Sustantivo==\n;1: Edificio.";
        let outcome = run(transform_to_new_structure, "casa", text, true).unwrap();
        assert!(outcome.text.starts_with("=={{lengua|es}}==\n{{pron-graf}}\n=== Etimología ===\n{{etimología|la|casa}}."));
        assert!(outcome.text.contains("===Sustantivo===\n;1: Edificio."));
    }

    #[test]
    fn test_transform_skips_new_layout() {
        assert!(run(transform_to_new_structure, "casa", "=={{lengua|es}}==", false).is_none());
    }
}
