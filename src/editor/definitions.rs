//! Definition lines of part-of-speech sections: `#` lists, numbering and
//! bold headword lines.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    has_hashed_lines, is_term_header, page_outcome, Context, Outcome, P_IMAGES, P_TERM,
};
use crate::error::EditorResult;
use crate::page::{Page, SectionId};
use crate::ranges::{replace_with_standard_ignored_ranges, strip_comments_and_nowiki};
use crate::template::find_templates;

static P_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#([^:;#*\n]|$)").expect("valid regex"));

static P_BRACKETED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\w+\]|\(\w+\)").expect("valid regex"));

static P_LOOSE_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^; *\d+").expect("valid regex"));

static P_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));

/// Translation templates whose numbered senses would go stale on renumbering.
const SENSE_TEMPLATES: &[&str] = &["t+", "trad", "trad2", "trad-arriba"];

/// Turn a `#` definition list into `;1:`, `;2:`... lines.
pub(crate) fn convert_hashed_definitions(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let targets: Vec<SectionId> = page
        .sections()
        .iter()
        .copied()
        .filter(|&id| {
            let section = page.section(id);
            let intro = section.intro();
            !section.is_lang_section()
                && page.lang_section_parent(id).is_some()
                && has_hashed_lines(intro)
                && !P_TERM.is_match(&strip_comments_and_nowiki(intro))
                && is_term_header(&section.stripped_header(), ctx.config)
        })
        .collect();

    for id in targets {
        let mut number = 1;
        let intro = replace_with_standard_ignored_ranges(page.section(id).intro(), &P_HASH, |caps| {
            let replacement = format!(";{}:{}", number, &caps[1]);
            number += 1;
            Some(replacement)
        });

        // Nested lists ("#:") stay as they are
        if !has_hashed_lines(&intro) {
            page.section_mut(id).set_intro(&intro);
        }
    }

    Ok(page_outcome(text, &page, "convirtiendo # a numeración continua"))
}

/// Numbered etymologies when there are several, the language section
/// otherwise.
fn numbering_roots(page: &Page, lang: SectionId) -> Vec<SectionId> {
    let etymologies: Vec<SectionId> = page
        .flatten_subsections(lang)
        .into_iter()
        .filter(|&id| {
            let header = page.section(id).stripped_header();
            header
                .strip_prefix("Etimología ")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .collect();

    if etymologies.len() > 1 { etymologies } else { vec![lang] }
}

/// Whether renumbering `root` could break something that points at the
/// current numbers.
fn is_numbering_safe(page: &Page, root: SectionId) -> bool {
    let rendered = page.render_section(root);
    let stripped = strip_comments_and_nowiki(&rendered);

    if stripped.lines().any(|line| line.starts_with('#')) {
        return false;
    }

    if P_IMAGES
        .find_iter(&stripped)
        .any(|m| P_BRACKETED_WORD.is_match(m.as_str()))
    {
        return false;
    }

    if P_LOOSE_TERM.is_match(&P_TERM.replace_all(&stripped, "")) {
        return false;
    }

    !SENSE_TEMPLATES.iter().any(|name| {
        find_templates(name, &rendered)
            .iter()
            .any(|(_, t)| t.params.iter().any(|p| P_DIGITS.is_match(p.value())))
    })
}

/// Definition sections right below `root`, if they follow one another.
fn successive_definition_sections(page: &Page, root: SectionId, ctx: &Context) -> Vec<SectionId> {
    let all = page.flatten_subsections(root);
    let level = page.section(root).level() + 1;

    let found: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|&(_, &id)| {
            let section = page.section(id);
            section.level() == level
                && !ctx.config.is_standard_header(&section.stripped_header())
                && P_TERM.is_match(&strip_comments_and_nowiki(section.intro()))
        })
        .map(|(i, _)| i)
        .collect();

    if found.windows(2).any(|w| w[1] != w[0] + 1) {
        return Vec::new();
    }

    found.into_iter().map(|i| all[i]).collect()
}

/// Number definitions 1, 2, 3... across all part-of-speech sections of a
/// language or etymology.
pub(crate) fn fix_definition_numbering(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let groups: Vec<Vec<SectionId>> = page
        .lang_sections()
        .into_iter()
        .flat_map(|lang| numbering_roots(&page, lang))
        .filter(|&root| is_numbering_safe(&page, root))
        .map(|root| successive_definition_sections(&page, root, ctx))
        .filter(|sections| !sections.is_empty())
        .collect();

    for sections in groups {
        let mut number = 1usize;

        for id in sections {
            let intro = page.section(id).intro().to_string();
            let updated = replace_with_standard_ignored_ranges(&intro, &P_TERM, |caps| {
                let whole = caps.get(0)?;
                let digits = caps.get(1)?;
                let current = digits.as_str().trim().parse::<usize>().ok();

                let replacement = (current != Some(number)).then(|| {
                    format!(
                        "{}{}{}",
                        &intro[whole.start()..digits.start()],
                        number,
                        &intro[digits.end()..whole.end()]
                    )
                });

                number += 1;
                replacement
            });

            if updated != intro {
                page.section_mut(id).set_intro(&updated);
            }
        }
    }

    Ok(page_outcome(text, &page, "corrigiendo numeración de definiciones"))
}

/// Drop `'''headword'''` lines repeating the title above the definitions.
pub(crate) fn remove_definition_headers(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let pattern = format!(r"(?m)^'{{3}}(?:to )?{}'{{3}}$", regex::escape(ctx.title));
    let Ok(headword) = Regex::new(&pattern) else {
        return Ok(None);
    };

    for id in page.sections().to_vec() {
        let section = page.section(id);
        if !is_term_header(&section.stripped_header(), ctx.config) {
            continue;
        }

        let intro = section.intro().to_string();
        let updated = replace_with_standard_ignored_ranges(&intro, &headword, |_| Some(String::new()));
        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    Ok(page_outcome(text, &page, "eliminando encabezamientos de definiciones"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn run(
        pass: fn(&Context, &str) -> EditorResult<Option<Outcome>>,
        title: &str,
        text: &str,
    ) -> Option<Outcome> {
        let config = Config::builtin().unwrap();
        let ctx = Context {
            config: &config,
            title,
            old_structure: false,
        };
        pass(&ctx, text).unwrap()
    }

    #[test]
    fn test_convert_hashed_definitions() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n# Edificio.\n#Hogar.";
        let outcome = run(convert_hashed_definitions, "casa", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n;2:Hogar."
        );
        assert!(run(convert_hashed_definitions, "casa", &outcome.text).is_none());
    }

    #[test]
    fn test_convert_hashed_definitions_keeps_nested_lists() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n# Edificio.\n#: Ejemplo.";
        assert!(run(convert_hashed_definitions, "casa", text).is_none());
    }

    #[test]
    fn test_fix_definition_numbering() {
        let text = "=={{lengua|es}}==\n===Etimología===\nx\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n;1: Hogar.\n==={{verbo transitivo|es}}===\n;1: Hacer casa.\n===Traducciones===\ny";
        let outcome = run(fix_definition_numbering, "casa", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología===\nx\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n;2: Hogar.\n==={{verbo transitivo|es}}===\n;3: Hacer casa.\n===Traducciones===\ny"
        );
        assert!(run(fix_definition_numbering, "casa", &outcome.text).is_none());
    }

    #[test]
    fn test_fix_definition_numbering_keeps_numbered_translations() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n;1: Hogar.\n===Traducciones===\n{{t+|fr|1|maison}}";
        assert!(run(fix_definition_numbering, "casa", text).is_none());
    }

    #[test]
    fn test_fix_definition_numbering_needs_successive_sections() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n===Locuciones===\nx\n==={{verbo|es}}===\n;1: Hacer.";
        assert!(run(fix_definition_numbering, "casa", text).is_none());
    }

    #[test]
    fn test_remove_definition_headers() {
        let text = "=={{lengua|en}}==\n==={{verbo|en}}===\n'''to walk'''\n;1: Caminar.";
        let outcome = run(remove_definition_headers, "walk", text).unwrap();
        assert!(!outcome.text.contains("'''to walk'''"));
        assert!(outcome.text.contains(";1: Caminar."));
        assert!(run(remove_definition_headers, "walk", &outcome.text).is_none());

        let text = "=={{lengua|en}}==\n===Etimología===\n'''walk'''";
        assert!(run(remove_definition_headers, "walk", text).is_none());
    }
}
