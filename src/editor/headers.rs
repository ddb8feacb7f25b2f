//! Header spelling, language header templates, inflected-form headers and
//! section levels.

use once_cell::sync::Lazy;
use regex::Regex;

use super::templates::section_catgram;
use super::{
    has_hashed_lines, has_template, is_term_header, page_outcome, Context, Outcome, P_ETYMOLOGY,
    P_FLEXIVE_HEADER, P_PRON_GRAF, P_REFERENCES, P_TERM, REFERENCES_HEADER,
};
use crate::config::Config;
use crate::error::{EditorError, EditorResult};
use crate::page::{Page, SectionId};
use crate::ranges::strip_comments_and_nowiki;
use crate::template::{find_template_spans, normalize_name, Template};

/// Header rewrites, applied in order. Each replaces its first match only.
static HEADER_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)^Etimolog[íi]a", "Etimología"),
        (r"(?i)^Pronunciaci[óo]n\b", "Pronunciación"),
        (r"(?i)^Locuciones", "Locuciones"),
        (r"(?i)^(?:Refranes|Dichos?)", "Refranes"),
        (r"(?i)^Conjugaci[óo]n\b", "Conjugación"),
        (r"(?i)^Informaci[óo]n (?:adicional|avanzada)", "Información adicional"),
        (r"(?i)^(?:Ver|Vea|V[ée]ase) tambi[ée]n", "Véase también"),
        (r"(?i)^Proverbio\b", "Refrán"),
        (r"(?i)^Acr[óo]nimo\b$", "Sigla"),
        (r"(?i)^Sub?stantivo\b", "Sustantivo"),
        (r"(?i)^Contracci[óo]n\b", "Contracción"),
        (r"(?i)^Formas? flexivas?$", "Forma flexiva"),
        (r"(?i)^Formas? (?:de )?sub?stantiv[oa]s?$", "Forma sustantiva"),
        (r"(?i)^Formas? (?:de )?verb(?:os?|al(?:es)?)$", "Forma verbal"),
        (r"(?i)^Formas? (?:de )?adjetiv[oa]s?$", "Forma adjetiva"),
        (r"(?i)^Formas? (?:de )?(?:pronombres?|pronominal(?:es)?)$", "Forma pronominal"),
        (
            r"(?i)^Formas? (?:de )?(?:preposici(?:ón|ones)|prepositiv(?:o|as?))$",
            "Forma prepositiva",
        ),
        (r"(?i)^Formas? (?:de )?adverbi(?:os?|al(?:es)?)$", "Forma adverbial"),
        (
            r"(?i)^Formas? (?:de )?sub?stantiv[oa]s? (masculin|femenin|neutr)[oa]s?$",
            "Forma sustantiva ${1}a",
        ),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("valid regex"), r))
    .collect()
});

static P_TRANSLATIONS_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Traducci[óo]n(?:es)?$").expect("valid regex"));

static P_REFERENCES_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:<small *?> *?)?(?:Notas y )?Referencias?\b.*$").expect("valid regex")
});

/// Replace plain language-name headers ("==Francés==") with `{{lengua}}`.
pub(crate) fn insert_lang_section_templates(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };
    let references = page.references();

    for id in page.sections().to_vec() {
        let section = page.section(id);

        if section.level() != 2
            || page.toc_level(id) != 1
            || section.is_lang_section()
            || Some(id) == references
        {
            continue;
        }

        let Some(code) = ctx.config.lang_code(section.header()) else {
            continue;
        };

        let header = format!("{{{{lengua|{}}}}}", code);
        page.section_mut(id).set_header(&header, ctx.config);
    }

    Ok(page_outcome(text, &page, "insertando plantillas de encabezamiento"))
}

/// Normalized spelling of a standard header.
fn normalized_header(header: &str, spanish: bool, old_structure: bool) -> String {
    let mut header = header.trim_matches('=').trim().to_string();

    for (re, replacement) in HEADER_RULES.iter() {
        header = re.replacen(&header, 1, *replacement).into_owned();
    }

    let translations = if spanish { "Traducciones" } else { "Traducción" };
    header = P_TRANSLATIONS_HEADER
        .replacen(&header, 1, translations)
        .into_owned();

    if !old_structure {
        header = P_REFERENCES_HEADER
            .replacen(&header, 1, REFERENCES_HEADER)
            .into_owned();
    }

    header
}

/// Fix the spelling and casing of standard headers.
pub(crate) fn normalize_section_headers(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    for id in page.sections().to_vec() {
        let section = page.section(id);

        if section.is_lang_section() || section.header() != section.stripped_header() {
            continue;
        }

        let spanish = page
            .lang_section_parent(id)
            .and_then(|lang| page.section(lang).lang())
            .is_some_and(|lang| lang.code_equals("es"));

        let header = normalized_header(section.header(), spanish, ctx.old_structure);

        if header != section.header() {
            page.section_mut(id).set_header(&header, ctx.config);
        }
    }

    Ok(page_outcome(text, &page, "normalizando títulos de encabezamiento"))
}

/// Push bottom sections found among `roots` (and their subtrees) up to
/// `level`.
fn lift_bottom_sections(
    page: &mut Page,
    roots: &[SectionId],
    level: usize,
    config: &Config,
) -> EditorResult<()> {
    let mut targets = Vec::new();

    for &root in roots {
        for id in std::iter::once(root).chain(page.flatten_subsections(root)) {
            let header = page.section(id).stripped_header();
            if config.settings.bottom_sections.contains(&header) {
                targets.push(id);
            }
        }
    }

    for id in targets {
        let current = page.section(id).level();
        if current > level {
            page.push_levels(id, -((current - level) as i32))?;
        }
    }

    Ok(())
}

/// Whether every definition in `intro` points at an inflected form, as in
/// `;1: {{forma verbo|amar|...}}`.
fn has_only_flexive_definitions(intro: &str, config: &Config) -> bool {
    let intro = strip_comments_and_nowiki(intro);
    let mut found = false;

    for caps in P_TERM.captures_iter(&intro) {
        let body = caps.get(4).map_or("", |m| m.as_str());
        let flexive = config
            .settings
            .flexive_form_templates
            .iter()
            .any(|name| has_template(body, name));

        if !flexive {
            return false;
        }
        found = true;
    }

    found
}

/// The header template, if the header consists of nothing else.
fn sole_template(header: &str) -> Option<Template> {
    match find_template_spans(header).as_slice() {
        [span] if span.start == 0 && span.end == header.len() => Template::parse(header),
        _ => None,
    }
}

/// "Forma" header for a section template header: `{{sustantivo femenino|xx}}`
/// becomes "Forma sustantiva femenina".
fn flexive_header(header: &str, config: &Config) -> Option<String> {
    let template = sole_template(header)?;
    let name = normalize_name(template.name());

    if !config.is_section_template(&name) && config.section_compound(&name).is_none() {
        return None;
    }

    let catgram = section_catgram(&name, &template, config)?;
    let form = std::iter::once(catgram.first())
        .chain(catgram.second())
        .map(|data| data.feminine_singular_adjective())
        .collect::<Vec<_>>()
        .join(" ");

    Some(format!("Forma {}", form))
}

/// Rename part-of-speech sections that only hold inflected-form definitions.
pub(crate) fn convert_headers_to_flexive_form(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let targets: Vec<SectionId> = page
        .sections()
        .iter()
        .copied()
        .filter(|&id| {
            let section = page.section(id);
            !section.is_lang_section()
                && page.lang_section_parent(id).is_some()
                && page.children(id).is_empty()
                && !section.header().to_lowercase().contains("forma")
                && !has_hashed_lines(section.intro())
                && is_term_header(&section.stripped_header(), ctx.config)
                && has_only_flexive_definitions(section.intro(), ctx.config)
        })
        .collect();

    for id in targets {
        let section = page.section(id);
        if section.header() != section.stripped_header() {
            continue;
        }

        let Some(header) = flexive_header(section.header(), ctx.config) else {
            continue;
        };

        let Some(lang) = page.lang_section_parent(id) else {
            continue;
        };

        let taken = page
            .flatten_subsections(lang)
            .into_iter()
            .any(|s| page.section(s).header() == header);

        if !taken {
            page.section_mut(id).set_header(&header, ctx.config);
        }
    }

    Ok(page_outcome(
        text,
        &page,
        "revisando títulos de sección de formas flexivas",
    ))
}

/// A language section holding "Forma ..." sections may otherwise only hold
/// standard sections.
pub(crate) fn check_flexive_form_headers(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    for lang in page.lang_sections() {
        let headers: Vec<String> = page
            .flatten_subsections(lang)
            .into_iter()
            .map(|id| page.section(id).stripped_header())
            .collect();

        if !headers.iter().any(|h| P_FLEXIVE_HEADER.is_match(h)) {
            continue;
        }

        if let Some(header) = headers
            .iter()
            .find(|h| !P_FLEXIVE_HEADER.is_match(h) && !ctx.config.is_standard_header(h))
        {
            return Err(EditorError::Structural(format!(
                "Inflected-form section mixed with \"{}\" in {}",
                header,
                page.section(lang).header()
            )));
        }
    }

    Ok(None)
}

/// "Etimología" for a single etymology, "Etimología N" for several.
pub(crate) fn normalize_etymology_headers(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    for lang in page.lang_sections() {
        let etymologies = page.find_subsections(lang, &P_ETYMOLOGY);
        let numbered = etymologies.len() > 1;

        for (i, id) in etymologies.into_iter().enumerate() {
            let header = if numbered {
                format!("Etimología {}", i + 1)
            } else {
                "Etimología".to_string()
            };

            if page.section(id).header() != header {
                page.section_mut(id).set_header(&header, ctx.config);
            }
        }
    }

    Ok(page_outcome(text, &page, "normalizando encabezamientos de etimología"))
}

/// Make header levels follow the page tree: language sections at level 2,
/// their subsections below, references back at level 2.
pub(crate) fn normalize_section_levels(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    if page.lang_sections().is_empty() {
        return Ok(None);
    }

    page.normalize_child_levels()?;

    // Stray top-level sections belong to whatever precedes them
    for id in page.top_level() {
        let section = page.section(id);
        if section.is_lang_section()
            || P_REFERENCES.is_match(&section.stripped_header())
            || page.previous_section(id).is_none()
        {
            continue;
        }

        page.push_levels(id, 1)?;
    }

    if let Some(references) = page.references() {
        let level = page.section(references).level();
        if level != 2 {
            page.push_levels(references, 2 - level as i32)?;
        }
    }

    for id in page.find_sections(&P_ETYMOLOGY) {
        let level = page.section(id).level();
        if level > 3 {
            page.push_levels(id, 3 - level as i32)?;
        }
    }

    page.normalize_child_levels()?;

    for id in page.find_sections(&P_PRON_GRAF) {
        for child in page.children(id).to_vec() {
            page.push_levels(child, -1)?;
        }
    }

    for lang in page.lang_sections() {
        if page.has_subsection(lang, &P_FLEXIVE_HEADER) {
            continue;
        }

        let etymologies = page.find_subsections(lang, &P_ETYMOLOGY);

        if etymologies.len() == 1 {
            for child in page.children(etymologies[0]).to_vec() {
                page.push_levels(child, -1)?;
            }
            let children = page.children(lang).to_vec();
            lift_bottom_sections(&mut page, &children, 3, ctx.config)?;
        } else if etymologies.len() > 1 {
            let order = page.sections().to_vec();
            let position = |id: SectionId| order.iter().position(|&s| s == id);
            let first = position(etymologies[0]);

            for child in page.children(lang).to_vec() {
                if etymologies.contains(&child) || position(child) < first {
                    continue;
                }
                page.push_levels(child, 1)?;
            }

            for &etymology in &etymologies {
                let children = page.children(etymology).to_vec();
                lift_bottom_sections(&mut page, &children, 4, ctx.config)?;
            }
        }
    }

    Ok(page_outcome(text, &page, "normalizando niveles de títulos"))
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_normalized_header() {
        assert_eq!(normalized_header("etimologia", true, false), "Etimología");
        assert_eq!(normalized_header("Ver también", true, false), "Véase también");
        assert_eq!(normalized_header("Traduccion", true, false), "Traducciones");
        assert_eq!(normalized_header("Traducciones", false, false), "Traducción");
        assert_eq!(normalized_header("Formas flexivas", true, false), "Forma flexiva");
        assert_eq!(
            normalized_header("Formas sustantivas femeninas", true, false),
            "Forma sustantiva femenina"
        );
        assert_eq!(normalized_header("Notas y referencias", true, false), "Referencias y notas");
        assert_eq!(normalized_header("Notas y referencias", true, true), "Notas y referencias");
    }

    #[test]
    fn test_normalize_section_headers() {
        let text = "=={{lengua|es}}==\n===Etimologia===\nx\n===Substantivo femenino===\ny";
        let outcome = run(normalize_section_headers, "x", text, false).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología===\nx\n===Sustantivo femenino===\ny"
        );
        assert!(run(normalize_section_headers, "x", &outcome.text, false).is_none());
    }

    #[test]
    fn test_insert_lang_section_templates() {
        let outcome = run(insert_lang_section_templates, "x", "==Francés==\nx", false).unwrap();
        assert_eq!(outcome.text, "=={{lengua|fr}}==\nx");
    }

    #[test]
    fn test_convert_headers_to_flexive_form() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: {{forma sustantivo|casa|número=plural}}.";
        let outcome = run(convert_headers_to_flexive_form, "casas", text, false).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Forma sustantiva femenina===\n;1: {{forma sustantivo|casa|número=plural}}."
        );
        assert!(run(convert_headers_to_flexive_form, "casas", &outcome.text, false).is_none());

        let text = "=={{lengua|es}}==\n==={{verbo|es}}===\n;1: {{forma verbo|amar|p=1s|t=presente}}.\n;2: Definición propia.";
        assert!(run(convert_headers_to_flexive_form, "amo", text, false).is_none());
    }

    #[test]
    fn test_flexive_header_taken() {
        let text = "=={{lengua|es}}==\n===Forma verbal===\n;1: {{forma verbo|amar}}.\n==={{verbo|es}}===\n;1: {{forma verbo|amar}}.";
        assert!(run(convert_headers_to_flexive_form, "amo", text, false).is_none());
    }

    #[test]
    fn test_check_flexive_form_headers() {
        let config = config();
        let ctx = Context {
            config: &config,
            title: "casas",
            old_structure: false,
        };

        let text = "=={{lengua|es}}==\n===Etimología===\nx\n===Forma sustantiva===\n;1: {{forma sustantivo|casa}}.";
        assert!(check_flexive_form_headers(&ctx, text).unwrap().is_none());

        let text = "=={{lengua|es}}==\n===Forma sustantiva===\n;1: {{forma sustantivo|casa}}.\n==={{sustantivo|es}}===\n;1: Edificio.";
        let err = check_flexive_form_headers(&ctx, text).unwrap_err();
        assert!(matches!(err, EditorError::Structural(_)));
    }

    #[test]
    fn test_normalize_etymology_headers() {
        let text = "=={{lengua|es}}==\n===Etimología 1===\nx\n=={{lengua|fr}}==\n===Etimología===\ny\n===Etimología===\nz";
        let outcome = run(normalize_etymology_headers, "x", text, false).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología===\nx\n=={{lengua|fr}}==\n===Etimología 1===\ny\n===Etimología 2===\nz"
        );
        assert!(run(normalize_etymology_headers, "x", &outcome.text, false).is_none());
    }

    #[test]
    fn test_normalize_section_levels_overflow() {
        let text = "=={{lengua|es}}==\n;1: x\n==Miscelánea==\n===a===\n====b====\n=====c=====\n======d======";
        let config = config();
        let ctx = Context {
            config: &config,
            title: "x",
            old_structure: false,
        };
        let err = normalize_section_levels(&ctx, text).unwrap_err();
        assert!(matches!(err, EditorError::InvariantViolation(_)));
    }

    #[test]
    fn test_normalize_section_levels() {
        let text = "=={{lengua|es}}==\n===Etimología===\nx\n====Sustantivo====\ny\n=====Traducciones=====\nz";
        let outcome = run(normalize_section_levels, "x", text, false).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología===\nx\n===Sustantivo===\ny\n===Traducciones===\nz"
        );
        assert!(run(normalize_section_levels, "x", &outcome.text, false).is_none());
    }
}
