//! Insertion, removal and ordering of whole sections.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    has_template, is_empty_or_invisible, outcome, page_outcome, push_unique,
    reduced_section_check, Context, Outcome, AMBOX_TEMPLATES, P_ETYMOLOGY, P_FLEXIVE_HEADER,
    P_PRON_GRAF, P_REFERENCES_AND_NOTES, RECONSTRUCTED_LANGS, REFERENCES_HEADER,
    TRANSLATIONS_COMMENT, TRANSLATIONS_TEMPLATE,
};
use super::migrator::move_etymology_lines;
use super::references::references_section;
use crate::config::Config;
use crate::error::EditorResult;
use crate::page::{Page, SectionId};
use crate::ranges::{contained_in_ranges, standard_ignored_ranges, strip_comments_and_nowiki};
use crate::section::Section;
use crate::template::{find_template_spans, find_templates, replace_named_templates, Param, Template};

static P_AMBOX_LINE: Lazy<Regex> = Lazy::new(|| {
    let names = AMBOX_TEMPLATES
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"^[ :;*#]*\{{\{{ *(?:{}) *(?:\|.*)?\}}\}}(?: *<!--.+?-->)*$",
        names
    );
    Regex::new(&pattern).expect("valid regex")
});

static P_TRANSLATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Traducciones$").expect("valid regex"));

static P_FOREIGN_TRANSLATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Traducción$").expect("valid regex"));

static P_ANY_TRANSLATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Traducci(?:ón|ones)$").expect("valid regex"));

static P_SINGLE_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Etimología$").expect("valid regex"));

static P_NUMBERED_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Etimología \d+$").expect("valid regex"));

static P_TRANSLATION_BOXES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{trad-(?:arriba|centro|abajo)\|*\}\}").expect("valid regex"));

static P_BARE_ETYMOLOGY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{etimología2?(?:\|leng=[\w-]+?)?\|*\}\}\.?").expect("valid regex")
});

static P_LINE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[:;*#]*").expect("valid regex"));

/// "de [[amar]]", "véase ''{{l|en|walk}}''" and similar pointers to the
/// inflected lemma.
static P_FLEX_ETYMOLOGY: Lazy<Regex> = Lazy::new(|| {
    let link = r"\[{2}[^\]]+\]{2}|\{{2}l\|[\w-]+\|[^|}]+\}{2}";
    let pattern = format!(
        r#"^(?:[Dd]e|[Vv]éase|[Dd]el verbo|[Ff]lexión de) (?:''(?:{0})''|"(?:{0})"|(?:{0}))(?: y (?:de )?\[{{2}}(?:-ed|-ing)\]{{2}})?$"#,
        link
    );
    Regex::new(&pattern).expect("valid regex")
});

/// Fold childless "Pronunciación y escritura" sections into their parent,
/// maintenance boxes first.
pub(crate) fn remove_pron_graf_section(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    for id in page.find_sections(&P_PRON_GRAF) {
        let Some(parent) = page.parent(id) else {
            continue;
        };

        if !page.children(id).is_empty() {
            continue;
        }

        let parent_section = page.section(parent);
        if !parent_section.is_lang_section() && !P_ETYMOLOGY.is_match(parent_section.header()) {
            continue;
        }

        let merged = format!("{}\n{}", page.section(id).intro(), parent_section.intro());
        let (ambox, rest): (Vec<&str>, Vec<&str>) =
            merged.lines().partition(|line| P_AMBOX_LINE.is_match(line));
        let intro = ambox.into_iter().chain(rest).collect::<Vec<_>>().join("\n");

        page.section_mut(parent).set_intro(&intro);
        page.detach_only_self(id);
    }

    Ok(page_outcome(text, &page, "eliminando títulos de pronunciación"))
}

pub(crate) fn sort_lang_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };
    page.sort_lang_sections();

    Ok(page_outcome(text, &page, "ordenando secciones de idioma"))
}

/// Add the etymology, translations and references sections a complete entry
/// is expected to have.
pub(crate) fn add_missing_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    if page.sections().is_empty() {
        return Ok(None);
    }

    let mut added: Vec<String> = Vec::new();

    // Etymology
    if !ctx.title.contains(' ') {
        for lang in page.lang_sections() {
            let section = page.section(lang);
            let children = page.children(lang);

            if children.is_empty()
                || page.has_subsection(lang, &P_ETYMOLOGY)
                || page.has_subsection(lang, &P_FLEXIVE_HEADER)
                || section
                    .lang_code()
                    .is_some_and(|code| RECONSTRUCTED_LANGS.contains(&code))
                || reduced_section_check(&page, lang, ctx.config)
                || children
                    .iter()
                    .all(|&c| ctx.config.is_standard_header(&page.section(c).stripped_header()))
            {
                continue;
            }

            let mut etymology = Section::create("Etimología", 3)?;
            etymology.set_trailing_newlines(1);
            move_etymology_lines(page.section_mut(lang), &mut etymology);

            let intro = etymology.intro();
            if !has_template(intro, "etimología") && !has_template(intro, "etimología2") {
                let template = match page.section(lang).lang_code() {
                    Some(code) if !code.eq_ignore_ascii_case("es") => {
                        format!("{{{{etimología|leng={}}}}}.", code)
                    }
                    _ => "{{etimología}}.".to_string(),
                };
                etymology.set_intro(&template);
            }

            let etymology = page.create_section(etymology);
            page.prepend_children(lang, &[etymology])?;
            push_unique(&mut added, "Etimología".to_string());
        }
    }

    // Translations
    if let Some(spanish) = page.lang_section("es") {
        if !has_template(&page.render_section(spanish), "apellido")
            && !reduced_section_check(&page, spanish, ctx.config)
        {
            let etymologies = page.find_subsections(spanish, &P_ETYMOLOGY);

            let targets: Vec<(SectionId, usize)> = match etymologies.as_slice() {
                [only] => {
                    let eligible = page.section(*only).level() == 3
                        && !page.has_subsection(spanish, &P_TRANSLATIONS)
                        && !page.has_subsection(spanish, &P_FLEXIVE_HEADER);
                    if eligible {
                        vec![(spanish, 3)]
                    } else {
                        Vec::new()
                    }
                }
                many => many
                    .iter()
                    .copied()
                    .filter(|&e| {
                        page.section(e).level() == 3
                            && !page.has_subsection(e, &P_TRANSLATIONS)
                            && !page.has_subsection(e, &P_FLEXIVE_HEADER)
                    })
                    .map(|e| (e, 4))
                    .collect(),
            };

            for (parent, level) in targets {
                let mut translations = Section::create("Traducciones", level)?;
                translations.set_intro(TRANSLATIONS_TEMPLATE);
                translations.set_trailing_newlines(1);
                let translations = page.create_section(translations);
                page.append_children(parent, &[translations])?;
                push_unique(&mut added, "Traducciones".to_string());
            }
        }
    }

    // References
    if page.find_sections(&P_REFERENCES_AND_NOTES).is_empty() && page.references().is_none() {
        let id = page.create_section(references_section()?);
        page.set_references_section(id);
        push_unique(&mut added, REFERENCES_HEADER.to_string());
    }

    if added.is_empty() {
        return Ok(None);
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some(format!("añadiendo secciones: {}", added.join(", "))),
    ))
}

pub(crate) fn sort_sub_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    for lang in page.lang_sections() {
        if !page.has_subsection(lang, &P_FLEXIVE_HEADER) {
            page.sort_lang_section_children(lang, ctx.config);
        }
    }

    Ok(page_outcome(text, &page, "ordenando subsecciones"))
}

/// Remove childless standard sections with nothing visible in them. Invisible
/// leftovers (comments, images, categories) move to the previous section.
pub(crate) fn delete_empty_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    if page.lang_sections().is_empty() {
        return Ok(None);
    }

    let mut removed: Vec<String> = Vec::new();

    for id in page.sections().to_vec() {
        let section = page.section(id);
        let header = section.stripped_header();

        if header.starts_with("Etimología")
            || !page.children(id).is_empty()
            || !ctx.config.is_standard_header(&header)
            || !is_empty_or_invisible(section.intro())
        {
            continue;
        }

        let intro = section.intro().to_string();

        if !intro.is_empty() {
            let Some(previous) = page.previous_section(id) else {
                continue;
            };
            let merged = format!("{}\n{}", page.section(previous).intro(), intro);
            page.section_mut(previous).set_intro(&merged);
        }

        page.detach_only_self(id);
        push_unique(&mut removed, header);
    }

    if removed.is_empty() {
        return Ok(None);
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some(format!("eliminando secciones vacías: {}", removed.join(", "))),
    ))
}

/// Foreign "Traducción" sections used as a plain wrapper lose their header;
/// their children move up one level.
pub(crate) fn pull_up_foreign_translations_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    let targets: Vec<SectionId> = page
        .lang_sections()
        .into_iter()
        .filter(|&lang| !page.section(lang).lang().is_some_and(|l| l.code_equals("es")))
        .flat_map(|lang| page.find_subsections(lang, &P_FOREIGN_TRANSLATIONS))
        .filter(|&id| is_empty_or_invisible(page.section(id).intro()) && !page.children(id).is_empty())
        .collect();

    for id in targets {
        let intro = page.section(id).intro().to_string();

        if !intro.is_empty() {
            if let Some(previous) = page.previous_section(id) {
                let merged = format!("{}\n{}", page.section(previous).intro(), intro);
                page.section_mut(previous).set_intro(&merged);
            }
        }

        page.push_levels(id, -1)?;
        page.detach_only_self(id);
    }

    Ok(page_outcome(text, &page, "subiendo subsecciones de \"Traducción\""))
}

/// Only "Forma ..." sections besides the standard ones.
fn is_flexive_only(page: &Page, id: SectionId, config: &Config) -> bool {
    let headers: Vec<String> = page
        .children(id)
        .iter()
        .map(|&c| page.section(c).stripped_header())
        .collect();

    headers.iter().any(|h| P_FLEXIVE_HEADER.is_match(h))
        && !headers
            .iter()
            .any(|h| !config.is_standard_header(h) && !P_FLEXIVE_HEADER.is_match(h))
}

fn is_empty_translations_section(intro: &str) -> bool {
    let intro = strip_comments_and_nowiki(intro);
    let intro = P_TRANSLATION_BOXES.replace_all(&intro, "");
    intro.replace("{{clear}}", "").trim().is_empty()
}

fn is_empty_etymology_section(intro: &str) -> bool {
    let intro = strip_comments_and_nowiki(intro);
    let intro = P_BARE_ETYMOLOGY.replace_all(&intro, "");
    intro.replace("{{clear}}", "").trim().is_empty()
}

/// Drop empty translation sections where none are expected (foreign
/// languages, inflected forms) and empty etymologies of multi-word titles.
pub(crate) fn delete_wrong_sections(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let langs: Vec<SectionId> = page
        .lang_sections()
        .into_iter()
        .filter(|&lang| !page.children(lang).is_empty())
        .collect();

    if langs.is_empty() {
        return Ok(None);
    }

    let mut removed: Vec<String> = Vec::new();

    let translations: Vec<SectionId> = langs
        .iter()
        .copied()
        .filter(|&lang| {
            !page.section(lang).lang().is_some_and(|l| l.code_equals("es"))
                || is_flexive_only(&page, lang, ctx.config)
                || reduced_section_check(&page, lang, ctx.config)
        })
        .flat_map(|lang| page.find_subsections(lang, &P_ANY_TRANSLATIONS))
        .filter(|&id| page.children(id).is_empty() && is_empty_translations_section(page.section(id).intro()))
        .collect();

    for id in translations {
        page.detach_only_self(id);
        push_unique(&mut removed, "Traducciones".to_string());
    }

    let etymologies: Vec<SectionId> = langs
        .iter()
        .copied()
        .filter(|&lang| {
            ctx.title.contains(' ')
                || is_flexive_only(&page, lang, ctx.config)
                || reduced_section_check(&page, lang, ctx.config)
        })
        .flat_map(|lang| page.find_subsections(lang, &P_SINGLE_ETYMOLOGY))
        .filter(|&id| page.children(id).is_empty() && is_empty_etymology_section(page.section(id).intro()))
        .collect();

    for id in etymologies {
        page.detach_only_self(id);
        push_unique(&mut removed, "Etimología".to_string());
    }

    if removed.is_empty() {
        return Ok(None);
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some(format!("eliminando secciones: {}", removed.join(", "))),
    ))
}

/// Whether an etymology template says nothing beyond pointing at the lemma.
fn is_redundant_etymology(template: &Template) -> bool {
    let params: Vec<&Param> = template
        .params
        .iter()
        .filter(|p| !p.answers_to("leng") && !p.value().trim().is_empty())
        .collect();

    if params.is_empty() {
        return true;
    }

    let first = template.get("1").filter(|v| !v.is_empty());

    if template.is_named("etimología") {
        first.is_some_and(|v| matches!(v, "plural" | "femenino" | "sufijo"))
    } else {
        first.is_some_and(|v| P_FLEX_ETYMOLOGY.is_match(v))
    }
}

/// The etymology template of a line holding nothing else but list markers
/// and a closing period.
fn etymology_line_template(line: &str) -> Option<Template> {
    let prefix = P_LINE_PREFIX.find(line).map_or(0, |m| m.end());
    let rest = &line[prefix..];

    let span = find_template_spans(rest).into_iter().next()?;
    if span.start != 0 || !matches!(&rest[span.end..], "" | ".") {
        return None;
    }

    Template::parse(&rest[span])
        .filter(|t| t.is_named("etimología") || t.is_named("etimología2"))
}

/// Remove etymology lines that only restate an inflection where no
/// etymology section is expected.
pub(crate) fn remove_etymology_templates(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let langs = page.lang_sections();
    if langs.is_empty() {
        return Ok(None);
    }

    let mut targets: Vec<SectionId> = langs
        .iter()
        .copied()
        .filter(|&lang| !page.children(lang).is_empty() && !page.has_subsection(lang, &P_ETYMOLOGY))
        .collect();
    targets.extend(
        langs
            .iter()
            .flat_map(|&lang| page.find_subsections(lang, &P_NUMBERED_ETYMOLOGY)),
    );

    for id in targets {
        let eligible = ctx.title.contains(' ')
            || is_flexive_only(&page, id, ctx.config)
            || reduced_section_check(&page, id, ctx.config);

        let intro = page.section(id).intro().to_string();
        if !eligible || (!has_template(&intro, "etimología") && !has_template(&intro, "etimología2")) {
            continue;
        }

        let ignored = standard_ignored_ranges(&intro);
        let mut offset = 0;
        let mut kept = Vec::new();

        for line in intro.split('\n') {
            let redundant = !contained_in_ranges(&ignored, offset)
                && etymology_line_template(line).is_some_and(|t| is_redundant_etymology(&t));
            if !redundant {
                kept.push(line);
            }
            offset += line.len() + 1;
        }

        let updated = kept.join("\n");
        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    Ok(page_outcome(text, &page, "eliminando plantillas de etimología"))
}

/// Show the expected `{{t+}}` format in translation boxes still without any.
pub(crate) fn add_translations_example_comment(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    let targets: Vec<SectionId> = page
        .find_sections(&P_TRANSLATIONS)
        .into_iter()
        .filter(|&id| {
            let intro = page.section(id).intro();
            !intro.contains("{{t+|")
                && !intro.contains("trad-véase")
                && has_template(intro, "trad-arriba")
                && find_templates("t+", intro).is_empty()
        })
        .collect();

    for id in targets {
        let intro = page.section(id).intro().to_string();
        let updated = replace_named_templates(&intro, "trad-arriba", |template| {
            Some(format!("{}\n{}", template, TRANSLATIONS_COMMENT))
        });
        page.section_mut(id).set_intro(&updated);
    }

    Ok(outcome(text, page.to_string(), None))
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
    fn test_remove_pron_graf_section() {
        let text = "=={{lengua|es}}==\n===Pronunciación y escritura===\n{{pron-graf}}\n{{esbozo}}\n===Etimología===\ny";
        let outcome = run(remove_pron_graf_section, "x", text, false).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n{{esbozo}}\n{{pron-graf}}\n===Etimología===\ny"
        );
    }

    #[test]
    fn test_add_missing_sections() {
        let text = "=={{lengua|es}}==\n===Sustantivo femenino===\n;1: Edificio.";
        let outcome = run(add_missing_sections, "casa", text, false).unwrap();
        assert_eq!(
            outcome.summary.as_deref(),
            Some("añadiendo secciones: Etimología, Traducciones, Referencias y notas")
        );
        assert!(outcome.text.contains("=== Etimología ===\n{{etimología}}."));
        assert!(outcome.text.contains("=== Traducciones ===\n{{trad-arriba}}"));
        assert!(outcome.text.trim_end().ends_with("== Referencias y notas ==\n<references />"));
        assert!(run(add_missing_sections, "casa", &outcome.text, false).is_none());
    }

    #[test]
    fn test_add_missing_sections_skips_multiword_titles() {
        let text = "=={{lengua|es}}==\n===Locución sustantiva===\n;1: Algo.\n==Referencias y notas==\n<references />";
        assert!(run(add_missing_sections, "casa grande", text, false).is_none());
    }

    #[test]
    fn test_delete_empty_sections() {
        let text = "=={{lengua|es}}==\nx\n===Véase también===\n<!-- nada -->\n===Traducciones===\n";
        let outcome = run(delete_empty_sections, "x", text, false).unwrap();
        assert_eq!(outcome.text.trim_end(), "=={{lengua|es}}==\nx\n<!-- nada -->");
        assert_eq!(
            outcome.summary.as_deref(),
            Some("eliminando secciones vacías: Véase también, Traducciones")
        );
    }

    #[test]
    fn test_pull_up_foreign_translations_sections() {
        let text = "=={{lengua|fr}}==\n===Etimología===\nx\n===Traducción===\n===={{sustantivo|fr}}====\n;1: Casa.";
        let outcome = run(pull_up_foreign_translations_sections, "maison", text, false).unwrap();
        assert!(!outcome.text.contains("Traducción"));
        assert!(outcome.text.contains("==={{sustantivo|fr}}===\n;1: Casa."));
        assert!(run(pull_up_foreign_translations_sections, "maison", &outcome.text, false).is_none());

        let text = "=={{lengua|es}}==\n===Traducción===\n===={{sustantivo|es}}====\n;1: Casa.";
        assert!(run(pull_up_foreign_translations_sections, "casa", text, false).is_none());
    }

    #[test]
    fn test_delete_wrong_sections() {
        let text = "=={{lengua|fr}}==\n===Etimología===\n{{etimología|leng=fr}}.\n==={{sustantivo|fr}}===\n;1: Casa.\n===Traducción===\n{{trad-arriba}}\n{{trad-centro}}\n{{trad-abajo}}";
        let outcome = run(delete_wrong_sections, "maison", text, false).unwrap();
        assert_eq!(outcome.summary.as_deref(), Some("eliminando secciones: Traducciones"));
        assert!(!outcome.text.contains("Traducción"));
        assert!(outcome.text.contains("===Etimología==="));
        assert!(run(delete_wrong_sections, "maison", &outcome.text, false).is_none());

        let text = "=={{lengua|es}}==\n===Etimología===\n{{etimología}}.\n===Locución sustantiva===\n;1: Algo.";
        let outcome = run(delete_wrong_sections, "casa grande", text, false).unwrap();
        assert_eq!(outcome.summary.as_deref(), Some("eliminando secciones: Etimología"));
        assert!(!outcome.text.contains("Etimología"));
        assert!(run(delete_wrong_sections, "casa grande", &outcome.text, false).is_none());
    }

    #[test]
    fn test_remove_etymology_templates() {
        let text = "=={{lengua|es}}==\n{{etimología|plural}}.\n===Forma sustantiva===\n;1: {{forma sustantivo|casa|número=plural}}.";
        let outcome = run(remove_etymology_templates, "casas", text, false).unwrap();
        assert!(!outcome.text.contains("etimología"));
        assert!(outcome.text.contains(";1: {{forma sustantivo|casa|número=plural}}."));
        assert!(run(remove_etymology_templates, "casas", &outcome.text, false).is_none());

        let text = "=={{lengua|es}}==\n{{etimología|compuesto|casa|grande}}.\n===Locución sustantiva===\n;1: Algo.";
        assert!(run(remove_etymology_templates, "casa grande", text, false).is_none());
    }

    #[test]
    fn test_is_redundant_etymology() {
        let parse = |t: &str| Template::parse(t).unwrap();
        assert!(is_redundant_etymology(&parse("{{etimología|leng=fr}}")));
        assert!(is_redundant_etymology(&parse("{{etimología|sufijo|casa|-s}}")));
        assert!(is_redundant_etymology(&parse("{{etimología2|de ''[[amar]]''}}")));
        assert!(is_redundant_etymology(&parse("{{etimología2|véase [[walk]] y de [[-ing]]}}")));
        assert!(!is_redundant_etymology(&parse("{{etimología2|Incierta}}")));
        assert!(!is_redundant_etymology(&parse("{{etimología|la|casa}}")));

        assert!(etymology_line_template(":{{etimología|plural}}.").is_some());
        assert!(etymology_line_template("{{etimología|plural}}, de casa").is_none());
    }

    #[test]
    fn test_add_translations_example_comment() {
        let text = "=={{lengua|es}}==\n===Traducciones===\n{{trad-arriba}}\n{{trad-centro}}\n{{trad-abajo}}";
        let outcome = run(add_translations_example_comment, "casa", text, false).unwrap();
        assert_eq!(
            outcome.text,
            format!(
                "=={{{{lengua|es}}}}==\n===Traducciones===\n{{{{trad-arriba}}}}\n{}\n{{{{trad-centro}}}}\n{{{{trad-abajo}}}}",
                TRANSLATIONS_COMMENT
            )
        );
        assert!(outcome.summary.is_none());
        assert!(run(add_translations_example_comment, "casa", &outcome.text, false).is_none());
    }

    #[test]
    fn test_sort_sub_sections() {
        let text = "=={{lengua|es}}==\n===Traducciones===\nx\n===Etimología===\ny";
        let outcome = run(sort_sub_sections, "x", text, false).unwrap();
        assert_eq!(outcome.text, "=={{lengua|es}}==\n===Etimología===\ny\n===Traducciones===\nx");
    }
}
