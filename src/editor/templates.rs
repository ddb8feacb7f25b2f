//! Template-level passes: inflection boxes, language parameters, section
//! header templates, redundant category links and `{{clear}}` elements.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{has_template, outcome, Context, Outcome, P_CATEGORY_LINKS, P_FLEXIVE_HEADER};
use crate::catgram::{Catgram, Data};
use crate::config::Config;
use crate::error::EditorResult;
use crate::page::Page;
use crate::ranges::{
    contained_in_ranges, replace_with_standard_ignored_ranges, standard_ignored_ranges,
    strip_comments_and_nowiki,
};
use crate::template::{find_template_spans, find_templates, normalize_name, replace_templates, Template};

static P_BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\b([^>]*?)>").expect("valid regex"));

static P_BR_CLEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)clear *= *(?:"all"|'all'|all)"#).expect("valid regex")
});

static P_BR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)style *=[^=]*?\bclear *:.+").expect("valid regex"));

static P_CLEAR_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n?\{\{ *clear *\}\}\n?").expect("valid regex"));

static P_NUMBERED_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Etimología \d+$").expect("valid regex"));

/// Boxes that must start below any floating element of the previous section.
const BOX_TEMPLATES: &[&str] = &["arriba", "trad-arriba", "rel-arriba", "derivados"];

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drop `{{inflect.…}}` tables from inflected-form sections. Participles keep
/// theirs.
pub(crate) fn remove_inflection_templates(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    if ctx.old_structure || !text.contains("{{inflect.") {
        return Ok(None);
    }

    let mut page = ctx.parse(text)?;

    for id in page.find_sections(&P_FLEXIVE_HEADER) {
        let intro = page.section(id).intro();

        let participle = has_template(intro, "participio")
            || find_templates("forma", intro).iter().any(|(_, t)| {
                t.get("2")
                    .is_some_and(|p| p.to_lowercase().contains("participio"))
            });

        if !intro.contains("{{inflect.") || participle {
            continue;
        }

        let updated = replace_templates(
            intro,
            |t| t.name().starts_with("inflect."),
            |_| Some(String::new()),
        );

        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some("eliminando plantillas de flexión".to_string()),
    ))
}

/// Align the `leng=` parameter of language-aware templates with the
/// enclosing language section.
fn fix_leng_params(text: &str, code: &str, config: &Config) -> String {
    let templates = &config.settings.leng_param_templates;

    replace_templates(
        text,
        |t| templates.iter().any(|name| t.is_named(name)),
        |template| {
            let mut template = template.clone();
            let mut leng = template.get("leng").map(str::to_string);

            // "lang" is a frequent misspelling of "leng"
            let misspelled = template.remove("lang");

            if template.is_named("ampliable") {
                if let Some(first) = template.get("1").map(str::to_string) {
                    template.remove("1");
                    leng = leng.or(Some(first));
                }
            }

            if code.eq_ignore_ascii_case("es") {
                return match leng {
                    Some(_) => {
                        template.remove("leng");
                        Some(template.to_string())
                    }
                    None if misspelled => Some(template.to_string()),
                    None => None,
                };
            }

            match leng {
                None => {
                    template.insert_named_first("leng", code);
                    Some(template.to_string())
                }
                Some(leng) if !leng.eq_ignore_ascii_case(code) => {
                    template.set_named("leng", code);
                    Some(template.to_string())
                }
                Some(_) if misspelled => Some(template.to_string()),
                Some(_) => None,
            }
        },
    )
}

/// Point section header templates (`{{sustantivo|xx}}`) at the language of
/// the enclosing section.
fn fix_section_template_code(header: &str, code: &str, config: &Config) -> String {
    replace_templates(
        header,
        |t| config.is_section_template(&normalize_name(t.name())),
        |template| {
            if template
                .get("1")
                .is_some_and(|c| c.eq_ignore_ascii_case(code))
            {
                return None;
            }

            let mut template = template.clone();
            template.set_positional(1, code);
            Some(template.to_string())
        },
    )
}

/// Lowercase the parameter `key` of every template in `names`.
fn lowercase_param(text: &str, names: &[String], key: &str) -> String {
    replace_templates(
        text,
        |t| names.iter().any(|name| t.is_named(name)),
        |template| {
            let value = template.get(key).filter(|v| !v.is_empty())?;
            let lowered = value.to_lowercase();
            if lowered == value {
                return None;
            }

            let mut template = template.clone();
            match key.parse::<usize>() {
                Ok(index) => template.set_positional(index, &lowered),
                Err(_) => template.set_named(key, &lowered),
            }
            Some(template.to_string())
        },
    )
}

/// Language codes are lowercase in `{{lengua}}`, section templates and
/// `leng=` parameters.
pub(crate) fn check_lang_code_case(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    for (lang, code) in page.lang_sections_with_codes() {
        let lowered = code.to_lowercase();
        if lowered != code {
            page.section_mut(lang).set_lang_code(&lowered, ctx.config);
        }
    }

    let settings = &ctx.config.settings;
    let formatted = lowercase_param(&page.to_string(), &settings.section_templates, "1");
    let formatted = lowercase_param(&formatted, &settings.leng_param_templates, "leng");

    Ok(outcome(text, formatted, None))
}

/// Fix language codes of templates inside language sections.
pub(crate) fn lang_template_params(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    if ctx.old_structure {
        return Ok(None);
    }

    let mut page = ctx.parse(text)?;

    for (lang, code) in page.lang_sections_with_codes() {
        for id in std::iter::once(lang).chain(page.flatten_subsections(lang)) {
            let intro = page.section(id).intro();
            let updated = fix_leng_params(intro, &code, ctx.config);
            if updated != intro {
                page.section_mut(id).set_intro(&updated);
            }

            let section = page.section(id);
            if section.is_lang_section() || section.header().is_empty() {
                continue;
            }

            let header = fix_section_template_code(section.header(), &code, ctx.config);
            let header = fix_leng_params(&header, &code, ctx.config);
            if header != section.header() {
                page.section_mut(id).set_header(&header, ctx.config);
            }
        }
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some("códigos de idioma".to_string()),
    ))
}

/// Longest qualified catgram of `first` whose singular form prefixes `text`.
fn longest_catgram_prefix(first: Data, text: &str) -> Option<Catgram> {
    Data::ALL
        .iter()
        .filter_map(|&second| Catgram::make(first, second))
        .filter(|catgram| text.starts_with(&catgram.singular()))
        .max_by_key(|catgram| catgram.singular().len())
}

/// Template opening `header`, with the byte offset where it ends.
fn opening_template(header: &str) -> Option<(usize, Template)> {
    let span = find_template_spans(header)
        .into_iter()
        .find(|span| span.start == 0)?;
    Some((span.end, Template::parse(&header[span])?))
}

/// Rewrite a header opening with a plain section template:
/// `{{sustantivo|xx}} masculino` → `{{sustantivo|xx|masculino}}` →
/// `{{sustantivo masculino|xx}}`.
fn process_header_template(header: &str, code: &str, config: &Config) -> String {
    let Some((mut end, mut template)) = opening_template(header) else {
        return header.to_string();
    };

    let mut header = header.to_string();
    let name = normalize_name(template.name());

    // Qualifier written after the template
    if template.has("1") && template.params.len() == 1 && header[end..].starts_with(' ') {
        let prose = format!("{}{}", name, &header[end..]);

        let folded = Data::query(&name).ok().and_then(|first| {
            let catgram = longest_catgram_prefix(first, &prose)?;
            let second = catgram.second()?;
            Some(prose.replacen(
                &catgram.singular(),
                &format!("{{{{{}|{}|{}}}}}", name, code, second.singular()),
                1,
            ))
        });

        if let Some(folded) = folded {
            if let Some((folded_end, reparsed)) = opening_template(&folded) {
                header = folded;
                end = folded_end;
                template = reparsed;
            }
        }
    }

    // Qualifier as second parameter
    if template.has("2") && !template.has("3") {
        let compound = match (Data::query(&name), template.get("2").map(Data::query)) {
            (Ok(first), Some(Ok(second))) => config.section_compound_name(first, second),
            _ => None,
        };

        if let Some(compound) = compound {
            template.set_name(compound);
            template.remove("2");
            header = format!("{}{}", template, &header[end..]);
        }
    }

    header
}

/// Fold qualifiers into compound section templates.
pub(crate) fn manage_section_templates(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    for (lang, code) in page.lang_sections_with_codes() {
        for id in page.flatten_subsections(lang) {
            let header = page.section(id).header().to_string();

            if header.is_empty() || header.contains(['[', ']', '<', '>']) {
                continue;
            }

            let Some((_, template)) = opening_template(&header) else {
                continue;
            };

            let name = normalize_name(template.name());
            if !ctx.config.is_section_template(&name) || ctx.config.section_compound(&name).is_some() {
                continue;
            }

            let updated = process_header_template(&header, &code, ctx.config);
            if updated != header {
                page.section_mut(id).set_header(&updated, ctx.config);
            }
        }
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some("revisando plantillas de sección".to_string()),
    ))
}

/// Template form of a lowercased prose header starting with `template`.
fn section_template_header(header: &str, code: &str, template: &str) -> Option<String> {
    let standard = format!("{{{{{}|{}}}}}", template, code);

    if header == template {
        return Some(standard);
    }

    if !header.contains(' ') {
        return None;
    }

    let first_token = header.split(' ').next().unwrap_or_default();

    let Ok(first) = Data::query(first_token) else {
        return Some(header.replacen(first_token, &standard, 1));
    };

    let qualified = longest_catgram_prefix(first, header).and_then(|catgram| {
        let second = catgram.second()?;
        Some(header.replacen(
            &catgram.singular(),
            &format!("{{{{{}|{}|{}}}}}", template, code, second.singular()),
            1,
        ))
    });

    Some(qualified.unwrap_or_else(|| header.replacen(template, &standard, 1)))
}

/// Replace prose part-of-speech headers with section templates.
pub(crate) fn add_section_templates(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    let mut compounds: Vec<&str> = ctx
        .config
        .section_compounds()
        .iter()
        .map(|(name, _, _)| name.as_str())
        .collect();
    compounds.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let mut simple: Vec<&str> = ctx
        .config
        .settings
        .section_templates
        .iter()
        .map(String::as_str)
        .filter(|name| ctx.config.section_compound(name).is_none())
        .collect();
    simple.sort_by_key(|name| std::cmp::Reverse(name.len()));

    for (lang, code) in page.lang_sections_with_codes() {
        for id in page.flatten_subsections(lang) {
            let header = page.section(id).header();

            if header.is_empty() || header.contains(['{', '}', '[', ']', '<', '>']) {
                continue;
            }

            let lowered = header.to_lowercase();

            let updated = compounds
                .iter()
                .find(|key| lowered.starts_with(*key))
                .map(|key| lowered.replacen(key, &format!("{{{{{}|{}}}}}", key, code), 1))
                .or_else(|| {
                    simple
                        .iter()
                        .filter(|name| lowered.starts_with(*name))
                        .find_map(|name| section_template_header(&lowered, &code, name))
                });

            if let Some(updated) = updated {
                page.section_mut(id).set_header(&updated, ctx.config);
            }
        }
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some("añadiendo plantillas de sección".to_string()),
    ))
}

fn category_name(code: &str, category: &str) -> String {
    format!("{}:{}", code.to_uppercase(), capitalize(category))
}

/// Grammatical category named by a section template, either a compound
/// (`{{sustantivo femenino|xx}}`) or a simple one with an optional second
/// descriptor (`{{sustantivo|xx|femenino}}`).
pub(crate) fn section_catgram(name: &str, template: &Template, config: &Config) -> Option<Catgram> {
    match config.section_compound(name) {
        Some((first, second)) => Catgram::make(first, second),
        None => match (Data::query(name), template.get("2")) {
            (Ok(first), None) => Catgram::single(first),
            (Ok(first), Some(second)) => Data::query(second).ok().and_then(|s| Catgram::make(first, s)),
            _ => None,
        },
    }
}

/// Categories already added by section templates.
fn catgram_categories(text: &str, config: &Config, out: &mut HashSet<String>) {
    for name in &config.settings.section_templates {
        for (_, template) in find_templates(name, text) {
            let Some(code) = template.get("1").filter(|c| !c.is_empty()) else {
                continue;
            };

            let Some(catgram) = section_catgram(name, &template, config) else {
                continue;
            };

            out.insert(category_name(code, &catgram.plural()));

            if let Some(second) = catgram.second() {
                out.insert(category_name(code, &catgram.first().plural()));

                if catgram.first() == Data::Phrase {
                    out.insert(category_name(code, &second.plural()));
                }
            }
        }
    }
}

/// Categories already added by language headers.
fn language_categories(page: &Page, config: &Config, out: &mut HashSet<String>) {
    for id in page.lang_sections() {
        let Some(lang) = page.section(id).lang() else {
            continue;
        };

        if lang.code_equals("es") {
            out.insert("Español".to_string());
        } else if let Some(name) = config.lang_name(lang.code()).filter(|n| !n.is_empty()) {
            out.insert(format!("{}-Español", capitalize(name)));
        }
    }
}

/// Drop explicit category links that templates on the page already add.
pub(crate) fn remove_category_links(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut targets = HashSet::new();
    catgram_categories(text, ctx.config, &mut targets);

    let page = ctx.parse(text)?;
    language_categories(&page, ctx.config, &mut targets);

    if targets.is_empty() {
        return Ok(None);
    }

    let formatted = replace_with_standard_ignored_ranges(text, &P_CATEGORY_LINKS, |caps| {
        let content = caps.get(1)?.as_str();
        let (category, sort_key) = content.split_once('|')?;
        let sort_key = sort_key.split('|').next().unwrap_or_default();

        let implied = (sort_key == ctx.title || sort_key == "{{PAGENAME}}")
            && targets.contains(category.trim());

        implied.then(String::new)
    });

    Ok(outcome(
        text,
        formatted,
        Some("eliminando categorías redundantes".to_string()),
    ))
}

/// Replace `<br clear="all">`-like tags with blank lines.
fn remove_br_tags(text: &str) -> String {
    let ignored = standard_ignored_ranges(text);
    let mut lines = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        let line_start = offset;
        offset += line.len() + 1;

        let found = P_BR_TAG.captures_iter(line).find(|caps| {
            let attributes = caps.get(1).map_or("", |m| m.as_str());
            let start = caps.get(0).map_or(0, |m| m.start());
            !contained_in_ranges(&ignored, line_start + start)
                && (P_BR_CLEAR.is_match(attributes) || P_BR_STYLE.is_match(attributes))
        });

        let Some(tag) = found.and_then(|caps| caps.get(0)) else {
            lines.push(line.to_string());
            continue;
        };

        let pre = &line[..tag.start()];
        let post = line[tag.end()..].trim_start_matches(' ');

        if pre.trim().is_empty() && post.trim().is_empty() {
            continue;
        }

        if !pre.trim().is_empty() && !post.trim().is_empty() {
            lines.push(format!("{}\n\n{}", pre, post));
        } else {
            lines.push(format!("{}{}", pre, post));
        }
    }

    lines.join("\n")
}

fn remove_clear_templates(intro: &str) -> String {
    replace_with_standard_ignored_ranges(intro, &P_CLEAR_TEMPLATE, |_| Some("\n\n".to_string()))
}

/// Put a single `{{clear}}` before tables and numbered etymologies, and drop
/// it elsewhere.
pub(crate) fn manage_clear_elements(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    if ctx.old_structure || ctx.parse(text)?.lang_sections().is_empty() {
        return Ok(None);
    }

    let initial = remove_br_tags(text);
    let mut page = ctx.parse(&initial)?;

    for id in page.sections().to_vec() {
        let Some(next) = page.next_section(id) else {
            break;
        };

        let next_intro = strip_comments_and_nowiki(page.section(next).intro());
        let opens_box = BOX_TEMPLATES.iter().any(|name| {
            find_templates(name, &next_intro)
                .iter()
                .any(|(span, _)| span.start == 0)
        });

        let next_header = page.section(next).stripped_header();
        let numbered = P_NUMBERED_ETYMOLOGY.is_match(&next_header) && next_header != "Etimología 1";

        let intro = page.section(id).intro().to_string();
        let clears = find_templates("clear", &intro).len();

        if opens_box || numbered {
            if clears == 1 && strip_comments_and_nowiki(&intro).trim_end().ends_with("{{clear}}") {
                continue;
            }

            let base = if clears > 0 {
                remove_clear_templates(&intro)
            } else {
                intro
            };

            let updated = format!("{}\n\n{{{{clear}}}}", base.trim_end());
            page.section_mut(id).set_intro(&updated);
        } else if clears > 0 {
            page.section_mut(id).set_intro(&remove_clear_templates(&intro));
        }
    }

    Ok(outcome(
        text,
        page.to_string(),
        Some("elementos \"clear\"".to_string()),
    ))
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
    ) -> Option<Outcome> {
        let config = config();
        let ctx = Context {
            config: &config,
            title,
            old_structure: false,
        };
        pass(&ctx, text).unwrap()
    }

    #[test]
    fn test_remove_inflection_templates() {
        let text = "=={{lengua|es}}==\n===Forma flexiva===\n{{inflect.es.sust.reg}}\n;1: {{forma sustantivo|casa|número=plural}}.";
        let outcome = run(remove_inflection_templates, "casas", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Forma flexiva===\n;1: {{forma sustantivo|casa|número=plural}}."
        );

        let text = "=={{lengua|es}}==\n===Forma flexiva===\n{{inflect.es.adj.reg}}\n;1: {{participio|amar}}.";
        assert!(run(remove_inflection_templates, "amado", text).is_none());
    }

    #[test]
    fn test_fix_leng_params() {
        let config = config();
        assert_eq!(
            fix_leng_params("{{sinónimo|maison}}", "fr", &config),
            "{{sinónimo|leng=fr|maison}}"
        );
        assert_eq!(
            fix_leng_params("{{sinónimo|leng=en|maison}}", "fr", &config),
            "{{sinónimo|leng=fr|maison}}"
        );
        assert_eq!(
            fix_leng_params("{{sinónimo|leng=es|casa}}", "es", &config),
            "{{sinónimo|casa}}"
        );
        assert_eq!(fix_leng_params("{{sinónimo|casa}}", "es", &config), "{{sinónimo|casa}}");
        assert_eq!(
            fix_leng_params("{{sinónimo|lang=fr|maison}}", "fr", &config),
            "{{sinónimo|leng=fr|maison}}"
        );
    }

    #[test]
    fn test_check_lang_code_case() {
        let text = "=={{lengua|FR}}==\n{{pron-graf|leng=FR}}\n==={{sustantivo|Fr}}===\n;1: Casa.";
        let outcome = run(check_lang_code_case, "maison", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|fr}}==\n{{pron-graf|leng=fr}}\n==={{sustantivo|fr}}===\n;1: Casa."
        );
        assert!(outcome.summary.is_none());
        assert!(run(check_lang_code_case, "maison", &outcome.text).is_none());
    }

    #[test]
    fn test_section_catgram() {
        let config = config();
        let (_, template) = find_templates("sustantivo femenino", "{{sustantivo femenino|es}}")
            .into_iter()
            .next()
            .unwrap();
        let catgram = section_catgram("sustantivo femenino", &template, &config).unwrap();
        assert_eq!(catgram.first(), Data::Noun);
        assert!(catgram.second().is_some());

        let (_, template) = find_templates("verbo", "{{verbo|es}}").into_iter().next().unwrap();
        let catgram = section_catgram("verbo", &template, &config).unwrap();
        assert_eq!(catgram.first(), Data::Verb);
        assert!(catgram.second().is_none());
    }

    #[test]
    fn test_lang_template_params() {
        let text = "=={{lengua|fr}}==\n{{pron-graf}}\n==={{sustantivo|es}}===\n;1: Casa.\n{{sinónimo|maison}}";
        let outcome = run(lang_template_params, "maison", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|fr}}==\n{{pron-graf|leng=fr}}\n==={{sustantivo|fr}}===\n;1: Casa.\n{{sinónimo|leng=fr|maison}}"
        );
        assert!(run(lang_template_params, "maison", &outcome.text).is_none());
    }

    #[test]
    fn test_manage_section_templates() {
        let text = "=={{lengua|es}}==\n==={{sustantivo|es}} masculino===\n;1: Algo.";
        let outcome = run(manage_section_templates, "x", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n==={{sustantivo masculino|es}}===\n;1: Algo."
        );

        let text = "=={{lengua|es}}==\n==={{sustantivo|es|femenino}}===\n;1: Algo.";
        let outcome = run(manage_section_templates, "x", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Algo."
        );
        assert!(run(manage_section_templates, "x", &outcome.text).is_none());
    }

    #[test]
    fn test_add_section_templates() {
        let text = "=={{lengua|es}}==\n===Sustantivo femenino===\n;1: Algo.\n===Verbo===\n;1: Algo.\n===Traducciones===";
        let outcome = run(add_section_templates, "x", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Algo.\n==={{verbo|es}}===\n;1: Algo.\n===Traducciones==="
        );
        assert!(run(add_section_templates, "x", &outcome.text).is_none());
    }

    #[test]
    fn test_remove_category_links() {
        let text = "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n[[Categoría:ES:Sustantivos femeninos|casa]]\n[[Categoría:ES:Arquitectura|casa]]";
        let outcome = run(remove_category_links, "casa", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n==={{sustantivo femenino|es}}===\n;1: Edificio.\n\n[[Categoría:ES:Arquitectura|casa]]"
        );
        assert_eq!(outcome.summary.as_deref(), Some("eliminando categorías redundantes"));
    }

    #[test]
    fn test_language_categories_removed() {
        let text = "=={{lengua|fr}}==\n;1: Casa.\n[[Categoría:Francés-Español|maison]]";
        let outcome = run(remove_category_links, "maison", text).unwrap();
        assert_eq!(outcome.text.trim_end(), "=={{lengua|fr}}==\n;1: Casa.");
    }

    #[test]
    fn test_remove_br_tags() {
        assert_eq!(remove_br_tags("a\n<br clear=\"all\">\nb"), "a\nb");
        assert_eq!(remove_br_tags("a<br clear=all>b"), "a\n\nb");
        assert_eq!(remove_br_tags("a<br>b"), "a<br>b");
    }

    #[test]
    fn test_manage_clear_elements() {
        let text = "=={{lengua|es}}==\n===Etimología 1===\nx\n===Etimología 2===\ny";
        let outcome = run(manage_clear_elements, "x", text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología 1===\nx\n\n{{clear}}\n===Etimología 2===\ny"
        );
        assert!(run(manage_clear_elements, "x", &outcome.text).is_none());
    }

    #[test]
    fn test_stray_clear_removed() {
        let text = "=={{lengua|es}}==\nx\n{{clear}}\n===Etimología===\ny";
        let outcome = run(manage_clear_elements, "x", text).unwrap();
        assert_eq!(outcome.text, "=={{lengua|es}}==\nx\n===Etimología===\ny");
    }
}
