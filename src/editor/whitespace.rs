//! Whitespace normalization, run last.
//!
//! [`strong_whitespaces`] collapses runs of blank lines and stray spaces and
//! reports a summary. [`weak_whitespaces`] applies purely cosmetic layout
//! rules and never adds to the edit summary on its own.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{outcome, Context, Outcome, P_TERM};
use crate::error::EditorResult;
use crate::page::{Page, SectionId};
use crate::ranges::{replace_all_outside, replace_with_standard_ignored_ranges, strip_comments_and_nowiki};
use crate::section::HeaderFormat;

static P_TRAILING_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?: |&nbsp;)+\n").expect("valid regex"));

static P_SPACE_NBSP: Lazy<Regex> = Lazy::new(|| Regex::new(r" &nbsp;").expect("valid regex"));

static P_NBSP_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&nbsp; ").expect("valid regex"));

static P_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static P_BLANK_BEFORE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\n<!--").expect("valid regex"));

static P_SPACE_BEFORE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.|\]\]|\}\}|\)) <ref(>| )").expect("valid regex"));

static P_DISAMBIGUATION_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[Dd]esambiguación\|*\}\}$").expect("valid regex"));

static P_CLEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\n])\n?\{\{clear\}\}").expect("valid regex"));

/// Sections whose definition lines get their spacing fixed.
fn term_sections(page: &Page, ctx: &Context) -> Vec<SectionId> {
    let references = page.references();

    page.sections()
        .iter()
        .copied()
        .filter(|&id| {
            let section = page.section(id);
            Some(id) != references
                && !section.is_lang_section()
                && !ctx.config.is_standard_header(&section.stripped_header())
        })
        .collect()
}

/// A page intro that needs no blank line before the first section.
fn is_bare_intro(intro: &str) -> bool {
    let stripped = strip_comments_and_nowiki(intro);
    let stripped = stripped.trim();
    stripped.is_empty() || P_DISAMBIGUATION_END.is_match(stripped)
}

/// Collapse redundant blank lines and spaces.
pub(crate) fn strong_whitespaces(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut initial = replace_all_outside(text, &P_TRAILING_SPACES, "\n");
    initial = replace_all_outside(&initial, &P_SPACE_NBSP, " ");
    initial = replace_all_outside(&initial, &P_NBSP_SPACE, " ");

    let mut page = ctx.parse(&initial)?;

    if page.leading_newlines() > 1 {
        page.set_leading_newlines(0);
    }

    if page.trailing_newlines() > 1 {
        page.set_trailing_newlines(1);
    }

    if page.trailing_newlines() == 1 && !page.intro().is_empty() && is_bare_intro(page.intro()) {
        page.set_trailing_newlines(0);
    }

    for id in page.sections().to_vec() {
        let section = page.section_mut(id);

        if section.leading_newlines() > 1 {
            section.set_leading_newlines(1);
        }

        if section.trailing_newlines() > 1 {
            section.set_trailing_newlines(1);
        }
    }

    // ;1{{foo}}: bar → ;1 {{foo}}: bar
    for id in term_sections(&page, ctx) {
        let intro = page.section(id).intro();

        let updated = replace_with_standard_ignored_ranges(intro, &P_TERM, |caps| {
            let whole = caps.get(0)?;
            let qualifier = caps.get(2)?;

            if qualifier.as_str().starts_with(' ') {
                return None;
            }

            let at = qualifier.start() - whole.start();
            Some(format!("{} {}", &whole.as_str()[..at], &whole.as_str()[at..]))
        });

        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    let mut formatted = page.to_string();
    formatted = replace_all_outside(&formatted, &P_BLANK_LINES, "\n\n");
    formatted = replace_all_outside(&formatted, &P_BLANK_BEFORE_COMMENT, "\n<!--");
    formatted = replace_all_outside(&formatted, &P_SPACE_BEFORE_REF, "$1<ref$2");

    Ok(outcome(text, formatted, Some("espacios en blanco".to_string())))
}

/// Layout conventions: a blank line after every section body, spaced
/// headers and `;1: text` definition lines.
pub(crate) fn weak_whitespaces(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let mut page = ctx.parse(text)?;

    if page.leading_newlines() == 1 {
        page.set_leading_newlines(0);
    }

    if page.intro().is_empty() && page.trailing_newlines() == 1 {
        page.set_trailing_newlines(0);
    }

    if !page.intro().is_empty() && page.trailing_newlines() == 0 && !is_bare_intro(page.intro()) {
        page.set_trailing_newlines(1);
    }

    for id in page.sections().to_vec() {
        let section = page.section_mut(id);
        let intro = section.intro();

        if (!intro.is_empty() && !intro.ends_with("<br clear=\"all\">"))
            || (intro.is_empty() && section.trailing_newlines() == 0)
        {
            section.set_trailing_newlines(1);
        }

        if section.header().is_empty() {
            section.set_header_format(HeaderFormat::Blank);
        } else {
            section.set_header_format(HeaderFormat::spaced());
        }

        if section.leading_newlines() == 1 {
            section.set_leading_newlines(0);
        }
    }

    // ;1 : text → ;1: text
    for id in term_sections(&page, ctx) {
        let intro = page.section(id).intro();

        let updated = replace_with_standard_ignored_ranges(intro, &P_TERM, |caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?;
            let colon = caps.get(3)?;
            let definition = caps.get(4)?;

            if definition.as_str().trim().is_empty() {
                return None;
            }

            if !number.as_str().starts_with(' ')
                && !colon.as_str().starts_with(' ')
                && definition.as_str().starts_with(' ')
            {
                return None;
            }

            let line = whole.as_str();
            let offset = whole.start();

            Some(format!(
                "{}{}{}{} {}",
                &line[..number.start() - offset],
                number.as_str().trim(),
                &line[number.end() - offset..colon.start() - offset],
                colon.as_str().trim(),
                definition.as_str().trim(),
            ))
        });

        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    let formatted = replace_all_outside(&page.to_string(), &P_CLEAR, "$1\n\n{{clear}}");

    Ok(outcome(text, formatted, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn run(
        pass: fn(&Context, &str) -> EditorResult<Option<Outcome>>,
        text: &str,
    ) -> Option<Outcome> {
        let config = Config::builtin().unwrap();
        let ctx = Context {
            config: &config,
            title: "casa",
            old_structure: false,
        };
        pass(&ctx, text).unwrap()
    }

    #[test]
    fn test_strong_whitespaces() {
        let text = "=={{lengua|es}}==\n===Etimología===\n{{etimología}}.  \n\n\n\n===Sustantivo===\n;1{{uso}}: Edificio. <ref>x</ref>";
        let outcome = run(strong_whitespaces, text).unwrap();
        assert_eq!(
            outcome.text,
            "=={{lengua|es}}==\n===Etimología===\n{{etimología}}.\n\n===Sustantivo===\n;1 {{uso}}: Edificio.<ref>x</ref>"
        );
        assert_eq!(outcome.summary.as_deref(), Some("espacios en blanco"));
        assert!(run(strong_whitespaces, &outcome.text).is_none());
    }

    #[test]
    fn test_strong_whitespaces_nbsp() {
        let text = "=={{lengua|es}}==\n;1: Casa &nbsp;grande.&nbsp;\n";
        let outcome = run(strong_whitespaces, text).unwrap();
        assert_eq!(outcome.text.trim_end(), "=={{lengua|es}}==\n;1: Casa grande.");
    }

    #[test]
    fn test_weak_whitespaces() {
        let text = "=={{lengua|es}}==\n{{pron-graf}}\n===Sustantivo===\n;1:Edificio.\n{{clear}}";
        let outcome = run(weak_whitespaces, text).unwrap();
        assert_eq!(
            outcome.text,
            "== {{lengua|es}} ==\n{{pron-graf}}\n\n=== Sustantivo ===\n;1: Edificio.\n\n{{clear}}\n"
        );
        assert!(outcome.summary.is_none());
        assert!(run(weak_whitespaces, &outcome.text).is_none());
    }

    #[test]
    fn test_weak_whitespaces_keeps_disambiguation_intro() {
        let text = "{{desambiguación}}\n== {{lengua|es}} ==\n{{pron-graf}}\n";
        assert!(run(weak_whitespaces, text).is_none());
    }
}
