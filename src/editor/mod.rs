//! Rewrite pipeline for Spanish Wiktionary entries.
//!
//! An [`Editor`] owns the text of one page and runs it through a fixed list
//! of named passes. Each pass takes the current text and either returns a
//! rewritten version with an optional edit-summary fragment, or nothing when
//! it does not apply. A pass result only counts as a change when it differs
//! from its input once trailing whitespace is ignored.
//!
//! The passes are grouped by concern:
//!
//! - `cleanup` - comments, template prefixes and names, links, minor fixes
//! - `lines` - joining and splitting lines
//! - `migrator` - the old `{{ES}}` layout
//! - `headers` - header spelling, inflected-form headers, levels
//! - `references` - the references section and `<ref>` tags
//! - `scaffolding` - adding, removing and sorting whole sections
//! - `templates` - language parameters, section templates, categories
//! - `definitions` - definition lines and their numbering
//! - `whitespace` - strong and weak whitespace normalization
//!
//! # Example
//!
//! ```ignore
//! use wikt_normalizer::{Config, Editor};
//!
//! let config = Config::builtin()?;
//! let mut editor = Editor::new("casa", "{{ES}}\n\n;1: Edificio.", &config);
//! editor.check()?;
//!
//! println!("{}", editor.text());
//! println!("{}", editor.summary());
//! ```

mod cleanup;
mod definitions;
mod headers;
mod lines;
mod migrator;
mod references;
mod scaffolding;
mod templates;
mod whitespace;

#[cfg(test)]
mod integration_tests;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catgram::Data;
use crate::config::Config;
use crate::error::EditorResult;
use crate::page::{Page, SectionId};
use crate::ranges::{sanitize_whitespaces, strip_comments_and_nowiki};
use crate::template::find_templates;

/// Definition line: `;1 {{uso|...}}: text`.
pub(crate) static P_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^;( *\d+)( *(?:\{\{[^\{]+?\}\}|[^:\n]+?))?(\s*?:+)(.*)$").expect("valid regex")
});

static P_OLD_STRUCTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{ *((?:Chono|[A-Z-]+?)-ES)").expect("valid regex"));

pub(crate) static P_IMAGES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\[ *(?:File|Image|Archivo|Imagen) *:[^\[\]]*(?:\[\[[^\]]*\]\][^\[\]]*)*\]\]")
        .expect("valid regex")
});

pub(crate) static P_CATEGORY_LINKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[ *(?i:category|categoría) *: *([^\[\{\}]+?) *\]\]").expect("valid regex")
});

static P_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\b[^>]*>").expect("valid regex"));

pub(crate) static P_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Etimología.*$").expect("valid regex"));

pub(crate) static P_ANY_ETYMOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Ee]timolog[íi]a.*$").expect("valid regex"));

pub(crate) static P_REFERENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Rr]eferencias.*$").expect("valid regex"));

pub(crate) static P_FLEXIVE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[Ff]orma|\{\{forma) .+$").expect("valid regex"));

pub(crate) static P_PRON_GRAF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[Pp]ronunciaci[óo]n(?: y escritura)?$").expect("valid regex")
});

pub(crate) static P_REFERENCES_AND_NOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Referencias y notas$").expect("valid regex"));

pub(crate) const REFERENCES_HEADER: &str = "Referencias y notas";

/// Maintenance banners, kept on lines of their own.
pub(crate) const AMBOX_TEMPLATES: &[&str] = &[
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
];

/// Languages without attested forms; their sections never get an etymology.
pub(crate) const RECONSTRUCTED_LANGS: &[&str] = &["poz-pol", "ine", "chono"];

/// Templates turning a whole entry into a pointer to another one.
pub(crate) const SOFT_REDIRECT_TEMPLATES: &[&str] = &[
    "grafía",
    "grafía obsoleta",
    "grafía rara",
    "variante",
    "variante obsoleta",
    "variante rara",
    "contracción",
    "redirección suave",
];

pub(crate) const TRANSLATIONS_COMMENT: &str =
    "<!-- formato: {{t+|idioma|<acepción#>|palabra|género}} p. ej. {{t+|fr|1|chose|f}} -->";

pub(crate) const TRANSLATIONS_TEMPLATE: &str = "{{trad-arriba}}\n<!-- formato: {{t+|idioma|<acepción#>|palabra|género}} p. ej. {{t+|fr|1|chose|f}} -->\n{{trad-centro}}\n{{trad-abajo}}";

/// Shared, read-only state handed to every pass.
pub struct Context<'a> {
    pub config: &'a Config,
    pub title: &'a str,
    /// The page still uses the pre-2015 `{{ES}}` layout
    pub old_structure: bool,
}

impl Context<'_> {
    pub(crate) fn parse(&self, text: &str) -> EditorResult<Page> {
        Page::parse(self.title, text, self.config)
    }

    /// Parse the page, or `None` when it still uses the old layout.
    pub(crate) fn parse_current(&self, text: &str) -> EditorResult<Option<Page>> {
        if self.old_structure {
            return Ok(None);
        }
        self.parse(text).map(Some)
    }
}

/// Rewritten text of a pass plus its summary fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub text: String,
    pub summary: Option<String>,
}

pub type PassFn = fn(&Context, &str) -> EditorResult<Option<Outcome>>;

/// A named pipeline stage.
pub struct Pass {
    pub name: &'static str,
    pub run: PassFn,
}

/// Every pass, in execution order.
pub const PIPELINE: &[Pass] = &[
    Pass { name: "remove_comments", run: cleanup::remove_comments },
    Pass { name: "failsafe", run: cleanup::failsafe },
    Pass { name: "remove_template_prefixes", run: cleanup::remove_template_prefixes },
    Pass { name: "sanitize_templates", run: cleanup::sanitize_templates },
    Pass { name: "sanitize_links", run: cleanup::sanitize_links },
    Pass { name: "join_lines", run: lines::join_lines },
    Pass { name: "normalize_template_names", run: cleanup::normalize_template_names },
    Pass { name: "split_lines", run: lines::split_lines },
    Pass { name: "minor_sanitizing", run: cleanup::minor_sanitizing },
    Pass { name: "transform_to_new_structure", run: migrator::transform_to_new_structure },
    Pass { name: "insert_lang_section_templates", run: headers::insert_lang_section_templates },
    Pass { name: "normalize_section_headers", run: headers::normalize_section_headers },
    Pass { name: "substitute_references_template", run: references::substitute_references_template },
    Pass { name: "duplicate_references_section", run: references::duplicate_references_section },
    Pass { name: "move_references_section", run: references::move_references_section },
    Pass { name: "convert_headers_to_flexive_form", run: headers::convert_headers_to_flexive_form },
    Pass { name: "check_flexive_form_headers", run: headers::check_flexive_form_headers },
    Pass { name: "normalize_etymology_headers", run: headers::normalize_etymology_headers },
    Pass { name: "pull_up_foreign_translations_sections", run: scaffolding::pull_up_foreign_translations_sections },
    Pass { name: "normalize_section_levels", run: headers::normalize_section_levels },
    Pass { name: "remove_pron_graf_section", run: scaffolding::remove_pron_graf_section },
    Pass { name: "sort_lang_sections", run: scaffolding::sort_lang_sections },
    Pass { name: "add_missing_sections", run: scaffolding::add_missing_sections },
    Pass { name: "move_references_elements", run: references::move_references_elements },
    Pass { name: "sort_sub_sections", run: scaffolding::sort_sub_sections },
    Pass { name: "remove_inflection_templates", run: templates::remove_inflection_templates },
    Pass { name: "check_lang_code_case", run: templates::check_lang_code_case },
    Pass { name: "lang_template_params", run: templates::lang_template_params },
    Pass { name: "manage_section_templates", run: templates::manage_section_templates },
    Pass { name: "add_section_templates", run: templates::add_section_templates },
    Pass { name: "remove_category_links", run: templates::remove_category_links },
    Pass { name: "delete_empty_sections", run: scaffolding::delete_empty_sections },
    Pass { name: "delete_wrong_sections", run: scaffolding::delete_wrong_sections },
    Pass { name: "remove_etymology_templates", run: scaffolding::remove_etymology_templates },
    Pass { name: "manage_clear_elements", run: templates::manage_clear_elements },
    Pass { name: "convert_hashed_definitions", run: definitions::convert_hashed_definitions },
    Pass { name: "fix_definition_numbering", run: definitions::fix_definition_numbering },
    Pass { name: "remove_definition_headers", run: definitions::remove_definition_headers },
    Pass { name: "sanitize_references", run: references::sanitize_references },
    Pass { name: "group_references", run: references::group_references },
    Pass { name: "add_translations_example_comment", run: scaffolding::add_translations_example_comment },
    Pass { name: "strong_whitespaces", run: whitespace::strong_whitespaces },
    Pass { name: "weak_whitespaces", run: whitespace::weak_whitespaces },
];

/// Look up a pass by name.
pub fn find_pass(name: &str) -> Option<&'static Pass> {
    PIPELINE.iter().find(|p| p.name == name)
}

/// A pass that changed the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub pass: &'static str,
    pub summary: Option<String>,
}

/// Whether `after` differs from `before`, trailing whitespace aside.
pub(crate) fn changed(before: &str, after: &str) -> bool {
    before.trim_end() != after.trim_end()
}

/// Wrap a rewritten text into an outcome, or `None` when nothing changed.
pub(crate) fn outcome(before: &str, after: String, summary: Option<String>) -> Option<Outcome> {
    changed(before, &after).then_some(Outcome { text: after, summary })
}

/// Outcome of a pass that rewrote the page tree.
pub(crate) fn page_outcome(before: &str, page: &Page, summary: &str) -> Option<Outcome> {
    outcome(before, page.to_string(), Some(summary.to_string()))
}

pub(crate) fn has_template(text: &str, name: &str) -> bool {
    !find_templates(name, text).is_empty()
}

/// Append `item` unless already present, keeping first-seen order.
pub(crate) fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Header holding a part-of-speech template, simple (`{{verbo|xx}}`) or
/// compound (`{{sustantivo femenino|xx}}`).
pub(crate) fn is_term_header(header: &str, config: &Config) -> bool {
    config
        .section_compounds()
        .iter()
        .any(|(name, _, _)| has_template(header, name))
        || Data::ALL
            .iter()
            .any(|data| has_template(header, &data.singular()))
}

/// Lines of `text` outside comments and `<nowiki>` that open a `#` list.
pub(crate) fn has_hashed_lines(text: &str) -> bool {
    strip_comments_and_nowiki(text)
        .lines()
        .any(|line| line.starts_with('#'))
}

/// Whether a language section consists only of soft-redirect entries, or is
/// the `trans` pseudo-language.
pub(crate) fn reduced_section_check(page: &Page, id: SectionId, config: &Config) -> bool {
    if page
        .section(id)
        .lang()
        .is_some_and(|lang| lang.code_equals("trans"))
    {
        return true;
    }

    let targets: Vec<SectionId> = page
        .children(id)
        .iter()
        .copied()
        .filter(|&c| !config.is_standard_header(&page.section(c).stripped_header()))
        .collect();

    let mut has_standard = false;
    let mut has_special = false;

    for target in targets {
        let intro = strip_comments_and_nowiki(page.section(target).intro());

        for m in P_TERM.find_iter(&intro) {
            let term = m.as_str();
            let special = SOFT_REDIRECT_TEMPLATES
                .iter()
                .any(|name| has_template(term, name));

            has_standard |= !special;
            has_special |= special;

            if has_standard && has_special {
                return false;
            }
        }
    }

    !has_standard && has_special
}

/// Whether the page still uses the old `{{ES}}`/`{{XX-ES}}` layout.
pub fn detect_old_structure(text: &str) -> bool {
    let text = strip_comments_and_nowiki(text);

    P_OLD_STRUCTURE.is_match(&text)
        || ["ES", "TRANSLIT", "TRANS", "TAXO", "carácter oriental"]
            .iter()
            .any(|name| {
                find_templates(name, &text)
                    .iter()
                    .any(|(_, t)| t.name() == *name)
            })
}

/// Text with comments, `{{clear}}`, line breaks, images and category links
/// removed is blank.
pub(crate) fn is_empty_or_invisible(intro: &str) -> bool {
    if intro.is_empty() {
        return true;
    }

    let text = strip_comments_and_nowiki(intro).replace("{{clear}}", "");
    let text = P_BR.replace_all(&text, "");
    let text = P_IMAGES.replace_all(&text, "");
    let text = P_CATEGORY_LINKS.replace_all(&text, "");
    text.trim().is_empty()
}

/// Runs the pipeline over one page.
pub struct Editor<'a> {
    config: &'a Config,
    title: String,
    text: String,
    original: String,
    old_structure: bool,
    changes: Vec<Change>,
}

impl<'a> Editor<'a> {
    /// Create an editor for a page. Whitespace is sanitized up front.
    pub fn new(title: &str, text: &str, config: &'a Config) -> Self {
        let sanitized = sanitize_whitespaces(text);

        Editor {
            config,
            title: title.trim().to_string(),
            old_structure: detect_old_structure(&sanitized),
            text: sanitized,
            original: text.to_string(),
            changes: Vec::new(),
        }
    }

    /// Run every pass in order.
    ///
    /// # Errors
    ///
    /// On a fatal error (template depth, unbalanced delimiters, a broken
    /// section tree) the text is restored to the original input, the
    /// recorded changes are dropped and the error is returned.
    pub fn check(&mut self) -> EditorResult<()> {
        info!("Checking [[{}]]", self.title);

        for pass in PIPELINE {
            if let Err(e) = self.apply(pass) {
                warn!("[[{}]] aborted in {}: {}", self.title, pass.name, e);
                self.text = self.original.clone();
                self.changes.clear();
                return Err(e);
            }
        }

        Ok(())
    }

    /// Run a single pass against the current text.
    ///
    /// # Returns
    ///
    /// * `true` if the pass changed the text
    pub fn apply(&mut self, pass: &Pass) -> EditorResult<bool> {
        let context = Context {
            config: self.config,
            title: &self.title,
            old_structure: self.old_structure,
        };

        let Some(Outcome { text, summary }) = (pass.run)(&context, &self.text)? else {
            return Ok(false);
        };

        if !changed(&self.text, &text) {
            return Ok(false);
        }

        debug!(
            "{}: {}",
            pass.name,
            summary.as_deref().unwrap_or("(no summary)")
        );

        self.text = text;
        self.old_structure = detect_old_structure(&self.text);
        self.changes.push(Change {
            pass: pass.name,
            summary,
        });

        Ok(true)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_old_structure(&self) -> bool {
        self.old_structure
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Unique summary fragments in the order they were produced, joined
    /// with "; ".
    pub fn summary(&self) -> String {
        let mut seen: Vec<&str> = Vec::new();

        for change in &self.changes {
            if let Some(summary) = change.summary.as_deref() {
                if !summary.is_empty() && !seen.contains(&summary) {
                    seen.push(summary);
                }
            }
        }

        seen.join("; ")
    }

    /// At least one change carried a summary. Whitespace-only edits are not
    /// worth saving on their own.
    pub fn is_modified(&self) -> bool {
        self.changes.iter().any(|c| c.summary.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let names: Vec<&str> = PIPELINE.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), 43);
        assert_eq!(names[0], "remove_comments");
        assert_eq!(names[1], "failsafe");
        assert_eq!(names[9], "transform_to_new_structure");
        assert_eq!(names[15], "convert_headers_to_flexive_form");
        assert_eq!(names[16], "check_flexive_form_headers");
        assert_eq!(names[19], "normalize_section_levels");
        assert_eq!(names[23], "move_references_elements");
        assert_eq!(names[26], "check_lang_code_case");
        assert_eq!(names[38], "sanitize_references");
        assert_eq!(names[39], "group_references");
        assert_eq!(names[42], "weak_whitespaces");

        let mut unique = names.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_detect_old_structure() {
        assert!(detect_old_structure("{{ES}}\n;1: x"));
        assert!(detect_old_structure("{{FR-ES|chose}}"));
        assert!(detect_old_structure("{{Chono-ES}}"));
        assert!(!detect_old_structure("=={{lengua|es}}==\n;1: x"));
        assert!(!detect_old_structure("<!-- {{ES}} -->"));
        assert!(!detect_old_structure("{{es}}"));
    }

    #[test]
    fn test_changed_ignores_trailing_whitespace() {
        assert!(!changed("abc", "abc\n\n"));
        assert!(changed("abc", "abd"));
        assert!(changed("abc", "\nabc"));
    }

    #[test]
    fn test_is_empty_or_invisible() {
        assert!(is_empty_or_invisible(""));
        assert!(is_empty_or_invisible("<!-- x -->\n{{clear}}\n<br clear=\"all\">"));
        assert!(is_empty_or_invisible("[[Archivo:x.jpg|thumb|y]]\n[[Categoría:Z]]"));
        assert!(!is_empty_or_invisible("texto"));
    }

    #[test]
    fn test_reduced_section_check() {
        let config = Config::builtin().unwrap();
        let text = "=={{lengua|es}}==\n===Forma===\n;1: {{grafía|casa}}.";
        let page = Page::parse("x", text, &config).unwrap();
        let es = page.lang_sections()[0];
        assert!(reduced_section_check(&page, es, &config));

        let text = "=={{lengua|es}}==\n===Sustantivo===\n;1: Edificio.";
        let page = Page::parse("x", text, &config).unwrap();
        let es = page.lang_sections()[0];
        assert!(!reduced_section_check(&page, es, &config));
    }

    #[test]
    fn test_is_term_header() {
        let config = Config::builtin().unwrap();
        assert!(is_term_header("{{sustantivo femenino|es}}", &config));
        assert!(is_term_header("{{verbo|es}}", &config));
        assert!(!is_term_header("Etimología", &config));
        assert!(!is_term_header("Verbo", &config));
    }

    #[test]
    fn test_find_pass() {
        assert!(find_pass("sanitize_links").is_some());
        assert!(find_pass("nope").is_none());
    }
}
