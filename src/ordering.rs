//! Section ordering.
//!
//! Language sections sort Spanish first, then regular `{{lengua}}` sections
//! before transliterations, then by language name under Spanish collation.
//! Within a language section, standard head sections come first and standard
//! bottom sections last, everything else keeping its relative order.

use std::cmp::Ordering;

use icu_collator::options::{CollatorOptions, Strength};
use icu_collator::{Collator, CollatorBorrowed};
use icu_locale::Locale;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::Config;
use crate::page::{Page, SectionId};
use crate::section::Section;

static P_ETYMOLOGY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Etimología.*").expect("valid regex"));

/// Accent and case-insensitive comparison of language names.
pub struct NameCollator {
    collator: Option<CollatorBorrowed<'static>>,
}

impl NameCollator {
    /// Spanish collator with secondary strength. Falls back to lowercase
    /// comparison when the collation data cannot be loaded.
    pub fn spanish() -> Self {
        let locale: Option<Locale> = "es".parse().ok();

        let collator = locale.and_then(|locale| {
            let mut options = CollatorOptions::default();
            options.strength = Some(Strength::Secondary);

            Collator::try_new(locale.into(), options)
                .map_err(|e| warn!("Failed to create Spanish collator: {}", e))
                .ok()
        });

        NameCollator { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

/// Compare two language sections. Plain sections sort after language ones.
pub fn compare_lang_sections(a: &Section, b: &Section, collator: &NameCollator) -> Ordering {
    let (Some(la), Some(lb)) = (a.lang(), b.lang()) else {
        return b.is_lang_section().cmp(&a.is_lang_section());
    };

    let is_spanish = |code: &str| code.eq_ignore_ascii_case("es");

    // Spanish first
    is_spanish(lb.code())
        .cmp(&is_spanish(la.code()))
        // Transliterations after regular sections
        .then_with(|| la.is_transliteration().cmp(&lb.is_transliteration()))
        // Unnamed languages after named ones
        .then_with(|| la.name().is_empty().cmp(&lb.name().is_empty()))
        .then_with(|| collator.compare(la.name(), lb.name()))
        .then_with(|| la.code().to_lowercase().cmp(&lb.code().to_lowercase()))
}

/// Sort rank of a subsection header: head sections by position, then
/// everything else, then bottom sections by position.
pub fn section_rank(header: &str, config: &Config) -> (u8, usize) {
    let settings = &config.settings;

    if let Some(i) = settings.head_sections.iter().position(|h| h == header) {
        (0, i)
    } else if let Some(i) = settings.bottom_sections.iter().position(|h| h == header) {
        (2, i)
    } else {
        (1, 0)
    }
}

pub fn compare_sections(a: &Section, b: &Section, config: &Config) -> Ordering {
    section_rank(&a.stripped_header(), config).cmp(&section_rank(&b.stripped_header(), config))
}

impl Page {
    /// Stable-sort the direct children of `parent` (or the top level) with
    /// `compare`, moving each child together with its subtree.
    pub fn sort_children<F>(&mut self, parent: Option<SectionId>, mut compare: F)
    where
        F: FnMut(&Section, &Section) -> Ordering,
    {
        let mut children = match parent {
            Some(p) => self.children(p).to_vec(),
            None => self.top_level(),
        };

        if children.len() < 2 {
            return;
        }

        let before = children.clone();
        children.sort_by(|&a, &b| compare(self.section(a), self.section(b)));

        if children != before {
            self.reorder_children(parent, &children);
        }
    }

    /// Reorder language sections and move every section outside a language
    /// section to the end of the page.
    pub fn sort_lang_sections(&mut self) {
        let collator = NameCollator::spanish();

        let mut langs = self.lang_sections();
        langs.sort_by(|&a, &b| compare_lang_sections(self.section(a), self.section(b), &collator));

        let mut order: Vec<SectionId> = Vec::with_capacity(self.sections().len());
        for &lang in &langs {
            order.push(lang);
            order.extend(self.flatten_subsections(lang));
        }

        let rest: Vec<SectionId> = self
            .sections()
            .iter()
            .copied()
            .filter(|id| !order.contains(id) && self.lang_section_parent(*id).is_none())
            .collect();
        order.extend(rest);

        if order.as_slice() != self.sections() {
            self.set_order(order);
        }
    }

    /// Whether two children of `parent` share a standard header.
    pub fn has_duplicated_child_sections(&self, parent: SectionId, config: &Config) -> bool {
        let headers: Vec<String> = self
            .children(parent)
            .iter()
            .map(|&c| self.section(c).stripped_header())
            .collect();

        headers.iter().enumerate().any(|(i, h)| {
            config.is_standard_header(h) && headers[i + 1..].contains(h)
        })
    }

    /// Sort the children of a section by header rank, unless a standard
    /// header is duplicated among them.
    pub fn sort_section_children(&mut self, parent: SectionId, config: &Config) {
        if self.children(parent).is_empty() || self.has_duplicated_child_sections(parent, config) {
            return;
        }

        self.sort_children(Some(parent), |a, b| compare_sections(a, b, config));
    }

    /// Sort the subsections of a language section. With several etymology
    /// groups each group is sorted on its own.
    pub fn sort_lang_section_children(&mut self, lang: SectionId, config: &Config) {
        if self.children(lang).is_empty() {
            return;
        }

        let etymologies = self.find_subsections(lang, &P_ETYMOLOGY);

        if etymologies.len() < 2 {
            self.sort_section_children(lang, config);
        } else {
            for etymology in etymologies {
                self.sort_section_children(etymology, config);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::builtin().unwrap()
    }

    fn lang_codes(page: &Page) -> Vec<String> {
        page.lang_sections()
            .into_iter()
            .map(|id| page.section(id).lang_code().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_collator_ignores_accents_and_case() {
        let collator = NameCollator::spanish();
        assert_eq!(collator.compare("árabe", "Árabe"), Ordering::Equal);
        assert_eq!(collator.compare("alemán", "árabe"), Ordering::Less);
        assert_eq!(collator.compare("éuscaro", "francés"), Ordering::Less);
    }

    #[test]
    fn test_spanish_first() {
        let config = config();
        let text = "=={{lengua|ar}}==\nuno\n=={{lengua|de}}==\ndos\n=={{lengua|es}}==\ntres";
        let mut page = Page::parse("x", text, &config).unwrap();
        page.sort_lang_sections();
        assert_eq!(lang_codes(&page), vec!["es", "de", "ar"]);
        assert_eq!(
            page.to_string(),
            "=={{lengua|es}}==\ntres\n=={{lengua|de}}==\ndos\n=={{lengua|ar}}==\nuno"
        );
    }

    #[test]
    fn test_sort_lang_sections_settles() {
        let config = config();
        let text = "=={{lengua|fr}}==\nuno\n=={{lengua|es}}==\ndos\n==Referencias y notas==\n<references />";
        let mut page = Page::parse("x", text, &config).unwrap();
        page.sort_lang_sections();
        let sorted = page.to_string();
        page.sort_lang_sections();
        assert_eq!(page.to_string(), sorted);
        assert_eq!(lang_codes(&page), vec!["es", "fr"]);
    }

    #[test]
    fn test_transliteration_after_regular() {
        let config = config();
        let text = "=={{lengua|ja|escritura=transliteración}}==\n=={{lengua|fr}}==";
        let mut page = Page::parse("x", text, &config).unwrap();
        page.sort_lang_sections();
        let first = page.lang_sections()[0];
        assert_eq!(page.section(first).lang_code(), Some("fr"));
    }

    #[test]
    fn test_non_lang_sections_move_last() {
        let config = config();
        let text = "==Referencias y notas==\nx\n=={{lengua|fr}}==\n===Uso===";
        let mut page = Page::parse("x", text, &config).unwrap();
        page.sort_lang_sections();
        assert_eq!(
            page.to_string(),
            "=={{lengua|fr}}==\n===Uso===\n==Referencias y notas==\nx"
        );
    }

    #[test]
    fn test_section_rank() {
        let config = config();
        assert_eq!(section_rank("Etimología", &config), (0, 2));
        assert_eq!(section_rank("Sustantivo", &config), (1, 0));
        assert_eq!(section_rank("Traducciones", &config), (2, 7));
    }

    #[test]
    fn test_sort_lang_section_children() {
        let config = config();
        let text = "=={{lengua|es}}==\n===Traducciones===\n===Sustantivo===\n===Verbo===\n===Etimología===";
        let mut page = Page::parse("x", text, &config).unwrap();
        let es = page.top_level()[0];
        page.sort_lang_section_children(es, &config);
        assert_eq!(
            page.to_string(),
            "=={{lengua|es}}==\n===Etimología===\n===Sustantivo===\n===Verbo===\n===Traducciones==="
        );
    }

    #[test]
    fn test_duplicated_headers_skip_sort() {
        let config = config();
        let text = "=={{lengua|es}}==\n===Traducciones===\n===Etimología===\n===Etimología===";
        let mut page = Page::parse("x", text, &config).unwrap();
        let es = page.top_level()[0];
        assert!(page.has_duplicated_child_sections(es, &config));
        page.sort_section_children(es, &config);
        assert_eq!(page.to_string(), text);
    }

    #[test]
    fn test_etymology_groups_sorted_independently() {
        let config = config();
        let text = "=={{lengua|es}}==\n===Etimología 1===\n====Traducciones====\n====Sustantivo====\n===Etimología 2===\n====Véase también====\n====Verbo====";
        let mut page = Page::parse("x", text, &config).unwrap();
        let es = page.top_level()[0];
        page.sort_lang_section_children(es, &config);
        assert_eq!(
            page.to_string(),
            "=={{lengua|es}}==\n===Etimología 1===\n====Sustantivo====\n====Traducciones====\n===Etimología 2===\n====Verbo====\n====Véase también===="
        );
    }

    #[test]
    fn test_ordering_law() {
        let config = config();
        let collator = NameCollator::spanish();
        let codes = ["fr", "es", "de", "en", "it", "pt"];

        for &first in &codes {
            let text: String = std::iter::once(first)
                .chain(codes.iter().copied().filter(|c| *c != first))
                .map(|c| format!("=={{{{lengua|{}}}}}==\n", c))
                .collect();
            let mut page = Page::parse("x", text.trim_end(), &config).unwrap();
            page.sort_lang_sections();

            let sorted = page.lang_sections();
            assert_eq!(page.section(sorted[0]).lang_code(), Some("es"));

            for pair in sorted[1..].windows(2) {
                let a = page.section(pair[0]).lang().unwrap().name().to_string();
                let b = page.section(pair[1]).lang().unwrap().name().to_string();
                assert_ne!(collator.compare(&a, &b), Ordering::Greater);
            }
        }
    }
}
