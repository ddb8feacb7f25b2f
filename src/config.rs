//! Read-only configuration tables.
//!
//! Everything the pipeline looks up by name (language names, interwiki
//! prefixes, template aliases, compound section templates, the boilerplate
//! comment catalogue and a few tunables) is loaded once into a [`Config`] and
//! passed around by reference.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catgram::Data;
use crate::error::{EditorError, EditorResult};

const LANGS: &str = include_str!("../data/langs.tsv");
const INTERWIKI: &str = include_str!("../data/interwiki.txt");
const TEMPLATE_REDIRECTS: &str = include_str!("../data/template-redirects.txt");
const CATGRAM_COMPOUNDS: &str = include_str!("../data/catgram-compounds.txt");
const COMMENTS: &str = include_str!("../data/comments.txt");
const SETTINGS: &str = include_str!("../data/settings.json");

/// Tunables and header/template vocabularies from `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Pages nesting templates deeper than this are refused
    #[serde(default = "default_max_template_depth")]
    pub max_template_depth: usize,
    /// Standard headers sorted to the top of a language section, in order
    #[serde(default)]
    pub head_sections: Vec<String>,
    /// Standard headers sorted to the bottom of a language section, in order
    #[serde(default)]
    pub bottom_sections: Vec<String>,
    /// Part-of-speech header templates taking the language code as first parameter
    #[serde(default)]
    pub section_templates: Vec<String>,
    /// Templates taking a `leng=` parameter
    #[serde(default)]
    pub leng_param_templates: Vec<String>,
    /// Templates marking a definition as an inflected form
    #[serde(default)]
    pub flexive_form_templates: Vec<String>,
}

fn default_max_template_depth() -> usize {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_template_depth: default_max_template_depth(),
            head_sections: Vec::new(),
            bottom_sections: Vec::new(),
            section_templates: Vec::new(),
            leng_param_templates: Vec::new(),
            flexive_form_templates: Vec::new(),
        }
    }
}

/// Raw text of every resource file.
struct Sources<'a> {
    langs: &'a str,
    interwiki: &'a str,
    template_redirects: &'a str,
    catgram_compounds: &'a str,
    comments: &'a str,
    settings: &'a str,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Language codes and names in resource order
    langs: Vec<(String, String)>,
    lang_index: HashMap<String, usize>,
    interwiki: Vec<String>,
    template_redirects: HashMap<String, String>,
    section_compounds: Vec<(String, Data, Data)>,
    comment_patterns: Vec<Regex>,
    trailing_interwiki: Regex,
    pub settings: Settings,
}

/// Meaningful lines: trimmed, blank lines and `#` comments skipped.
fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
}

/// Split a `key = value` line.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

impl Config {
    /// Configuration built from the resources embedded at compile time.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Config` if an embedded resource is malformed.
    pub fn builtin() -> EditorResult<Self> {
        Config::from_sources(&Sources {
            langs: LANGS,
            interwiki: INTERWIKI,
            template_redirects: TEMPLATE_REDIRECTS,
            catgram_compounds: CATGRAM_COMPOUNDS,
            comments: COMMENTS,
            settings: SETTINGS,
        })
    }

    /// Load resources from a directory.
    ///
    /// Files are looked up under their usual names (`langs.tsv`,
    /// `interwiki.txt`, `template-redirects.txt`, `catgram-compounds.txt`,
    /// `comments.txt`, `settings.json`); a missing file falls back to the
    /// embedded copy.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory holding the resource files
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Io` if a present file cannot be read, or
    /// `EditorError::Config` if its contents are malformed.
    pub fn load_from_dir(dir: &Path) -> EditorResult<Self> {
        // Read each file, falling back to the builtin text
        let read = |name: &str, fallback: &'static str| -> EditorResult<String> {
            let path = dir.join(name);
            if path.exists() {
                Ok(fs::read_to_string(path)?)
            } else {
                Ok(fallback.to_string())
            }
        };

        let langs = read("langs.tsv", LANGS)?;
        let interwiki = read("interwiki.txt", INTERWIKI)?;
        let template_redirects = read("template-redirects.txt", TEMPLATE_REDIRECTS)?;
        let catgram_compounds = read("catgram-compounds.txt", CATGRAM_COMPOUNDS)?;
        let comments = read("comments.txt", COMMENTS)?;
        let settings = read("settings.json", SETTINGS)?;

        Config::from_sources(&Sources {
            langs: &langs,
            interwiki: &interwiki,
            template_redirects: &template_redirects,
            catgram_compounds: &catgram_compounds,
            comments: &comments,
            settings: &settings,
        })
    }

    fn from_sources(sources: &Sources) -> EditorResult<Self> {
        let mut langs = Vec::new();
        let mut lang_index = HashMap::new();

        for line in content_lines(sources.langs) {
            match line.split_once('\t') {
                Some((code, name)) if !code.trim().is_empty() && !name.trim().is_empty() => {
                    lang_index.insert(code.trim().to_lowercase(), langs.len());
                    langs.push((code.trim().to_string(), name.trim().to_string()));
                }
                _ => warn!("Skipping malformed language line: {:?}", line),
            }
        }

        let interwiki: Vec<String> = content_lines(sources.interwiki)
            .map(|line| line.trim().to_string())
            .collect();

        let mut template_redirects = HashMap::new();
        for line in content_lines(sources.template_redirects) {
            match split_assignment(line) {
                Some((old, canonical)) => {
                    template_redirects.insert(old.to_string(), canonical.to_string());
                }
                None => warn!("Skipping malformed template redirect: {:?}", line),
            }
        }

        let mut section_compounds = Vec::new();
        for line in content_lines(sources.catgram_compounds) {
            let Some((template, members)) = split_assignment(line) else {
                warn!("Skipping malformed compound line: {:?}", line);
                continue;
            };

            let names: Vec<&str> = members.split(',').map(str::trim).collect();
            let [first, second] = names.as_slice() else {
                warn!("Compound {:?} needs exactly two members", template);
                continue;
            };

            let first = Data::from_name(first).map_err(|e| EditorError::Config(e.to_string()))?;
            let second = Data::from_name(second).map_err(|e| EditorError::Config(e.to_string()))?;
            section_compounds.push((template.to_string(), first, second));
        }

        let comment_patterns = content_lines(sources.comments)
            .map(|line| {
                Regex::new(line).map_err(|e| {
                    EditorError::Config(format!("Invalid comment pattern {:?}: {}", line, e))
                })
            })
            .collect::<EditorResult<Vec<_>>>()?;

        let settings: Settings = serde_json::from_str(sources.settings)
            .map_err(|e| EditorError::Config(format!("Failed to parse settings: {}", e)))?;

        let trailing_interwiki = Config::build_trailing_interwiki(&interwiki)?;

        Ok(Config {
            langs,
            lang_index,
            interwiki,
            template_redirects,
            section_compounds,
            comment_patterns,
            trailing_interwiki,
            settings,
        })
    }

    fn build_trailing_interwiki(prefixes: &[String]) -> EditorResult<Regex> {
        let group = prefixes
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)\n(?:\[\[(?:{}):[^\]]+?\]\]\s*)+$", group);

        Regex::new(&pattern)
            .map_err(|e| EditorError::Config(format!("Invalid interwiki pattern: {}", e)))
    }

    /// Language name for a code, matched case-insensitively.
    pub fn lang_name(&self, code: &str) -> Option<&str> {
        self.lang_index
            .get(&code.trim().to_lowercase())
            .map(|&i| self.langs[i].1.as_str())
    }

    /// Code for a language name ("Francés" → "fr"), ignoring case.
    pub fn lang_code(&self, name: &str) -> Option<&str> {
        let name = name.trim().to_lowercase();
        self.langs
            .iter()
            .find(|(_, n)| n.to_lowercase() == name)
            .map(|(code, _)| code.as_str())
    }

    pub fn interwiki_prefixes(&self) -> &[String] {
        &self.interwiki
    }

    /// Matches a block of interwiki links closing the text.
    pub fn trailing_interwiki(&self) -> &Regex {
        &self.trailing_interwiki
    }

    /// Canonical name of an aliased template.
    pub fn template_redirect(&self, name: &str) -> Option<&str> {
        self.template_redirects.get(name).map(String::as_str)
    }

    pub fn template_redirects(&self) -> impl Iterator<Item = (&str, &str)> {
        self.template_redirects
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Members of a compound section template ("sustantivo femenino").
    pub fn section_compound(&self, template: &str) -> Option<(Data, Data)> {
        self.section_compounds
            .iter()
            .find(|(name, _, _)| name == template)
            .map(|(_, first, second)| (*first, *second))
    }

    /// Compound section template built from two members.
    pub fn section_compound_name(&self, first: Data, second: Data) -> Option<&str> {
        self.section_compounds
            .iter()
            .find(|(_, f, s)| *f == first && *s == second)
            .map(|(name, _, _)| name.as_str())
    }

    pub fn section_compounds(&self) -> &[(String, Data, Data)] {
        &self.section_compounds
    }

    pub fn comment_patterns(&self) -> &[Regex] {
        &self.comment_patterns
    }

    /// Head and bottom section headers.
    pub fn is_standard_header(&self, header: &str) -> bool {
        self.settings.head_sections.iter().any(|h| h == header)
            || self.settings.bottom_sections.iter().any(|h| h == header)
    }

    pub fn is_section_template(&self, name: &str) -> bool {
        self.settings.section_templates.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let config = Config::builtin().unwrap();
        assert_eq!(config.lang_name("es"), Some("español"));
        assert_eq!(config.lang_name("FR"), Some("francés"));
        assert_eq!(config.lang_code("Francés"), Some("fr"));
        assert_eq!(config.settings.max_template_depth, 2);
        assert!(config.is_standard_header("Etimología"));
        assert!(config.is_standard_header("Traducciones"));
        assert!(!config.is_standard_header("Sustantivo"));
        assert!(config.is_section_template("sustantivo femenino"));
        assert!(!config.comment_patterns().is_empty());
    }

    #[test]
    fn test_section_compounds() {
        let config = Config::builtin().unwrap();
        assert_eq!(
            config.section_compound("sustantivo femenino"),
            Some((Data::Noun, Data::Feminine))
        );
        assert_eq!(
            config.section_compound_name(Data::Phrase, Data::Adjective),
            Some("locución adjetiva")
        );
        assert_eq!(config.section_compound("sustantivo"), None);
    }

    #[test]
    fn test_trailing_interwiki() {
        let config = Config::builtin().unwrap();
        let re = config.trailing_interwiki();
        assert!(re.is_match("texto\n[[en:foo]]\n[[fr:foo]]"));
        assert!(!re.is_match("texto\n[[Categoría:foo]]"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let config = Config::from_sources(&Sources {
            langs: "# header\nes\tespañol\nbroken line\n\nfr\tfrancés\n",
            interwiki: "en\n",
            template_redirects: "a = b\nno equals sign\n",
            catgram_compounds: "sustantivo neutro = NOUN, NEUTER\nmal = NOUN\n",
            comments: "<!-- x -->\n",
            settings: "{}",
        })
        .unwrap();

        assert_eq!(config.lang_name("fr"), Some("francés"));
        assert_eq!(config.template_redirect("a"), Some("b"));
        assert_eq!(config.section_compounds().len(), 1);
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_unknown_compound_member_is_error() {
        let result = Config::from_sources(&Sources {
            langs: "",
            interwiki: "",
            template_redirects: "",
            catgram_compounds: "x = NOUN, NOPE\n",
            comments: "",
            settings: "{}",
        });
        assert!(matches!(result, Err(EditorError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_dir_uses_builtin() {
        let config = Config::load_from_dir(Path::new("/nonexistent/wikt-normalizer")).unwrap();
        assert_eq!(config.lang_name("de"), Some("alemán"));
    }
}
