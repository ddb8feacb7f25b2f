//! Section nodes and header grammar.
//!
//! A [`Section`] owns its header line and the free text ("intro") up to the
//! first child. Tree structure lives in [`crate::page::Page`]; a section only
//! knows how to render its own head.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::Config;
use crate::error::{EditorError, EditorResult};
use crate::ranges::{sanitize_whitespaces, strip_comments_and_nowiki};
use crate::template::Template;

static P_HEADER_REFS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<ref\b.*?(?:/ *?>|>.*?</ref *?>)").expect("valid regex")
});

static P_LANG_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{ *?(lengua|translit) *?\|.+?\}\}$").expect("valid regex")
});

/// One header regex per level, deepest first.
static P_HEADERS: Lazy<Vec<(usize, Regex)>> = Lazy::new(|| {
    (1..=6)
        .rev()
        .map(|n| {
            let re = format!(
                r"^((?:<!--.*?-->)*)={{{n}}}(.+)={{{n}}}((?:<!--.*?-->|\s*)*)$",
                n = n
            );
            (n, Regex::new(&re).expect("valid regex"))
        })
        .collect()
});

/// Spacing between the `=` markers and the header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderFormat {
    /// `==<lead>header<trail>==`
    Padded { lead: String, trail: String },
    /// `== ==`, used for blank headers
    Blank,
}

impl HeaderFormat {
    /// `== header ==`
    pub fn spaced() -> Self {
        HeaderFormat::Padded {
            lead: " ".to_string(),
            trail: " ".to_string(),
        }
    }

    /// `==header==`
    pub fn tight() -> Self {
        HeaderFormat::Padded {
            lead: String::new(),
            trail: String::new(),
        }
    }

    fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return HeaderFormat::Blank;
        }

        let lead_len = raw.len() - raw.trim_start_matches(' ').len();
        let trail_len = raw.len() - raw.trim_end_matches(' ').len();

        HeaderFormat::Padded {
            lead: " ".repeat(lead_len),
            trail: " ".repeat(trail_len),
        }
    }
}

/// Header template flavour of a language section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangTemplateKind {
    /// `{{lengua|xx}}`
    Lengua,
    /// `{{translit|xx}}`
    Translit,
}

/// Structured view of a `{{lengua|…}}` header.
///
/// The template is kept verbatim so an untouched header round-trips byte for
/// byte; every mutation re-serializes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangHeader {
    template: Template,
    kind: LangTemplateKind,
    name: String,
}

impl LangHeader {
    /// Parse a trimmed header. `Ok(None)` when the header is not a language
    /// template at all.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Structural` when the template carries no
    /// language code.
    pub fn parse(header: &str, config: &Config) -> EditorResult<Option<LangHeader>> {
        let Some(caps) = P_LANG_HEADER.captures(header) else {
            return Ok(None);
        };

        let kind = match &caps[1] {
            "translit" => LangTemplateKind::Translit,
            _ => LangTemplateKind::Lengua,
        };

        let Some(template) = Template::parse(header) else {
            return Ok(None);
        };

        let code = template.get("1").unwrap_or_default();
        if code.is_empty() {
            return Err(EditorError::Structural(format!(
                "Language header without code: {}",
                header
            )));
        }

        let name = config.lang_name(code).unwrap_or_default().to_string();

        Ok(Some(LangHeader {
            template,
            kind,
            name,
        }))
    }

    /// Header for a new language section. Codes are stored lowercase.
    pub fn create(code: &str, config: &Config) -> LangHeader {
        let code = code.trim().to_lowercase();
        let mut template = Template::new("lengua");
        template.set_positional(1, &code);

        LangHeader {
            name: config.lang_name(&code).unwrap_or_default().to_string(),
            template,
            kind: LangTemplateKind::Lengua,
        }
    }

    /// Language code as written in the header.
    pub fn code(&self) -> &str {
        self.template.get("1").unwrap_or_default()
    }

    pub fn code_equals(&self, code: &str) -> bool {
        self.code().eq_ignore_ascii_case(code.trim())
    }

    /// Language name from the code table, empty for unknown codes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LangTemplateKind {
        self.kind
    }

    /// Named and extra positional parameters besides the code.
    pub fn params(&self) -> Vec<(String, String)> {
        self.template
            .params
            .iter()
            .filter(|p| !p.answers_to("1"))
            .map(|p| match p {
                crate::template::Param::Named { key, value } => {
                    (key.trim().to_string(), value.trim().to_string())
                }
                crate::template::Param::Positional { index, value } => {
                    (index.to_string(), value.trim().to_string())
                }
            })
            .collect()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        if key.trim() == "1" {
            return None;
        }
        self.template.get(key)
    }

    /// Transliterated entry: `{{translit|…}}` or an `escritura…=transliteración`
    /// parameter.
    pub fn is_transliteration(&self) -> bool {
        self.kind == LangTemplateKind::Translit
            || self.params().iter().any(|(key, value)| {
                key.starts_with("escritura") && value.to_lowercase() == "transliteración"
            })
    }

    fn set_code(&mut self, code: &str, config: &Config) {
        let code = code.trim();
        self.template.set_positional(1, code);
        self.name = config.lang_name(code).unwrap_or_default().to_string();
    }

    fn set_param(&mut self, key: &str, value: &str) {
        if key.trim() != "1" {
            self.template.set_named(key, value);
        }
    }

    fn remove_param(&mut self, key: &str) -> bool {
        key.trim() != "1" && self.template.remove(key)
    }
}

impl fmt::Display for LangHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

/// A headed block of page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: String,
    intro: String,
    level: usize,
    leading_newlines: usize,
    trailing_newlines: usize,
    format: HeaderFormat,
    leading_comments: String,
    trailing_comments: String,
    lang: Option<LangHeader>,
}

impl Section {
    /// A fresh section with an empty intro and spaced header.
    pub fn create(header: &str, level: usize) -> EditorResult<Section> {
        check_level(level)?;
        let header = header.trim().to_string();

        Ok(Section {
            format: if header.is_empty() {
                HeaderFormat::Blank
            } else {
                HeaderFormat::spaced()
            },
            header,
            intro: String::new(),
            level,
            leading_newlines: 0,
            trailing_newlines: 0,
            leading_comments: String::new(),
            trailing_comments: String::new(),
            lang: None,
        })
    }

    /// A fresh level-2 `{{lengua|code}}` section.
    pub fn create_lang(code: &str, config: &Config) -> Section {
        let lang = LangHeader::create(code, config);

        Section {
            header: lang.to_string(),
            intro: String::new(),
            level: 2,
            leading_newlines: 0,
            trailing_newlines: 0,
            format: HeaderFormat::spaced(),
            leading_comments: String::new(),
            trailing_comments: String::new(),
            lang: Some(lang),
        }
    }

    /// Parse one section chunk: a header line followed by the intro text.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Structural` if the first line is not a header,
    /// or if a language header carries no code.
    pub fn parse(text: &str, config: &Config) -> EditorResult<Section> {
        let (first_line, rest) = match text.split_once('\n') {
            Some((first, rest)) => (first, Some(rest)),
            None => (text, None),
        };

        let mut section = Section::parse_header(first_line)?;

        if let Some(rest) = rest {
            if rest.split('\n').all(str::is_empty) {
                section.trailing_newlines = rest.split('\n').count();
            } else {
                let mut intro = rest;
                while let Some(stripped) = intro.strip_suffix('\n') {
                    section.trailing_newlines += 1;
                    intro = stripped;
                }
                while let Some(stripped) = intro.strip_prefix('\n') {
                    section.leading_newlines += 1;
                    intro = stripped;
                }
                section.intro = intro.to_string();
            }
        }

        if section.level == 2 {
            section.lang = LangHeader::parse(&section.header, config)?;
        }

        Ok(section)
    }

    fn parse_header(line: &str) -> EditorResult<Section> {
        for (level, re) in P_HEADERS.iter() {
            let Some(caps) = re.captures(line) else {
                continue;
            };

            let raw = caps.get(2).map_or("", |m| m.as_str());

            return Ok(Section {
                header: raw.trim().to_string(),
                intro: String::new(),
                level: *level,
                leading_newlines: 0,
                trailing_newlines: 0,
                format: HeaderFormat::from_raw(raw),
                leading_comments: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                trailing_comments: caps.get(3).map_or("", |m| m.as_str()).to_string(),
                lang: None,
            });
        }

        Err(EditorError::Structural(format!("Not a section header: {}", line)))
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Header without `<ref>` tags, comments and `<nowiki>` regions.
    pub fn stripped_header(&self) -> String {
        let header = P_HEADER_REFS.replace_all(&self.header, "");
        let header = strip_comments_and_nowiki(&header);
        sanitize_whitespaces(&header).trim().to_string()
    }

    /// Replace the header text.
    ///
    /// A language section whose new header is no longer a language template
    /// becomes a plain section.
    pub fn set_header(&mut self, header: &str, config: &Config) {
        let was_empty = self.header.is_empty();
        self.header = header.trim().to_string();

        if was_empty && !self.header.is_empty() {
            self.format = HeaderFormat::spaced();
        } else if !was_empty && self.header.is_empty() {
            self.format = HeaderFormat::Blank;
        }

        self.lang = if self.level == 2 {
            match LangHeader::parse(&self.header, config) {
                Ok(lang) => lang,
                Err(e) => {
                    warn!("Header kept as a plain section: {}", e);
                    None
                }
            }
        } else {
            None
        };
    }

    pub fn intro(&self) -> &str {
        &self.intro
    }

    pub fn set_intro(&mut self, intro: &str) {
        self.intro = intro.trim().to_string();

        if self.intro.is_empty() {
            self.leading_newlines = 0;
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: usize) -> EditorResult<()> {
        check_level(level)?;
        self.level = level;
        if level != 2 {
            self.lang = None;
        }
        Ok(())
    }

    pub fn leading_newlines(&self) -> usize {
        self.leading_newlines
    }

    /// With an empty intro the newlines are folded into the trailing count.
    pub fn set_leading_newlines(&mut self, n: usize) {
        if self.intro.is_empty() {
            self.trailing_newlines += n;
        } else {
            self.leading_newlines = n;
        }
    }

    pub fn trailing_newlines(&self) -> usize {
        self.trailing_newlines
    }

    pub fn set_trailing_newlines(&mut self, n: usize) {
        self.trailing_newlines = n;
    }

    pub fn header_format(&self) -> &HeaderFormat {
        &self.format
    }

    pub fn set_header_format(&mut self, format: HeaderFormat) {
        self.format = format;
    }

    pub fn is_lang_section(&self) -> bool {
        self.lang.is_some()
    }

    pub fn lang(&self) -> Option<&LangHeader> {
        self.lang.as_ref()
    }

    /// Language code, if this is a language section.
    pub fn lang_code(&self) -> Option<&str> {
        self.lang.as_ref().map(LangHeader::code)
    }

    pub fn set_lang_code(&mut self, code: &str, config: &Config) {
        if let Some(lang) = self.lang.as_mut() {
            lang.set_code(code, config);
            self.header = lang.to_string();
        }
    }

    pub fn set_lang_param(&mut self, key: &str, value: &str) {
        if let Some(lang) = self.lang.as_mut() {
            lang.set_param(key, value);
            self.header = lang.to_string();
        }
    }

    pub fn remove_lang_param(&mut self, key: &str) -> bool {
        let Some(lang) = self.lang.as_mut() else {
            return false;
        };

        let removed = lang.remove_param(key);
        if removed {
            self.header = lang.to_string();
        }
        removed
    }

    /// Header line with its comments, `==header==` style.
    pub fn render_header(&self) -> String {
        let marks = "=".repeat(self.level);
        let inner = match &self.format {
            HeaderFormat::Padded { lead, trail } => format!("{}{}{}", lead, self.header, trail),
            HeaderFormat::Blank => " ".to_string(),
        };

        format!(
            "{}{}{}{}{}",
            self.leading_comments, marks, inner, marks, self.trailing_comments
        )
    }

    /// Header line plus intro, without children.
    pub fn render_head(&self) -> String {
        let mut out = self.render_header();

        if !self.intro.is_empty() {
            out.push('\n');
        }

        out.push_str(&"\n".repeat(self.leading_newlines));
        out.push_str(&self.intro);
        out.push_str(&"\n".repeat(self.trailing_newlines));
        out
    }
}

fn check_level(level: usize) -> EditorResult<()> {
    if (1..=6).contains(&level) {
        Ok(())
    } else {
        Err(EditorError::InvariantViolation(format!(
            "Invalid section level: {}",
            level
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::builtin().unwrap()
    }

    #[test]
    fn test_parse_header_and_intro() {
        let section = Section::parse("== Etimología ==\n\ntexto\n", &config()).unwrap();
        assert_eq!(section.level(), 2);
        assert_eq!(section.header(), "Etimología");
        assert_eq!(section.intro(), "texto");
        assert_eq!(section.leading_newlines(), 1);
        assert_eq!(section.trailing_newlines(), 1);
        assert_eq!(section.render_head(), "== Etimología ==\n\ntexto\n");
    }

    #[test]
    fn test_tight_and_commented_headers() {
        let section = Section::parse("<!-- a -->===Uso=== <!-- b -->", &config()).unwrap();
        assert_eq!(section.level(), 3);
        assert_eq!(section.header(), "Uso");
        assert_eq!(section.header_format(), &HeaderFormat::tight());
        assert_eq!(section.render_head(), "<!-- a -->===Uso=== <!-- b -->");
    }

    #[test]
    fn test_empty_intro_counts_trailing() {
        let section = Section::parse("==a==\n\n", &config()).unwrap();
        assert_eq!(section.intro(), "");
        assert_eq!(section.trailing_newlines(), 2);
        assert_eq!(section.render_head(), "==a==\n\n");
    }

    #[test]
    fn test_blank_header() {
        let section = Section::parse("==   ==", &config()).unwrap();
        assert_eq!(section.header(), "");
        assert_eq!(section.header_format(), &HeaderFormat::Blank);
        assert_eq!(section.render_header(), "== ==");
    }

    #[test]
    fn test_not_a_header() {
        assert!(matches!(
            Section::parse("texto", &config()),
            Err(EditorError::Structural(_))
        ));
    }

    #[test]
    fn test_lang_header_roundtrip() {
        let config = config();
        let header = "== {{lengua| fr |escritura=latina}} ==";
        let section = Section::parse(header, &config).unwrap();
        let lang = section.lang().unwrap();
        assert_eq!(lang.code(), "fr");
        assert_eq!(lang.name(), "francés");
        assert_eq!(lang.kind(), LangTemplateKind::Lengua);
        assert!(!lang.is_transliteration());
        assert_eq!(section.render_header(), header);
    }

    #[test]
    fn test_lang_header_mutation_rederives() {
        let config = config();
        let mut section = Section::parse("=={{lengua|FR}}==", &config).unwrap();
        assert!(section.lang().unwrap().code_equals("fr"));
        section.set_lang_code("de", &config);
        assert_eq!(section.header(), "{{lengua|de}}");
        assert_eq!(section.lang().unwrap().name(), "alemán");
        section.set_lang_param("escritura", "transliteración");
        assert_eq!(section.header(), "{{lengua|de|escritura=transliteración}}");
        assert!(section.lang().unwrap().is_transliteration());
        assert!(section.remove_lang_param("escritura"));
        assert_eq!(section.header(), "{{lengua|de}}");
    }

    #[test]
    fn test_lang_header_requires_level_two() {
        let section = Section::parse("==={{lengua|fr}}===", &config()).unwrap();
        assert!(!section.is_lang_section());
    }

    #[test]
    fn test_lang_header_without_code() {
        assert!(matches!(
            Section::parse("=={{lengua| }}==", &config()),
            Err(EditorError::Structural(_))
        ));
    }

    #[test]
    fn test_translit_kind() {
        let section = Section::parse("=={{translit|ja}}==", &config()).unwrap();
        assert!(section.lang().unwrap().is_transliteration());
    }

    #[test]
    fn test_stripped_header() {
        let section = Section::parse(
            "==Referencias<ref>x</ref>  y <!-- c -->notas==",
            &config(),
        )
        .unwrap();
        assert_eq!(section.stripped_header(), "Referencias y notas");
    }

    #[test]
    fn test_set_header_formats() {
        let config = config();
        let mut section = Section::parse("==   ==", &config).unwrap();
        section.set_header("Uso", &config);
        assert_eq!(section.render_header(), "== Uso ==");
        section.set_header("", &config);
        assert_eq!(section.render_header(), "== ==");
    }

    #[test]
    fn test_set_header_without_lang_code() {
        let config = config();
        let mut section = Section::parse("== {{lengua|fr}} ==\nx", &config).unwrap();
        assert!(section.is_lang_section());

        section.set_header("{{lengua|alt=chose}}", &config);
        assert!(!section.is_lang_section());
        assert_eq!(section.header(), "{{lengua|alt=chose}}");
        assert!(LangHeader::parse(section.header(), &config).is_err());
    }

    #[test]
    fn test_set_leading_newlines_on_empty_intro() {
        let mut section = Section::create("a", 3).unwrap();
        section.set_leading_newlines(2);
        assert_eq!(section.leading_newlines(), 0);
        assert_eq!(section.trailing_newlines(), 2);
    }

    #[test]
    fn test_create_rejects_bad_level() {
        assert!(Section::create("a", 0).is_err());
        assert!(Section::create("a", 7).is_err());
    }
}
