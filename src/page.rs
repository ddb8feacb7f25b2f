//! Arena-backed page tree.
//!
//! Sections live in an arena and are addressed by [`SectionId`]. The page
//! keeps the flat document order of its sections; parent/child links are
//! derived from that order and the section levels by [`Page::rebuild_tree`],
//! which every structural mutation calls. Detached sections stay in the
//! arena but are no longer reachable from the document order.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;
use crate::error::{EditorError, EditorResult};
use crate::ranges::{contained_in_ranges, sanitize_whitespaces, standard_ignored_ranges};
use crate::section::Section;

static P_SECTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:<!--.*?-->)*(={1,6}.+?={1,6})\s*(?:(?:<!--.*?-->)+\s*)?$")
        .expect("valid regex")
});

/// Stable handle to a section of a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(usize);

#[derive(Debug, Clone, Default)]
struct Links {
    parent: Option<SectionId>,
    children: Vec<SectionId>,
    toc_level: usize,
}

#[derive(Debug, Clone)]
pub struct Page {
    title: String,
    intro: String,
    leading_newlines: usize,
    trailing_newlines: usize,
    trailing_content: String,
    nodes: Vec<Section>,
    links: Vec<Links>,
    order: Vec<SectionId>,
}

impl Page {
    /// An empty page.
    pub fn new(title: &str) -> Self {
        Page {
            title: title.trim().to_string(),
            intro: String::new(),
            leading_newlines: 0,
            trailing_newlines: 0,
            trailing_content: String::new(),
            nodes: Vec::new(),
            links: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Parse page text into a section tree.
    ///
    /// Whitespace is sanitized first. Header lines inside comments,
    /// `<nowiki>`, `<pre>` or `<code>` do not split the page. Trailing
    /// interwiki links of the last section are moved to the page's trailing
    /// content.
    ///
    /// # Arguments
    ///
    /// * `title` - Page title
    /// * `text` - Raw page text
    /// * `config` - Language and interwiki tables
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Structural` if a header line cannot be parsed or
    /// a language header carries no code.
    pub fn parse(title: &str, text: &str, config: &Config) -> EditorResult<Page> {
        let mut page = Page::new(title);

        if text.is_empty() {
            return Ok(page);
        }

        let text = sanitize_whitespaces(text);
        let chunks = split_sections(&text);

        // Page intro
        let mut intro = chunks[0];
        if !intro.is_empty() {
            if let Some(stripped) = intro.strip_suffix('\n') {
                intro = stripped;
            }
            page.extract_intro(intro);
        }

        // Sections
        let count = chunks.len();
        for (i, chunk) in chunks.iter().enumerate().skip(1) {
            let mut chunk = *chunk;
            if i < count - 1 {
                if let Some(stripped) = chunk.strip_suffix('\n') {
                    chunk = stripped;
                }
            }

            let section = Section::parse(chunk, config)?;
            let id = page.alloc(section);
            page.order.push(id);
        }

        page.rebuild_tree();
        page.extract_trailing_content(config);

        Ok(page)
    }

    fn extract_intro(&mut self, intro: &str) {
        if intro.split('\n').all(str::is_empty) {
            self.intro = String::new();
            self.trailing_newlines = intro.split('\n').count();
            return;
        }

        let mut intro = intro;
        while let Some(stripped) = intro.strip_suffix('\n') {
            self.trailing_newlines += 1;
            intro = stripped;
        }
        while let Some(stripped) = intro.strip_prefix('\n') {
            self.leading_newlines += 1;
            intro = stripped;
        }
        self.intro = intro.to_string();
    }

    fn extract_trailing_content(&mut self, config: &Config) {
        let Some(&last) = self.order.last() else {
            return;
        };

        let content = format!("\n{}", self.nodes[last.0].intro());
        let Some(m) = config.trailing_interwiki().find(&content) else {
            return;
        };

        self.trailing_content = m.as_str()[1..].to_string();
        let mut trimmed = &content[1..m.start().max(1)];

        let section = &mut self.nodes[last.0];
        if trimmed.is_empty() {
            let trailing = section.leading_newlines();
            section.set_intro("");
            section.set_trailing_newlines(trailing);
        } else {
            let mut trailing = 0;
            while let Some(stripped) = trimmed.strip_suffix('\n') {
                trailing += 1;
                trimmed = stripped;
            }
            section.set_intro(trimmed);
            section.set_trailing_newlines(trailing);
        }
    }

    fn alloc(&mut self, section: Section) -> SectionId {
        self.nodes.push(section);
        self.links.push(Links::default());
        SectionId(self.nodes.len() - 1)
    }

    /// Add a detached section to the arena. It becomes part of the document
    /// once appended or inserted somewhere.
    pub fn create_section(&mut self, section: Section) -> SectionId {
        self.alloc(section)
    }

    /// Re-derive parent/child links from the document order and levels.
    pub fn rebuild_tree(&mut self) {
        for links in &mut self.links {
            *links = Links::default();
        }

        let order = self.order.clone();
        self.traverse(&order, 1);
    }

    fn traverse(&mut self, sections: &[SectionId], toc_level: usize) -> Vec<SectionId> {
        let mut siblings: Vec<SectionId> = Vec::with_capacity(sections.len());
        let mut groups: Vec<(SectionId, Vec<SectionId>)> = Vec::new();
        let mut min_level = 6;

        for &id in sections {
            let level = self.nodes[id.0].level();
            min_level = min_level.min(level);

            if level <= min_level {
                siblings.push(id);
                self.links[id.0].toc_level = toc_level;
                continue;
            }

            // A deeper level than the running minimum always follows a sibling
            let Some(&previous) = siblings.last() else {
                continue;
            };

            match groups.last_mut() {
                Some((owner, children)) if *owner == previous => children.push(id),
                _ => groups.push((previous, vec![id])),
            }
        }

        for (owner, group) in groups {
            let children = self.traverse(&group, toc_level + 1);
            for &child in &children {
                self.links[child.0].parent = Some(owner);
            }
            self.links[owner.0].children = children;
        }

        siblings
    }

    pub fn title(&self) -> &str {
        &self.title
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

    pub fn leading_newlines(&self) -> usize {
        self.leading_newlines
    }

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

    pub fn trailing_content(&self) -> &str {
        &self.trailing_content
    }

    pub fn set_trailing_content(&mut self, content: &str) {
        self.trailing_content = content.to_string();
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.nodes[id.0]
    }

    /// Mutable access to a section's text. Level changes go through
    /// [`Page::set_level`] so the tree stays consistent.
    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.nodes[id.0]
    }

    /// Every attached section in document order.
    pub fn sections(&self) -> &[SectionId] {
        &self.order
    }

    pub fn top_level(&self) -> Vec<SectionId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.links[id.0].toc_level == 1)
            .collect()
    }

    pub fn is_attached(&self, id: SectionId) -> bool {
        self.order.contains(&id)
    }

    pub fn parent(&self, id: SectionId) -> Option<SectionId> {
        self.links[id.0].parent
    }

    pub fn children(&self, id: SectionId) -> &[SectionId] {
        &self.links[id.0].children
    }

    pub fn toc_level(&self, id: SectionId) -> usize {
        self.links[id.0].toc_level
    }

    /// Sections sharing the parent of `id` (itself included).
    pub fn siblings(&self, id: SectionId) -> Vec<SectionId> {
        match self.parent(id) {
            Some(parent) => self.children(parent).to_vec(),
            None => self.top_level(),
        }
    }

    fn position(&self, id: SectionId) -> Option<usize> {
        self.order.iter().position(|&s| s == id)
    }

    /// Next section in document order.
    pub fn next_section(&self, id: SectionId) -> Option<SectionId> {
        let index = self.position(id)?;
        self.order.get(index + 1).copied()
    }

    pub fn previous_section(&self, id: SectionId) -> Option<SectionId> {
        let index = self.position(id)?;
        index.checked_sub(1).and_then(|i| self.order.get(i).copied())
    }

    /// All descendants of `id` in document order.
    pub fn flatten_subsections(&self, id: SectionId) -> Vec<SectionId> {
        let mut out = Vec::new();
        for &child in self.children(id) {
            out.push(child);
            out.extend(self.flatten_subsections(child));
        }
        out
    }

    fn subtree(&self, id: SectionId) -> Vec<SectionId> {
        let mut out = vec![id];
        out.extend(self.flatten_subsections(id));
        out
    }

    /// Sections whose stripped header matches `re`.
    pub fn find_sections(&self, re: &Regex) -> Vec<SectionId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| re.is_match(&self.nodes[id.0].stripped_header()))
            .collect()
    }

    /// Descendants of `id` whose stripped header matches `re`.
    pub fn find_subsections(&self, id: SectionId, re: &Regex) -> Vec<SectionId> {
        self.flatten_subsections(id)
            .into_iter()
            .filter(|&s| re.is_match(&self.nodes[s.0].stripped_header()))
            .collect()
    }

    pub fn has_subsection(&self, id: SectionId, re: &Regex) -> bool {
        !self.find_subsections(id, re).is_empty()
    }

    /// Language sections in document order.
    pub fn lang_sections(&self) -> Vec<SectionId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.nodes[id.0].is_lang_section())
            .collect()
    }

    /// Language sections paired with their codes, skipping any without one.
    pub fn lang_sections_with_codes(&self) -> Vec<(SectionId, String)> {
        self.lang_sections()
            .into_iter()
            .filter_map(|id| {
                self.nodes[id.0]
                    .lang_code()
                    .map(|code| (id, code.to_string()))
            })
            .collect()
    }

    /// Language section with the given code (case-insensitive).
    pub fn lang_section(&self, code: &str) -> Option<SectionId> {
        self.lang_sections().into_iter().find(|id| {
            self.nodes[id.0]
                .lang()
                .is_some_and(|lang| lang.code_equals(code))
        })
    }

    pub fn has_lang_section(&self, code: &str) -> bool {
        self.lang_section(code).is_some()
    }

    /// Closest language-section ancestor of `id`, itself included.
    pub fn lang_section_parent(&self, id: SectionId) -> Option<SectionId> {
        let mut current = Some(id);
        while let Some(s) = current {
            if self.nodes[s.0].is_lang_section() {
                return Some(s);
            }
            current = self.parent(s);
        }
        None
    }

    /// Add an empty language section unless one with that code exists, and
    /// re-sort language sections.
    pub fn add_lang_section(&mut self, code: &str, config: &Config) -> SectionId {
        if let Some(existing) = self.lang_section(code) {
            return existing;
        }

        let id = self.alloc(Section::create_lang(code, config));
        self.order.push(id);
        self.rebuild_tree();
        self.sort_lang_sections();
        id
    }

    /// Remove the language section with that code. Its subsections are
    /// re-attached to whatever precedes them.
    pub fn remove_lang_section(&mut self, code: &str) -> bool {
        match self.lang_section(code) {
            Some(id) => {
                self.detach_only_self(id);
                true
            }
            None => false,
        }
    }

    /// The last section, when its header starts with "Referencias".
    pub fn references(&self) -> Option<SectionId> {
        let &last = self.order.last()?;
        self.nodes[last.0]
            .header()
            .starts_with("Referencias")
            .then_some(last)
    }

    /// Make `id` the references section: the previous one is removed (its
    /// children stay) and `id` moves to the end of the page.
    pub fn set_references_section(&mut self, id: SectionId) {
        if let Some(old) = self.references() {
            if old != id {
                self.order.retain(|&s| s != old);
            }
        }

        self.order.retain(|&s| s != id);
        self.order.push(id);
        self.rebuild_tree();
    }

    /// Append sections at the end of the page.
    pub fn append_sections(&mut self, ids: &[SectionId]) {
        if ids.is_empty() {
            return;
        }

        let flattened = self.flatten_all(ids);
        self.order.retain(|s| !flattened.contains(s));
        self.order.extend(flattened);
        self.rebuild_tree();
    }

    fn flatten_all(&self, ids: &[SectionId]) -> Vec<SectionId> {
        let mut out = Vec::new();
        for &id in ids {
            for s in self.subtree(id) {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        }
        out
    }

    fn check_child_levels(&self, parent: SectionId, ids: &[SectionId]) -> EditorResult<()> {
        let level = self.nodes[parent.0].level();
        for &id in ids {
            let child_level = self.nodes[id.0].level();
            if child_level <= level {
                return Err(EditorError::InvariantViolation(format!(
                    "Invalid level of inserted section: {} (must be > {})",
                    child_level, level
                )));
            }
        }
        Ok(())
    }

    /// Insert sections as the last children of `parent`, after its whole
    /// subtree.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvariantViolation` if a section is not deeper
    /// than `parent`.
    pub fn append_children(&mut self, parent: SectionId, ids: &[SectionId]) -> EditorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.check_child_levels(parent, ids)?;

        let flattened = self.flatten_all(ids);
        self.order.retain(|s| !flattened.contains(s));

        let anchor = self
            .subtree(parent)
            .into_iter()
            .filter_map(|s| self.position(s))
            .max()
            .ok_or_else(|| EditorError::InvariantViolation("Parent section is detached".to_string()))?;

        self.order.splice(anchor + 1..anchor + 1, flattened);
        self.rebuild_tree();
        Ok(())
    }

    /// Insert sections as the first children of `parent`.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvariantViolation` if a section is not deeper
    /// than `parent`.
    pub fn prepend_children(&mut self, parent: SectionId, ids: &[SectionId]) -> EditorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.check_child_levels(parent, ids)?;

        let flattened = self.flatten_all(ids);
        self.order.retain(|s| !flattened.contains(s));

        let anchor = self
            .position(parent)
            .ok_or_else(|| EditorError::InvariantViolation("Parent section is detached".to_string()))?;

        self.order.splice(anchor + 1..anchor + 1, flattened);
        self.rebuild_tree();
        Ok(())
    }

    /// Insert sections of the same level right after `target`'s subtree.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvariantViolation` on a level mismatch.
    pub fn insert_after(&mut self, target: SectionId, ids: &[SectionId]) -> EditorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let level = self.nodes[target.0].level();
        if let Some(&bad) = ids.iter().find(|id| self.nodes[id.0].level() != level) {
            return Err(EditorError::InvariantViolation(format!(
                "Invalid level of inserted section: {} (must be == {})",
                self.nodes[bad.0].level(),
                level
            )));
        }

        let flattened = self.flatten_all(ids);
        self.order.retain(|s| !flattened.contains(s));

        let anchor = self
            .subtree(target)
            .into_iter()
            .filter_map(|s| self.position(s))
            .max()
            .ok_or_else(|| EditorError::InvariantViolation("Target section is detached".to_string()))?;

        self.order.splice(anchor + 1..anchor + 1, flattened);
        self.rebuild_tree();
        Ok(())
    }

    /// Remove a section together with its subsections.
    pub fn detach(&mut self, id: SectionId) {
        let subtree = self.subtree(id);
        self.order.retain(|s| !subtree.contains(s));
        self.rebuild_tree();
    }

    /// Remove only the section itself; its children are re-derived onto
    /// whatever precedes them.
    pub fn detach_only_self(&mut self, id: SectionId) {
        self.order.retain(|&s| s != id);
        self.rebuild_tree();
    }

    /// Change the level of a single section.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvariantViolation` for a level outside 1..=6.
    pub fn set_level(&mut self, id: SectionId, level: usize) -> EditorResult<()> {
        self.nodes[id.0].set_level(level)?;
        self.rebuild_tree();
        Ok(())
    }

    /// Shift the level of a section and all its descendants by `diff`.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvariantViolation` when `diff` is outside
    /// -5..=5, a resulting level falls outside 1..=6, or a language section
    /// would leave level 2.
    pub fn push_levels(&mut self, id: SectionId, diff: i32) -> EditorResult<()> {
        if diff == 0 {
            return Ok(());
        }

        if !(-5..=5).contains(&diff) {
            return Err(EditorError::InvariantViolation(format!(
                "Level diff out of range: {}",
                diff
            )));
        }

        if self.nodes[id.0].is_lang_section() {
            return Err(EditorError::InvariantViolation(
                "Language sections must stay at level 2".to_string(),
            ));
        }

        let subtree = self.subtree(id);
        let shifted: Vec<i64> = subtree
            .iter()
            .map(|s| self.nodes[s.0].level() as i64 + diff as i64)
            .collect();

        if shifted.iter().any(|&l| !(1..=6).contains(&l)) {
            return Err(EditorError::InvariantViolation(format!(
                "New level out of accepted range (diff {})",
                diff
            )));
        }

        for (s, level) in subtree.into_iter().zip(shifted) {
            self.nodes[s.0].set_level(level as usize)?;
        }

        self.rebuild_tree();
        Ok(())
    }

    /// Make sibling levels consistent, one tree depth at a time.
    ///
    /// A sibling group with mixed levels, or one more than a level deeper than
    /// its parent, is moved to parent level + 1. Mixed top-level groups are
    /// moved to their minimum level.
    pub fn normalize_child_levels(&mut self) -> EditorResult<()> {
        if self.order.is_empty() {
            return Ok(());
        }

        let mut toc_level = 1;

        loop {
            let groups: Vec<(Option<SectionId>, Vec<SectionId>)> = if toc_level == 1 {
                vec![(None, self.top_level())]
            } else {
                self.order
                    .iter()
                    .copied()
                    .filter(|&id| self.toc_level(id) == toc_level - 1 && !self.children(id).is_empty())
                    .map(|id| (Some(id), self.children(id).to_vec()))
                    .collect()
            };

            if groups.is_empty() {
                break;
            }

            for (parent, siblings) in groups {
                let levels: Vec<usize> = siblings.iter().map(|s| self.nodes[s.0].level()).collect();
                let (Some(&min), Some(&max)) = (levels.iter().min(), levels.iter().max()) else {
                    continue;
                };

                let target = match parent {
                    Some(p) => {
                        let parent_level = self.nodes[p.0].level();
                        (min != max || min > parent_level + 1).then_some(parent_level + 1)
                    }
                    None => (min != max).then_some(min),
                };

                if let Some(level) = target {
                    for s in siblings {
                        self.nodes[s.0].set_level(level.min(6))?;
                    }
                }
            }

            self.rebuild_tree();
            toc_level += 1;
        }

        Ok(())
    }

    /// Replace the document order of `parent`'s children (each moved with
    /// its subtree). `children` must be a permutation of the current ones.
    pub(crate) fn reorder_children(&mut self, parent: Option<SectionId>, children: &[SectionId]) {
        let block: Vec<SectionId> = self.flatten_all(children);

        match parent {
            Some(p) => {
                let Some(start) = self.position(p).map(|i| i + 1) else {
                    return;
                };
                let end = start + self.flatten_subsections(p).len();
                self.order.splice(start..end, block);
            }
            None => {
                let rest: Vec<SectionId> = self
                    .order
                    .iter()
                    .copied()
                    .filter(|s| !block.contains(s))
                    .collect();
                self.order = block;
                self.order.extend(rest);
            }
        }

        self.rebuild_tree();
    }

    /// Replace the whole document order.
    pub(crate) fn set_order(&mut self, order: Vec<SectionId>) {
        self.order = order;
        self.rebuild_tree();
    }

    /// Serialize a section and its subtree.
    pub fn render_section(&self, id: SectionId) -> String {
        let mut out = self.nodes[id.0].render_head();
        let children = self.children(id);

        if !children.is_empty() {
            out.push('\n');
            let rendered: Vec<String> = children.iter().map(|&c| self.render_section(c)).collect();
            out.push_str(&rendered.join("\n"));
        }

        out
    }

    /// Section text without its header line, trimmed.
    pub fn flattened_content(&self, id: SectionId) -> String {
        let section = &self.nodes[id.0];
        let mut out = section.intro().to_string();
        out.push_str(&"\n".repeat(section.trailing_newlines()));

        let children = self.children(id);
        if !children.is_empty() {
            out.push('\n');
            let rendered: Vec<String> = children.iter().map(|&c| self.render_section(c)).collect();
            out.push_str(&rendered.join("\n"));
        }

        out.trim().to_string()
    }
}

/// Split page text at header lines outside ignored regions. The first chunk
/// is the page intro (possibly empty).
fn split_sections(text: &str) -> Vec<&str> {
    let ignored = standard_ignored_ranges(text);
    let mut starts = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        if let Some(header) = P_SECTION_LINE.captures(line).and_then(|c| c.get(1)) {
            if !contained_in_ranges(&ignored, offset + header.start()) {
                starts.push(offset);
            }
        }
        offset += line.len() + 1;
    }

    let mut chunks = Vec::with_capacity(starts.len() + 1);
    let mut last = 0usize;
    for start in starts {
        chunks.push(&text[last..start]);
        last = start;
    }
    chunks.push(&text[last..]);
    chunks
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();

        out.push_str(&"\n".repeat(self.leading_newlines));
        out.push_str(&self.intro);
        out.push_str(&"\n".repeat(self.trailing_newlines));

        if !self.intro.is_empty() {
            out.push('\n');
        }

        for id in self.top_level() {
            out.push_str(&self.render_section(id));
            out.push('\n');
        }

        out.pop();

        if !self.trailing_content.is_empty() {
            out.push('\n');
            out.push_str(&self.trailing_content);
        }

        write!(f, "{}", out)
    }
}
