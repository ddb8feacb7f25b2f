//! The references section and the `<ref>` elements feeding it.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    has_template, outcome, page_outcome, push_unique, Context, Outcome, P_REFERENCES,
    P_REFERENCES_AND_NOTES, REFERENCES_HEADER,
};
use crate::error::EditorResult;
use crate::ranges::{
    contained_in_ranges, replace_with_standard_ignored_ranges, standard_ignored_ranges,
    strip_comments_and_nowiki,
};
use crate::section::Section;
use crate::template::{find_templates, replace_named_templates};

static P_REFERENCES_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<references *?/ *?>").expect("valid regex"));

static P_REFERENCES_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{ *título referencias *\}\}").expect("valid regex"));

static P_REFERENCES_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<references *?/? *?>").expect("valid regex"));

static P_REFERENCES_OPENING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<references\b").expect("valid regex"));

static P_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<ref\b([^>]*?)(?:/\s*>|>(.*?)</ref\s*>)").expect("valid regex")
});

static P_REF_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s*\b(name|group)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'/>]+))"#)
        .expect("valid regex")
});

/// A `<ref>` element, either `<ref ...>content</ref>` or `<ref ... />`.
#[derive(Debug, Clone)]
struct RefTag {
    span: Range<usize>,
    attrs: String,
    content: Option<String>,
}

impl RefTag {
    fn attr(&self, key: &str) -> Option<String> {
        P_REF_ATTR
            .captures_iter(&self.attrs)
            .find(|caps| caps[1].eq_ignore_ascii_case(key))
            .map(|caps| {
                (2..=4)
                    .find_map(|i| caps.get(i))
                    .map_or(String::new(), |m| m.as_str().to_string())
            })
    }

    fn name(&self) -> Option<String> {
        self.attr("name")
    }

    fn has_group(&self) -> bool {
        self.attr("group").is_some()
    }

    fn is_self_closing(&self) -> bool {
        self.content.is_none()
    }

    fn body(&self) -> &str {
        self.content.as_deref().unwrap_or_default().trim()
    }

    /// Attributes with `name` replaced (or dropped when `None`).
    fn attrs_with_name(&self, name: Option<&str>) -> String {
        let mut rest = String::new();
        let mut last = 0;

        for caps in P_REF_ATTR.captures_iter(&self.attrs) {
            if caps[1].eq_ignore_ascii_case("name") {
                let m = caps.get(0).map_or(0..0, |m| m.range());
                rest.push_str(&self.attrs[last..m.start]);
                last = m.end;
            }
        }
        rest.push_str(&self.attrs[last..]);
        let rest = rest.trim_end();

        match name {
            Some(name) => format!(" name=\"{}\"{}", name, rest),
            None => rest.to_string(),
        }
    }

    fn render(&self, name: Option<&str>, self_closing: bool) -> String {
        let attrs = self.attrs_with_name(name);
        match (&self.content, self_closing) {
            (Some(content), false) => format!("<ref{}>{}</ref>", attrs, content),
            _ => format!("<ref{} />", attrs),
        }
    }
}

/// `<ref>` elements outside comments, `<nowiki>`, `<pre>` and `<code>`.
fn find_refs(text: &str) -> Vec<RefTag> {
    let ignored = standard_ignored_ranges(text);

    P_REF
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            if contained_in_ranges(&ignored, m.start()) {
                return None;
            }
            Some(RefTag {
                span: m.range(),
                attrs: caps.get(1).map_or("", |a| a.as_str()).to_string(),
                content: caps.get(2).map(|c| c.as_str().to_string()),
            })
        })
        .collect()
}

/// More than one references list makes `<ref>` names ambiguous.
fn has_several_reference_lists(text: &str) -> bool {
    let ignored = standard_ignored_ranges(text);
    let tags = P_REFERENCES_OPENING
        .find_iter(text)
        .filter(|m| !contained_in_ranges(&ignored, m.start()))
        .count();

    tags + find_templates("título referencias", text).len() > 1
}

/// Splice the rendered replacement of every edited ref into `text`.
fn apply_ref_edits(text: &str, refs: &[RefTag], edits: &[Option<String>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (tag, edit) in refs.iter().zip(edits) {
        if let Some(replacement) = edit {
            out.push_str(&text[last..tag.span.start]);
            out.push_str(replacement);
            last = tag.span.end;
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Group indices of `items` by key, keeping first-seen order.
fn group_by<K: PartialEq>(items: impl Iterator<Item = (usize, K)>) -> Vec<(K, Vec<usize>)> {
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();

    for (i, key) in items {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(i),
            None => groups.push((key, vec![i])),
        }
    }

    groups
}

/// A level-2 "Referencias y notas" section holding only `<references />`.
pub(crate) fn references_section() -> EditorResult<Section> {
    let mut section = Section::create(REFERENCES_HEADER, 2)?;
    section.set_intro("<references />");
    Ok(section)
}

/// Replace `{{título referencias}}` with a proper references section.
pub(crate) fn substitute_references_template(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };
    let mut contents = Vec::new();
    let mut found = false;

    for id in page.sections().to_vec().into_iter().rev() {
        let intro = page.section(id).intro().to_string();
        let ignored = standard_ignored_ranges(&intro);

        let Some(m) = P_REFERENCES_TEMPLATE
            .find_iter(&intro)
            .find(|m| !contained_in_ranges(&ignored, m.start()))
        else {
            continue;
        };

        found = true;
        let content = P_REFERENCES_TAG.replace_all(&intro[m.end()..], "");
        let content = content.trim();
        if !content.is_empty() {
            contents.push(content.to_string());
        }

        page.section_mut(id).set_intro(&intro[..m.start()]);
    }

    if !found {
        return Ok(None);
    }

    contents.reverse();

    match page.references() {
        Some(references) => {
            let existing = P_REFERENCES_TAG
                .replace_all(page.section(references).intro(), "")
                .trim()
                .to_string();
            if !existing.is_empty() {
                contents.extend(existing.split('\n').map(str::to_string));
            }
            contents.push("<references />".to_string());
            page.section_mut(references).set_intro(&contents.join("\n"));
        }
        None => {
            contents.push("<references />".to_string());
            let mut section = Section::create(REFERENCES_HEADER, 2)?;
            section.set_intro(&contents.join("\n"));
            let id = page.create_section(section);
            page.set_references_section(id);
        }
    }

    Ok(page_outcome(text, &page, "sustituyendo {{título referencias}}"))
}

/// Merge several references sections into a single one at the end.
pub(crate) fn duplicate_references_section(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };
    let all = page.find_sections(&P_REFERENCES);

    if all.len() < 2 {
        return Ok(None);
    }

    let mut contents: Vec<String> = Vec::new();

    for &id in &all {
        let content = P_REFERENCES_TAG
            .replace_all(page.section(id).intro(), "")
            .trim()
            .to_string();
        if !strip_comments_and_nowiki(&content).trim().is_empty() {
            push_unique(&mut contents, content);
        }
        page.detach_only_self(id);
    }

    contents.push("<references />".to_string());

    let mut section = Section::create(REFERENCES_HEADER, 2)?;
    section.set_intro(&contents.join("\n"));
    let id = page.create_section(section);
    page.set_references_section(id);

    Ok(page_outcome(text, &page, "más de una sección de referencias"))
}

/// Move the only references section to the end of the page.
pub(crate) fn move_references_section(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };
    let all = page.find_sections(&P_REFERENCES);

    let [references] = all.as_slice() else {
        return Ok(None);
    };

    if page.references() == Some(*references) {
        return Ok(None);
    }

    page.detach_only_self(*references);
    page.set_references_section(*references);

    Ok(page_outcome(text, &page, "trasladando sección de referencias"))
}

/// Collect `{{listaref}}` and `<references />` scattered over the page into
/// the references section.
pub(crate) fn move_references_elements(ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let Some(mut page) = ctx.parse_current(text)? else {
        return Ok(None);
    };

    let Some(references) = page.references() else {
        return Ok(None);
    };

    if page.find_sections(&P_REFERENCES_AND_NOTES).len() > 1 {
        return Ok(None);
    }

    let mut moved = Vec::new();

    for id in page.sections().to_vec() {
        if id == references {
            continue;
        }

        let intro = page.section(id).intro().to_string();
        let mut updated = replace_named_templates(&intro, "listaref", |_| Some(String::new()));
        if updated != intro {
            push_unique(&mut moved, "{{listaref}}".to_string());
        }

        let stripped = replace_with_standard_ignored_ranges(&updated, &P_REFERENCES_ELEMENT, |_| {
            Some("\n\n".to_string())
        });
        if stripped != updated {
            push_unique(&mut moved, "<references>".to_string());
            updated = stripped;
        }

        if updated != intro {
            page.section_mut(id).set_intro(&updated);
        }
    }

    if moved.is_empty() {
        return Ok(None);
    }

    let intro = page.section(references).intro().to_string();
    let listed = has_template(&intro, "listaref")
        || P_REFERENCES_ELEMENT.is_match(&strip_comments_and_nowiki(&intro));

    let summary = if listed {
        format!("eliminando {}", moved.join(", "))
    } else {
        let added = if moved.iter().any(|m| m == "<references>") {
            "<references />"
        } else {
            "{{listaref}}"
        };
        let intro = match intro.trim_end() {
            "" => added.to_string(),
            kept => format!("{}\n{}", kept, added),
        };
        page.section_mut(references).set_intro(&intro);
        format!("trasladando {}", moved.join(", "))
    };

    Ok(page_outcome(text, &page, &summary))
}

/// Drop the `name` of a named `<ref>` whose content differs from every
/// other ref sharing that name.
pub(crate) fn sanitize_references(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let refs = find_refs(text);

    if !refs.iter().any(|r| r.name().is_some() && !r.has_group()) || has_several_reference_lists(text) {
        return Ok(None);
    }

    let named = refs
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.has_group())
        .filter_map(|(i, r)| r.name().map(|name| (i, name)));

    let mut edits: Vec<Option<String>> = vec![None; refs.len()];

    for (_, members) in group_by(named) {
        if members.len() < 2
            || members
                .iter()
                .any(|&i| refs[i].is_self_closing() || refs[i].body().is_empty())
        {
            continue;
        }

        let by_content = group_by(members.iter().map(|&i| (i, refs[i].body())));
        if by_content.len() < 2 {
            continue;
        }

        for (_, same) in by_content {
            if let [single] = same.as_slice() {
                edits[*single] = Some(refs[*single].render(None, false));
            }
        }
    }

    Ok(outcome(
        text,
        apply_ref_edits(text, &refs, &edits),
        Some("corrigiendo referencias".to_string()),
    ))
}

/// Next free `auto_ref_id_N` name.
fn auto_ref_id(counter: &mut usize, taken: &[String]) -> String {
    loop {
        let name = format!("auto_ref_id_{}", counter);
        *counter += 1;
        if !taken.contains(&name) {
            return name;
        }
    }
}

/// Keep one full copy of repeated `<ref>` contents and point the rest at it
/// with self-closing `<ref name="..." />` tags.
pub(crate) fn group_references(_ctx: &Context, text: &str) -> EditorResult<Option<Outcome>> {
    let refs = find_refs(text);

    let candidates: Vec<usize> = (0..refs.len())
        .filter(|&i| !refs[i].is_self_closing() && !refs[i].has_group() && !refs[i].body().is_empty())
        .collect();

    if candidates.is_empty() || has_several_reference_lists(text) {
        return Ok(None);
    }

    let mut taken: Vec<String> = refs.iter().filter_map(RefTag::name).collect();
    let mut counter = 1;
    let mut names: Vec<Option<String>> = refs.iter().map(RefTag::name).collect();
    let mut edits: Vec<Option<String>> = vec![None; refs.len()];

    for (_, members) in group_by(candidates.iter().map(|&i| (i, refs[i].body()))) {
        if members.len() < 2 {
            continue;
        }

        let others_named = |name: &str| -> Vec<usize> {
            (0..refs.len())
                .filter(|i| !members.contains(i) && names[*i].as_deref() == Some(name))
                .collect()
        };

        let candidate = members
            .iter()
            .find_map(|&i| names[i].clone().filter(|n| !n.is_empty()));

        let name = match candidate {
            Some(candidate) => {
                let others = others_named(&candidate);
                let full = others.iter().filter(|&&i| !refs[i].is_self_closing()).count();
                let short = others.len() - full;

                if short > 0 && full > 0 {
                    continue;
                } else if full > 0 {
                    auto_ref_id(&mut counter, &taken)
                } else {
                    candidate
                }
            }
            None => auto_ref_id(&mut counter, &taken),
        };

        // Self-closing refs pointing at a name this group drops follow it
        let mut renamed = Vec::new();
        let mut ambiguous = false;

        for &i in &members {
            let Some(old) = names[i].as_deref().filter(|n| *n != name) else {
                continue;
            };

            let others = others_named(old);
            let full = others.iter().filter(|&&o| !refs[o].is_self_closing()).count();

            if full > 0 && full < others.len() {
                ambiguous = true;
                break;
            } else if full == 0 {
                renamed.extend(others);
            }
        }

        if ambiguous {
            continue;
        }

        for o in renamed {
            names[o] = Some(name.clone());
            edits[o] = Some(refs[o].render(Some(&name), true));
        }

        for (n, &i) in members.iter().enumerate() {
            names[i] = Some(name.clone());
            edits[i] = Some(refs[i].render(Some(&name), n > 0));
        }

        taken.push(name);
    }

    Ok(outcome(
        text,
        apply_ref_edits(text, &refs, &edits),
        Some("agrupando referencias".to_string()),
    ))
}
