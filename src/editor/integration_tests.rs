use proptest::prelude::*;

use super::*;
use crate::error::EditorError;

fn config() -> Config {
    Config::builtin().unwrap()
}

const MODERN_PAGE: &str = "== {{lengua|es}} ==\n{{pron-graf}}\n\n=== Etimología ===\n{{etimología|leng=es}}.\n\n=== {{sustantivo femenino|es}} ===\n;1: Edificio para habitar.\n\n== Referencias y notas ==\n<references />";

const FOREIGN_PAGE: &str = "== {{lengua|fr}} ==\n{{pron-graf}}\n\n=== Etimología ===\n{{etimología}}.\n\n===Sustantivo femenino===\n;1:Casa.\n{{sinónimo|logis}}\n[[Categoría:FR:Sustantivos femeninos|maison]]\n\n== Referencias y notas ==\n<references />";

const INFLECTED_PAGE: &str = "== {{lengua|es}} ==\n{{pron-graf}}\n\n=== {{sustantivo femenino|es}} ===\n;1: {{forma sustantivo|casa|número=plural}}.\n\n== Referencias y notas ==\n<references />";

const HASHED_PAGE: &str = "== {{lengua|en}} ==\n{{pron-graf|leng=en}}\n\n=== Etimología ===\n{{etimología|leng=en}}.\n\n=== {{verbo|en}} ===\n'''to walk'''\n# Caminar.<ref>libro</ref>\n# Pasear.<ref>libro</ref>\n\n== Referencias y notas ==\n<references />";

/// Run every pass twice on the text as it flows through the pipeline.
fn assert_passes_idempotent(title: &str, text: &str) {
    let config = config();
    let mut current = sanitize_whitespaces(text);

    for pass in PIPELINE {
        let ctx = Context {
            config: &config,
            title,
            old_structure: detect_old_structure(&current),
        };

        let Some(first) = (pass.run)(&ctx, &current).unwrap() else {
            continue;
        };

        let ctx = Context {
            config: &config,
            title,
            old_structure: detect_old_structure(&first.text),
        };

        let second = (pass.run)(&ctx, &first.text).unwrap();
        assert!(
            second.is_none(),
            "{} is not idempotent on [[{}]]:\n{}\n---\n{}",
            pass.name,
            title,
            first.text,
            second.map(|o| o.text).unwrap_or_default()
        );

        current = first.text;
    }
}

#[test]
fn test_old_structure_migration() {
    let config = config();
    let mut editor = Editor::new("casa", "{{ES}}\n\n;1: Edificio para habitar.", &config);
    assert!(editor.is_old_structure());

    editor.check().unwrap();

    assert!(!editor.is_old_structure());
    assert!(editor.text().contains("{{lengua|es}}"));
    assert!(editor.text().contains("Edificio para habitar."));
    assert!(!editor.text().contains("{{ES}}"));
    assert!(editor.is_modified());
    assert!(editor
        .changes()
        .iter()
        .any(|c| c.pass == "transform_to_new_structure"));
}

#[test]
fn test_old_structure_migration_adds_etymology() {
    let config = config();
    let text = "{{ES}}\n\n;1: Edificio para habitar.";
    let ctx = Context {
        config: &config,
        title: "casa",
        old_structure: true,
    };

    let pass = find_pass("transform_to_new_structure").unwrap();
    let migrated = (pass.run)(&ctx, text).unwrap().unwrap();
    let page = Page::parse("casa", &migrated.text, &config).unwrap();

    let spanish = page.lang_section("es").unwrap();
    let etymology = page
        .children(spanish)
        .iter()
        .copied()
        .find(|&id| page.section(id).stripped_header() == "Etimología")
        .unwrap();
    assert_eq!(page.section(etymology).level(), 3);
    assert_eq!(page.section(etymology).intro().trim(), "{{etimología|leng=es}}.");

    // The full run keeps it and drops the redundant leng=es
    let mut editor = Editor::new("casa", text, &config);
    editor.check().unwrap();

    let page = Page::parse("casa", editor.text(), &config).unwrap();
    let spanish = page.lang_section("es").unwrap();
    let etymology = page
        .children(spanish)
        .iter()
        .copied()
        .find(|&id| page.section(id).stripped_header() == "Etimología")
        .unwrap();
    assert_eq!(page.section(etymology).level(), 3);
    assert!(page.section(etymology).intro().contains("{{etimología}}."));
}

#[test]
fn test_duplicate_references_merged() {
    let config = config();
    let text = "== {{lengua|es}} ==\n{{pron-graf}}\n\n=== Etimología ===\n{{etimología}}.\n\n=== {{sustantivo femenino|es}} ===\n;1: Edificio.<ref>a</ref>\n\n== Referencias ==\n<references />\n\n== Referencias ==\n<references />";
    let mut editor = Editor::new("casa", text, &config);

    editor.check().unwrap();

    assert_eq!(editor.text().matches("Referencias").count(), 1);
    assert_eq!(editor.text().matches("<references />").count(), 1);
    assert!(editor.text().contains("Referencias y notas"));

    let page = Page::parse("casa", editor.text(), &config).unwrap();
    let last = *page.sections().last().unwrap();
    assert_eq!(page.references(), Some(last));
    assert_eq!(page.section(last).stripped_header(), "Referencias y notas");
    assert_eq!(page.section(last).level(), 2);
    assert!(page.parent(last).is_none());
}

#[test]
fn test_depth_gate_boundary() {
    let config = config();

    let text = "== {{lengua|es}} ==\n;1: {{a|{{b}}}}";
    let mut editor = Editor::new("casa", text, &config);
    assert!(editor.check().is_ok());

    let text = "== {{lengua|es}} ==\n;1: {{a|{{b|{{c}}}}}}";
    let mut editor = Editor::new("casa", text, &config);
    let err = editor.check().unwrap_err();
    assert!(matches!(err, EditorError::MaxTemplateDepthExceeded { .. }));
    assert_eq!(editor.text(), text);
}

#[test]
fn test_level_overflow_aborts() {
    let config = config();
    let text = "== {{lengua|es}} ==\n;1: x\n== Miscelánea ==\n=== a ===\n==== b ====\n===== c =====\n====== d ======";
    let mut editor = Editor::new("casa", text, &config);

    let err = editor.check().unwrap_err();

    assert!(matches!(err, EditorError::InvariantViolation(_)));
    assert!(err.is_fatal());
    assert_eq!(editor.text(), text);
    assert!(editor.changes().is_empty());
}

#[test]
fn test_mixed_inflected_sections_abort() {
    let config = config();
    let text = "== {{lengua|es}} ==\n=== Forma sustantiva ===\n;1: {{forma sustantivo|casa|número=plural}}.\n\n=== {{verbo|es}} ===\n;1: Hacer casas.";
    let mut editor = Editor::new("casas", text, &config);

    let err = editor.check().unwrap_err();

    assert!(matches!(err, EditorError::Structural(_)));
    assert_eq!(editor.text(), text);
}

#[test]
fn test_inflected_page_normalized() {
    let config = config();
    let mut editor = Editor::new("casas", INFLECTED_PAGE, &config);

    editor.check().unwrap();

    let text = editor.text();
    assert!(text.contains("Forma sustantiva femenina"));
    assert!(!text.contains("{{sustantivo femenino|es}}"));
    assert!(!text.contains("Etimología"));
    assert!(editor
        .changes()
        .iter()
        .any(|c| c.pass == "convert_headers_to_flexive_form"));
}

#[test]
fn test_hashed_page_normalized() {
    let config = config();
    let mut editor = Editor::new("walk", HASHED_PAGE, &config);

    editor.check().unwrap();

    let text = editor.text();
    assert!(text.contains(";1: Caminar."));
    assert!(text.contains(";2: Pasear."));
    assert!(!text.contains("'''to walk'''"));
    assert!(text.contains("<ref name=\"auto_ref_id_1\">libro</ref>"));
    assert!(text.contains("<ref name=\"auto_ref_id_1\" />"));
}

#[test]
fn test_depth_gate_aborts() {
    let config = config();
    let text = "== {{lengua|es}} ==\n;1: {{a|{{b|{{c|{{d}}}}}}}}";
    let mut editor = Editor::new("casa", text, &config);

    let err = editor.check().unwrap_err();

    assert!(matches!(err, EditorError::MaxTemplateDepthExceeded { .. }));
    assert!(err.is_fatal());
    assert_eq!(editor.text(), text);
    assert!(editor.changes().is_empty());
    assert!(editor.summary().is_empty());
}

#[test]
fn test_unbalanced_brackets_abort() {
    let config = config();
    let text = "== {{lengua|es}} ==\n;1: {{plm|casa.";
    let mut editor = Editor::new("casa", text, &config);

    assert!(editor.check().is_err());
    assert_eq!(editor.text(), text);
}

#[test]
fn test_modern_page_passes_idempotent() {
    assert_passes_idempotent("casa", MODERN_PAGE);
}

#[test]
fn test_foreign_page_passes_idempotent() {
    assert_passes_idempotent("maison", FOREIGN_PAGE);
}

#[test]
fn test_inflected_page_passes_idempotent() {
    assert_passes_idempotent("casas", INFLECTED_PAGE);
}

#[test]
fn test_hashed_page_passes_idempotent() {
    assert_passes_idempotent("walk", HASHED_PAGE);
}

#[test]
fn test_old_page_passes_idempotent() {
    assert_passes_idempotent("casa", "{{ES}}\n{{pron-graf}}\n\n;1: Edificio para habitar.");
}

#[test]
fn test_foreign_page_normalized() {
    let config = config();
    let mut editor = Editor::new("maison", FOREIGN_PAGE, &config);

    editor.check().unwrap();

    let text = editor.text();
    assert!(text.contains("{{sinónimo|leng=fr|logis}}"));
    assert!(text.contains("{{sustantivo femenino|fr}}"));
    assert!(text.contains(";1: Casa."));
    assert!(!text.contains("[[Categoría:FR:Sustantivos femeninos|maison]]"));
}

#[test]
fn test_summary_deduplicated() {
    let config = config();
    let mut editor = Editor::new("maison", FOREIGN_PAGE, &config);
    editor.check().unwrap();

    let summary = editor.summary();
    let fragments: Vec<&str> = summary.split("; ").collect();
    let mut unique = fragments.clone();
    unique.dedup();

    assert_eq!(fragments, unique);
    assert!(summary.contains("códigos de idioma"));
}

proptest! {
    #[test]
    fn pipeline_converges_on_prose(
        lines in prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,4}", 1..6)
    ) {
        let config = config();
        let text = lines.join("\n");

        let mut first = Editor::new("prueba", &text, &config);
        prop_assert!(first.check().is_ok());

        let mut second = Editor::new("prueba", first.text(), &config);
        prop_assert!(second.check().is_ok());
        prop_assert_eq!(second.text().trim_end(), first.text().trim_end());
    }
}
