use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Arg, Command};
use serde::Serialize;
use tracing::{info, warn};

use wikt_normalizer::store::{DirectoryStore, PageStore, SubmitOutcome};
use wikt_normalizer::{Change, Config, Editor, EditorError, EditorResult};

#[derive(Serialize)]
struct Report<'a> {
    title: &'a str,
    text: &'a str,
    changes: &'a [Change],
    summary: String,
}

/// Where the page came from and how to write it back.
enum Source {
    /// A `<title>.wiki` file inside a page directory
    Store { store: DirectoryStore, revision: u64 },
    Plain(PathBuf),
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

fn load(path: &Path, title: &str) -> EditorResult<(Source, String)> {
    let is_wiki = path.extension().is_some_and(|ext| ext == "wiki");

    if is_wiki && default_title(path) == title {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let store = DirectoryStore::new(root);
        let page = store.fetch_text(title)?;
        return Ok((
            Source::Store {
                store,
                revision: page.revision,
            },
            page.text,
        ));
    }

    let text = fs::read_to_string(path)?;
    Ok((Source::Plain(path.to_path_buf()), text))
}

fn save(source: &Source, title: &str, text: &str, summary: &str) -> EditorResult<()> {
    match source {
        Source::Store { store, revision } => {
            match store.submit_edit(title, text, summary, *revision)? {
                SubmitOutcome::Success => Ok(()),
                SubmitOutcome::Conflict => Err(EditorError::Io(format!(
                    "{} changed while it was being processed",
                    title
                ))),
            }
        }
        Source::Plain(path) => {
            fs::write(path, text)?;
            info!("Saved {} ({})", title, summary);
            Ok(())
        }
    }
}

fn run() -> EditorResult<()> {
    let matches = Command::new("wikt-normalize")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Normalize the layout of a Spanish Wiktionary entry")
        .arg(
            Arg::new("file")
                .help("File holding the page wikitext")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("title")
                .long("title")
                .short('t')
                .help("Page title (default: the file name)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print a JSON report instead of the page text")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .short('n')
                .help("Do not write the result back")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Directory with langs.tsv, settings.json and the other resources"),
        )
        .get_matches();

    let path = matches
        .get_one::<String>("file")
        .map(PathBuf::from)
        .unwrap_or_default();
    let title = matches
        .get_one::<String>("title")
        .cloned()
        .unwrap_or_else(|| default_title(&path));
    let json = matches.get_flag("json");
    let dry_run = matches.get_flag("dry-run");

    let config = match matches.get_one::<String>("config") {
        Some(dir) => Config::load_from_dir(Path::new(dir))?,
        None => Config::builtin()?,
    };

    let (source, text) = load(&path, &title)?;

    let mut editor = Editor::new(&title, &text, &config);
    editor.check()?;

    let summary = editor.summary();

    if editor.is_modified() {
        info!("[[{}]]: {}", title, summary);

        if !dry_run {
            save(&source, &title, editor.text(), &summary)?;
        }
    } else {
        info!("[[{}]]: no changes", title);
    }

    if json {
        let report = Report {
            title: &title,
            text: editor.text(),
            changes: editor.changes(),
            summary,
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| EditorError::Io(e.to_string()))?;
        println!("{}", rendered);
    } else {
        println!("{}", editor.text());
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
