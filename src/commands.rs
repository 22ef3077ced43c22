//! CLI command implementations.
//!
//! Thin wrappers that build an [`Orchestrator`] from configuration and
//! print its output. Used by the `ragtrace` binary.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::config::Config;
use crate::orchestrator::{Orchestrator, PipelineResponse};
use crate::parser::{parse_document, DocumentKind};
use crate::protocol::Payload;

/// `--file` paths followed by every supported file under `--dir`, sorted.
pub fn collect_files(files: &[PathBuf], dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut paths = files.to_vec();

    if let Some(dir) = dir {
        if !dir.is_dir() {
            bail!("not a directory: {}", dir.display());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry =
                entry.with_context(|| format!("failed to walk directory {}", dir.display()))?;
            if entry.file_type().is_file() && DocumentKind::from_path(entry.path()).is_some() {
                found.push(entry.into_path());
            }
        }
        found.sort();
        paths.extend(found);
    }

    if paths.is_empty() {
        bail!("no input files: pass --file <path> or --dir <dir>");
    }
    Ok(paths)
}

pub fn run_ask(
    config: &Config,
    query: &str,
    paths: &[PathBuf],
    json: bool,
    show_messages: bool,
) -> Result<()> {
    let mut orchestrator = Orchestrator::from_config(config)?;
    let response = orchestrator.run_pipeline(paths, query);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response, show_messages);
    }
    Ok(())
}

/// Read questions from stdin, one per line, until EOF or `exit`.
///
/// Every question is a full pipeline run against the same orchestrator, so
/// the index and the conversation history carry over between questions.
pub fn run_chat(config: &Config, paths: &[PathBuf], show_messages: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::from_config(config)?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }

        let response = orchestrator.run_pipeline(paths, query);
        print_response(&response, show_messages);
        println!();
    }
    Ok(())
}

pub fn run_parse(config: &Config, path: &Path) -> Result<()> {
    if DocumentKind::from_path(path).is_none() {
        bail!("unsupported file type: {}", path.display());
    }
    let chunks = parse_document(path, &config.chunking)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    println!("{}: {} chunks", path.display(), chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        println!();
        println!("--- chunk {} ({} chars) ---", i, chunk.chars().count());
        println!("{}", chunk);
    }
    Ok(())
}

fn print_response(response: &PipelineResponse, show_messages: bool) {
    match (&response.answer, &response.error) {
        (Some(answer), _) => println!("{}", answer),
        (None, Some(error)) => println!("error: {}", error),
        (None, None) => println!("error: no answer"),
    }

    if !response.source_metadata.is_empty() {
        println!();
        println!("sources:");
        for (i, meta) in response.source_metadata.iter().enumerate() {
            println!("  [{}] {} ({})", i + 1, meta.source_file, meta.chunk_id);
        }
    }

    println!();
    println!("trace: {}", response.trace_id);

    if show_messages {
        println!();
        println!("messages:");
        for msg in &response.message_history {
            let mut detail = String::new();
            if let Payload::RetrievalResult(r) = &msg.payload {
                let ids: Vec<&str> =
                    r.context_metadata.iter().map(|m| m.chunk_id.as_str()).collect();
                detail = format!("  [{}]", ids.join(", "));
            }
            println!(
                "  {}  {} -> {}  {}{}",
                msg.timestamp.format("%H:%M:%S%.3f"),
                msg.sender,
                msg.receiver,
                msg.message_type(),
                detail
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn collect_files_keeps_explicit_then_sorted_supported() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(tmp.path().join("b.md"), "b").unwrap();
        fs::write(nested.join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("skip.png"), "x").unwrap();
        let other = TempDir::new().unwrap();
        let explicit = other.path().join("z.csv");
        fs::write(&explicit, "h\n1").unwrap();

        let paths = collect_files(&[explicit.clone()], Some(tmp.path())).unwrap();
        assert_eq!(
            paths,
            vec![explicit, tmp.path().join("b.md"), nested.join("a.txt")]
        );
    }

    #[test]
    fn collect_files_requires_input() {
        assert!(collect_files(&[], None).is_err());
        let tmp = TempDir::new().unwrap();
        assert!(collect_files(&[], Some(tmp.path())).is_err());
        assert!(collect_files(&[], Some(&tmp.path().join("nope"))).is_err());
    }
}
