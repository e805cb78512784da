//! Local source fetcher: specification pages on disk, split into one text
//! block per top-level definition.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Lines of one top-level definition, continuation lines already joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub path: PathBuf,
    pub blocks: Vec<TextBlock>,
}

impl Page {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Read every `*.ttl` page under `dir`, in file-name order.
pub fn read_pages(dir: impl AsRef<Path>) -> anyhow::Result<Vec<Page>> {
    let dir = dir.as_ref();
    let entries =
        fs::read_dir(dir).with_context(|| format!("read source directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list source directory {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "ttl") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read source page {}", path.display()))?;
        let blocks = split_blocks(&text);
        tracing::debug!(page = %path.display(), blocks = blocks.len(), "read page");
        pages.push(Page { path, blocks });
    }
    tracing::info!(dir = %dir.display(), pages = pages.len(), "read source pages");
    Ok(pages)
}

fn starts_block(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('[')
        .is_some_and(|rest| rest.trim_start().starts_with("a fhir:"))
}

/// Split one page into definition blocks.
///
/// Prefix declarations before the first definition are dropped. A page with
/// no definition header is returned as a single block.
pub fn split_blocks(text: &str) -> Vec<TextBlock> {
    let lines = join_continuations(text);

    let mut blocks: Vec<Vec<String>> = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    for line in lines {
        if starts_block(&line) {
            blocks.push(vec![line]);
        } else if let Some(current) = blocks.last_mut() {
            current.push(line);
        } else {
            preamble.push(line);
        }
    }
    if blocks.is_empty() {
        blocks.push(preamble);
    }

    blocks
        .into_iter()
        .filter(|lines| lines.iter().any(|l| !l.trim().is_empty()))
        .map(|lines| TextBlock { lines })
        .collect()
}

/// Enumerations and reference lists can wrap; a line ending in `|` continues
/// on the next one.
fn join_continuations(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;

    // `lines()` accepts both "\n" and "\r\n".
    for line in text.lines() {
        let line = match pending.take() {
            Some(head) => format!("{} {}", head, line.trim_start()),
            None => line.to_string(),
        };
        if line.trim_end().ends_with('|') {
            pending = Some(line.trim_end().to_string());
        } else {
            out.push(line);
        }
    }
    out.extend(pending);
    out
}
