use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::{DomainError, Passage};

const SOURCE_HEADER_PREFIX: &str = "Content from PDF ";
const DEFAULT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Splits plain-text corpus files into passages.
///
/// Passages are blank-line separated paragraphs; the lines of a paragraph are
/// joined with single spaces. A `Content from PDF <name>:` line starts a new
/// source, and every following paragraph is stored as
/// `Content from [<name>] <paragraph>`. A short title-case paragraph ending in `:`
/// is a section heading and is prefixed to the paragraphs that follow it.
pub struct TextCorpusLoader {
    extensions: Vec<String>,
}

impl TextCorpusLoader {
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Loads a single file, or every matching file under a directory in
    /// path order.
    pub fn load(&self, path: &Path) -> Result<Vec<Passage>, DomainError> {
        let files = self.collect_files(path)?;
        if files.is_empty() {
            return Err(DomainError::invalid_input(format!(
                "No corpus files found at {}",
                path.display()
            )));
        }

        let mut passages = Vec::new();
        for file in &files {
            let text = std::fs::read_to_string(file)?;
            let before = passages.len();
            passages.extend(split_passages(&text).into_iter().map(Passage::new));
            debug!(
                "Read {} passages from {}",
                passages.len() - before,
                file.display()
            );
        }

        info!(
            "Loaded {} passages from {} file(s) under {}",
            passages.len(),
            files.len(),
            path.display()
        );
        Ok(passages)
    }

    fn collect_files(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(DomainError::invalid_input(format!(
                "Corpus path does not exist: {}",
                path.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| self.has_supported_extension(p))
            .collect();
        files.sort();
        Ok(files)
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl Default for TextCorpusLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits corpus text into passage strings, applying source markers and
/// section headings.
pub fn split_passages(text: &str) -> Vec<String> {
    let mut passages = Vec::new();
    let mut source: Option<String> = None;
    let mut heading: Option<String> = None;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();

        if let Some(name) = parse_source_header(line) {
            finish_paragraph(&mut paragraph, source.as_deref(), &mut heading, &mut passages);
            source = Some(name.to_string());
            heading = None;
            continue;
        }

        if line.is_empty() {
            finish_paragraph(&mut paragraph, source.as_deref(), &mut heading, &mut passages);
        } else {
            paragraph.push(line);
        }
    }
    finish_paragraph(&mut paragraph, source.as_deref(), &mut heading, &mut passages);

    passages
}

fn finish_paragraph(
    paragraph: &mut Vec<&str>,
    source: Option<&str>,
    heading: &mut Option<String>,
    passages: &mut Vec<String>,
) {
    if paragraph.is_empty() {
        return;
    }
    let joined = paragraph.join(" ");
    paragraph.clear();

    if is_heading(&joined) {
        *heading = Some(joined);
        return;
    }

    let body = match heading {
        Some(h) => format!("{} {}", h, joined),
        None => joined,
    };
    passages.push(match source {
        Some(s) => format!("Content from [{}] {}", s, body),
        None => body,
    });
}

fn parse_source_header(line: &str) -> Option<&str> {
    line.strip_prefix(SOURCE_HEADER_PREFIX)?
        .strip_suffix(':')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// A heading is a short title-case line ending in a colon, e.g. `General Services:`.
fn is_heading(paragraph: &str) -> bool {
    let Some(title) = paragraph.strip_suffix(':') else {
        return false;
    };
    !title.is_empty()
        && !title.contains(['.', '?', ':'])
        && title.split_whitespace().count() <= 6
        && title
            .split_whitespace()
            .all(|word| word.chars().next().is_some_and(char::is_uppercase))
}
