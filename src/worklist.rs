//! Collecting the files of a batch: directory discovery, dropped path lists,
//! and per-item output format selection.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::batch::BatchItem;
use crate::error::{Result, ConvertError};
use crate::formats::{extension_of, FormatTable, MediaKind};

static WINDOWS_DROP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Za-z]:/[^{}]*?\.\w+(?:\s|$)").unwrap());

static UNIX_DROP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/[^{}]*?\.\w+(?:\s|$)").unwrap());

/// Path syntax of drag-and-drop payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPlatform {
    /// Drive-letter paths with forward slashes, `C:/Users/...`
    Windows,
    /// Absolute paths, `/home/...`
    Unix,
}

impl DropPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            DropPlatform::Windows
        } else {
            DropPlatform::Unix
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            DropPlatform::Windows => &WINDOWS_DROP_PATH,
            DropPlatform::Unix => &UNIX_DROP_PATH,
        }
    }
}

/// Paths with a supported extension found in a drop payload, existing or not.
///
/// Payloads may wrap the whole list, or single paths containing spaces, in
/// braces.
pub fn candidate_paths(data: &str, table: &FormatTable, platform: DropPlatform) -> Vec<PathBuf> {
    let data = data.trim();
    let data = data
        .strip_prefix('{')
        .and_then(|d| d.strip_suffix('}'))
        .unwrap_or(data);
    let data = data.replace(['{', '}'], " ");

    let mut paths = Vec::new();
    for found in platform.pattern().find_iter(&data) {
        let path = PathBuf::from(found.as_str().trim());
        let ext = extension_of(&path);
        if !table.is_supported(&ext) {
            info!("Skipping dropped file with unsupported extension: {}", path.display());
            continue;
        }
        paths.push(path);
    }
    paths
}

/// Existing, supported files named in a drop payload.
pub fn parse_dropped_paths(data: &str, table: &FormatTable, platform: DropPlatform) -> Vec<PathBuf> {
    debug!("Parsing dropped data: {}", data);
    candidate_paths(data, table, platform)
        .into_iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("Dropped file not found: {}", path.display());
            }
            exists
        })
        .collect()
}

/// Files directly inside `dir` whose kind is one of `kinds`.
///
/// Results are grouped by kind in the order given, then sorted by name.
pub fn discover<P: AsRef<Path>>(dir: P, kinds: &[MediaKind], table: &FormatTable) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ConvertError::FileNotFound(dir.display().to_string()));
    }

    let mut by_kind: HashMap<MediaKind, Vec<PathBuf>> = HashMap::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let kind = table.classify_path(entry.path());
        if kinds.contains(&kind) {
            by_kind.entry(kind).or_default().push(entry.into_path());
        }
    }

    let mut files = Vec::new();
    for kind in kinds {
        if let Some(mut group) = by_kind.remove(kind) {
            group.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            info!("Found {} {} file(s) in {}", group.len(), kind, dir.display());
            files.extend(group);
        }
    }
    Ok(files)
}

/// Ordered files of a pending batch and the output format chosen for each.
///
/// Items without a selection get their kind's default format.
#[derive(Debug, Clone, Default)]
pub struct WorkList {
    files: Vec<PathBuf>,
    selections: HashMap<usize, String>,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<I: IntoIterator<Item = PathBuf>>(files: I) -> Self {
        Self {
            files: files.into_iter().collect(),
            selections: HashMap::new(),
        }
    }

    /// Append a file, returning its index
    pub fn push<P: Into<PathBuf>>(&mut self, path: P) -> usize {
        self.files.push(path.into());
        self.files.len() - 1
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Choose the output format of item `index`
    pub fn select<S: Into<String>>(&mut self, index: usize, format: S) -> Result<()> {
        if index >= self.files.len() {
            return Err(ConvertError::Config(format!(
                "No item {} in a list of {} file(s)",
                index,
                self.files.len()
            )));
        }
        self.selections.insert(index, format.into());
        Ok(())
    }

    pub fn selection(&self, index: usize) -> Option<&str> {
        self.selections.get(&index).map(String::as_str)
    }

    /// Drop item `index`; selections of later items move down with them.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.files.len() {
            return None;
        }
        let removed = self.files.remove(index);
        self.selections = self
            .selections
            .drain()
            .filter(|(i, _)| *i != index)
            .map(|(i, format)| if i > index { (i - 1, format) } else { (i, format) })
            .collect();
        Some(removed)
    }

    /// Batch items with the resolved output format for every file
    pub fn items(&self, table: &FormatTable) -> Vec<BatchItem> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let kind = table.classify_path(path);
                let format = table.resolve_target(kind, self.selection(index));
                BatchItem::new(path.clone(), format)
            })
            .collect()
    }
}
