use std::path::{Path, PathBuf};

use log::debug;

use super::normalize::{nfc, nfc_lower, nfc_string};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// A regular file in the data directory with its NFC-normalized name.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
}

/// List the regular files of `dir` (non-recursive), sorted by normalized
/// name so that "first match" does not depend on directory iteration order.
pub fn list_files(dir: &Path) -> Result<Vec<Candidate>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let raw = entry.file_name();
        let name = nfc_string(&raw.to_string_lossy());
        files.push(Candidate {
            path: entry.path(),
            name,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

// ---------------------------------------------------------------------------
// Discovery rules
// ---------------------------------------------------------------------------

/// Return the first file whose normalized name contains `keyword`.
pub fn find_by_keyword(dir: &Path, keyword: &str) -> Result<PathBuf> {
    let files = list_files(dir)?;
    first_containing(&files, keyword).ok_or_else(|| PipelineError::FileNotFound {
        what: format!("file containing '{}'", nfc(keyword)),
        dir: dir.to_path_buf(),
    })
}

/// Return every file whose extension equals `extension` (leading dot
/// optional) after normalization and lower-casing. May be empty.
pub fn find_by_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let target = normalize_extension(extension);
    Ok(list_files(dir)?
        .into_iter()
        .filter(|c| has_extension(&c.name, &target))
        .map(|c| c.path)
        .collect())
}

/// First candidate whose name contains `keyword` (both sides NFC).
pub fn first_containing(files: &[Candidate], keyword: &str) -> Option<PathBuf> {
    let keyword = nfc(keyword);
    let found = files.iter().find(|c| c.name.contains(&*keyword));
    if let Some(c) = found {
        debug!("keyword '{keyword}' matched {}", c.path.display());
    }
    found.map(|c| c.path.clone())
}

/// Normalized, lower-cased extension without its leading dot.
pub fn normalize_extension(extension: &str) -> String {
    nfc_lower(extension.trim_start_matches('.'))
}

/// Whether the (already normalized) file name has exactly `target` as its
/// extension. `target` must come from [`normalize_extension`].
pub fn has_extension(name: &str, target: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| nfc_lower(&e.to_string_lossy()) == target)
        .unwrap_or(false)
}

/// The part of the file stem before the first `separator`, normalized.
///
/// `songdo_env.csv` with `_` gives `songdo`. A stem without the separator
/// is returned whole.
pub fn leading_token(file_name: &str, separator: char) -> String {
    let name = nfc_string(file_name);
    let stem = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let token = stem.split(separator).next().unwrap_or_default();
    token.to_string()
}
