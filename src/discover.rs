use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MergeError, Result};
use crate::io::format::SheetFormat;

/// A candidate input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Lists the regular files directly inside `directory` whose name ends with
/// the format's extension, ignoring ASCII case.
///
/// Entries are ordered by file name so repeated runs over the same directory
/// produce the same row order. Entries that cannot be inspected are skipped;
/// a matching symlink is kept even when its target is missing, so the reader
/// reports it as a per-file failure.
pub fn discover(directory: &Path, format: SheetFormat) -> Result<Vec<SourceFile>> {
    if !directory.is_dir() {
        return Err(MergeError::DirectoryNotFound(directory.to_path_buf()));
    }

    let extension = format.extension();
    let mut files = Vec::new();

    let walker = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        let file_type = entry.file_type();
        let is_candidate =
            file_type.is_file() || (file_type.is_symlink() && !entry.path().is_dir());
        if !is_candidate {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(extension) {
            files.push(SourceFile::new(entry.into_path()));
        } else {
            debug!(file = %name, "skipping file with other extension");
        }
    }

    if files.is_empty() {
        return Err(MergeError::NoMatchingFiles {
            directory: directory.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    Ok(files)
}
