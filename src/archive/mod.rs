use anyhow::{Context, Result};
use fs_err as fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::ScaffoldError;
use crate::files::{dedupe_last_wins, path_conflicts};
use crate::safety::within_root;
use crate::wire::FileEntry;

/// Deflate archive holding exactly the given set; a later duplicate name
/// replaces the earlier entry.
pub fn build_zip(files: &[FileEntry]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for f in dedupe_last_wins(files) {
        zip.start_file(f.name.as_str(), options)
            .map_err(|e| ScaffoldError::Archive(format!("{}: {e}", f.name)))?;
        zip.write_all(f.content.as_bytes())?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ScaffoldError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Write the archive next to its final location, then move it into place.
pub fn write_zip(path: &Path, files: &[FileEntry]) -> Result<u64> {
    let bytes = build_zip(files)?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let tmp = NamedTempFile::new_in(&parent)?;
    fs::write(tmp.path(), &bytes)?;
    tmp.persist(path)
        .with_context(|| format!("moving archive into {}", path.display()))?;
    Ok(bytes.len() as u64)
}

/// Write every file below `root`. Returns the number of bytes written.
pub fn extract(root: &Path, files: &[FileEntry]) -> Result<u64> {
    let files = dedupe_last_wins(files);
    for f in &files {
        if !within_root(root, &f.name) {
            return Err(ScaffoldError::UnsafePath(f.name.clone()).into());
        }
    }
    if let Some(name) = path_conflicts(&files).into_iter().next() {
        return Err(ScaffoldError::PathConflict(name).into());
    }

    let mut written = 0u64;
    for f in &files {
        let abs = root.join(&f.name);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = NamedTempFile::new_in(abs.parent().unwrap_or(root))?;
        fs::write(tmp.path(), &f.content)?;
        tmp.persist(&abs)
            .with_context(|| format!("writing {}", abs.display()))?;
        written += f.content.len() as u64;
    }
    Ok(written)
}
