use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fs_err as fs;
use glob::Pattern;
use std::path::Path;
use walkdir::WalkDir;

use crate::errors::ScaffoldError;
use crate::wire::{FileEntry, ImageAttachment};

pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Read a screenshot and encode it for the request.
pub fn load_image(path: &Path) -> Result<ImageAttachment> {
    let mime = mime_for(path)
        .ok_or_else(|| ScaffoldError::UnsupportedImage(path.display().to_string()))?;
    let bytes = fs::read(path)?;
    Ok(ImageAttachment { mime_type: mime.to_string(), data: STANDARD.encode(bytes) })
}

/// Use an existing project as the starting file set.
///
/// Hidden entries (`.git`, `.scaffold`, ...) are skipped, as are files that
/// match one of `excludes`, are larger than `max_bytes`, or are not UTF-8.
pub fn seed_files(dir: &Path, excludes: &[String], max_bytes: usize) -> Result<Vec<FileEntry>> {
    let patterns = excludes
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("bad exclude pattern {p}")))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(dir) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if patterns.iter().any(|p| p.matches(&rel)) {
            tracing::debug!(path = %rel, "seed: excluded");
            continue;
        }
        if entry.metadata()?.len() as usize > max_bytes {
            tracing::debug!(path = %rel, "seed: too large");
            continue;
        }
        match String::from_utf8(fs::read(entry.path())?) {
            Ok(content) => out.push(FileEntry::new(rel, content)),
            Err(_) => tracing::debug!(path = %rel, "seed: not utf-8"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_base64_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("Shot.PNG");
        std::fs::write(&p, [0x89, b'P', b'N', b'G']).unwrap();
        let img = load_image(&p).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data, "iVBORw==");
    }

    #[test]
    fn unknown_image_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("shot.bmp");
        std::fs::write(&p, b"BM").unwrap();
        let err = load_image(&p).unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }

    #[test]
    fn seed_skips_hidden_excluded_large_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/x")).unwrap();
        std::fs::write(root.join("src/main.ts"), "export {}").unwrap();
        std::fs::write(root.join("package.json"), "{}").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(root.join("node_modules/x/i.js"), "1").unwrap();
        std::fs::write(root.join("big.txt"), "x".repeat(100)).unwrap();
        std::fs::write(root.join("logo.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let files = seed_files(root, &["node_modules/**".to_string()], 50).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["package.json", "src/main.ts"]);
    }
}
