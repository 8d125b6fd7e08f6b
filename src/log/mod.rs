use fs_err as fs;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::wire::{GenerateRequest, GenerateResponse};

pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: Option<PathBuf>,
    pub response: Option<PathBuf>,
}

/// `RUST_LOG` wins; otherwise info, or debug with `--debug`.
pub fn init_tracing(debug: bool) {
    let default = if debug { "scaffold_gen=debug" } else { "scaffold_gen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join(".scaffold").join("tx").join(tx.to_string())
}

pub fn save_stage(
    root: &Path,
    stage: &str,
    req: &GenerateRequest,
    resp: &GenerateResponse,
    save_request: bool,
    save_response: bool,
) -> anyhow::Result<SavedPaths> {
    let dir = tx_dir(root, req.transaction.id);
    let mut request_path = None;
    let mut response_path = None;
    if !save_request && !save_response {
        return Ok(SavedPaths { dir, request: None, response: None });
    }
    fs::create_dir_all(&dir)?;

    if save_request {
        let p = dir.join(format!("{stage}.request.json"));
        fs::write(&p, to_string_pretty(&req.without_image_data())?)?;
        request_path = Some(p);
    }

    if save_response {
        let p = dir.join(format!("{stage}.response.json"));
        fs::write(&p, to_string_pretty(resp)?)?;
        response_path = Some(p);
    }

    Ok(SavedPaths { dir, request: request_path, response: response_path })
}

pub fn print_saved_paths(stage: &str, saved: &SavedPaths) {
    eprintln!("debug[{stage}]: artifacts directory: {}", saved.dir.display());
    match &saved.request {
        Some(p) => eprintln!("debug[{stage}]: request saved at: {}", p.display()),
        None => eprintln!("debug[{stage}]: request not saved (flag off)"),
    }
    match &saved.response {
        Some(p) => eprintln!("debug[{stage}]: response saved at: {}", p.display()),
        None => eprintln!("debug[{stage}]: response not saved (flag off)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{FileEntry, ImageAttachment, Instruction, Tx};
    use chrono::Utc;

    fn req() -> GenerateRequest {
        GenerateRequest {
            schema_version: "v1".into(),
            transaction: Tx { id: Uuid::new_v4(), timestamp: Utc::now(), turn: 2 },
            prompt: "p".into(),
            image: Some(ImageAttachment { mime_type: "image/png".into(), data: "SECRETBYTES".into() }),
            files: vec![],
            instruction: Instruction { system: "s".into(), user: "u".into(), developer: None },
        }
    }

    #[test]
    fn saves_both_files_without_image_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let resp = GenerateResponse { files: vec![FileEntry::new("a", "b")] };
        let saved = save_stage(dir.path(), "turn-2", &req(), &resp, true, true).unwrap();
        let r = std::fs::read_to_string(saved.request.unwrap()).unwrap();
        assert!(r.contains("image/png"));
        assert!(!r.contains("SECRETBYTES"));
        let s = std::fs::read_to_string(saved.response.unwrap()).unwrap();
        assert!(s.contains("\"name\": \"a\""));
        assert!(saved.dir.starts_with(dir.path().join(".scaffold").join("tx")));
    }

    #[test]
    fn nothing_written_when_flags_off() {
        let dir = tempfile::tempdir().unwrap();
        let resp = GenerateResponse::default();
        let saved = save_stage(dir.path(), "turn-1", &req(), &resp, false, false).unwrap();
        assert!(saved.request.is_none());
        assert!(!dir.path().join(".scaffold").exists());
    }
}
