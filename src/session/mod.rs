use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ScaffoldError;
use crate::files::{self, SetDiff};
use crate::prompt;
use crate::provider::Provider;
use crate::wire::{FileEntry, GenerateRequest, GenerateResponse, ImageAttachment, Instruction, Tx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Full file set produced at this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>, files: Option<Vec<FileEntry>>) -> Self {
        Self { id: Uuid::new_v4(), role, text: text.into(), timestamp: Utc::now(), files }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub turns: Vec<Turn>,
    /// Highest turn number handed out; never goes back, even after `undo`.
    #[serde(default)]
    last_turn: usize,
    #[serde(skip)]
    loading: Arc<AtomicBool>,
}

/// Marks a request as in flight until dropped.
#[derive(Debug)]
pub struct InFlight {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn: usize,
    pub request: GenerateRequest,
    pub response: GenerateResponse,
    pub files: Vec<FileEntry>,
    pub warnings: Vec<String>,
    pub diff: SetDiff,
}

impl Conversation {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), ..Self::default() }
    }

    /// Start from an existing file set (e.g. a seeded directory).
    pub fn with_files(files: Vec<FileEntry>) -> Self {
        let mut c = Self::new();
        if !files.is_empty() {
            let text = format!("Loaded {} existing files", files.len());
            c.turns.push(Turn::new(Role::System, text, Some(files)));
        }
        c
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, text, None));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, files: Vec<FileEntry>) {
        self.turns.push(Turn::new(Role::Assistant, text, Some(files)));
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::System, text, None));
    }

    /// Files of the most recent turn that carries a snapshot.
    pub fn current_files(&self) -> &[FileEntry] {
        self.turns
            .iter()
            .rev()
            .find_map(|t| t.files.as_deref())
            .unwrap_or(&[])
    }

    pub fn user_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fails with [`ScaffoldError::Busy`] while another request is in flight.
    pub fn begin_request(&self) -> Result<InFlight, ScaffoldError> {
        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScaffoldError::Busy);
        }
        Ok(InFlight { flag: Arc::clone(&self.loading) })
    }

    /// Drop the latest generated snapshot and the prompt that produced it.
    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(idx) = self
            .turns
            .iter()
            .rposition(|t| t.role == Role::Assistant && t.files.is_some())
        else {
            return false;
        };
        let start = self.turns[..idx]
            .iter()
            .rposition(|t| t.role == Role::User)
            .unwrap_or(idx);
        self.turns.truncate(start);
        true
    }

    pub fn build_request(&self, prompt_text: &str, image: Option<ImageAttachment>, schema_version: &str) -> GenerateRequest {
        let current = self.current_files().to_vec();
        GenerateRequest {
            schema_version: schema_version.to_string(),
            transaction: Tx { id: self.id, timestamp: Utc::now(), turn: self.last_turn + 1 },
            prompt: prompt_text.to_string(),
            instruction: Instruction {
                system: prompt::system_prompt(),
                user: prompt::user_prompt(prompt_text, &current),
                developer: Some(prompt::developer_note(image.is_some())),
            },
            image,
            files: current,
        }
    }

    /// One request/response cycle. The current file set is re-submitted with
    /// the prompt; on success the sanitized result becomes the new current set.
    /// A failure is recorded as a system turn and returned; nothing is retried.
    pub async fn run_turn(
        &mut self,
        provider: &dyn Provider,
        prompt_text: &str,
        image: Option<ImageAttachment>,
        schema_version: &str,
        debug: bool,
    ) -> Result<TurnOutcome> {
        let _guard = self.begin_request()?;

        let label = match &image {
            Some(img) => format!("{prompt_text}\n[screenshot: {}]", img.mime_type),
            None => prompt_text.to_string(),
        };
        self.push_user(label);
        let request = self.build_request(prompt_text, image, schema_version);
        let turn = request.transaction.turn;
        self.last_turn = turn;
        tracing::info!(turn, provider = provider.name(), files_in = request.files.len(), "turn: sending");

        let response = match provider.send(&request, debug).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(turn, error = %e, "turn: failed");
                self.push_system(format!("Error: {e}"));
                return Err(e);
            }
        };

        let (files, warnings) = files::sanitize(response.files.clone());
        if files.is_empty() {
            self.push_system(format!("Error: {}", ScaffoldError::EmptyResponse));
            return Err(ScaffoldError::EmptyResponse.into());
        }
        let diff = files::diff_sets(self.current_files(), &files);
        tracing::info!(
            turn,
            files_out = files.len(),
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "turn: done"
        );

        let text = format!(
            "Generated {} files ({} added, {} changed, {} removed)",
            files.len(),
            diff.added.len(),
            diff.changed.len(),
            diff.removed.len()
        );
        self.push_assistant(text, files.clone());

        Ok(TurnOutcome { turn, request, response, files, warnings, diff })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut convo: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing session {}", path.display()))?;
        // sessions written before turn numbers were stored
        convo.last_turn = convo.last_turn.max(convo.user_turns());
        Ok(convo)
    }
}
