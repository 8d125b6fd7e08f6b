use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::ScaffoldError;
use crate::wire::{GenerateRequest, GenerateResponse, Instruction};

pub mod anthropic;
pub mod decode;
pub mod gemini;
pub mod ollama;
pub mod openai;

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, req: &GenerateRequest, debug: bool) -> Result<GenerateResponse>;
}

pub type DynProvider = Box<dyn Provider + Send + Sync>;

pub fn make_provider(
    kind: ProviderKind,
    model: String,
    timeout_secs: u64,
    cfg: &Config,
) -> Result<DynProvider> {
    let timeout = Duration::from_secs(timeout_secs);
    let provider: DynProvider = match kind {
        ProviderKind::Gemini => Box::new(gemini::Gemini {
            model,
            api_base: cfg.gemini_url.clone(),
            timeout,
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
        }),
        ProviderKind::OpenAI => Box::new(openai::OpenAIProvider {
            model,
            api_base: cfg.openai_url.clone(),
            timeout,
            temperature: cfg.temperature,
        }),
        ProviderKind::Anthropic => Box::new(anthropic::Anthropic {
            model,
            api_base: cfg.anthropic_url.clone(),
            api_version: cfg.anthropic_version.clone(),
            timeout,
            max_tokens: cfg.max_output_tokens,
        }),
        ProviderKind::Ollama => Box::new(ollama::Ollama {
            model,
            url: cfg.ollama_url.clone(),
            timeout,
            temperature: cfg.temperature,
        }),
    };
    Ok(provider)
}

pub(crate) fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(k) if !k.trim().is_empty() => Ok(k),
        _ => Err(anyhow!("{var} env var is not set")),
    }
}

/// System text with developer notes folded in, for APIs with a single system slot.
pub(crate) fn system_with_notes(ins: &Instruction) -> String {
    let mut system = ins.system.clone();
    if let Some(dev) = &ins.developer {
        system.push_str("\n\nDeveloper notes:\n");
        system.push_str(dev);
    }
    system
}

pub(crate) fn check_status(provider: &str, status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ScaffoldError::Provider(format!("{provider} API error ({status}): {body}")).into())
    }
}
