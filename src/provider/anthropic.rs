use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{api_key, check_status, decode::decode_response, system_with_notes, Provider};
use crate::errors::ScaffoldError;
use crate::wire::{response_schema, GenerateRequest, GenerateResponse};

pub struct Anthropic {
    pub model: String,
    pub api_base: String,
    pub api_version: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Msg<'a>>,
    system: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: Vec<Block<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Block<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    r#type: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    #[serde(default)]
    content: Vec<OutBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct OutBlock {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

impl Anthropic {
    /// No server-side schema here, so the schema travels in the system prompt.
    fn body<'a>(&'a self, req: &'a GenerateRequest) -> MsgRequest<'a> {
        let mut system = system_with_notes(&req.instruction);
        system.push_str("\n\nResponse JSON Schema:\n");
        system.push_str(&response_schema().to_string());

        let mut content = Vec::new();
        if let Some(img) = &req.image {
            content.push(Block::Image {
                source: ImageSource { r#type: "base64", media_type: &img.mime_type, data: &img.data },
            });
        }
        content.push(Block::Text { text: &req.instruction.user });

        MsgRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Msg { role: "user", content }],
            system,
        }
    }
}

fn extract_text(raw: &str) -> Result<String> {
    let parsed: MsgResponse = serde_json::from_str(raw)
        .map_err(|e| ScaffoldError::Provider(format!("anthropic response parse error: {e}")))?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|b| b.r#type == "text")
        .map(|b| b.text)
        .collect();
    if text.trim().is_empty() {
        return Err(ScaffoldError::EmptyResponse.into());
    }
    if parsed.stop_reason.as_deref() == Some("max_tokens") {
        tracing::warn!("anthropic: response hit max_tokens, output is likely truncated");
    }
    Ok(text)
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, req: &GenerateRequest, debug: bool) -> Result<GenerateResponse> {
        let key = api_key("ANTHROPIC_API_KEY")?;
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));
        let client = Client::builder().timeout(self.timeout).build()?;
        let body = self.body(req);

        if debug {
            eprintln!("debug/anthropic: POST {}", url);
        }
        let started = Instant::now();

        let resp = client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("anthropic read body failed")?;
        tracing::info!(%status, elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "anthropic: response");
        if debug {
            eprintln!("debug/anthropic: raw body:\n{}\n", text);
        }
        check_status("anthropic", status, &text)?;

        let content = extract_text(&text)?;
        Ok(decode_response(&content)?)
    }
}
