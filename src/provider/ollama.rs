use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{check_status, decode::decode_response, system_with_notes, Provider};
use crate::wire::{response_schema, GenerateRequest, GenerateResponse};

pub struct Ollama {
    pub model: String,
    pub url: String,
    pub timeout: Duration,
    pub temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Msg>,
    stream: bool,
    format: Value,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct Msg {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: String,
}

fn to_messages(req: &GenerateRequest) -> Vec<Msg> {
    vec![
        Msg { role: "system".into(), content: system_with_notes(&req.instruction), images: vec![] },
        Msg {
            role: "user".into(),
            content: req.instruction.user.clone(),
            images: req.image.iter().map(|i| i.data.clone()).collect(),
        },
    ]
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &GenerateRequest, debug: bool) -> Result<GenerateResponse> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));
        let client = Client::builder().timeout(self.timeout).build()?;
        let body = ChatRequest {
            model: &self.model,
            messages: to_messages(req),
            stream: false,
            format: response_schema(),
            options: OllamaOptions { temperature: self.temperature },
        };

        if debug {
            eprintln!("debug/ollama: POST {}", url);
        }
        let started = Instant::now();

        let resp = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("ollama request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("ollama read body failed")?;
        tracing::info!(%status, elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "ollama: response");
        if debug {
            eprintln!("debug/ollama: raw body:\n{}\n", text);
        }
        check_status("ollama", status, &text)?;

        // Try to parse to standard ollama response first
        let content = match serde_json::from_str::<ChatResponse>(&text) {
            Ok(c) => c.message.content,
            Err(_) => text,
        };
        Ok(decode_response(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{ImageAttachment, Instruction, Tx};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn image_goes_on_user_message() {
        let req = GenerateRequest {
            schema_version: "v1".into(),
            transaction: Tx { id: Uuid::new_v4(), timestamp: Utc::now(), turn: 1 },
            prompt: "p".into(),
            image: Some(ImageAttachment { mime_type: "image/png".into(), data: "AAAA".into() }),
            files: vec![],
            instruction: Instruction { system: "sys".into(), user: "usr".into(), developer: Some("dev".into()) },
        };
        let v = serde_json::to_value(to_messages(&req)).unwrap();
        assert!(v[0].get("images").is_none());
        assert_eq!(v[0]["content"], "sys\n\nDeveloper notes:\ndev");
        assert_eq!(v[1]["images"], serde_json::json!(["AAAA"]));
    }
}
