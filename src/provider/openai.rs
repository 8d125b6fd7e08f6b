use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::{api_key, check_status, decode::decode_response, Provider};
use crate::errors::ScaffoldError;
use crate::wire::{strict_response_schema, GenerateRequest, GenerateResponse};

/// Chat Completions with a strict `json_schema` response format.
pub struct OpenAIProvider {
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl OpenAIProvider {
    pub(crate) fn body(&self, req: &GenerateRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": req.instruction.system })];
        if let Some(dev) = &req.instruction.developer {
            messages.push(json!({ "role": "developer", "content": dev }));
        }
        let user = match &req.image {
            Some(img) => json!([
                { "type": "text", "text": req.instruction.user },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", img.mime_type, img.data) }
                }
            ]),
            None => json!(req.instruction.user),
        };
        messages.push(json!({ "role": "user", "content": user }));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "scaffold",
                    "strict": true,
                    "schema": strict_response_schema()
                }
            }
        })
    }
}

pub(crate) fn extract_text(raw: &str) -> Result<String> {
    // Minimal structs to parse the chat response
    #[derive(Deserialize)]
    struct ChatMessage {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        refusal: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: ChatMessage,
    }
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    let parsed: ChatResponse = serde_json::from_str(raw)
        .map_err(|e| ScaffoldError::Provider(format!("failed to parse OpenAI response: {e}")))?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or(ScaffoldError::EmptyResponse)?;
    if let Some(refusal) = message.refusal {
        return Err(ScaffoldError::Provider(format!("openai refused: {refusal}")).into());
    }
    Ok(message.content.unwrap_or_default())
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &GenerateRequest, debug: bool) -> Result<GenerateResponse> {
        let key = api_key("OPENAI_API_KEY")?;
        let url = format!("{}/v1/chat/completions", self.api_base.trim_end_matches('/'));
        let client = Client::builder().timeout(self.timeout).build()?;
        let body = self.body(req);

        if debug {
            eprintln!(
                "debug[openai]: HTTP POST {} messages={}",
                url,
                body["messages"].as_array().map(|m| m.len()).unwrap_or(0)
            );
        }
        tracing::debug!(%url, model = %self.model, "openai: POST");
        let started = Instant::now();

        let resp = client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("openai read body failed")?;
        tracing::info!(%status, elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "openai: response");
        if debug {
            eprintln!("debug[openai]: raw response:\n{}", &text);
        }
        check_status("openai", status, &text)?;

        let content = extract_text(&text)?;
        Ok(decode_response(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{ImageAttachment, Instruction, Tx};
    use chrono::Utc;
    use uuid::Uuid;

    fn provider() -> OpenAIProvider {
        OpenAIProvider {
            model: "gpt-4.1-mini".into(),
            api_base: "http://localhost".into(),
            timeout: Duration::from_secs(1),
            temperature: 0.0,
        }
    }

    fn request(image: Option<ImageAttachment>) -> GenerateRequest {
        GenerateRequest {
            schema_version: "v1".into(),
            transaction: Tx { id: Uuid::new_v4(), timestamp: Utc::now(), turn: 3 },
            prompt: "p".into(),
            image,
            files: vec![],
            instruction: Instruction { system: "sys".into(), user: "usr".into(), developer: None },
        }
    }

    #[test]
    fn body_uses_strict_schema() {
        let body = provider().body(&request(None));
        let fmt = &body["response_format"];
        assert_eq!(fmt["type"], "json_schema");
        assert_eq!(fmt["json_schema"]["strict"], true);
        assert_eq!(fmt["json_schema"]["schema"]["additionalProperties"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["content"], "usr");
    }

    #[test]
    fn image_becomes_data_url() {
        let img = ImageAttachment { mime_type: "image/jpeg".into(), data: "QUJD".into() };
        let body = provider().body(&request(Some(img)));
        let content = &body["messages"][1]["content"];
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn extracts_content_or_refusal() {
        let ok = r#"{"choices":[{"message":{"content":"{\"files\":[]}"}}]}"#;
        assert_eq!(extract_text(ok).unwrap(), r#"{"files":[]}"#);
        let refused = r#"{"choices":[{"message":{"content":null,"refusal":"no"}}]}"#;
        assert!(extract_text(refused).unwrap_err().to_string().contains("refused"));
        let none = r#"{"choices":[]}"#;
        assert!(extract_text(none).is_err());
    }
}
