use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::{api_key, check_status, decode::decode_response, system_with_notes, Provider};
use crate::errors::ScaffoldError;
use crate::wire::{response_schema, GenerateRequest, GenerateResponse};

/// Google Generative Language API, with the file schema enforced server side.
pub struct Gemini {
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini's schema dialect spells types in upper case.
pub(crate) fn gemini_schema(v: &Value) -> Value {
    match v {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, val)| {
                    let val = match (k.as_str(), val) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        _ => gemini_schema(val),
                    };
                    (k.clone(), val)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

impl Gemini {
    pub(crate) fn body(&self, req: &GenerateRequest) -> Value {
        let mut parts = vec![json!({ "text": req.instruction.user })];
        if let Some(img) = &req.image {
            parts.push(json!({
                "inline_data": { "mime_type": img.mime_type, "data": img.data }
            }));
        }
        let system = system_with_notes(&req.instruction);
        json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": gemini_schema(&response_schema()),
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        })
    }
}

pub(crate) fn extract_text(raw: &str) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|e| ScaffoldError::Provider(format!("gemini response parse error: {e}")))?;

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ScaffoldError::Provider(format!("gemini blocked the prompt: {reason}")).into());
    }
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or(ScaffoldError::EmptyResponse)?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason {
            return Err(ScaffoldError::Provider(format!("gemini returned no text (finish reason {reason})")).into());
        }
        return Err(ScaffoldError::EmptyResponse.into());
    }
    Ok(text)
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, req: &GenerateRequest, debug: bool) -> Result<GenerateResponse> {
        let key = api_key("GEMINI_API_KEY")?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );
        let client = Client::builder().timeout(self.timeout).build()?;
        let body = self.body(req);

        tracing::debug!(%url, model = %self.model, image = req.image.is_some(), "gemini: POST");
        let started = Instant::now();
        let resp = client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .context("gemini request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("gemini read body failed")?;
        tracing::info!(%status, elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "gemini: response");
        if debug {
            eprintln!("debug[gemini]: raw body:\n{}\n", text);
        }
        check_status("gemini", status, &text)?;

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

    fn request(image: bool) -> GenerateRequest {
        GenerateRequest {
            schema_version: "v1".into(),
            transaction: Tx { id: Uuid::new_v4(), timestamp: Utc::now(), turn: 1 },
            prompt: "p".into(),
            image: image.then(|| ImageAttachment { mime_type: "image/png".into(), data: "AAAA".into() }),
            files: vec![],
            instruction: Instruction { system: "sys".into(), user: "usr".into(), developer: Some("dev".into()) },
        }
    }

    fn provider() -> Gemini {
        Gemini {
            model: "gemini-2.5-flash".into(),
            api_base: "http://localhost".into(),
            timeout: Duration::from_secs(1),
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }

    #[test]
    fn body_carries_schema_and_image() {
        let body = provider().body(&request(true));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["files"]["items"]["properties"]["name"]["type"],
            "STRING"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys\n\nDeveloper notes:\ndev");
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
    }

    #[test]
    fn body_without_image_is_text_only() {
        let body = provider().body(&request(false));
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn schema_keys_are_not_uppercased() {
        let s = gemini_schema(&json!({ "type": "object", "required": ["type"] }));
        assert_eq!(s, json!({ "type": "OBJECT", "required": ["type"] }));
    }

    #[test]
    fn text_parts_are_joined() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"files\":"},{"text":"[]}"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(extract_text(raw).unwrap(), r#"{"files":[]}"#);
    }

    #[test]
    fn blocked_and_empty_candidates() {
        let blocked = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(extract_text(blocked).unwrap_err().to_string().contains("SAFETY"));
        let none = r#"{"candidates":[]}"#;
        assert!(extract_text(none).unwrap_err().to_string().contains("empty response"));
        let truncated = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        assert!(extract_text(truncated).unwrap_err().to_string().contains("MAX_TOKENS"));
    }
}
