use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// ========================================
/// Request/Response wire protocol
/// ========================================

/// One generated file. `name` is a relative path with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { name: name.into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tx {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub turn: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub system: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
}

/// Base64 screenshot sent alongside the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub schema_version: String,
    pub transaction: Tx,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    /// The current file set, re-submitted with every prompt.
    pub files: Vec<FileEntry>,
    pub instruction: Instruction,
}

impl GenerateRequest {
    /// Copy suitable for saving to disk: the image payload is dropped.
    pub fn without_image_data(&self) -> Self {
        let mut out = self.clone();
        if let Some(img) = out.image.as_mut() {
            img.data.clear();
        }
        out
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub files: Vec<FileEntry>,
}

/// JSON Schema for [`GenerateResponse`], sent to providers that constrain output.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "files": {
                "type": "array",
                "description": "Every file of the project, with full contents.",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Relative path, e.g. src/main.rs"
                        },
                        "content": {
                            "type": "string",
                            "description": "Full file contents"
                        }
                    },
                    "required": ["name", "content"]
                }
            }
        },
        "required": ["files"]
    })
}

/// The same schema with `additionalProperties: false` on every object, as
/// strict structured-output modes require.
pub fn strict_response_schema() -> Value {
    let mut schema = response_schema();
    close_objects(&mut schema);
    schema
}

fn close_objects(v: &mut Value) {
    if let Value::Object(map) = v {
        if map.get("type").and_then(Value::as_str) == Some("object") {
            map.insert("additionalProperties".into(), Value::Bool(false));
        }
        for child in map.values_mut() {
            close_objects(child);
        }
    }
}
