//! Wire shapes for the assistant and preprocessing endpoints.

use chatcut_core::ops::EditOp;
use chatcut_core::types::{Annotations, FrameAttributes};
use chatcut_core::CoreError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    NewChat,
    ContinueTask,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantRequest {
    pub messages: Vec<ChatMessage>,
    /// Each entry is one serialized clip context.
    #[serde(rename = "clipContexts")]
    pub clip_contexts: Vec<String>,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl AssistantRequest {
    pub fn new_chat(messages: Vec<ChatMessage>, clip_contexts: Vec<String>) -> Self {
        Self {
            messages,
            clip_contexts,
            request_type: RequestType::NewChat,
            task_id: None,
        }
    }

    pub fn continue_task(
        messages: Vec<ChatMessage>,
        clip_contexts: Vec<String>,
        task_id: Option<String>,
    ) -> Self {
        Self {
            messages,
            clip_contexts,
            request_type: RequestType::ContinueTask,
            task_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantResponse {
    Message {
        message: String,
    },
    FunctionCall(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub function_name: String,
    /// Usually a JSON-encoded string; a bare object is accepted too.
    #[serde(default)]
    pub function_args: Value,
    #[serde(default, deserialize_with = "task_id_string")]
    pub task_id: Option<String>,
}

impl FunctionCall {
    /// The argument object, decoded from its string form if needed. Garbled
    /// arguments are the assistant's malformed input, not a transport fault.
    pub fn arguments(&self) -> Result<Value> {
        match &self.function_args {
            Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                CoreError::InvalidArgument(format!(
                    "{} arguments are not valid JSON: {e}",
                    self.function_name
                ))
                .into()
            }),
            Value::Null => Ok(Value::Object(Default::default())),
            other => Ok(other.clone()),
        }
    }

    pub fn to_op(&self) -> Result<EditOp> {
        let args = self.arguments()?;
        Ok(EditOp::parse(&self.function_name, &args)?)
    }
}

fn task_id_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

/// Per-second analysis returned for a newly ingested video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessResponse {
    pub image_description: Vec<String>,
    pub transcription: Vec<String>,
    pub image_attributes: Vec<FrameAttributes>,
}

impl PreprocessResponse {
    pub fn into_annotations(self) -> Annotations {
        Annotations {
            descriptions: self.image_description,
            attributes: self.image_attributes,
            transcript: self.transcription,
        }
    }
}
