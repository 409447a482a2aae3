use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::aspect::AspectRatio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    #[serde(rename = "resetFaceMemory")]
    ResetFaceMemory,
    #[serde(rename = "searchTheWeb")]
    SearchTheWeb,
    #[serde(rename = "complexQuery")]
    ComplexQuery,
    #[serde(rename = "generateImage")]
    GenerateImage,
    #[serde(rename = "editImage")]
    EditImage,
    #[serde(rename = "resizeImage")]
    ResizeImage,
    #[serde(rename = "generateFromReference")]
    GenerateFromReference,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::ResetFaceMemory,
        ToolName::SearchTheWeb,
        ToolName::ComplexQuery,
        ToolName::GenerateImage,
        ToolName::EditImage,
        ToolName::ResizeImage,
        ToolName::GenerateFromReference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ResetFaceMemory => "resetFaceMemory",
            ToolName::SearchTheWeb => "searchTheWeb",
            ToolName::ComplexQuery => "complexQuery",
            ToolName::GenerateImage => "generateImage",
            ToolName::EditImage => "editImage",
            ToolName::ResizeImage => "resizeImage",
            ToolName::GenerateFromReference => "generateFromReference",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == trimmed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: ToolName,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: ToolName) -> Self {
        Self {
            name,
            arguments: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.to_string(), value.into());
        self
    }

    /// Trimmed, non-empty string argument.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn aspect_ratio_arg(&self) -> Option<AspectRatio> {
        self.str_arg("aspectRatio").and_then(AspectRatio::parse)
    }
}

/// Picks which of the returned calls a turn acts on.
pub type ToolCallSelector = fn(&[ToolCall]) -> Option<&ToolCall>;

pub fn first_tool_call(calls: &[ToolCall]) -> Option<&ToolCall> {
    calls.first()
}

/// Function declarations offered to the function-calling step.
pub fn tool_declarations() -> Value {
    let ratios: Vec<&str> = AspectRatio::STUDIO
        .iter()
        .map(|ratio| ratio.as_str())
        .collect();
    json!([
        {
            "name": ToolName::ResetFaceMemory.as_str(),
            "description": "Forget every stored reference image (face, dress, background, environment). Use when the user asks to start over with a new person or to clear the remembered look.",
        },
        {
            "name": ToolName::SearchTheWeb.as_str(),
            "description": "Answer questions about current events, recent facts or anything that needs up-to-date information from the web.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "query": {"type": "STRING", "description": "The search query."}
                },
                "required": ["query"]
            }
        },
        {
            "name": ToolName::ComplexQuery.as_str(),
            "description": "Hand off questions that need careful multi-step reasoning, math, code or long analysis.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "query": {"type": "STRING", "description": "The full question to reason about."}
                },
                "required": ["query"]
            }
        },
        {
            "name": ToolName::GenerateImage.as_str(),
            "description": "Create a brand new image from a text description.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "prompt": {"type": "STRING", "description": "Detailed description of the image to create."},
                    "aspectRatio": {
                        "type": "STRING",
                        "enum": ratios,
                        "description": "Only set when the user explicitly named a shape or ratio."
                    }
                },
                "required": ["prompt"]
            }
        },
        {
            "name": ToolName::EditImage.as_str(),
            "description": "Change the most recent image (or the attached one) according to an instruction while keeping the person recognisable.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "instruction": {"type": "STRING", "description": "What to change."}
                },
                "required": ["instruction"]
            }
        },
        {
            "name": ToolName::ResizeImage.as_str(),
            "description": "Re-frame the most recent image (or the attached one) to a new aspect ratio by extending the scene.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "aspectRatio": {"type": "STRING", "enum": ratios},
                    "sceneDescription": {"type": "STRING", "description": "Optional description of the original scene."}
                },
                "required": ["aspectRatio"]
            }
        },
        {
            "name": ToolName::GenerateFromReference.as_str(),
            "description": "Create a new image that keeps the person from the reference images (attached or stored) while following the prompt.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "prompt": {"type": "STRING", "description": "Description of the new scene."}
                },
                "required": ["prompt"]
            }
        }
    ])
}
