use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Raw image bytes plus their MIME type. Never holds a data-URI prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            data,
            mime_type: if mime_type.trim().is_empty() {
                DEFAULT_IMAGE_MIME.to_string()
            } else {
                mime_type.trim().to_string()
            },
        }
    }

    /// Decodes either a bare base64 payload or a `data:<mime>;base64,` URI.
    /// A MIME type embedded in the URI wins over `fallback_mime`.
    pub fn from_encoded(raw: &str, fallback_mime: &str) -> Result<Self, base64::DecodeError> {
        let (embedded_mime, payload) = split_data_uri(raw);
        let data = BASE64.decode(payload.trim().as_bytes())?;
        Ok(Self::new(data, embedded_mime.unwrap_or(fallback_mime)))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Presentation form handed back to the UI boundary.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
/// Input without the prefix is returned unchanged as the payload.
pub fn split_data_uri(raw: &str) -> (Option<&str>, &str) {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return (None, trimmed);
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return (None, trimmed);
    };
    let mime = header
        .split(';')
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    (mime, payload)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImageBlob>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, images: Vec<ImageBlob>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images,
        }
    }

    pub fn model(text: impl Into<String>, images: Vec<ImageBlob>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            images,
        }
    }

    pub fn last_image(&self) -> Option<&ImageBlob> {
        self.images.iter().rev().find(|image| !image.is_empty())
    }
}

/// Most recent image part in `history`, scanning turns newest first.
pub fn latest_image(history: &[ConversationTurn]) -> Option<&ImageBlob> {
    history.iter().rev().find_map(ConversationTurn::last_image)
}

/// In-memory thread of turns for callers that do not keep their own history.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub thread_id: String,
    pub created_at: String,
    turns: Vec<ConversationTurn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn latest_image(&self) -> Option<&ImageBlob> {
        latest_image(&self.turns)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (_, payload) = super::split_data_uri(&raw);
        BASE64
            .decode(payload.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
