use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub uri: String,
    pub title: String,
}

/// Why a turn ended errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExceeded,
    NoImageAvailable,
    NoImageProduced,
    NoAudioProduced,
    GenerationFailed,
    BackendFailure,
    Cancelled,
    AlreadyResolved,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::QuotaExceeded => {
                "The image service is seeing high traffic right now. Please try again in a little while."
            }
            FailureKind::NoImageAvailable => {
                "I couldn't find an image to work with. Please upload one and try again."
            }
            FailureKind::NoImageProduced => {
                "The model finished without returning an image. Please try rephrasing the request."
            }
            FailureKind::NoAudioProduced => "The model finished without returning any audio.",
            FailureKind::GenerationFailed => {
                "Sorry, I couldn't generate that image. Please try again."
            }
            FailureKind::BackendFailure => "Sorry, something went wrong. Please try again.",
            FailureKind::Cancelled => "The request was cancelled.",
            FailureKind::AlreadyResolved => "That image request has already been handled.",
        }
    }

    pub fn is_retryable_later(self) -> bool {
        self == FailureKind::QuotaExceeded
    }
}

/// Single return contract of every dispatch path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub message_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SearchSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub needs_aspect_ratio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_prompt: Option<String>,
    #[serde(default)]
    pub reset_memory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl GenerationResult {
    pub fn text(message_id: &str, text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.to_string(),
            text: text.into(),
            image: None,
            sources: None,
            prompt: None,
            needs_aspect_ratio: false,
            pending_prompt: None,
            reset_memory: false,
            failure: None,
        }
    }

    /// `image` is a data URI; `prompt` is the user-level prompt behind it.
    pub fn image(
        message_id: &str,
        text: impl Into<String>,
        image: String,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            image: Some(image),
            prompt: Some(prompt.into()),
            ..Self::text(message_id, text)
        }
    }

    pub fn deferred(message_id: &str, text: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            needs_aspect_ratio: true,
            pending_prompt: Some(prompt.into()),
            ..Self::text(message_id, text)
        }
    }

    pub fn search(message_id: &str, text: impl Into<String>, sources: Vec<SearchSource>) -> Self {
        Self {
            sources: Some(sources),
            ..Self::text(message_id, text)
        }
    }

    pub fn reset(message_id: &str, text: impl Into<String>) -> Self {
        Self {
            reset_memory: true,
            ..Self::text(message_id, text)
        }
    }

    pub fn failure(message_id: &str, kind: FailureKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::text(message_id, kind.user_message())
        }
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }
}
