//! Capability interface over the generative backends.

mod dryrun;
mod gemini;

use serde_json::Value;
use studio_contracts::aspect::AspectRatio;
use studio_contracts::conversation::{ConversationTurn, ImageBlob};
use studio_contracts::result::SearchSource;
use studio_contracts::tools::ToolCall;

use crate::error::GatewayError;

pub use dryrun::DryrunGateway;
pub use gemini::GeminiGateway;

/// Which text-to-image backend to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTier {
    Primary,
    Fallback,
}

impl ImageTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageTier::Primary => "primary",
            ImageTier::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolCompletionRequest<'a> {
    pub history: &'a [ConversationTurn],
    pub turn: &'a ConversationTurn,
    pub system_instruction: &'a str,
    pub tools: &'a Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCompletion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReferenceImageRequest<'a> {
    pub prompt: &'a str,
    pub images: &'a [ImageBlob],
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchAnswer {
    pub text: String,
    pub sources: Vec<SearchSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Blocking calls against a generative backend. Implementations hold no
/// per-turn state and never retry.
pub trait ModelGateway: Send + Sync {
    fn name(&self) -> &str;

    fn complete_with_tools(
        &self,
        request: &ToolCompletionRequest<'_>,
    ) -> Result<ToolCompletion, GatewayError>;

    fn generate_image(
        &self,
        tier: ImageTier,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError>;

    fn generate_image_from_references(
        &self,
        request: &ReferenceImageRequest<'_>,
    ) -> Result<ImageBlob, GatewayError>;

    fn search(&self, query: &str) -> Result<SearchAnswer, GatewayError>;

    fn complex_reasoning(&self, query: &str) -> Result<String, GatewayError>;

    fn synthesize_speech(&self, text: &str) -> Result<AudioClip, GatewayError>;
}
