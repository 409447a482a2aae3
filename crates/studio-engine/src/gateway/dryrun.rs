use std::collections::HashSet;

use sha2::{Digest, Sha256};
use studio_contracts::aspect::{parse_ratio_parts, AspectRatio};
use studio_contracts::conversation::{latest_image, ImageBlob};
use studio_contracts::result::SearchSource;
use studio_contracts::tools::{ToolCall, ToolName};
use tracing::debug;

use super::{
    AudioClip, ImageTier, ModelGateway, ReferenceImageRequest, SearchAnswer, ToolCompletion,
    ToolCompletionRequest,
};
use crate::error::GatewayError;
use crate::imaging;

pub const DRYRUN_AUDIO_MIME: &str = "audio/L16;codec=pcm;rate=24000";

const SAMPLE_RATE: usize = 24_000;
const SAMPLES_PER_CHAR: usize = SAMPLE_RATE / 20;
const MAX_SAMPLES: usize = SAMPLE_RATE * 30;

/// Offline backend: routes tools by keyword and renders solid-colour PNGs
/// whose colour is derived from the prompt.
#[derive(Debug, Clone, Default)]
pub struct DryrunGateway {
    failing_tiers: HashSet<ImageTier>,
}

impl DryrunGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call on `tier` fail with a quota error.
    pub fn with_failing_tier(mut self, tier: ImageTier) -> Self {
        self.failing_tiers.insert(tier);
        self
    }

    fn route(text: &str, has_image: bool) -> Option<ToolCall> {
        let lower = text.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));
        let ratio = explicit_ratio(text);

        if has(&["reset", "forget"]) {
            return Some(ToolCall::new(ToolName::ResetFaceMemory));
        }
        if has(&["search", "look up", "latest"]) {
            return Some(ToolCall::new(ToolName::SearchTheWeb).with_arg("query", text.trim()));
        }
        if has(&["think", "reason", "prove"]) {
            return Some(ToolCall::new(ToolName::ComplexQuery).with_arg("query", text.trim()));
        }
        if has(&["resize", "reframe"]) {
            if let Some(ratio) = ratio {
                return Some(
                    ToolCall::new(ToolName::ResizeImage).with_arg("aspectRatio", ratio.as_str()),
                );
            }
        }
        if has(&["reference", "same person"]) {
            return Some(
                ToolCall::new(ToolName::GenerateFromReference).with_arg("prompt", text.trim()),
            );
        }
        if has_image && has(&["edit", "change", "make it"]) {
            return Some(ToolCall::new(ToolName::EditImage).with_arg("instruction", text.trim()));
        }
        if has(&["draw", "generate", "create", "image of", "picture of"]) {
            let mut call = ToolCall::new(ToolName::GenerateImage).with_arg("prompt", text.trim());
            if let Some(ratio) = ratio {
                call = call.with_arg("aspectRatio", ratio.as_str());
            }
            return Some(call);
        }
        None
    }

    fn render(
        &self,
        prompt: &str,
        references: &[ImageBlob],
        ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError> {
        let mut seed: Vec<&[u8]> = vec![prompt.as_bytes()];
        seed.extend(references.iter().map(|image| image.data.as_slice()));
        let (width, height) = ratio.dimensions();
        imaging::solid_png(width / 4, height / 4, imaging::color_from_seed(&seed)).map_err(|err| {
            GatewayError::BackendFailure(format!("dryrun image encode failed: {err}"))
        })
    }
}

/// Ratio the user named explicitly: `16:9`-style tokens or a shape word.
fn explicit_ratio(text: &str) -> Option<AspectRatio> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|ch: char| !(ch.is_alphanumeric() || ch == ':' || ch == '/'))
                .to_lowercase()
        })
        .filter(|token| {
            parse_ratio_parts(token).is_some()
                || matches!(token.as_str(), "square" | "portrait" | "landscape")
        })
        .find_map(|token| AspectRatio::parse(&token))
}

impl ModelGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete_with_tools(
        &self,
        request: &ToolCompletionRequest<'_>,
    ) -> Result<ToolCompletion, GatewayError> {
        let has_image =
            request.turn.last_image().is_some() || latest_image(request.history).is_some();
        let completion = match Self::route(&request.turn.text, has_image) {
            Some(call) => ToolCompletion {
                text: String::new(),
                tool_calls: vec![call],
            },
            None => ToolCompletion {
                text: format!("(dryrun) You said: {}", request.turn.text.trim()),
                tool_calls: Vec::new(),
            },
        };
        debug!(
            tools = ?completion.tool_calls.iter().map(|call| call.name.as_str()).collect::<Vec<_>>(),
            "dryrun tool routing"
        );
        Ok(completion)
    }

    fn generate_image(
        &self,
        tier: ImageTier,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError> {
        if self.failing_tiers.contains(&tier) {
            return Err(GatewayError::QuotaExceeded(format!(
                "dryrun {} tier is exhausted (RESOURCE_EXHAUSTED)",
                tier.as_str()
            )));
        }
        self.render(prompt, &[], aspect_ratio)
    }

    fn generate_image_from_references(
        &self,
        request: &ReferenceImageRequest<'_>,
    ) -> Result<ImageBlob, GatewayError> {
        let ratio = request.aspect_ratio.unwrap_or_else(|| {
            request
                .images
                .first()
                .and_then(imaging::dimensions)
                .map(|(width, height)| AspectRatio::nearest(width, height, &AspectRatio::STUDIO))
                .unwrap_or(AspectRatio::Square)
        });
        self.render(request.prompt, request.images, ratio)
    }

    fn search(&self, query: &str) -> Result<SearchAnswer, GatewayError> {
        let digest = Sha256::digest(query.as_bytes());
        let uri = format!("https://dryrun.invalid/search/{}", hex::encode(&digest[..4]));
        Ok(SearchAnswer {
            text: format!("(dryrun) Search results for \"{}\".", query.trim()),
            sources: vec![SearchSource {
                title: uri.clone(),
                uri,
            }],
        })
    }

    fn complex_reasoning(&self, query: &str) -> Result<String, GatewayError> {
        Ok(format!("(dryrun) Reasoned answer to: {}", query.trim()))
    }

    fn synthesize_speech(&self, text: &str) -> Result<AudioClip, GatewayError> {
        let chars = text.trim().chars().count();
        if chars == 0 {
            return Err(GatewayError::NoAudioProduced(
                "dryrun speech needs non-empty text".to_string(),
            ));
        }
        let samples = (chars * SAMPLES_PER_CHAR).min(MAX_SAMPLES);
        Ok(AudioClip {
            data: vec![0u8; samples * 2],
            mime_type: DRYRUN_AUDIO_MIME.to_string(),
        })
    }
}
