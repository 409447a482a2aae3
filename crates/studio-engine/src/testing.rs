//! Scripted gateway for engine tests: queued responses per operation and a
//! log of every call.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use studio_contracts::aspect::AspectRatio;
use studio_contracts::conversation::ImageBlob;
use studio_contracts::tools::ToolCall;

use crate::cancel::CancelToken;
use crate::error::GatewayError;
use crate::gateway::{
    AudioClip, ImageTier, ModelGateway, ReferenceImageRequest, SearchAnswer, ToolCompletion,
    ToolCompletionRequest,
};
use crate::imaging;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    CompleteWithTools {
        text: String,
        images: usize,
        history: usize,
    },
    GenerateImage {
        tier: ImageTier,
        prompt: String,
        ratio: AspectRatio,
    },
    GenerateFromReferences {
        prompt: String,
        images: Vec<ImageBlob>,
        ratio: Option<AspectRatio>,
    },
    Search {
        query: String,
    },
    ComplexReasoning {
        query: String,
    },
    SynthesizeSpeech {
        text: String,
    },
}

type Queue<T> = VecDeque<Result<T, GatewayError>>;

#[derive(Default)]
struct Script {
    completions: Queue<ToolCompletion>,
    primary: Queue<ImageBlob>,
    fallback: Queue<ImageBlob>,
    reference: Queue<ImageBlob>,
    search: Queue<SearchAnswer>,
    reasoning: Queue<String>,
    speech: Queue<AudioClip>,
    calls: Vec<GatewayCall>,
    cancel_on_call: Option<CancelToken>,
}

#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

pub fn png(width: u32, height: u32) -> ImageBlob {
    imaging::solid_png(width, height, (120, 80, 40)).unwrap_or_else(|err| panic!("png: {err}"))
}

pub fn marker_image(byte: u8) -> ImageBlob {
    ImageBlob::new(vec![byte; 4], "image/png")
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: GatewayCall) {
        let mut script = self.script();
        script.calls.push(call);
        if let Some(token) = script.cancel_on_call.as_ref() {
            token.cancel();
        }
    }

    pub fn with_tool_call(self, call: ToolCall) -> Self {
        self.push_completion(Ok(ToolCompletion {
            text: String::new(),
            tool_calls: vec![call],
        }));
        self
    }

    pub fn with_completion(self, text: &str, tool_calls: Vec<ToolCall>) -> Self {
        self.push_completion(Ok(ToolCompletion {
            text: text.to_string(),
            tool_calls,
        }));
        self
    }

    /// Cancels `token` as soon as any gateway call is made.
    pub fn cancel_during_calls(&self, token: CancelToken) {
        self.script().cancel_on_call = Some(token);
    }

    pub fn push_completion(&self, result: Result<ToolCompletion, GatewayError>) {
        self.script().completions.push_back(result);
    }

    pub fn push_primary(&self, result: Result<ImageBlob, GatewayError>) {
        self.script().primary.push_back(result);
    }

    pub fn push_fallback(&self, result: Result<ImageBlob, GatewayError>) {
        self.script().fallback.push_back(result);
    }

    pub fn push_reference(&self, result: Result<ImageBlob, GatewayError>) {
        self.script().reference.push_back(result);
    }

    pub fn push_search(&self, result: Result<SearchAnswer, GatewayError>) {
        self.script().search.push_back(result);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.script().calls.clone()
    }

    pub fn image_tiers(&self) -> Vec<ImageTier> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::GenerateImage { tier, .. } => Some(tier),
                _ => None,
            })
            .collect()
    }

    /// Every image-producing call, text-to-image and reference alike.
    pub fn image_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    GatewayCall::GenerateImage { .. } | GatewayCall::GenerateFromReferences { .. }
                )
            })
            .count()
    }

    pub fn reference_calls(&self) -> Vec<(String, Vec<ImageBlob>, Option<AspectRatio>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::GenerateFromReferences {
                    prompt,
                    images,
                    ratio,
                } => Some((prompt, images, ratio)),
                _ => None,
            })
            .collect()
    }
}

impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete_with_tools(
        &self,
        request: &ToolCompletionRequest<'_>,
    ) -> Result<ToolCompletion, GatewayError> {
        self.record(GatewayCall::CompleteWithTools {
            text: request.turn.text.clone(),
            images: request.turn.images.len(),
            history: request.history.len(),
        });
        self.script().completions.pop_front().unwrap_or_else(|| {
            Ok(ToolCompletion {
                text: "scripted reply".to_string(),
                tool_calls: Vec::new(),
            })
        })
    }

    fn generate_image(
        &self,
        tier: ImageTier,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError> {
        self.record(GatewayCall::GenerateImage {
            tier,
            prompt: prompt.to_string(),
            ratio: aspect_ratio,
        });
        let mut script = self.script();
        let queued = match tier {
            ImageTier::Primary => script.primary.pop_front(),
            ImageTier::Fallback => script.fallback.pop_front(),
        };
        queued.unwrap_or_else(|| {
            Ok(match tier {
                ImageTier::Primary => marker_image(1),
                ImageTier::Fallback => marker_image(2),
            })
        })
    }

    fn generate_image_from_references(
        &self,
        request: &ReferenceImageRequest<'_>,
    ) -> Result<ImageBlob, GatewayError> {
        self.record(GatewayCall::GenerateFromReferences {
            prompt: request.prompt.to_string(),
            images: request.images.to_vec(),
            ratio: request.aspect_ratio,
        });
        self.script()
            .reference
            .pop_front()
            .unwrap_or_else(|| Ok(marker_image(3)))
    }

    fn search(&self, query: &str) -> Result<SearchAnswer, GatewayError> {
        self.record(GatewayCall::Search {
            query: query.to_string(),
        });
        self.script().search.pop_front().unwrap_or_else(|| {
            Ok(SearchAnswer {
                text: "scripted answer".to_string(),
                sources: Vec::new(),
            })
        })
    }

    fn complex_reasoning(&self, query: &str) -> Result<String, GatewayError> {
        self.record(GatewayCall::ComplexReasoning {
            query: query.to_string(),
        });
        self.script()
            .reasoning
            .pop_front()
            .unwrap_or_else(|| Ok("scripted reasoning".to_string()))
    }

    fn synthesize_speech(&self, text: &str) -> Result<AudioClip, GatewayError> {
        self.record(GatewayCall::SynthesizeSpeech {
            text: text.to_string(),
        });
        self.script().speech.pop_front().unwrap_or_else(|| {
            Ok(AudioClip {
                data: vec![0; 8],
                mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
            })
        })
    }
}
