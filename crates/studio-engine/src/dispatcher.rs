use std::fmt;
use std::slice;

use serde_json::json;
use studio_contracts::aspect::AspectRatio;
use studio_contracts::conversation::{latest_image, ConversationTurn, ImageBlob};
use studio_contracts::deferred::ResumeOutcome;
use studio_contracts::events::{self, EventWriter};
use studio_contracts::memory::Attribute;
use studio_contracts::prompts::{
    build_consistency_prompt, build_edit_prompt, build_generation_prompt_with,
    build_resize_prompt_from, extraction_prompt, KeywordHeuristics, ORCHESTRATOR_INSTRUCTION,
};
use studio_contracts::result::GenerationResult;
use studio_contracts::tools::{first_tool_call, tool_declarations, ToolCall, ToolCallSelector, ToolName};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::classifier::{classify, failure_result};
use crate::error::StudioError;
use crate::gateway::{AudioClip, ModelGateway, ReferenceImageRequest, ToolCompletionRequest};
use crate::imaging;
use crate::journal::{emit, image_summary};
use crate::pipeline;
use crate::session::SessionState;

const RESET_CONFIRMATION: &str =
    "Done. I've forgotten the stored reference images, so the next person will be new.";
const EDIT_CONFIRMATION: &str = "Here is the edited image.";
const REFERENCE_CONFIRMATION: &str = "Here is the new image, keeping the person from your references.";
const GENERATE_CONFIRMATION: &str = "Here is your image.";

/// One user turn as it enters the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub message_id: String,
    pub text: String,
    pub images: Vec<ImageBlob>,
}

impl TurnRequest {
    pub fn new(text: impl Into<String>, images: Vec<ImageBlob>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            text: text.into(),
            images,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn::user(self.text.clone(), self.images.clone())
    }

    fn attached_images(&self) -> Vec<ImageBlob> {
        self.images
            .iter()
            .filter(|image| !image.is_empty())
            .cloned()
            .collect()
    }
}

/// Overridable routing heuristics.
#[derive(Clone)]
pub struct DispatchPolicy {
    /// Picks the one tool call a turn acts on.
    pub select_tool_call: ToolCallSelector,
    /// Keyword lists behind subject/environment/style detection.
    pub heuristics: KeywordHeuristics,
    /// When set, `generateImage` on a turn with attached images always runs
    /// reference-based generation. When cleared, attached images are context
    /// only and the request goes through the ratio flow.
    pub attached_images_preserve_identity: bool,
    pub system_instruction: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            select_tool_call: first_tool_call,
            heuristics: KeywordHeuristics::default(),
            attached_images_preserve_identity: true,
            system_instruction: ORCHESTRATOR_INSTRUCTION.to_string(),
        }
    }
}

impl fmt::Debug for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPolicy")
            .field("heuristics", &self.heuristics)
            .field(
                "attached_images_preserve_identity",
                &self.attached_images_preserve_identity,
            )
            .finish_non_exhaustive()
    }
}

/// Last image attached to the turn, else the newest image in `history`.
pub fn resolve_target_image<'a>(
    images: &'a [ImageBlob],
    history: &'a [ConversationTurn],
) -> Option<&'a ImageBlob> {
    images
        .iter()
        .rev()
        .find(|image| !image.is_empty())
        .or_else(|| latest_image(history))
}

pub fn deferral_text() -> String {
    format!(
        "What aspect ratio would you like for this image? Supported ratios: {}.",
        AspectRatio::supported_list(&AspectRatio::STUDIO)
    )
}

fn unsupported_ratio_text(requested: Option<&str>) -> String {
    let supported = AspectRatio::supported_list(&AspectRatio::STUDIO);
    match requested.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => format!("\"{raw}\" is not a supported aspect ratio. Please choose one of: {supported}."),
        None => format!("Please choose an aspect ratio: {supported}."),
    }
}

fn reply(model_text: &str, fallback: &str) -> String {
    let trimmed = model_text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn image_result(message_id: &str, text: String, image: &ImageBlob, prompt: &str) -> GenerationResult {
    let mut result = GenerationResult::image(message_id, text, image.to_data_uri(), prompt.trim());
    if prompt.trim().is_empty() {
        result.prompt = None;
    }
    result
}

/// Routes one turn for one session. Borrowed for the duration of the turn.
pub(crate) struct ToolDispatcher<'a> {
    pub gateway: &'a dyn ModelGateway,
    pub policy: &'a DispatchPolicy,
    pub events: &'a EventWriter,
    pub cancel: &'a CancelToken,
}

impl ToolDispatcher<'_> {
    /// Never fails: errors come back as a result with `failure` set.
    pub fn dispatch(
        &self,
        state: &mut SessionState,
        request: &TurnRequest,
        history: &[ConversationTurn],
    ) -> GenerationResult {
        emit(
            self.events,
            events::TURN_STARTED,
            json!({
                "message_id": request.message_id,
                "text_chars": request.text.chars().count(),
                "images": request.images.len(),
                "history": history.len(),
            }),
        );
        match self.route(state, request, history) {
            Ok(result) => result,
            Err(err) => self.fail(&request.message_id, &err),
        }
    }

    fn fail(&self, message_id: &str, err: &StudioError) -> GenerationResult {
        let kind = classify(err);
        warn!(message_id, failure = ?kind, "turn failed: {err}");
        emit(
            self.events,
            events::TURN_FAILED,
            json!({
                "message_id": message_id,
                "failure": kind,
                "detail": err.to_string(),
            }),
        );
        failure_result(message_id, err)
    }

    fn route(
        &self,
        state: &mut SessionState,
        request: &TurnRequest,
        history: &[ConversationTurn],
    ) -> Result<GenerationResult, StudioError> {
        let message_id = request.message_id.as_str();
        let turn = request.to_turn();
        let tools = tool_declarations();

        self.cancel.check()?;
        let completion = self.gateway.complete_with_tools(&ToolCompletionRequest {
            history,
            turn: &turn,
            system_instruction: &self.policy.system_instruction,
            tools: &tools,
        })?;
        self.cancel.check()?;

        let Some(call) = (self.policy.select_tool_call)(&completion.tool_calls) else {
            return Ok(GenerationResult::text(message_id, completion.text));
        };
        let ignored = completion.tool_calls.len().saturating_sub(1);
        if ignored > 0 {
            debug!(message_id, ignored, "acting on a single tool call");
        }
        emit(
            self.events,
            events::TOOL_SELECTED,
            json!({
                "message_id": message_id,
                "tool": call.name.as_str(),
                "ignored_calls": ignored,
            }),
        );

        let model_text = completion.text.as_str();
        let fallback_text = request.text.trim();
        match call.name {
            ToolName::ResetFaceMemory => {
                self.cancel.check()?;
                state.memory.clear_all();
                emit(
                    self.events,
                    events::MEMORY_RESET,
                    json!({ "message_id": message_id }),
                );
                Ok(GenerationResult::reset(
                    message_id,
                    reply(model_text, RESET_CONFIRMATION),
                ))
            }
            ToolName::SearchTheWeb => {
                let query = call.str_arg("query").unwrap_or(fallback_text);
                self.cancel.check()?;
                let answer = self.gateway.search(query)?;
                self.cancel.check()?;
                Ok(GenerationResult::search(message_id, answer.text, answer.sources))
            }
            ToolName::ComplexQuery => {
                let query = call.str_arg("query").unwrap_or(fallback_text);
                self.cancel.check()?;
                let answer = self.gateway.complex_reasoning(query)?;
                self.cancel.check()?;
                Ok(GenerationResult::text(message_id, answer))
            }
            ToolName::GenerateImage => self.generate_image(state, request, call, model_text),
            ToolName::EditImage => {
                let target = resolve_target_image(&request.images, history)
                    .ok_or(StudioError::NoImageAvailable)?;
                let instruction = call.str_arg("instruction").unwrap_or(fallback_text);
                let prompt = build_edit_prompt(instruction);
                let image = self.reference_call(&prompt, slice::from_ref(target), None)?;
                self.record_image(message_id, call.name, &image, json!({ "references": 1 }));
                Ok(image_result(
                    message_id,
                    reply(model_text, EDIT_CONFIRMATION),
                    &image,
                    instruction,
                ))
            }
            ToolName::ResizeImage => {
                let target = resolve_target_image(&request.images, history)
                    .ok_or(StudioError::NoImageAvailable)?;
                let Some(ratio) = call.aspect_ratio_arg() else {
                    return Ok(GenerationResult::text(
                        message_id,
                        unsupported_ratio_text(call.str_arg("aspectRatio")),
                    ));
                };
                self.resize_image(
                    message_id,
                    target,
                    ratio,
                    call.str_arg("sceneDescription"),
                    model_text,
                )
            }
            ToolName::GenerateFromReference => {
                let mut images = request.attached_images();
                if images.is_empty() {
                    let target = latest_image(history).ok_or(StudioError::NoImageAvailable)?;
                    images.push(target.clone());
                }
                let prompt = call.str_arg("prompt").unwrap_or(fallback_text);
                self.reference_generation(state, message_id, call.name, prompt, images, None, model_text)
            }
        }
    }

    fn generate_image(
        &self,
        state: &mut SessionState,
        request: &TurnRequest,
        call: &ToolCall,
        model_text: &str,
    ) -> Result<GenerationResult, StudioError> {
        let message_id = request.message_id.as_str();
        let prompt = call.str_arg("prompt").unwrap_or(request.text.trim());
        let attached = request.attached_images();

        if !attached.is_empty() {
            if self.policy.attached_images_preserve_identity {
                return self.reference_generation(
                    state,
                    message_id,
                    call.name,
                    prompt,
                    attached,
                    call.aspect_ratio_arg(),
                    model_text,
                );
            }
            debug!(message_id, images = attached.len(), "attached images used as context only");
        }

        if let Some(ratio) = call.aspect_ratio_arg() {
            return self.generate_direct(message_id, prompt, ratio, model_text);
        }

        self.cancel.check()?;
        let pending = state.deferred.defer(message_id, prompt);
        emit(
            self.events,
            events::GENERATION_DEFERRED,
            json!({
                "message_id": message_id,
                "prompt_chars": pending.prompt.chars().count(),
            }),
        );
        Ok(GenerationResult::deferred(message_id, deferral_text(), pending.prompt))
    }

    /// Text-to-image through the primary/fallback pipeline.
    fn generate_direct(
        &self,
        message_id: &str,
        prompt: &str,
        ratio: AspectRatio,
        model_text: &str,
    ) -> Result<GenerationResult, StudioError> {
        let synthesized = build_generation_prompt_with(prompt, ratio, &self.policy.heuristics);
        let output = pipeline::generate(self.gateway, &synthesized, ratio, self.cancel)?;
        if let Some(primary_error) = output.primary_error.as_ref() {
            emit(
                self.events,
                events::GENERATION_FALLBACK,
                json!({
                    "message_id": message_id,
                    "primary_error": primary_error.to_string(),
                }),
            );
        }
        self.record_image(
            message_id,
            ToolName::GenerateImage,
            &output.image,
            json!({ "tier": output.tier.as_str(), "aspect_ratio": ratio.as_str() }),
        );
        Ok(image_result(
            message_id,
            reply(model_text, GENERATE_CONFIRMATION),
            &output.image,
            prompt,
        ))
    }

    /// Attached images first, then every memory slot marked consistent.
    #[allow(clippy::too_many_arguments)]
    fn reference_generation(
        &self,
        state: &SessionState,
        message_id: &str,
        tool: ToolName,
        prompt: &str,
        mut images: Vec<ImageBlob>,
        ratio: Option<AspectRatio>,
        model_text: &str,
    ) -> Result<GenerationResult, StudioError> {
        let attached = images.len();
        images.extend(
            state
                .memory
                .filled()
                .into_iter()
                .filter(|(attribute, _)| state.settings.is_consistent(*attribute))
                .map(|(_, image)| image.clone()),
        );
        let synthesized = build_consistency_prompt(prompt, &state.settings);
        let image = self.reference_call(&synthesized, &images, ratio)?;
        self.record_image(
            message_id,
            tool,
            &image,
            json!({ "references": images.len(), "attached": attached }),
        );
        Ok(image_result(
            message_id,
            reply(model_text, REFERENCE_CONFIRMATION),
            &image,
            prompt,
        ))
    }

    fn resize_image(
        &self,
        message_id: &str,
        target: &ImageBlob,
        ratio: AspectRatio,
        scene_description: Option<&str>,
        model_text: &str,
    ) -> Result<GenerationResult, StudioError> {
        let source = imaging::dimensions(target);
        let prompt = build_resize_prompt_from(ratio, source, scene_description);
        let image = self.reference_call(&prompt, slice::from_ref(target), Some(ratio))?;
        self.record_image(
            message_id,
            ToolName::ResizeImage,
            &image,
            json!({
                "aspect_ratio": ratio.as_str(),
                "source_dimensions": source.map(|(width, height)| format!("{width}x{height}")),
            }),
        );
        Ok(image_result(
            message_id,
            reply(model_text, &format!("Here is the image resized to {ratio}.")),
            &image,
            scene_description.unwrap_or_default(),
        ))
    }

    fn reference_call(
        &self,
        prompt: &str,
        images: &[ImageBlob],
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<ImageBlob, StudioError> {
        self.cancel.check()?;
        let image = self.gateway.generate_image_from_references(&ReferenceImageRequest {
            prompt,
            images,
            aspect_ratio,
        })?;
        self.cancel.check()?;
        Ok(image)
    }

    fn record_image(&self, message_id: &str, tool: ToolName, image: &ImageBlob, extra: serde_json::Value) {
        let mut payload = json!({
            "message_id": message_id,
            "tool": tool.as_str(),
            "image": image_summary(image),
        });
        if let (Some(target), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        emit(self.events, events::IMAGE_GENERATED, payload);
    }

    /// Second phase of a deferred generation.
    ///
    /// An unparseable ratio leaves the entry pending. A cancelled resume also
    /// leaves it pending; any other outcome resolves it.
    pub fn resume(
        &self,
        state: &mut SessionState,
        message_id: &str,
        prompt: &str,
        ratio_text: &str,
    ) -> GenerationResult {
        let Some(ratio) = AspectRatio::parse(ratio_text) else {
            return GenerationResult::text(message_id, unsupported_ratio_text(Some(ratio_text)));
        };
        let tracked = match state.deferred.begin_resume(message_id) {
            ResumeOutcome::Tracked(stored) => Some(stored),
            ResumeOutcome::Untracked => None,
            ResumeOutcome::AlreadyResolved => {
                return self.fail(
                    message_id,
                    &StudioError::AlreadyResolved(message_id.to_string()),
                );
            }
        };
        let prompt = match (prompt.trim(), tracked.as_deref()) {
            ("", Some(stored)) => stored.to_string(),
            (prompt, _) => prompt.to_string(),
        };
        emit(
            self.events,
            events::GENERATION_RESUMED,
            json!({
                "message_id": message_id,
                "aspect_ratio": ratio.as_str(),
                "tracked": tracked.is_some(),
            }),
        );

        let outcome = if prompt.is_empty() {
            Err(StudioError::GenerationFailed(
                "no prompt to resume with".to_string(),
            ))
        } else {
            self.generate_direct(message_id, &prompt, ratio, "")
        };
        match outcome {
            Ok(result) => {
                state.deferred.resolve(message_id);
                result
            }
            Err(StudioError::Cancelled) => self.fail(message_id, &StudioError::Cancelled),
            Err(err) => {
                state.deferred.resolve(message_id);
                self.fail(message_id, &err)
            }
        }
    }

    /// Outpaints `image` to `ratio_text` outside of a tool call.
    pub fn resize(
        &self,
        message_id: &str,
        image: &ImageBlob,
        ratio_text: &str,
        original_prompt: Option<&str>,
    ) -> GenerationResult {
        if image.is_empty() {
            return self.fail(message_id, &StudioError::NoImageAvailable);
        }
        let Some(ratio) = AspectRatio::parse(ratio_text) else {
            return GenerationResult::text(message_id, unsupported_ratio_text(Some(ratio_text)));
        };
        let scene = original_prompt.map(str::trim).filter(|scene| !scene.is_empty());
        self.resize_image(message_id, image, ratio, scene, "")
            .unwrap_or_else(|err| self.fail(message_id, &err))
    }

    /// Isolates `attribute` from `image` and stores it once the call succeeds.
    pub fn extract(
        &self,
        state: &mut SessionState,
        message_id: &str,
        attribute: Attribute,
        image: &ImageBlob,
    ) -> GenerationResult {
        if image.is_empty() {
            return self.fail(message_id, &StudioError::NoImageAvailable);
        }
        let extracted =
            match self.reference_call(extraction_prompt(attribute), slice::from_ref(image), None) {
                Ok(extracted) => extracted,
                Err(err) => return self.fail(message_id, &err),
            };
        state.memory.set(attribute, extracted.clone());
        emit(
            self.events,
            events::REFERENCE_SET,
            json!({
                "message_id": message_id,
                "attribute": attribute.as_str(),
                "source": "extraction",
                "image": image_summary(&extracted),
            }),
        );
        image_result(
            message_id,
            format!("Saved the {} reference.", attribute.as_str()),
            &extracted,
            "",
        )
    }

    pub fn speak(&self, text: &str) -> Result<AudioClip, StudioError> {
        self.cancel.check()?;
        let clip = self.gateway.synthesize_speech(text)?;
        self.cancel.check()?;
        emit(
            self.events,
            events::SPEECH_GENERATED,
            json!({
                "text_chars": text.chars().count(),
                "bytes": clip.data.len(),
                "mime_type": clip.mime_type,
            }),
        );
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use studio_contracts::deferred::DeferredState;
    use studio_contracts::memory::AttributeMode;
    use studio_contracts::result::{FailureKind, SearchSource};

    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{SearchAnswer, ToolCompletion};
    use crate::testing::{marker_image, png, GatewayCall, ScriptedGateway};

    struct Harness {
        gateway: ScriptedGateway,
        policy: DispatchPolicy,
        events: EventWriter,
        cancel: CancelToken,
        state: SessionState,
    }

    impl Harness {
        fn new(gateway: ScriptedGateway) -> Self {
            Self {
                gateway,
                policy: DispatchPolicy::default(),
                events: EventWriter::disabled("test-session"),
                cancel: CancelToken::new(),
                state: SessionState::default(),
            }
        }

        fn dispatch(&mut self, request: &TurnRequest, history: &[ConversationTurn]) -> GenerationResult {
            let dispatcher = ToolDispatcher {
                gateway: &self.gateway,
                policy: &self.policy,
                events: &self.events,
                cancel: &self.cancel,
            };
            dispatcher.dispatch(&mut self.state, request, history)
        }

        fn resume(&mut self, message_id: &str, prompt: &str, ratio: &str) -> GenerationResult {
            let dispatcher = ToolDispatcher {
                gateway: &self.gateway,
                policy: &self.policy,
                events: &self.events,
                cancel: &self.cancel,
            };
            dispatcher.resume(&mut self.state, message_id, prompt, ratio)
        }
    }

    fn generate_call(prompt: &str) -> ToolCall {
        ToolCall::new(ToolName::GenerateImage).with_arg("prompt", prompt)
    }

    fn turn(text: &str, images: Vec<ImageBlob>) -> TurnRequest {
        TurnRequest::new(text, images).with_message_id("m1")
    }

    #[test]
    fn generate_without_images_or_ratio_defers() {
        let mut harness = Harness::new(
            ScriptedGateway::new().with_tool_call(generate_call("a lion in the desert")),
        );
        let result = harness.dispatch(&turn("draw a lion", Vec::new()), &[]);

        assert!(result.needs_aspect_ratio);
        assert_eq!(result.pending_prompt.as_deref(), Some("a lion in the desert"));
        assert!(result.image.is_none());
        assert!(result.text.contains("9:16"));
        assert_eq!(harness.gateway.image_call_count(), 0);
        assert_eq!(
            harness.state.deferred.state("m1"),
            DeferredState::AwaitingRatio {
                prompt: "a lion in the desert".to_string()
            }
        );
    }

    #[test]
    fn generate_with_attached_image_preserves_identity() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(generate_call("at the beach")));
        let selfie = marker_image(9);
        let result = harness.dispatch(&turn("me at the beach", vec![selfie.clone()]), &[]);

        assert!(!result.needs_aspect_ratio);
        assert!(result.pending_prompt.is_none());
        assert!(result.image.is_some());
        assert_eq!(result.prompt.as_deref(), Some("at the beach"));

        let calls = harness.gateway.reference_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![selfie]);
        assert!(calls[0].0.contains("Request: at the beach"));
        assert!(harness.gateway.image_tiers().is_empty());
    }

    #[test]
    fn context_only_policy_defers_even_with_images() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(generate_call("a castle")));
        harness.policy.attached_images_preserve_identity = false;
        let result = harness.dispatch(&turn("like this but a castle", vec![marker_image(9)]), &[]);

        assert!(result.needs_aspect_ratio);
        assert_eq!(harness.gateway.image_call_count(), 0);
    }

    #[test]
    fn explicit_ratio_generates_immediately() {
        let call = generate_call("a lion in the desert, landscape").with_arg("aspectRatio", "9:16");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let result = harness.dispatch(&turn("draw", Vec::new()), &[]);

        assert!(!result.needs_aspect_ratio);
        assert!(result.image.is_some());
        let prompts: Vec<String> = harness
            .gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::GenerateImage { prompt, .. } => Some(prompt),
                _ => None,
            })
            .collect();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("9:16"));
        assert!(prompts[0].contains("Vertical composition guidance:"));
        assert!(!prompts[0].to_lowercase().contains("landscape"));
    }

    #[test]
    fn resize_without_any_image_makes_no_gateway_image_call() {
        let call = ToolCall::new(ToolName::ResizeImage).with_arg("aspectRatio", "16:9");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let history = vec![ConversationTurn::model("hello", Vec::new())];
        let result = harness.dispatch(&turn("make it wide", Vec::new()), &history);

        assert_eq!(result.failure, Some(FailureKind::NoImageAvailable));
        assert!(result.text.contains("upload"));
        assert_eq!(harness.gateway.image_call_count(), 0);
    }

    #[test]
    fn resize_uses_latest_history_image_and_its_dimensions() {
        let call = ToolCall::new(ToolName::ResizeImage)
            .with_arg("aspectRatio", "16:9")
            .with_arg("sceneDescription", "a red fox");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let older = marker_image(5);
        let newest = png(90, 160);
        let history = vec![
            ConversationTurn::model("first", vec![older]),
            ConversationTurn::model("second", vec![newest.clone()]),
            ConversationTurn::user("thanks", Vec::new()),
        ];
        let result = harness.dispatch(&turn("make it 16:9", Vec::new()), &history);

        assert!(result.image.is_some());
        assert_eq!(result.prompt.as_deref(), Some("a red fox"));
        let calls = harness.gateway.reference_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![newest]);
        assert_eq!(calls[0].2, Some(AspectRatio::Wide16x9));
        assert!(calls[0].0.contains("left and right"));
        assert!(calls[0].0.contains("Original scene description: a red fox"));
    }

    #[test]
    fn resize_with_unsupported_ratio_lists_ratios() {
        let call = ToolCall::new(ToolName::ResizeImage).with_arg("aspectRatio", "7:3");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let result = harness.dispatch(&turn("resize", vec![marker_image(1)]), &[]);

        assert!(!result.is_error());
        assert!(result.text.contains("7:3"));
        assert!(result.text.contains("21:9"));
        assert_eq!(harness.gateway.image_call_count(), 0);
    }

    #[test]
    fn primary_failure_falls_back_silently() {
        let call = generate_call("a fox").with_arg("aspectRatio", "1:1");
        let gateway = ScriptedGateway::new().with_tool_call(call);
        gateway.push_primary(Err(GatewayError::BackendFailure("boom".to_string())));
        let mut harness = Harness::new(gateway);
        let result = harness.dispatch(&turn("draw a fox", Vec::new()), &[]);

        assert!(!result.is_error());
        assert_eq!(result.image, Some(marker_image(2).to_data_uri()));
        assert_eq!(
            harness.gateway.image_tiers(),
            vec![crate::gateway::ImageTier::Primary, crate::gateway::ImageTier::Fallback]
        );
    }

    #[test]
    fn double_quota_failure_reports_quota() {
        let call = generate_call("a fox").with_arg("aspectRatio", "1:1");
        let gateway = ScriptedGateway::new().with_tool_call(call);
        gateway.push_primary(Err(GatewayError::QuotaExceeded("429".to_string())));
        gateway.push_fallback(Err(GatewayError::BackendFailure(
            "status RESOURCE_EXHAUSTED".to_string(),
        )));
        let mut harness = Harness::new(gateway);
        let result = harness.dispatch(&turn("draw a fox", Vec::new()), &[]);

        assert_eq!(result.failure, Some(FailureKind::QuotaExceeded));
        assert!(result.text.contains("high traffic"));
    }

    #[test]
    fn reset_clears_every_slot() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(ToolCall::new(ToolName::ResetFaceMemory)));
        for (index, attribute) in Attribute::ALL.into_iter().enumerate() {
            harness.state.memory.set(attribute, marker_image(index as u8 + 1));
        }
        let result = harness.dispatch(&turn("start over", Vec::new()), &[]);

        assert!(result.reset_memory);
        assert!(harness.state.memory.is_empty());

        let mut empty =
            Harness::new(ScriptedGateway::new().with_tool_call(ToolCall::new(ToolName::ResetFaceMemory)));
        assert!(empty.dispatch(&turn("again", Vec::new()), &[]).reset_memory);
    }

    #[test]
    fn only_the_first_tool_call_runs() {
        let gateway = ScriptedGateway::new().with_completion(
            "",
            vec![
                ToolCall::new(ToolName::SearchTheWeb).with_arg("query", "weather in Oslo"),
                ToolCall::new(ToolName::ResetFaceMemory),
            ],
        );
        gateway.push_search(Ok(SearchAnswer {
            text: "Rainy.".to_string(),
            sources: vec![SearchSource {
                uri: "https://weather.example".to_string(),
                title: "Weather".to_string(),
            }],
        }));
        let mut harness = Harness::new(gateway);
        harness.state.memory.set(Attribute::Face, marker_image(7));
        let result = harness.dispatch(&turn("weather?", Vec::new()), &[]);

        assert_eq!(result.text, "Rainy.");
        assert_eq!(result.sources.as_ref().map(Vec::len), Some(1));
        assert!(!result.reset_memory);
        assert!(harness.state.memory.get(Attribute::Face).is_some());
    }

    #[test]
    fn plain_text_is_returned_verbatim() {
        let gateway = ScriptedGateway::new();
        gateway.push_completion(Ok(ToolCompletion {
            text: "Hi! How can I help?".to_string(),
            tool_calls: Vec::new(),
        }));
        let mut harness = Harness::new(gateway);
        let result = harness.dispatch(&turn("hello", Vec::new()), &[]);
        assert_eq!(result.text, "Hi! How can I help?");
        assert!(result.image.is_none() && result.failure.is_none());
    }

    #[test]
    fn reference_generation_sends_consistent_memory_slots() {
        let call = ToolCall::new(ToolName::GenerateFromReference).with_arg("prompt", "in Paris");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let face = marker_image(11);
        let dress = marker_image(12);
        harness.state.memory.set(Attribute::Face, face.clone());
        harness.state.memory.set(Attribute::Dress, dress);
        harness.state.settings.set_mode(Attribute::Background, AttributeMode::Consistent);

        let attached = marker_image(10);
        let result = harness.dispatch(&turn("same person in Paris", vec![attached.clone()]), &[]);

        assert!(result.image.is_some());
        let calls = harness.gateway.reference_calls();
        assert_eq!(calls[0].1, vec![attached, face]);
        assert!(calls[0].0.contains("Background: keep exactly"));
    }

    #[test]
    fn reference_generation_without_any_image_fails() {
        let call = ToolCall::new(ToolName::GenerateFromReference).with_arg("prompt", "in Paris");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let result = harness.dispatch(&turn("same person", Vec::new()), &[]);
        assert_eq!(result.failure, Some(FailureKind::NoImageAvailable));
        assert_eq!(harness.gateway.image_call_count(), 0);
    }

    #[test]
    fn edit_prefers_the_attached_image_and_keeps_identity() {
        let call = ToolCall::new(ToolName::EditImage).with_arg("instruction", "make the sky purple");
        let mut harness = Harness::new(ScriptedGateway::new().with_tool_call(call));
        let history = vec![ConversationTurn::model("old", vec![marker_image(1)])];
        let attached = marker_image(2);
        let result = harness.dispatch(&turn("edit", vec![attached.clone()]), &history);

        assert_eq!(result.prompt.as_deref(), Some("make the sky purple"));
        let calls = harness.gateway.reference_calls();
        assert_eq!(calls[0].1, vec![attached]);
        assert!(calls[0].0.contains("Requested edit: make the sky purple"));
    }

    #[test]
    fn resume_generates_once_then_refuses() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(generate_call("a red fox")));
        harness.dispatch(&turn("draw a fox", Vec::new()), &[]);

        let resumed = harness.resume("m1", "", "16:9");
        assert!(resumed.image.is_some());
        assert_eq!(resumed.prompt.as_deref(), Some("a red fox"));
        assert_eq!(harness.state.deferred.state("m1"), DeferredState::Resolved);
        let image_calls = harness.gateway.image_call_count();

        let again = harness.resume("m1", "a red fox", "16:9");
        assert_eq!(again.failure, Some(FailureKind::AlreadyResolved));
        assert_eq!(harness.gateway.image_call_count(), image_calls);
    }

    #[test]
    fn resume_with_bad_ratio_keeps_waiting() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(generate_call("a red fox")));
        harness.dispatch(&turn("draw a fox", Vec::new()), &[]);

        let result = harness.resume("m1", "a red fox", "sideways");
        assert!(result.text.contains("sideways"));
        assert_eq!(harness.state.deferred.pending().len(), 1);
        assert_eq!(harness.gateway.image_call_count(), 0);
    }

    #[test]
    fn cancelled_resume_stays_pending() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(generate_call("a red fox")));
        harness.dispatch(&turn("draw a fox", Vec::new()), &[]);
        harness.gateway.cancel_during_calls(harness.cancel.clone());

        let result = harness.resume("m1", "", "16:9");
        assert_eq!(result.failure, Some(FailureKind::Cancelled));
        assert!(result.image.is_none());
        assert_eq!(
            harness.state.deferred.state("m1"),
            DeferredState::AwaitingRatio {
                prompt: "a red fox".to_string()
            }
        );
    }

    #[test]
    fn failed_resume_still_resolves() {
        let gateway = ScriptedGateway::new().with_tool_call(generate_call("a red fox"));
        gateway.push_primary(Err(GatewayError::BackendFailure("down".to_string())));
        gateway.push_fallback(Err(GatewayError::BackendFailure("down".to_string())));
        let mut harness = Harness::new(gateway);
        harness.dispatch(&turn("draw a fox", Vec::new()), &[]);

        let result = harness.resume("m1", "a red fox", "1:1");
        assert_eq!(result.failure, Some(FailureKind::GenerationFailed));
        assert_eq!(harness.state.deferred.state("m1"), DeferredState::Resolved);
    }

    #[test]
    fn untracked_resume_uses_callers_prompt() {
        let mut harness = Harness::new(ScriptedGateway::new());
        let result = harness.resume("restarted", "a quiet harbour", "4:3");
        assert_eq!(result.prompt.as_deref(), Some("a quiet harbour"));
        assert_eq!(harness.state.deferred.state("restarted"), DeferredState::Resolved);
    }

    #[test]
    fn cancelled_turn_touches_nothing() {
        let mut harness =
            Harness::new(ScriptedGateway::new().with_tool_call(ToolCall::new(ToolName::ResetFaceMemory)));
        harness.state.memory.set(Attribute::Face, marker_image(4));
        harness.gateway.cancel_during_calls(harness.cancel.clone());

        let result = harness.dispatch(&turn("forget her", Vec::new()), &[]);
        assert_eq!(result.failure, Some(FailureKind::Cancelled));
        assert!(harness.state.memory.get(Attribute::Face).is_some());
    }
}
