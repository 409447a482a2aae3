use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use studio_contracts::aspect::AspectRatio;
use studio_contracts::conversation::{ConversationTurn, ImageBlob};
use studio_contracts::models::ModelSpec;
use studio_contracts::result::SearchSource;
use studio_contracts::tools::{ToolCall, ToolName};
use tracing::{debug, warn};

use super::{
    AudioClip, ImageTier, ModelGateway, ReferenceImageRequest, SearchAnswer, ToolCompletion,
    ToolCompletionRequest,
};
use crate::config::EngineConfig;
use crate::error::GatewayError;

const GEMINI: &str = "Gemini";
const IMAGEN: &str = "Imagen";

/// Ratios accepted by the Gemini image models' `imageConfig`.
const GEMINI_IMAGE_RATIOS: [AspectRatio; 9] = [
    AspectRatio::Square,
    AspectRatio::Tall9x16,
    AspectRatio::Wide16x9,
    AspectRatio::Tall3x4,
    AspectRatio::Wide4x3,
    AspectRatio::Tall4x5,
    AspectRatio::Wide3x2,
    AspectRatio::Tall2x3,
    AspectRatio::Wide21x9,
];

pub struct GeminiGateway {
    config: EngineConfig,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            GatewayError::BackendFailure("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
        })
    }

    fn endpoint_for_model(&self, model: &ModelSpec) -> String {
        let trimmed = model.name.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        let method = if model.uses_predict() {
            "predict"
        } else {
            "generateContent"
        };
        format!("{}/{}:{}", self.config.api_base, model_path, method)
    }

    fn post(&self, provider: &str, model: &ModelSpec, payload: &Value) -> Result<Value, GatewayError> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint_for_model(model);
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                target: "studio.gateway",
                provider,
                model = model.name.as_str(),
                payload = %summarize_payload(payload)
            );
        }
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .timeout(self.config.request_timeout)
            .json(payload)
            .send()
            .map_err(|err| {
                warn!(
                    "{provider} request failed to send: {err} (timeout={}, connect={})",
                    err.is_timeout(),
                    err.is_connect(),
                );
                GatewayError::from_transport(provider, &err)
            })?;
        response_json_or_error(provider, response)
    }

    fn predict_image(
        &self,
        model: &ModelSpec,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError> {
        let ratio = snap_ratio(aspect_ratio, &AspectRatio::STANDARD);
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": ratio.as_str(),
            },
        });
        let response = self.post(IMAGEN, model, &payload)?;
        parse_predictions(&response)?.ok_or_else(|| {
            GatewayError::NoImageProduced(format!(
                "Imagen returned no images{}",
                missing_payload_detail(&response)
            ))
        })
    }

    fn content_image(
        &self,
        model: &ModelSpec,
        images: &[ImageBlob],
        prompt: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<ImageBlob, GatewayError> {
        let mut parts: Vec<Value> = images
            .iter()
            .filter(|image| !image.is_empty())
            .map(inline_part)
            .collect();
        parts.push(json!({ "text": prompt }));

        let mut generation_config = Map::new();
        generation_config.insert(
            "responseModalities".to_string(),
            Value::Array(vec![Value::String("IMAGE".to_string())]),
        );
        if let Some(ratio) = aspect_ratio {
            let ratio = snap_ratio(ratio, &GEMINI_IMAGE_RATIOS);
            generation_config.insert(
                "imageConfig".to_string(),
                json!({ "aspectRatio": ratio.as_str() }),
            );
        }

        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
            "safetySettings": default_safety_settings(),
        });
        let response = self.post(GEMINI, model, &payload)?;
        let Some((data, mime_type)) = first_inline_data(&response, "image/")? else {
            return Err(GatewayError::NoImageProduced(format!(
                "Gemini returned no images{}",
                missing_payload_detail(&response)
            )));
        };
        Ok(ImageBlob::new(data, mime_type))
    }
}

impl ModelGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete_with_tools(
        &self,
        request: &ToolCompletionRequest<'_>,
    ) -> Result<ToolCompletion, GatewayError> {
        let mut contents: Vec<Value> = request.history.iter().map(turn_content).collect();
        contents.push(turn_content(request.turn));
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": contents,
            "tools": [{ "functionDeclarations": request.tools }],
        });
        let response = self.post(GEMINI, &self.config.chat_model, &payload)?;
        Ok(parse_tool_completion(&response))
    }

    fn generate_image(
        &self,
        tier: ImageTier,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageBlob, GatewayError> {
        let model = match tier {
            ImageTier::Primary => &self.config.image_model,
            ImageTier::Fallback => &self.config.fallback_image_model,
        };
        if model.uses_predict() {
            self.predict_image(model, prompt, aspect_ratio)
        } else {
            self.content_image(model, &[], prompt, Some(aspect_ratio))
        }
    }

    fn generate_image_from_references(
        &self,
        request: &ReferenceImageRequest<'_>,
    ) -> Result<ImageBlob, GatewayError> {
        self.content_image(
            &self.config.reference_image_model,
            request.images,
            request.prompt,
            request.aspect_ratio,
        )
    }

    fn search(&self, query: &str) -> Result<SearchAnswer, GatewayError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "tools": [{ "google_search": {} }],
        });
        let response = self.post(GEMINI, &self.config.search_model, &payload)?;
        Ok(parse_search_answer(&response))
    }

    fn complex_reasoning(&self, query: &str) -> Result<String, GatewayError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "generationConfig": {
                "thinkingConfig": { "thinkingBudget": self.config.thinking_budget },
            },
        });
        let response = self.post(GEMINI, &self.config.reasoning_model, &payload)?;
        let text = response_text(&response);
        if text.is_empty() {
            return Err(GatewayError::BackendFailure(format!(
                "Gemini reasoning returned no text{}",
                missing_payload_detail(&response)
            )));
        }
        Ok(text)
    }

    fn synthesize_speech(&self, text: &str) -> Result<AudioClip, GatewayError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.config.speech_voice },
                    },
                },
            },
        });
        let response = self.post(GEMINI, &self.config.speech_model, &payload)?;
        let Some((data, mime_type)) = first_inline_data(&response, "audio/")? else {
            return Err(GatewayError::NoAudioProduced(format!(
                "Gemini returned no audio{}",
                missing_payload_detail(&response)
            )));
        };
        Ok(AudioClip { data, mime_type })
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| GatewayError::from_transport(provider, &err))?;
    if !status.is_success() {
        return Err(status_error(provider, status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        GatewayError::BackendFailure(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

fn status_error(provider: &str, status: u16, body: &str) -> GatewayError {
    let detail = summarize_error_body(body);
    warn!("{provider} API error: status={status}, body={detail}");
    GatewayError::from_status(provider, status, &detail)
}

/// `STATUS: message` from a Gemini error envelope, or a truncated body.
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return truncate_text(trimmed, 512);
    };
    let status = value.pointer("/error/status").and_then(Value::as_str);
    let message = value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str);
    match (status, message) {
        (Some(status), Some(message)) => format!("{status}: {}", truncate_text(message, 512)),
        (None, Some(message)) => truncate_text(message, 512),
        (Some(status), None) => status.to_string(),
        (None, None) => truncate_text(&value.to_string(), 512),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn snap_ratio(ratio: AspectRatio, allowed: &[AspectRatio]) -> AspectRatio {
    if allowed.contains(&ratio) {
        return ratio;
    }
    let (width, height) = ratio.parts();
    let snapped = AspectRatio::nearest(width, height, allowed);
    debug!(requested = ratio.as_str(), snapped = snapped.as_str(), "aspect ratio snapped");
    snapped
}

fn default_safety_settings() -> Vec<Value> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| {
        json!({
            "category": category,
            "threshold": "OFF",
        })
    })
    .collect()
}

fn inline_part(image: &ImageBlob) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.to_base64(),
        }
    })
}

fn turn_content(turn: &ConversationTurn) -> Value {
    let mut parts: Vec<Value> = turn
        .images
        .iter()
        .filter(|image| !image.is_empty())
        .map(inline_part)
        .collect();
    if !turn.text.trim().is_empty() || parts.is_empty() {
        parts.push(json!({ "text": turn.text }));
    }
    json!({
        "role": turn.role.as_str(),
        "parts": parts,
    })
}

fn first_candidate_parts(payload: &Value) -> Vec<Value> {
    payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn response_text(payload: &Value) -> String {
    first_candidate_parts(payload)
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("")
        .trim()
        .to_string()
}

fn parse_tool_completion(payload: &Value) -> ToolCompletion {
    let mut tool_calls = Vec::new();
    for part in first_candidate_parts(payload) {
        let Some(call) = part.get("functionCall") else {
            continue;
        };
        let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(tool) = ToolName::parse(name) else {
            warn!(tool = name, "dropping unknown tool call");
            continue;
        };
        tool_calls.push(ToolCall {
            name: tool,
            arguments: call
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        });
    }
    ToolCompletion {
        text: response_text(payload),
        tool_calls,
    }
}

fn parse_search_answer(payload: &Value) -> SearchAnswer {
    let chunks = payload
        .pointer("/candidates/0/groundingMetadata/groundingChunks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut sources: Vec<SearchSource> = Vec::new();
    for chunk in chunks {
        let Some(web) = chunk.get("web") else {
            continue;
        };
        let uri = web.get("uri").and_then(Value::as_str).unwrap_or_default().trim();
        if uri.is_empty() || sources.iter().any(|source| source.uri == uri) {
            continue;
        }
        let title = web
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(uri);
        sources.push(SearchSource {
            uri: uri.to_string(),
            title: title.to_string(),
        });
    }
    SearchAnswer {
        text: response_text(payload),
        sources,
    }
}

/// First `inlineData` part whose MIME type starts with `mime_prefix`.
fn first_inline_data(
    payload: &Value,
    mime_prefix: &str,
) -> Result<Option<(Vec<u8>, String)>, GatewayError> {
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for candidate in candidates {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !mime_type.starts_with(mime_prefix) {
                continue;
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                GatewayError::BackendFailure(format!("Gemini inline data base64 decode failed: {err}"))
            })?;
            return Ok(Some((bytes, mime_type.to_string())));
        }
    }
    Ok(None)
}

fn parse_predictions(payload: &Value) -> Result<Option<ImageBlob>, GatewayError> {
    let predictions = payload
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for row in predictions {
        let Some(encoded) = row
            .get("bytesBase64Encoded")
            .or_else(|| row.get("bytes_base64_encoded"))
            .and_then(Value::as_str)
            .filter(|encoded| !encoded.is_empty())
        else {
            continue;
        };
        let bytes = BASE64.decode(encoded.as_bytes()).map_err(|err| {
            GatewayError::BackendFailure(format!("Imagen image base64 decode failed: {err}"))
        })?;
        let mime_type = row
            .get("mimeType")
            .or_else(|| row.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Ok(Some(ImageBlob::new(bytes, mime_type)));
    }
    Ok(None)
}

/// Finish or block reason appended to "returned nothing" errors.
fn missing_payload_detail(payload: &Value) -> String {
    let block = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str);
    let finish = payload
        .pointer("/candidates/0/finishReason")
        .and_then(Value::as_str);
    match (block, finish) {
        (Some(block), _) => format!(" (blocked: {block})"),
        (None, Some(finish)) => format!(" (finish reason: {finish})"),
        (None, None) => String::new(),
    }
}

/// Request shape for debug logs with inline payloads replaced by their size.
fn summarize_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let summarized = match key.as_str() {
                    "inlineData" => json!({
                        "mimeType": value.get("mimeType").cloned().unwrap_or(Value::Null),
                        "dataLen": value.get("data").and_then(Value::as_str).map(str::len).unwrap_or(0),
                    }),
                    "functionDeclarations" => json!({
                        "count": value.as_array().map(Vec::len).unwrap_or(0),
                    }),
                    _ => summarize_payload(value),
                };
                out.insert(key.clone(), summarized);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(summarize_payload).collect()),
        Value::String(text) => Value::String(truncate_text(text, 200)),
        other => other.clone(),
    }
}
