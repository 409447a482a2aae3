use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use studio_contracts::models::{capability, ModelSelector, ModelSpec};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SPEECH_VOICE: &str = "Kore";

const DEFAULT_TIMEOUT_S: f64 = 90.0;
const MIN_TIMEOUT_S: f64 = 5.0;
const MAX_TIMEOUT_S: f64 = 300.0;
const DEFAULT_THINKING_BUDGET: f64 = 8192.0;
const MAX_THINKING_BUDGET: f64 = 32768.0;
/// Pro models cannot switch thinking off; 128 is the smallest budget they take.
const PRO_MIN_THINKING_BUDGET: f64 = 128.0;

/// Backend settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub chat_model: ModelSpec,
    pub search_model: ModelSpec,
    pub reasoning_model: ModelSpec,
    pub image_model: ModelSpec,
    pub fallback_image_model: ModelSpec,
    pub reference_image_model: ModelSpec,
    pub speech_model: ModelSpec,
    pub speech_voice: String,
    pub request_timeout: Duration,
    pub thinking_budget: u32,
    /// Why a requested model was replaced by the capability default.
    pub fallback_reasons: Vec<String>,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let selector = ModelSelector::default();
        let mut fallback_reasons = Vec::new();
        let mut resolve = |key: &str, capability: &str| -> Result<ModelSpec> {
            let requested = value(key);
            let selection = selector
                .select(requested.as_deref(), capability)
                .map_err(|err| anyhow!("{key}: {err}"))?;
            if let (Some(requested), Some(reason)) =
                (selection.requested.as_ref(), selection.fallback_reason.as_ref())
            {
                warn!(
                    env = key,
                    requested = requested.as_str(),
                    using = selection.model.name.as_str(),
                    "{reason}"
                );
                fallback_reasons.push(format!("{key}: {reason}"));
            }
            Ok(selection.model)
        };

        let chat_model = resolve("STUDIO_CHAT_MODEL", capability::CHAT)?;
        let search_model = resolve("STUDIO_SEARCH_MODEL", capability::SEARCH)?;
        let reasoning_model = resolve("STUDIO_REASONING_MODEL", capability::REASONING)?;
        let image_model = resolve("STUDIO_IMAGE_MODEL", capability::IMAGE)?;
        let fallback_image_model =
            resolve("STUDIO_FALLBACK_IMAGE_MODEL", capability::IMAGE_REFERENCE)?;
        let reference_image_model =
            resolve("STUDIO_REFERENCE_IMAGE_MODEL", capability::IMAGE_REFERENCE)?;
        let speech_model = resolve("STUDIO_SPEECH_MODEL", capability::SPEECH)?;

        let timeout_s = parse_clamped(
            value("STUDIO_REQUEST_TIMEOUT").as_deref(),
            DEFAULT_TIMEOUT_S,
            MIN_TIMEOUT_S,
            MAX_TIMEOUT_S,
        );
        let thinking_budget = parse_clamped(
            value("STUDIO_THINKING_BUDGET").as_deref(),
            DEFAULT_THINKING_BUDGET,
            min_thinking_budget(&reasoning_model.name),
            MAX_THINKING_BUDGET,
        );

        Ok(Self {
            api_key: value("GEMINI_API_KEY").or_else(|| value("GOOGLE_API_KEY")),
            api_base: value("GEMINI_API_BASE")
                .map(|raw| raw.trim_end_matches('/').to_string())
                .filter(|raw| !raw.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            chat_model,
            search_model,
            reasoning_model,
            image_model,
            fallback_image_model,
            reference_image_model,
            speech_model,
            speech_voice: value("STUDIO_SPEECH_VOICE")
                .unwrap_or_else(|| DEFAULT_SPEECH_VOICE.to_string()),
            request_timeout: Duration::from_secs_f64(timeout_s),
            thinking_budget: thinking_budget.round() as u32,
            fallback_reasons,
        })
    }
}

fn parse_clamped(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|text| text.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

fn min_thinking_budget(model: &str) -> f64 {
    if model.contains("-pro") {
        PRO_MIN_THINKING_BUDGET
    } else {
        0.0
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
