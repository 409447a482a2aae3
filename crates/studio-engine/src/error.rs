use thiserror::Error;

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("no image produced: {0}")]
    NoImageProduced(String),
    #[error("no audio produced: {0}")]
    NoAudioProduced(String),
    #[error("backend failure: {0}")]
    BackendFailure(String),
}

impl GatewayError {
    /// Maps a non-2xx response. 429 or a RESOURCE_EXHAUSTED body is quota.
    pub fn from_status(provider: &str, status: u16, detail: &str) -> Self {
        let message = format!("{provider} request failed ({status}): {detail}");
        if status == 429 || is_quota_signal(detail) {
            GatewayError::QuotaExceeded(message)
        } else {
            GatewayError::BackendFailure(message)
        }
    }

    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        if err.status().map(|status| status.as_u16()) == Some(429) {
            return GatewayError::QuotaExceeded(format!("{provider} request failed: {err}"));
        }
        let kind = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "could not connect"
        } else {
            "failed"
        };
        GatewayError::BackendFailure(format!("{provider} request {kind}: {err}"))
    }

    pub fn detail(&self) -> &str {
        match self {
            GatewayError::QuotaExceeded(detail)
            | GatewayError::NoImageProduced(detail)
            | GatewayError::NoAudioProduced(detail)
            | GatewayError::BackendFailure(detail) => detail,
        }
    }

    /// True for explicit quota errors and for failures whose text carries a
    /// quota signal.
    pub fn is_quota(&self) -> bool {
        matches!(self, GatewayError::QuotaExceeded(_)) || is_quota_signal(self.detail())
    }
}

/// Looks for the backend's resource-exhaustion markers in free text. The
/// status code only counts as a standalone number, never inside `4290`.
pub fn is_quota_signal(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    upper.contains("RESOURCE_EXHAUSTED")
        || text
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .any(|token| token == "429")
}

/// Failure of a whole orchestration step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("no image available for this request")]
    NoImageAvailable,
    #[error("image generation failed: {0}")]
    GenerationFailed(String),
    #[error("turn cancelled")]
    Cancelled,
    #[error("deferred generation {0} already resolved")]
    AlreadyResolved(String),
}
