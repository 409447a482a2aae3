use studio_contracts::result::{FailureKind, GenerationResult};

use crate::error::{is_quota_signal, GatewayError, StudioError};

pub fn classify(err: &StudioError) -> FailureKind {
    match err {
        StudioError::Gateway(gateway) => match gateway {
            GatewayError::QuotaExceeded(_) => FailureKind::QuotaExceeded,
            GatewayError::NoImageProduced(_) => FailureKind::NoImageProduced,
            GatewayError::NoAudioProduced(_) => FailureKind::NoAudioProduced,
            GatewayError::BackendFailure(detail) if is_quota_signal(detail) => {
                FailureKind::QuotaExceeded
            }
            GatewayError::BackendFailure(_) => FailureKind::BackendFailure,
        },
        StudioError::NoImageAvailable => FailureKind::NoImageAvailable,
        StudioError::GenerationFailed(detail) if is_quota_signal(detail) => {
            FailureKind::QuotaExceeded
        }
        StudioError::GenerationFailed(_) => FailureKind::GenerationFailed,
        StudioError::Cancelled => FailureKind::Cancelled,
        StudioError::AlreadyResolved(_) => FailureKind::AlreadyResolved,
    }
}

pub fn user_message(kind: FailureKind) -> &'static str {
    kind.user_message()
}

pub fn failure_result(message_id: &str, err: &StudioError) -> GenerationResult {
    GenerationResult::failure(message_id, classify(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_to_matching_kinds() {
        let quota = StudioError::Gateway(GatewayError::QuotaExceeded("429".to_string()));
        assert_eq!(classify(&quota), FailureKind::QuotaExceeded);

        let hidden_quota =
            StudioError::Gateway(GatewayError::BackendFailure("HTTP 429 Too Many".to_string()));
        assert_eq!(classify(&hidden_quota), FailureKind::QuotaExceeded);

        let backend = StudioError::Gateway(GatewayError::BackendFailure("timeout".to_string()));
        assert_eq!(classify(&backend), FailureKind::BackendFailure);

        let truncated = StudioError::Gateway(GatewayError::BackendFailure(
            "invalid JSON payload: EOF while parsing a string at line 1 column 4290".to_string(),
        ));
        assert_eq!(classify(&truncated), FailureKind::BackendFailure);

        let empty = StudioError::Gateway(GatewayError::NoAudioProduced("none".to_string()));
        assert_eq!(classify(&empty), FailureKind::NoAudioProduced);
    }

    #[test]
    fn orchestration_errors_map_to_matching_kinds() {
        assert_eq!(
            classify(&StudioError::NoImageAvailable),
            FailureKind::NoImageAvailable
        );
        assert_eq!(
            classify(&StudioError::GenerationFailed("both tiers down".to_string())),
            FailureKind::GenerationFailed
        );
        assert_eq!(classify(&StudioError::Cancelled), FailureKind::Cancelled);
        assert_eq!(
            classify(&StudioError::AlreadyResolved("m1".to_string())),
            FailureKind::AlreadyResolved
        );
    }

    #[test]
    fn failure_result_uses_user_message() {
        let result = failure_result("m1", &StudioError::NoImageAvailable);
        assert_eq!(result.message_id, "m1");
        assert_eq!(result.failure, Some(FailureKind::NoImageAvailable));
        assert_eq!(result.text, user_message(FailureKind::NoImageAvailable));
    }
}
