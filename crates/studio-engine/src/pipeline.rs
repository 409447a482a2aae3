use studio_contracts::aspect::AspectRatio;
use studio_contracts::conversation::ImageBlob;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{GatewayError, StudioError};
use crate::gateway::{ImageTier, ModelGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub image: ImageBlob,
    pub tier: ImageTier,
    /// Set when the primary tier failed and the fallback produced the image.
    pub primary_error: Option<GatewayError>,
}

/// Text-to-image with one fallback attempt.
///
/// The fallback receives the identical synthesized prompt. When both tiers
/// fail the result is a quota error if either failure was quota related,
/// otherwise a generic generation failure.
pub fn generate(
    gateway: &dyn ModelGateway,
    prompt: &str,
    aspect_ratio: AspectRatio,
    cancel: &CancelToken,
) -> Result<PipelineOutput, StudioError> {
    cancel.check()?;
    let primary_error = match gateway.generate_image(ImageTier::Primary, prompt, aspect_ratio) {
        Ok(image) => {
            cancel.check()?;
            return Ok(PipelineOutput {
                image,
                tier: ImageTier::Primary,
                primary_error: None,
            });
        }
        Err(err) => err,
    };
    warn!(
        gateway = gateway.name(),
        ratio = aspect_ratio.as_str(),
        "primary image generation failed, trying fallback: {primary_error}"
    );

    cancel.check()?;
    match gateway.generate_image(ImageTier::Fallback, prompt, aspect_ratio) {
        Ok(image) => {
            cancel.check()?;
            Ok(PipelineOutput {
                image,
                tier: ImageTier::Fallback,
                primary_error: Some(primary_error),
            })
        }
        Err(fallback_error) => {
            warn!(
                gateway = gateway.name(),
                "fallback image generation failed: {fallback_error}"
            );
            if primary_error.is_quota() || fallback_error.is_quota() {
                let detail = if fallback_error.is_quota() {
                    fallback_error.detail().to_string()
                } else {
                    primary_error.detail().to_string()
                };
                return Err(StudioError::Gateway(GatewayError::QuotaExceeded(detail)));
            }
            Err(StudioError::GenerationFailed(format!(
                "primary: {primary_error}; fallback: {fallback_error}"
            )))
        }
    }
}
