use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

impl ModelSelection {
    pub fn name(&self) -> &str {
        &self.model.name
    }
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let Some(model) = self.registry.default_for(capability) else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::models::capability;

    #[test]
    fn requested_model_wins_when_capable() -> Result<(), String> {
        let selector = ModelSelector::default();
        let selection = selector.select(Some("gemini-2.5-pro"), capability::REASONING)?;
        assert_eq!(selection.name(), "gemini-2.5-pro");
        assert_eq!(selection.fallback_reason, None);
        Ok(())
    }

    #[test]
    fn wrong_capability_falls_back_with_reason() -> Result<(), String> {
        let selector = ModelSelector::default();
        let selection = selector.select(Some("gemini-2.5-flash"), capability::IMAGE)?;
        assert_eq!(selection.name(), "imagen-4.0-generate-001");
        assert_eq!(selection.requested.as_deref(), Some("gemini-2.5-flash"));
        assert!(selection
            .fallback_reason
            .as_deref()
            .unwrap_or("")
            .contains("unavailable for capability 'image'"));
        Ok(())
    }

    #[test]
    fn blank_request_uses_default() -> Result<(), String> {
        let selector = ModelSelector::default();
        let selection = selector.select(Some("  "), capability::IMAGE_REFERENCE)?;
        assert_eq!(selection.name(), "gemini-2.5-flash-image");
        assert_eq!(selection.requested, None);
        Ok(())
    }

    #[test]
    fn empty_registry_is_an_error() {
        let selector = ModelSelector::new(Some(ModelRegistry::new(Some(IndexMap::new()))));
        let err = selector.select(None, capability::CHAT).err().unwrap_or_default();
        assert!(err.contains("No models available"));
    }
}
