use indexmap::IndexMap;

/// Capability names a model can be registered under.
pub mod capability {
    pub const CHAT: &str = "chat";
    pub const SEARCH: &str = "search";
    pub const REASONING: &str = "reasoning";
    pub const VISION: &str = "vision";
    pub const IMAGE: &str = "image";
    pub const IMAGE_REFERENCE: &str = "image_reference";
    pub const SPEECH: &str = "speech";

    pub const ALL: [&str; 7] = [CHAT, SEARCH, REASONING, VISION, IMAGE, IMAGE_REFERENCE, SPEECH];
}

pub const PROVIDER_GEMINI: &str = "gemini";
pub const PROVIDER_IMAGEN: &str = "imagen";
pub const PROVIDER_DRYRUN: &str = "dryrun";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    /// Imagen models speak `:predict`, everything else `:generateContent`.
    pub fn uses_predict(&self) -> bool {
        self.provider == PROVIDER_IMAGEN
    }

    pub fn is_dryrun(&self) -> bool {
        self.provider == PROVIDER_DRYRUN
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    /// First registered model for `capability`, skipping dryrun entries
    /// unless nothing else qualifies.
    pub fn default_for(&self, capability: &str) -> Option<ModelSpec> {
        let candidates = self.by_capability(capability);
        candidates
            .iter()
            .find(|model| !model.is_dryrun())
            .or_else(|| candidates.first())
            .cloned()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str], context_window: Option<u64>| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
                context_window,
            },
        );
    };

    insert(
        "gemini-2.5-flash",
        PROVIDER_GEMINI,
        &[capability::CHAT, capability::SEARCH, capability::VISION],
        Some(1_048_576),
    );
    insert(
        "gemini-2.5-pro",
        PROVIDER_GEMINI,
        &[capability::REASONING, capability::CHAT, capability::SEARCH],
        Some(1_048_576),
    );
    insert(
        "imagen-4.0-generate-001",
        PROVIDER_IMAGEN,
        &[capability::IMAGE],
        None,
    );
    insert(
        "imagen-4.0-ultra-generate-001",
        PROVIDER_IMAGEN,
        &[capability::IMAGE],
        None,
    );
    insert(
        "gemini-2.5-flash-image",
        PROVIDER_GEMINI,
        &[capability::IMAGE, capability::IMAGE_REFERENCE],
        Some(32_768),
    );
    insert(
        "gemini-2.5-flash-preview-tts",
        PROVIDER_GEMINI,
        &[capability::SPEECH],
        Some(8_192),
    );
    insert("dryrun-studio-1", PROVIDER_DRYRUN, &capability::ALL, None);

    map
}
