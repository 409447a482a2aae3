use serde::{Deserialize, Serialize};

use crate::conversation::ImageBlob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Face,
    Dress,
    Background,
    Environment,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Face,
        Attribute::Dress,
        Attribute::Background,
        Attribute::Environment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Face => "face",
            Attribute::Dress => "dress",
            Attribute::Background => "background",
            Attribute::Environment => "environment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "face" => Some(Attribute::Face),
            "dress" | "outfit" | "clothes" => Some(Attribute::Dress),
            "background" | "bg" => Some(Attribute::Background),
            "environment" | "env" | "scene" => Some(Attribute::Environment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeMode {
    Consistent,
    Change,
}

/// Which attributes a reference-based generation must hold fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySettings {
    pub face: AttributeMode,
    pub dress: AttributeMode,
    pub background: AttributeMode,
    pub environment: AttributeMode,
}

impl Default for ConsistencySettings {
    fn default() -> Self {
        Self {
            face: AttributeMode::Consistent,
            dress: AttributeMode::Change,
            background: AttributeMode::Change,
            environment: AttributeMode::Change,
        }
    }
}

impl ConsistencySettings {
    pub fn mode(&self, attribute: Attribute) -> AttributeMode {
        match attribute {
            Attribute::Face => self.face,
            Attribute::Dress => self.dress,
            Attribute::Background => self.background,
            Attribute::Environment => self.environment,
        }
    }

    pub fn set_mode(&mut self, attribute: Attribute, mode: AttributeMode) {
        match attribute {
            Attribute::Face => self.face = mode,
            Attribute::Dress => self.dress = mode,
            Attribute::Background => self.background = mode,
            Attribute::Environment => self.environment = mode,
        }
    }

    pub fn is_consistent(&self, attribute: Attribute) -> bool {
        self.mode(attribute) == AttributeMode::Consistent
    }
}

/// Session-scoped reference images, one optional slot per attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyMemory {
    face: Option<ImageBlob>,
    dress: Option<ImageBlob>,
    background: Option<ImageBlob>,
    environment: Option<ImageBlob>,
}

impl ConsistencyMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the slot. An empty buffer clears it instead.
    pub fn set(&mut self, attribute: Attribute, image: ImageBlob) {
        let slot = self.slot_mut(attribute);
        if image.is_empty() {
            *slot = None;
        } else {
            *slot = Some(image);
        }
    }

    /// Stores a base64 payload or data URI as raw bytes.
    pub fn set_encoded(
        &mut self,
        attribute: Attribute,
        encoded: &str,
        fallback_mime: &str,
    ) -> Result<(), base64::DecodeError> {
        let image = ImageBlob::from_encoded(encoded, fallback_mime)?;
        self.set(attribute, image);
        Ok(())
    }

    pub fn get(&self, attribute: Attribute) -> Option<&ImageBlob> {
        match attribute {
            Attribute::Face => self.face.as_ref(),
            Attribute::Dress => self.dress.as_ref(),
            Attribute::Background => self.background.as_ref(),
            Attribute::Environment => self.environment.as_ref(),
        }
    }

    pub fn clear(&mut self, attribute: Attribute) {
        *self.slot_mut(attribute) = None;
    }

    pub fn clear_all(&mut self) {
        for attribute in Attribute::ALL {
            self.clear(attribute);
        }
    }

    pub fn is_empty(&self) -> bool {
        Attribute::ALL
            .iter()
            .all(|attribute| self.get(*attribute).is_none())
    }

    /// Filled slots in attribute order.
    pub fn filled(&self) -> Vec<(Attribute, &ImageBlob)> {
        Attribute::ALL
            .iter()
            .filter_map(|attribute| self.get(*attribute).map(|image| (*attribute, image)))
            .collect()
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            face: self.face.clone(),
            dress: self.dress.clone(),
            background: self.background.clone(),
            environment: self.environment.clone(),
        }
    }

    fn slot_mut(&mut self, attribute: Attribute) -> &mut Option<ImageBlob> {
        match attribute {
            Attribute::Face => &mut self.face,
            Attribute::Dress => &mut self.dress,
            Attribute::Background => &mut self.background,
            Attribute::Environment => &mut self.environment,
        }
    }
}

/// Owned copy of the memory slots for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub face: Option<ImageBlob>,
    pub dress: Option<ImageBlob>,
    pub background: Option<ImageBlob>,
    pub environment: Option<ImageBlob>,
}

impl MemorySnapshot {
    pub fn get(&self, attribute: Attribute) -> Option<&ImageBlob> {
        match attribute {
            Attribute::Face => self.face.as_ref(),
            Attribute::Dress => self.dress.as_ref(),
            Attribute::Background => self.background.as_ref(),
            Attribute::Environment => self.environment.as_ref(),
        }
    }
}
