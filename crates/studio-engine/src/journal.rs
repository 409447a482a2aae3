use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use studio_contracts::conversation::ImageBlob;
use studio_contracts::events::EventWriter;
use tracing::warn;

/// Best-effort event write. A failing log never fails the turn.
pub(crate) fn emit(events: &EventWriter, event_type: &str, payload: Value) {
    if let Err(err) = events.emit(event_type, map_object(payload)) {
        warn!(
            event = event_type,
            session = events.session_id(),
            "event write failed: {err:#}"
        );
    }
}

/// Short stable identifier for image bytes; images themselves are never logged.
pub(crate) fn fingerprint(image: &ImageBlob) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&image.data);
    hex::encode(&hasher.finalize()[..8])
}

pub(crate) fn image_summary(image: &ImageBlob) -> Value {
    serde_json::json!({
        "sha256": fingerprint(image),
        "bytes": image.data.len(),
        "mime_type": image.mime_type,
    })
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
