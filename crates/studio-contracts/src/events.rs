use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

pub const SESSION_STARTED: &str = "session_started";
pub const TURN_STARTED: &str = "turn_started";
pub const TOOL_SELECTED: &str = "tool_selected";
pub const GENERATION_DEFERRED: &str = "generation_deferred";
pub const GENERATION_RESUMED: &str = "generation_resumed";
pub const GENERATION_FALLBACK: &str = "generation_fallback";
pub const IMAGE_GENERATED: &str = "image_generated";
pub const REFERENCE_SET: &str = "reference_set";
pub const REFERENCE_CLEARED: &str = "reference_cleared";
pub const MEMORY_RESET: &str = "memory_reset";
pub const TURN_FAILED: &str = "turn_failed";
pub const SPEECH_GENERATED: &str = "speech_generated";

/// Append-only writer for a session's `events.jsonl`.
///
/// - default fields are `type`, `session_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
/// - a writer without a path builds the event but never touches disk
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self::build(Some(path.into()), session_id.into())
    }

    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self::build(None, session_id.into())
    }

    fn build(path: Option<PathBuf>, session_id: String) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path,
                session_id,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_ref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert("tool".to_string(), Value::String("generateImage".to_string()));
        let emitted = writer.emit(TOOL_SELECTED, payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String(TOOL_SELECTED.to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-123".to_string()));
        assert_eq!(parsed["tool"], Value::String("generateImage".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn caller_fields_win_over_defaults() -> anyhow::Result<()> {
        let writer = EventWriter::disabled("session-123");
        let payload = serde_json::json!({ "session_id": "forwarded", "attribute": "face" });
        let emitted = writer.emit(REFERENCE_SET, payload.as_object().cloned().unwrap_or_default())?;

        assert_eq!(emitted["type"], REFERENCE_SET);
        assert_eq!(emitted["session_id"], "forwarded");
        assert_eq!(emitted["attribute"], "face");
        assert_eq!(writer.session_id(), "session-123");
        Ok(())
    }

    #[test]
    fn emit_appends_lines_and_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit(TURN_STARTED, EventPayload::new())?;
        writer.emit(MEMORY_RESET, EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(first["type"], Value::String(TURN_STARTED.to_string()));
        assert_eq!(second["type"], Value::String(MEMORY_RESET.to_string()));
        Ok(())
    }

    #[test]
    fn disabled_writer_touches_nothing() -> anyhow::Result<()> {
        let writer = EventWriter::disabled("session-9");
        assert!(writer.path().is_none());
        let emitted = writer.emit(TURN_FAILED, EventPayload::new())?;
        assert_eq!(emitted["session_id"], Value::String("session-9".to_string()));
        Ok(())
    }
}
