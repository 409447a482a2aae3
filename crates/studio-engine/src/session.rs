use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use studio_contracts::conversation::{ConversationTurn, ImageBlob};
use studio_contracts::deferred::{DeferredGenerations, PendingGeneration};
use studio_contracts::events::{self, EventWriter};
use studio_contracts::memory::{
    Attribute, AttributeMode, ConsistencyMemory, ConsistencySettings, MemorySnapshot,
};
use studio_contracts::result::GenerationResult;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::dispatcher::{DispatchPolicy, ToolDispatcher, TurnRequest};
use crate::error::StudioError;
use crate::gateway::{AudioClip, ModelGateway};
use crate::journal::{emit, image_summary};

/// Everything a session mutates between turns.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    pub(crate) memory: ConsistencyMemory,
    pub(crate) settings: ConsistencySettings,
    pub(crate) deferred: DeferredGenerations,
}

/// One conversation's orchestration state.
///
/// Every operation holds the state lock for its whole pipeline, so turns of
/// the same session never interleave. Sessions share only the gateway.
pub struct Session {
    id: String,
    gateway: Arc<dyn ModelGateway>,
    policy: Arc<DispatchPolicy>,
    events: EventWriter,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(
        id: String,
        gateway: Arc<dyn ModelGateway>,
        policy: Arc<DispatchPolicy>,
        events: EventWriter,
    ) -> Self {
        Self {
            id,
            gateway,
            policy,
            events,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn events_path(&self) -> Option<&Path> {
        self.events.path()
    }

    /// State is only written after complete gateway calls, so a poisoned
    /// lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatcher<'a>(&'a self, cancel: &'a CancelToken) -> ToolDispatcher<'a> {
        ToolDispatcher {
            gateway: self.gateway.as_ref(),
            policy: self.policy.as_ref(),
            events: &self.events,
            cancel,
        }
    }

    pub fn send_turn(&self, request: TurnRequest, history: &[ConversationTurn]) -> GenerationResult {
        self.send_turn_with_cancel(request, history, &CancelToken::new())
    }

    pub fn send_turn_with_cancel(
        &self,
        request: TurnRequest,
        history: &[ConversationTurn],
        cancel: &CancelToken,
    ) -> GenerationResult {
        let mut state = self.lock();
        self.dispatcher(cancel).dispatch(&mut state, &request, history)
    }

    pub fn resume_deferred(&self, message_id: &str, prompt: &str, ratio_text: &str) -> GenerationResult {
        self.resume_deferred_with_cancel(message_id, prompt, ratio_text, &CancelToken::new())
    }

    pub fn resume_deferred_with_cancel(
        &self,
        message_id: &str,
        prompt: &str,
        ratio_text: &str,
        cancel: &CancelToken,
    ) -> GenerationResult {
        let mut state = self.lock();
        self.dispatcher(cancel)
            .resume(&mut state, message_id, prompt, ratio_text)
    }

    pub fn abandon_deferred(&self, message_id: &str) -> bool {
        let abandoned = self.lock().deferred.abandon(message_id);
        if abandoned {
            debug!(session = self.id.as_str(), message_id, "deferred generation abandoned");
        }
        abandoned
    }

    pub fn pending(&self) -> Vec<PendingGeneration> {
        self.lock().deferred.pending()
    }

    pub fn set_reference(&self, attribute: Attribute, image: ImageBlob) {
        let summary = image_summary(&image);
        let cleared = image.is_empty();
        self.lock().memory.set(attribute, image);
        if cleared {
            self.record_cleared(attribute);
        } else {
            emit(
                &self.events,
                events::REFERENCE_SET,
                json!({
                    "attribute": attribute.as_str(),
                    "source": "upload",
                    "image": summary,
                }),
            );
        }
    }

    /// Accepts a bare base64 payload or a data URI; only raw bytes are kept.
    pub fn set_reference_encoded(
        &self,
        attribute: Attribute,
        encoded: &str,
        fallback_mime: &str,
    ) -> Result<(), base64::DecodeError> {
        let image = ImageBlob::from_encoded(encoded, fallback_mime)?;
        self.set_reference(attribute, image);
        Ok(())
    }

    pub fn clear_reference(&self, attribute: Attribute) {
        self.lock().memory.clear(attribute);
        self.record_cleared(attribute);
    }

    fn record_cleared(&self, attribute: Attribute) {
        emit(
            &self.events,
            events::REFERENCE_CLEARED,
            json!({ "attribute": attribute.as_str() }),
        );
    }

    pub fn reset_memory(&self) {
        self.lock().memory.clear_all();
        emit(&self.events, events::MEMORY_RESET, json!({ "source": "caller" }));
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.lock().memory.snapshot()
    }

    pub fn settings(&self) -> ConsistencySettings {
        self.lock().settings
    }

    pub fn set_attribute_mode(&self, attribute: Attribute, mode: AttributeMode) {
        self.lock().settings.set_mode(attribute, mode);
    }

    pub fn extract_reference(&self, attribute: Attribute, image: &ImageBlob) -> GenerationResult {
        self.extract_reference_with_cancel(attribute, image, &CancelToken::new())
    }

    pub fn extract_reference_with_cancel(
        &self,
        attribute: Attribute,
        image: &ImageBlob,
        cancel: &CancelToken,
    ) -> GenerationResult {
        let message_id = Uuid::new_v4().to_string();
        let mut state = self.lock();
        self.dispatcher(cancel)
            .extract(&mut state, &message_id, attribute, image)
    }

    pub fn resize(
        &self,
        image: &ImageBlob,
        ratio_text: &str,
        original_prompt: Option<&str>,
    ) -> GenerationResult {
        let message_id = Uuid::new_v4().to_string();
        let _state = self.lock();
        self.dispatcher(&CancelToken::new())
            .resize(&message_id, image, ratio_text, original_prompt)
    }

    pub fn speak(&self, text: &str) -> Result<AudioClip, StudioError> {
        let _state = self.lock();
        self.dispatcher(&CancelToken::new())
            .speak(text)
            .inspect_err(|err| warn!(session = self.id.as_str(), "speech failed: {err}"))
    }
}

/// Registry of independent sessions over one shared gateway.
pub struct Studio {
    gateway: Arc<dyn ModelGateway>,
    policy: Arc<DispatchPolicy>,
    events_dir: Option<PathBuf>,
    sessions: Mutex<BTreeMap<String, Arc<Session>>>,
}

impl Studio {
    pub fn new(gateway: Arc<dyn ModelGateway>, policy: DispatchPolicy) -> Self {
        Self {
            gateway,
            policy: Arc::new(policy),
            events_dir: None,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Each session appends to `<dir>/<session_id>/events.jsonl`.
    pub fn with_events_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.events_dir = Some(dir.into());
        self
    }

    fn sessions(&self) -> MutexGuard<'_, BTreeMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_session(&self) -> Arc<Session> {
        let id = Uuid::new_v4().to_string();
        let writer = match self.events_dir.as_ref() {
            Some(dir) => EventWriter::new(dir.join(&id).join("events.jsonl"), id.as_str()),
            None => EventWriter::disabled(id.as_str()),
        };
        emit(
            &writer,
            events::SESSION_STARTED,
            json!({ "gateway": self.gateway.name() }),
        );
        let session = Arc::new(Session::new(
            id.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.policy),
            writer,
        ));
        self.sessions().insert(id, Arc::clone(&session));
        session
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions().get(id).cloned()
    }

    pub fn close_session(&self, id: &str) -> bool {
        self.sessions().remove(id).is_some()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions().keys().cloned().collect()
    }
}
