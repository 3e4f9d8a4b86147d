//! Test doubles shared by the engine's unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use legion_types::channel::{Channel, ChannelId, ChannelKind, CreateChannelRequest};
use legion_types::config::LegionConfig;
use legion_types::credential::Credential;
use legion_types::diary::{PerceptionPlan, TurnDecision};
use legion_types::error::RepositoryError;
use legion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};
use legion_types::message::{ChatMessage, MessageId};
use legion_types::minion::{
    CreateMinionRequest, Minion, MinionId, MinionStatus, OpinionMap,
};

use crate::event::EventBus;
use crate::llm::{BoxLlmProvider, LlmProvider, LlmStream, ModelGateway, ProviderFactory};
use crate::observer::TurnObserver;
use crate::service::LegionService;
use crate::state::LegionState;
use crate::storage::KvStore;
use crate::turn::prompt::{MINION_MARKER, OPINIONS_MARKER, SENDER_MARKER};

// --- Scripted model provider ---

/// What the fake model does for one call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// A complete body for a structured call.
    Structured(String),
    /// Text deltas followed by a clean end of stream.
    Stream(Vec<String>),
    /// Text deltas followed by a stream error.
    StreamThenFail(Vec<String>, String),
    /// Some deltas, a pause, then the rest and a clean end.
    StreamWithPause {
        before: Vec<String>,
        pause: Duration,
        after: Vec<String>,
    },
    /// The provider rejects the call.
    Fail(String),
}

type Responder = Arc<dyn Fn(&CompletionRequest) -> ScriptedReply + Send + Sync>;

#[derive(Default)]
struct Script {
    queue: VecDeque<ScriptedReply>,
    responder: Option<Responder>,
    calls: Vec<(String, CompletionRequest)>,
}

/// Provider factory that answers from a queue or a closure and records every call.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queue: replies.into(),
                ..Default::default()
            })),
        }
    }

    pub fn with_responder(
        responder: impl Fn(&CompletionRequest) -> ScriptedReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                responder: Some(Arc::new(responder)),
                ..Default::default()
            })),
        }
    }

    /// `(api_key, request)` for every model call, in call order.
    pub fn calls(&self) -> Vec<(String, CompletionRequest)> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.calls().into_iter().map(|(_, request)| request).collect()
    }

    fn next_reply(&self, api_key: &str, request: &CompletionRequest) -> ScriptedReply {
        let responder = {
            let mut script = self.script.lock().unwrap();
            script.calls.push((api_key.to_string(), request.clone()));
            if let Some(reply) = script.queue.pop_front() {
                return reply;
            }
            script.responder.clone()
        };
        match responder {
            Some(responder) => responder(request),
            None => ScriptedReply::Fail("no scripted reply".to_string()),
        }
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, api_key: &str) -> Result<BoxLlmProvider, LlmError> {
        Ok(BoxLlmProvider::new(ScriptedProvider {
            factory: self.clone(),
            api_key: api_key.to_string(),
            capabilities: ProviderCapabilities {
                streaming: true,
                structured_output: true,
                max_context_tokens: 1_000_000,
                max_output_tokens: 8192,
            },
        }))
    }
}

struct ScriptedProvider {
    factory: ScriptedFactory,
    api_key: String,
    capabilities: ProviderCapabilities,
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let reply = self.factory.next_reply(&self.api_key, request);
        let model = request.model.clone();
        async move {
            let content = match reply {
                ScriptedReply::Structured(body) => body,
                ScriptedReply::Stream(chunks) => chunks.concat(),
                ScriptedReply::StreamWithPause { before, after, .. } => {
                    [before, after].concat().concat()
                }
                ScriptedReply::StreamThenFail(_, message) | ScriptedReply::Fail(message) => {
                    return Err(LlmError::Provider { message });
                }
            };
            Ok(CompletionResponse {
                id: "scripted".to_string(),
                content,
                model,
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }
    }

    fn stream(&self, request: CompletionRequest) -> LlmStream {
        let reply = self.factory.next_reply(&self.api_key, &request);
        Box::pin(async_stream::stream! {
            let (chunks, pause, rest, failure) = match reply {
                ScriptedReply::Structured(body) => (vec![body], None, Vec::new(), None),
                ScriptedReply::Stream(chunks) => (chunks, None, Vec::new(), None),
                ScriptedReply::StreamWithPause { before, pause, after } => {
                    (before, Some(pause), after, None)
                }
                ScriptedReply::StreamThenFail(chunks, message) => {
                    (chunks, None, Vec::new(), Some(message))
                }
                ScriptedReply::Fail(message) => {
                    yield Err(LlmError::Provider { message });
                    return;
                }
            };
            yield Ok(StreamEvent::Connected);
            for text in chunks {
                yield Ok(StreamEvent::TextDelta { index: 0, text });
            }
            if let Some(pause) = pause {
                tokio::time::sleep(pause).await;
            }
            for text in rest {
                yield Ok(StreamEvent::TextDelta { index: 0, text });
            }
            if let Some(message) = failure {
                yield Err(LlmError::Stream(message));
                return;
            }
            yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
            yield Ok(StreamEvent::Done);
        })
    }
}

// --- Perception reply builders ---

fn opinions_json(opinions: &[(&str, u8)]) -> serde_json::Value {
    opinions
        .iter()
        .map(|(name, score)| (name.to_string(), serde_json::json!(score)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

pub fn speak_json(plan: &str, latency_ms: u64, opinions: &[(&str, u8)]) -> String {
    serde_json::json!({
        "perceptionAnalysis": "Something worth answering.",
        "opinionUpdates": [],
        "finalOpinions": opinions_json(opinions),
        "selectedResponseMode": "Friendly/Proactive",
        "action": "SPEAK",
        "responsePlan": plan,
        "predictedResponseTime": latency_ms,
    })
    .to_string()
}

pub fn silent_json(opinions: &[(&str, u8)]) -> String {
    serde_json::json!({
        "perceptionAnalysis": "Nothing to add.",
        "opinionUpdates": [],
        "finalOpinions": opinions_json(opinions),
        "selectedResponseMode": "Wary/Reluctant",
        "action": "STAY_SILENT",
        "responsePlan": "",
    })
    .to_string()
}

fn quoted_after(prompt: &str, marker: &str) -> Option<String> {
    let rest = prompt.split(marker).nth(1)?.trim_start().strip_prefix('"')?;
    rest.split('"').next().map(str::to_string)
}

/// Name of the minion a prompt was rendered for.
pub fn perception_minion(prompt: &str) -> Option<String> {
    quoted_after(prompt, MINION_MARKER)
}

/// A responder that behaves like a well-mannered model: a minion speaks with
/// probability equal to its opinion of the sender, and its latency shrinks as
/// the opinion grows. Opinions are never changed.
pub fn opinion_responder(
    seed: u64,
) -> impl Fn(&CompletionRequest) -> ScriptedReply + Send + Sync + 'static {
    let rng = Mutex::new(StdRng::seed_from_u64(seed));
    move |request| {
        let prompt = &request.messages[0].content;
        let name = perception_minion(prompt).unwrap_or_default();
        if request.output_config.is_none() {
            return ScriptedReply::Stream(vec![format!("{name} here.")]);
        }
        let sender = quoted_after(prompt, SENDER_MARKER).unwrap_or_default();
        let opinions: BTreeMap<String, u8> = prompt
            .lines()
            .find_map(|line| line.split(OPINIONS_MARKER).nth(1))
            .and_then(|json| serde_json::from_str(json.trim()).ok())
            .unwrap_or_default();
        let score = opinions.get(&sender).copied().unwrap_or(50);
        let roll: u8 = rng.lock().unwrap().random_range(0..100);
        if roll < score {
            let latency = 500 + u64::from(100 - score) * 20;
            ScriptedReply::Structured(speak_json("Answer the sender.", latency, &[]))
        } else {
            ScriptedReply::Structured(silent_json(&[]))
        }
    }
}

// --- In-memory key-value store ---

/// Shared-state store; clones see the same map.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryKvStore {
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// --- Recording observer ---

#[derive(Default)]
struct Recorded {
    messages: Vec<ChatMessage>,
    notices: Vec<ChatMessage>,
    deltas: Vec<String>,
    statuses: Vec<(String, MinionStatus)>,
}

#[derive(Default)]
pub struct RecordingObserver {
    recorded: Mutex<Recorded>,
}

impl RecordingObserver {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.recorded.lock().unwrap().messages.clone()
    }

    /// System notices other than credential audit records.
    pub fn notices(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .notices
            .iter()
            .filter(|m| !m.is_credential_log)
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn error_notices(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .notices
            .iter()
            .filter(|m| m.is_error())
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn credential_logs(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .notices
            .iter()
            .filter(|m| m.is_credential_log)
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn deltas(&self) -> Vec<String> {
        self.recorded.lock().unwrap().deltas.clone()
    }

    pub fn statuses(&self, minion: &str) -> Vec<MinionStatus> {
        self.recorded
            .lock()
            .unwrap()
            .statuses
            .iter()
            .filter(|(name, _)| name == minion)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl TurnObserver for RecordingObserver {
    fn on_message(&self, message: &ChatMessage) {
        self.recorded.lock().unwrap().messages.push(message.clone());
    }

    fn on_delta(&self, _channel: &ChannelId, _message: &MessageId, text: &str) {
        self.recorded.lock().unwrap().deltas.push(text.to_string());
    }

    fn on_status(&self, _channel: &ChannelId, minion: &str, status: MinionStatus) {
        self.recorded
            .lock()
            .unwrap()
            .statuses
            .push((minion.to_string(), status));
    }

    fn on_notice(&self, message: &ChatMessage) {
        self.recorded.lock().unwrap().notices.push(message.clone());
    }
}

// --- Engine fixture ---

pub fn test_config() -> LegionConfig {
    LegionConfig {
        seed_default_channels: false,
        ..LegionConfig::default()
    }
}

/// A loaded engine state over an in-memory store with no seeded channels.
pub struct TestLegion {
    pub store: MemoryKvStore,
    state: LegionState<MemoryKvStore>,
}

impl TestLegion {
    pub async fn new(factory: ScriptedFactory) -> Self {
        Self::with_config(factory, test_config()).await
    }

    pub async fn with_config(factory: ScriptedFactory, config: LegionConfig) -> Self {
        let store = MemoryKvStore::default();
        let gateway = ModelGateway::new(Arc::new(factory), 1024);
        let state = LegionState::load(store.clone(), gateway, config, EventBus::new(64)).await;
        Self { store, state }
    }

    pub fn state(&self) -> &LegionState<MemoryKvStore> {
        &self.state
    }

    pub fn add_credential(&self, name: &str) -> Credential {
        self.state
            .credentials
            .add(name, &format!("secret-{name}"))
            .unwrap()
    }

    pub fn add_minion(&self, name: &str) -> Minion {
        self.state
            .roster
            .add(
                minion_request(name),
                self.state.commander(),
                |id| self.state.credentials.contains(id),
            )
            .unwrap()
    }

    pub fn set_opinion(&self, minion: &str, participant: &str, score: u8) {
        force_opinion(&self.state, minion, participant, score);
    }

    pub fn group_channel(&self, members: &[&str]) -> Channel {
        self.channel(ChannelKind::Group, members)
    }

    pub fn swarm_channel(&self, members: &[&str]) -> Channel {
        self.channel(ChannelKind::AutonomousSwarm, members)
    }

    fn channel(&self, kind: ChannelKind, members: &[&str]) -> Channel {
        let request = CreateChannelRequest {
            name: format!("channel-{}", self.state.channels.list().len() + 1),
            description: String::new(),
            kind,
            members: members.iter().map(|m| m.to_string()).collect(),
            auto_mode_delay: None,
        };
        self.state
            .channels
            .add(request, |name| self.state.roster.contains_name(name))
            .unwrap()
    }

    /// A minion value that is not registered anywhere.
    pub fn detached_minion(name: &str) -> Minion {
        let now = Utc::now();
        Minion {
            id: MinionId::new(),
            name: name.to_string(),
            model_id: "gemini-2.5-flash".to_string(),
            model_name: None,
            persona: format!("{name} is curious."),
            temperature: 0.7,
            credential_id: None,
            opinions: OpinionMap::new(),
            last_diary: None,
            status: MinionStatus::Idle,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Force one opinion score, as if a perception call had produced it.
pub fn force_opinion<K: KvStore>(
    state: &LegionState<K>,
    minion: &str,
    participant: &str,
    score: u8,
) {
    let mut final_opinions = OpinionMap::new();
    final_opinions.insert(participant.to_string(), score);
    let plan = PerceptionPlan {
        perception_analysis: String::new(),
        opinion_updates: vec![],
        final_opinions,
        selected_response_mode: "Neutral/Standard".to_string(),
        personal_notes: None,
        decision: TurnDecision::StaySilent,
    };
    assert!(state.roster.apply_plan(minion, &plan));
}

pub fn minion_request(name: &str) -> CreateMinionRequest {
    CreateMinionRequest {
        name: name.to_string(),
        model_id: "gemini-2.5-flash".to_string(),
        model_name: None,
        persona: format!("{name} is curious."),
        temperature: 0.7,
        credential_id: None,
    }
}

/// A service over `store` that reports to a fresh [`RecordingObserver`].
pub async fn service_over(
    store: MemoryKvStore,
    factory: ScriptedFactory,
) -> (LegionService<MemoryKvStore>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let service = LegionService::load(store, Arc::new(factory), test_config(), EventBus::new(64))
        .await
        .with_observer(observer.clone());
    (service, observer)
}

pub async fn test_service(
    factory: ScriptedFactory,
) -> (LegionService<MemoryKvStore>, Arc<RecordingObserver>, MemoryKvStore) {
    let store = MemoryKvStore::default();
    let (service, observer) = service_over(store.clone(), factory).await;
    (service, observer, store)
}
