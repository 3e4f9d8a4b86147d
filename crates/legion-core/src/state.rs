//! Shared engine state and the write paths every stage goes through.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use legion_types::channel::{Channel, ChannelId, ChannelKind, CreateChannelRequest};
use legion_types::config::LegionConfig;
use legion_types::credential::{Credential, KeySelection};
use legion_types::message::ChatMessage;
use legion_types::minion::Minion;

use crate::channel::ChannelDirectory;
use crate::credential::CredentialPool;
use crate::emotion::MinionRoster;
use crate::event::EventBus;
use crate::llm::ModelGateway;
use crate::observer::TurnObserver;
use crate::storage::{KvStore, Persistence, keys};
use crate::transcript::TranscriptStore;

/// Which model call an audit record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Perception,
    Response,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Perception => write!(f, "Perception"),
            Stage::Response => write!(f, "Response"),
        }
    }
}

pub struct LegionState<K: KvStore> {
    pub config: LegionConfig,
    pub roster: MinionRoster,
    pub channels: ChannelDirectory,
    pub transcripts: TranscriptStore,
    pub credentials: CredentialPool,
    pub gateway: ModelGateway,
    pub events: EventBus,
    persistence: Persistence<K>,
    /// Serializes snapshot-then-write so a stale snapshot never lands last.
    write_gate: Mutex<()>,
}

impl<K: KvStore> LegionState<K> {
    /// Load every collection from `store`, seeding default channels on first start.
    pub async fn load(
        store: K,
        gateway: ModelGateway,
        config: LegionConfig,
        events: EventBus,
    ) -> Self {
        let persistence = Persistence::new(store);

        let minions: Vec<Minion> = persistence.load(keys::MINIONS).await;
        let channels: Vec<Channel> = persistence.load(keys::CHANNELS).await;
        let credentials: Vec<Credential> = persistence.load(keys::CREDENTIALS).await;

        let mut logs = HashMap::new();
        for channel in &channels {
            let log: Vec<ChatMessage> = persistence.load(&keys::messages(&channel.id)).await;
            logs.insert(channel.id, log);
        }

        info!(
            minions = minions.len(),
            channels = channels.len(),
            credentials = credentials.len(),
            "Loaded legion state"
        );

        let state = Self {
            roster: MinionRoster::new(minions),
            channels: ChannelDirectory::new(channels),
            transcripts: TranscriptStore::new(logs),
            credentials: CredentialPool::new(credentials),
            gateway,
            events,
            persistence,
            write_gate: Mutex::new(()),
            config,
        };

        if state.config.seed_default_channels && state.channels.is_empty() {
            state.seed_default_channels().await;
        }
        state
    }

    async fn seed_default_channels(&self) {
        let defaults = [
            ("general", "Commander and minions", ChannelKind::Group),
            ("legion-log", "Credential usage and diagnostics", ChannelKind::SystemLog),
        ];
        for (name, description, kind) in defaults {
            let request = CreateChannelRequest {
                name: name.to_string(),
                description: description.to_string(),
                kind,
                members: Vec::new(),
                auto_mode_delay: None,
            };
            if let Ok(channel) = self.channels.add(request, |_| false) {
                debug!(channel = %channel.name, "Seeded default channel");
            }
        }
        self.persist_channels().await;
    }

    pub fn commander(&self) -> &str {
        &self.config.commander_name
    }

    pub async fn persist_minions(&self) {
        let _gate = self.write_gate.lock().await;
        self.persistence.save(keys::MINIONS, &self.roster.list()).await;
    }

    pub async fn persist_channels(&self) {
        let _gate = self.write_gate.lock().await;
        self.persistence.save(keys::CHANNELS, &self.channels.list()).await;
    }

    pub async fn persist_credentials(&self) {
        let _gate = self.write_gate.lock().await;
        self.persistence
            .save(keys::CREDENTIALS, &self.credentials.snapshot())
            .await;
    }

    pub async fn persist_messages(&self, channel: &ChannelId) {
        let _gate = self.write_gate.lock().await;
        self.persistence
            .save(&keys::messages(channel), &self.transcripts.list(channel))
            .await;
    }

    pub async fn forget_messages(&self, channel: &ChannelId) {
        let _gate = self.write_gate.lock().await;
        self.transcripts.drop_channel(channel);
        self.persistence.remove(&keys::messages(channel)).await;
    }

    /// Store a conversational message, persist its channel, and report it.
    pub async fn record(&self, message: ChatMessage, observer: &dyn TurnObserver) {
        let channel = message.channel_id;
        observer.on_message(&message);
        self.transcripts.upsert(message);
        self.persist_messages(&channel).await;
    }

    /// Store a system notice, persist its channel, and report it.
    ///
    /// System-log channels keep only the newest `system_log_retention` entries.
    pub async fn notice(&self, message: ChatMessage, observer: &dyn TurnObserver) {
        let channel = message.channel_id;
        observer.on_notice(&message);
        self.transcripts.upsert(message);
        self.trim_system_log(&channel);
        self.persist_messages(&channel).await;
    }

    fn trim_system_log(&self, channel: &ChannelId) {
        let keep = self.config.system_log_retention;
        if keep == 0 {
            return;
        }
        let is_log = self
            .channels
            .get(channel)
            .is_ok_and(|c| c.kind == ChannelKind::SystemLog);
        if is_log {
            let dropped = self.transcripts.retain_newest(channel, keep);
            if dropped > 0 {
                trace!(channel = %channel, dropped, "Trimmed system log");
            }
        }
    }

    /// Emit the credential audit record for one model call.
    ///
    /// Routed to the first system-log channel when one exists so audit noise
    /// stays out of conversations.
    pub async fn audit(
        &self,
        origin: &ChannelId,
        minion: &str,
        selection: &KeySelection,
        stage: Stage,
        observer: &dyn TurnObserver,
    ) {
        let target = self.channels.system_log().unwrap_or(*origin);
        let text = format!(
            "{minion} is using key '{}' ({}) for {stage}.",
            selection.label(),
            selection.method
        );
        debug!(minion, stage = %stage, method = %selection.method, "Credential selected");
        self.notice(ChatMessage::credential_log(target, text), observer).await;
    }
}
