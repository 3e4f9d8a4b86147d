//! Transcript access and commander-triggered turns.

use tracing::info;

use legion_types::channel::{Channel, ChannelId};
use legion_types::error::LegionError;
use legion_types::event::LegionEvent;
use legion_types::message::{ChatMessage, MessageId};

use crate::storage::KvStore;
use crate::turn::{BatchMode, BatchReport, Trigger, run_batch};

use super::{LegionService, run_detached};

impl<K: KvStore + 'static> LegionService<K> {
    pub fn list_messages(&self, channel: &ChannelId) -> Result<Vec<ChatMessage>, LegionError> {
        self.state.channels.get(channel)?;
        Ok(self.state.transcripts.list(channel))
    }

    /// Post a commander message and run one full batch against it.
    ///
    /// Returns once every speaker has finished. Progress is reported to the
    /// service observer as it happens. The batch runs on its own task, so
    /// dropping the returned future does not cut a turn short.
    pub async fn submit_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<BatchReport, LegionError> {
        let channel = self.state.channels.get(channel_id)?;
        if !channel.is_postable() {
            return Err(LegionError::validation(format!(
                "#{} is a system log and does not accept messages",
                channel.name
            )));
        }
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(LegionError::validation("message content cannot be blank"));
        }

        let service = self.clone();
        run_detached(async move { service.commander_batch(channel, content).await }).await
    }

    async fn commander_batch(&self, channel: Channel, content: String) -> BatchReport {
        // Marks the channel busy so an autonomous tick defers to this batch.
        let _guard = self.autonomous.try_begin(channel.id);

        let commander = self.state.commander().to_string();
        let message = ChatMessage::commander(channel.id, &commander, &content);
        self.state.record(message, self.observer.as_ref()).await;
        info!(channel = %channel.name, sender = %commander, "Commander message posted");

        let trigger = Trigger {
            sender: commander,
            content,
        };
        run_batch(
            &self.state,
            self.observer.as_ref(),
            &channel,
            &trigger,
            BatchMode::Commander,
        )
        .await
    }

    /// Replace a finalized message's content, keeping its id and timestamp.
    pub async fn edit_message(
        &self,
        channel: &ChannelId,
        id: &MessageId,
        content: &str,
    ) -> Result<ChatMessage, LegionError> {
        self.state.channels.get(channel)?;
        let edited = self.state.transcripts.edit(channel, id, content)?;
        self.state.persist_messages(channel).await;
        self.observer.on_message(&edited);
        Ok(edited)
    }

    pub async fn delete_message(
        &self,
        channel: &ChannelId,
        id: &MessageId,
    ) -> Result<ChatMessage, LegionError> {
        self.state.channels.get(channel)?;
        let removed = self.state.transcripts.delete(channel, id)?;
        self.state.persist_messages(channel).await;
        self.state.events.publish(LegionEvent::MessageDeleted {
            channel_id: *channel,
            message_id: *id,
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use legion_types::channel::{Channel, ChannelKind, CreateChannelRequest};
    use legion_types::message::{MessageState, SenderKind};
    use legion_types::minion::MinionStatus;

    use super::*;
    use crate::storage::keys;
    use crate::testing::{
        MemoryKvStore, ScriptedFactory, ScriptedReply, force_opinion, minion_request,
        opinion_responder, service_over, speak_json, test_service,
    };

    async fn channel(
        service: &LegionService<MemoryKvStore>,
        name: &str,
        kind: ChannelKind,
        members: &[&str],
    ) -> Channel {
        service
            .add_channel(CreateChannelRequest {
                name: name.to_string(),
                description: String::new(),
                kind,
                members: members.iter().map(|m| m.to_string()).collect(),
                auto_mode_delay: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn system_log_rejects_commander_messages() {
        let (service, _observer, _store) = test_service(ScriptedFactory::default()).await;
        let log = channel(&service, "legion-log", ChannelKind::SystemLog, &[]).await;
        let err = service.submit_message(&log.id, "hello").await.unwrap_err();
        assert!(matches!(err, LegionError::Validation(_)));
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let (service, _observer, _store) = test_service(ScriptedFactory::default()).await;
        let general = channel(&service, "general", ChannelKind::Group, &[]).await;
        let err = service.submit_message(&general.id, "   ").await.unwrap_err();
        assert!(matches!(err, LegionError::Validation(_)));
        assert!(service.list_messages(&general.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_runs_a_full_batch_and_persists() {
        let factory = ScriptedFactory::with_responder(|request| {
            if request.output_config.is_some() {
                ScriptedReply::Structured(speak_json("Say hi back.", 700, &[("Steven", 70)]))
            } else {
                ScriptedReply::Stream(vec!["Hi, ".to_string(), "Commander!".to_string()])
            }
        });
        let (service, observer, store) = test_service(factory).await;
        service.add_credential("Main", "key-main").await.unwrap();
        service.add_minion(minion_request("Alpha")).await.unwrap();
        let general = channel(&service, "general", ChannelKind::Group, &["Alpha"]).await;
        let log = channel(&service, "legion-log", ChannelKind::SystemLog, &[]).await;

        let report = service.submit_message(&general.id, "Hello legion").await.unwrap();

        assert_eq!(report.responses.len(), 1);
        let messages = service.list_messages(&general.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender_kind, SenderKind::Commander);
        assert_eq!(messages[1].content, "Hi, Commander!");
        assert_eq!(messages[1].state, MessageState::Finalized);

        // Audit records went to the log channel, not the conversation.
        assert_eq!(service.list_messages(&log.id).unwrap().len(), 2);
        assert_eq!(observer.credential_logs().len(), 2);

        let persisted: Vec<ChatMessage> =
            serde_json::from_str(&store.raw(&keys::messages(&general.id)).unwrap()).unwrap();
        assert_eq!(persisted, messages);
        let alpha = service.state().roster.get_by_name("Alpha").unwrap();
        assert_eq!(alpha.opinions["Steven"], 70);
    }

    #[tokio::test]
    async fn edit_and_delete() {
        let (service, observer, _store) = test_service(ScriptedFactory::default()).await;
        let general = channel(&service, "general", ChannelKind::Group, &[]).await;
        service.submit_message(&general.id, "first draft").await.unwrap();
        let original = service.list_messages(&general.id).unwrap()[0].clone();

        let edited = service
            .edit_message(&general.id, &original.id, "second draft")
            .await
            .unwrap();
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.created_at, original.created_at);
        assert_eq!(edited.content, "second draft");
        assert_eq!(observer.messages().last().unwrap().content, "second draft");

        service.delete_message(&general.id, &original.id).await.unwrap();
        let err = service
            .delete_message(&general.id, &original.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LegionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let factory = ScriptedFactory::with_responder(|request| {
            if request.output_config.is_some() {
                ScriptedReply::Structured(speak_json("Reply.", 500, &[("Steven", 64)]))
            } else {
                ScriptedReply::Stream(vec!["Noted.".to_string()])
            }
        });
        let (service, _observer, store) = test_service(factory.clone()).await;
        service.add_credential("Main", "key-main").await.unwrap();
        service.add_minion(minion_request("Alpha")).await.unwrap();
        let general = channel(&service, "general", ChannelKind::Group, &["Alpha"]).await;
        service.submit_message(&general.id, "Status?").await.unwrap();

        let (reloaded, _observer) = service_over(store, factory).await;

        assert_eq!(reloaded.list_channels(), service.list_channels());
        assert_eq!(reloaded.list_minions(), service.list_minions());
        assert_eq!(reloaded.list_credentials(), service.list_credentials());
        assert_eq!(
            reloaded.list_messages(&general.id).unwrap(),
            service.list_messages(&general.id).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn turn_completes_after_caller_stops_waiting() {
        let factory = ScriptedFactory::with_responder(|request| {
            if request.output_config.is_some() {
                ScriptedReply::Structured(speak_json("Say hello.", 500, &[]))
            } else {
                ScriptedReply::StreamWithPause {
                    before: vec!["Hal".to_string()],
                    pause: Duration::from_secs(30),
                    after: vec!["lo there.".to_string()],
                }
            }
        });
        let (service, observer, store) = test_service(factory).await;
        service.add_credential("Main", "key-main").await.unwrap();
        service.add_minion(minion_request("Alpha")).await.unwrap();
        let general = channel(&service, "general", ChannelKind::Group, &["Alpha"]).await;

        // The caller gives up while Alpha is mid-stream, like a disconnected client.
        let waited =
            tokio::time::timeout(Duration::from_secs(5), service.submit_message(&general.id, "Hi"))
                .await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;

        let alpha_reply = |messages: &[ChatMessage]| {
            messages
                .iter()
                .find(|m| m.sender_name == "Alpha")
                .cloned()
                .unwrap()
        };
        let reply = alpha_reply(&service.list_messages(&general.id).unwrap());
        assert_eq!(reply.state, MessageState::Finalized);
        assert_eq!(reply.content, "Hallo there.");
        assert_eq!(observer.statuses("Alpha").last(), Some(&MinionStatus::Idle));
        assert_eq!(
            service.state().roster.get_by_name("Alpha").unwrap().status,
            MinionStatus::Idle
        );

        let persisted: Vec<ChatMessage> =
            serde_json::from_str(&store.raw(&keys::messages(&general.id)).unwrap()).unwrap();
        assert_eq!(alpha_reply(&persisted).state, MessageState::Finalized);
    }

    /// Opinion of the sender drives how often a minion chooses to speak.
    #[tokio::test]
    async fn warmer_minion_speaks_far_more_often() {
        const TRIALS: usize = 200;

        let (service, _observer, _store) =
            test_service(ScriptedFactory::with_responder(opinion_responder(7))).await;
        service.add_credential("Main", "key-main").await.unwrap();
        service.add_minion(minion_request("Alpha")).await.unwrap();
        service.add_minion(minion_request("Bravo")).await.unwrap();
        let general = channel(&service, "general", ChannelKind::Group, &["Alpha", "Bravo"]).await;

        force_opinion(service.state(), "Alpha", "Steven", 80);
        force_opinion(service.state(), "Bravo", "Steven", 10);

        let (mut alpha, mut bravo) = (0, 0);
        for _ in 0..TRIALS {
            let report = service
                .submit_message(&general.id, "What does everyone think?")
                .await
                .unwrap();
            for message in &report.responses {
                match message.sender_name.as_str() {
                    "Alpha" => alpha += 1,
                    "Bravo" => bravo += 1,
                    _ => {}
                }
            }
        }

        assert!((130..=190).contains(&alpha), "Alpha spoke {alpha} times");
        assert!((3..=45).contains(&bravo), "Bravo spoke {bravo} times");
        assert!(alpha > bravo * 3);

        // The stub never moves opinions, so the odds held for every trial.
        let alpha_state = service.state().roster.get_by_name("Alpha").unwrap();
        assert_eq!(alpha_state.opinions["Steven"], 80);
    }
}
