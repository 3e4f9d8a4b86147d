//! Response stage: a minion with an approved plan streams its line.

use futures_util::StreamExt;
use tracing::{info, warn};

use legion_types::channel::ChannelId;
use legion_types::diary::PerceptionPlan;
use legion_types::message::ChatMessage;
use legion_types::minion::{Minion, MinionStatus};

use crate::llm::gateway::TextChunk;
use crate::llm::ModelCall;
use crate::observer::TurnObserver;
use crate::state::{LegionState, Stage};
use crate::storage::KvStore;

use super::prompt::response_prompt;

/// Generate and stream one minion's reply into `channel`.
///
/// Always returns the message in its terminal state: finalized with the
/// plan attached, or errored with the failure text.
pub async fn respond<K: KvStore>(
    state: &LegionState<K>,
    observer: &dyn TurnObserver,
    channel: &ChannelId,
    minion: &Minion,
    plan: &PerceptionPlan,
    response_plan: &str,
    history: &str,
) -> ChatMessage {
    let selection = state.credentials.select(minion.credential_id.as_ref());
    state
        .audit(channel, &minion.name, &selection, Stage::Response, observer)
        .await;

    let mut message = ChatMessage::streaming(*channel, &minion.name);
    state.record(message.clone(), observer).await;

    let Some(credential) = selection.credential else {
        message.fail(format!(
            "{} could not respond: no usable credential is configured.",
            minion.name
        ));
        state.record(message.clone(), observer).await;
        return message;
    };

    let call = ModelCall {
        prompt: response_prompt(minion, &plan.selected_response_mode, response_plan, history),
        model_id: minion.model_id.clone(),
        temperature: minion.temperature,
        api_key: credential.secret.clone(),
        system_instruction: Some(minion.persona.clone()),
        minion: minion.name.clone(),
    };

    state.roster.set_status(&minion.name, MinionStatus::Composing);
    observer.on_status(channel, &minion.name, MinionStatus::Composing);

    let mut stream = state.gateway.generate_streamed(&call);
    let mut accumulated = String::new();
    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(TextChunk::Delta(text)) => {
                accumulated.push_str(&text);
                message.content.clone_from(&accumulated);
                state.transcripts.upsert(message.clone());
                observer.on_delta(channel, &message.id, &text);
            }
            Ok(TextChunk::End) => break,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let reply = accumulated.trim();
    match failure {
        Some(error) => {
            warn!(minion = %minion.name, error = %error, "Response stream failed");
            message.fail(format!("{} failed to respond: {error}", minion.name));
        }
        None if reply.is_empty() => {
            warn!(minion = %minion.name, "Response stream produced no text");
            message.fail(format!("{} returned an empty response.", minion.name));
        }
        None => {
            info!(minion = %minion.name, chars = reply.len(), "Response finalized");
            message.finalize(reply, Some(plan.clone()));
        }
    }

    state.roster.set_status(&minion.name, MinionStatus::Idle);
    observer.on_status(channel, &minion.name, MinionStatus::Idle);
    state.record(message.clone(), observer).await;
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingObserver, ScriptedFactory, ScriptedReply, TestLegion};
    use legion_types::diary::TurnDecision;
    use legion_types::message::MessageState;
    use legion_types::minion::OpinionMap;

    fn plan() -> PerceptionPlan {
        PerceptionPlan {
            perception_analysis: "Steven wants news.".to_string(),
            opinion_updates: vec![],
            final_opinions: OpinionMap::new(),
            selected_response_mode: "Friendly/Proactive".to_string(),
            personal_notes: None,
            decision: TurnDecision::Speak {
                response_plan: "Share the news.".to_string(),
                predicted_response_time: 500,
            },
        }
    }

    #[tokio::test]
    async fn streams_then_finalizes_with_diary() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::Stream(vec![
            "  Big ".to_string(),
            "news! ".to_string(),
        ])]);
        let legion = TestLegion::new(factory.clone()).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let message = respond(
            legion.state(),
            &observer,
            &channel.id,
            &alpha,
            &plan(),
            "Share the news.",
            "[COMMANDER Steven]: news?",
        )
        .await;

        assert_eq!(message.state, MessageState::Finalized);
        assert_eq!(message.content, "Big news!");
        assert_eq!(message.diary, Some(plan()));
        assert_eq!(observer.deltas(), vec!["  Big ", "news! "]);

        // Placeholder first, then the finalized replacement under the same id.
        let upserts = observer.messages();
        assert!(upserts.first().unwrap().is_in_progress());
        assert_eq!(upserts.last().unwrap().id, message.id);

        let log = legion.state().transcripts.list(&channel.id);
        let conversational: Vec<_> = log.iter().filter(|m| !m.is_credential_log).collect();
        assert_eq!(conversational.len(), 1);

        let request = factory.requests().pop().unwrap();
        assert!(request.stream);
        assert_eq!(request.system.as_deref(), Some(alpha.persona.as_str()));
        assert!(observer.credential_logs()[0].ends_with("for Response."));
    }

    #[tokio::test]
    async fn stream_error_finalizes_as_error() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::StreamThenFail(
            vec!["Partial".to_string()],
            "connection reset".to_string(),
        )]);
        let legion = TestLegion::new(factory).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let message = respond(legion.state(), &observer, &channel.id, &alpha, &plan(), "x", "").await;

        assert!(message.is_error());
        assert!(!message.is_in_progress());
        assert!(message.content.contains("connection reset"));
        assert!(message.diary.is_none());
        assert_eq!(
            observer.statuses("Alpha"),
            vec![MinionStatus::Composing, MinionStatus::Idle]
        );
    }

    #[tokio::test]
    async fn empty_stream_is_an_error() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::Stream(vec!["   ".to_string()])]);
        let legion = TestLegion::new(factory).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);

        let message = respond(
            legion.state(),
            &RecordingObserver::default(),
            &channel.id,
            &alpha,
            &plan(),
            "x",
            "",
        )
        .await;
        assert!(message.is_error());
        assert!(message.content.contains("empty response"));
    }

    #[tokio::test]
    async fn no_credential_short_circuits() {
        let factory = ScriptedFactory::new(vec![]);
        let legion = TestLegion::new(factory.clone()).await;
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let message = respond(legion.state(), &observer, &channel.id, &alpha, &plan(), "x", "").await;

        assert!(message.is_error());
        assert!(factory.calls().is_empty());
        assert!(observer.statuses("Alpha").is_empty());
    }
}
