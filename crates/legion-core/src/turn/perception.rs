//! Perception stage: one minion decides how it feels and whether to speak.

use tracing::{info, warn};

use legion_types::channel::Channel;
use legion_types::diary::{PerceptionPlan, RawPerceptionPlan};
use legion_types::error::LegionError;
use legion_types::message::ChatMessage;
use legion_types::minion::{Minion, MinionStatus};

use crate::llm::ModelCall;
use crate::observer::TurnObserver;
use crate::state::{LegionState, Stage};
use crate::storage::KvStore;

use super::prompt::PerceptionPrompt;

/// The message a batch reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub sender: String,
    pub content: String,
}

/// Result of one minion's perception call.
#[derive(Debug)]
pub enum PerceptionOutcome {
    /// The model returned a valid plan; emotional state has been updated.
    Planned { minion: Minion, plan: PerceptionPlan },
    /// The minion wrote the trigger itself and was not asked.
    SelfTrigger { minion: Minion },
    /// The call failed; a diagnostic has already been posted.
    Failed { minion: Minion, error: LegionError },
}

impl PerceptionOutcome {
    pub fn minion(&self) -> &Minion {
        match self {
            PerceptionOutcome::Planned { minion, .. }
            | PerceptionOutcome::SelfTrigger { minion }
            | PerceptionOutcome::Failed { minion, .. } => minion,
        }
    }
}

pub async fn perceive<K: KvStore>(
    state: &LegionState<K>,
    observer: &dyn TurnObserver,
    channel: &Channel,
    minion: Minion,
    trigger: &Trigger,
    history: &str,
) -> PerceptionOutcome {
    if minion.name == trigger.sender {
        return PerceptionOutcome::SelfTrigger { minion };
    }

    let selection = state.credentials.select(minion.credential_id.as_ref());
    state
        .audit(&channel.id, &minion.name, &selection, Stage::Perception, observer)
        .await;

    let Some(credential) = selection.credential else {
        let error = LegionError::CredentialUnavailable {
            minion: minion.name.clone(),
        };
        report_failure(state, observer, channel, &minion, &error).await;
        return PerceptionOutcome::Failed { minion, error };
    };

    let prompt = PerceptionPrompt {
        minion: &minion,
        channel_kind: channel.kind,
        commander: state.commander(),
        trigger_sender: &trigger.sender,
        trigger_content: &trigger.content,
        history,
    }
    .render();

    let call = ModelCall {
        prompt,
        model_id: minion.model_id.clone(),
        temperature: minion.temperature,
        api_key: credential.secret.clone(),
        system_instruction: None,
        minion: minion.name.clone(),
    };

    set_status(state, observer, channel, &minion.name, MinionStatus::Perceiving);
    let result = state
        .gateway
        .generate_structured::<RawPerceptionPlan>(&call)
        .await
        .and_then(|raw| PerceptionPlan::try_from(raw).map_err(LegionError::DecisionParse));
    set_status(state, observer, channel, &minion.name, MinionStatus::Idle);

    match result {
        Ok(plan) => {
            state.roster.apply_plan(&minion.name, &plan);
            info!(
                channel = %channel.name,
                minion = %minion.name,
                speak = plan.decision.is_speak(),
                mode = %plan.selected_response_mode,
                "Perception complete"
            );
            PerceptionOutcome::Planned { minion, plan }
        }
        Err(error) => {
            report_failure(state, observer, channel, &minion, &error).await;
            PerceptionOutcome::Failed { minion, error }
        }
    }
}

fn set_status<K: KvStore>(
    state: &LegionState<K>,
    observer: &dyn TurnObserver,
    channel: &Channel,
    minion: &str,
    status: MinionStatus,
) {
    state.roster.set_status(minion, status);
    observer.on_status(&channel.id, minion, status);
}

async fn report_failure<K: KvStore>(
    state: &LegionState<K>,
    observer: &dyn TurnObserver,
    channel: &Channel,
    minion: &Minion,
    error: &LegionError,
) {
    warn!(channel = %channel.name, minion = %minion.name, error = %error, "Perception failed");
    let diagnostic = ChatMessage::system_error(
        channel.id,
        format!("Error during {}'s perception stage: {error}", minion.name),
    );
    state.notice(diagnostic, observer).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        RecordingObserver, ScriptedFactory, ScriptedReply, TestLegion, silent_json, speak_json,
    };
    use legion_types::diary::TurnDecision;

    fn trigger(sender: &str, content: &str) -> Trigger {
        Trigger {
            sender: sender.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn success_updates_opinions_and_diary() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::Structured(speak_json(
            "Greet Steven.",
            600,
            &[("Steven", 91)],
        ))]);
        let legion = TestLegion::new(factory).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let outcome = perceive(
            legion.state(),
            &observer,
            &channel,
            alpha,
            &trigger("Steven", "hello all"),
            "",
        )
        .await;

        let PerceptionOutcome::Planned { plan, .. } = outcome else {
            panic!("expected a plan");
        };
        assert!(matches!(plan.decision, TurnDecision::Speak { predicted_response_time: 600, .. }));

        let stored = legion.state().roster.get_by_name("Alpha").unwrap();
        assert_eq!(stored.opinions["Steven"], 91);
        assert_eq!(stored.last_diary, Some(plan));
        assert_eq!(stored.status, MinionStatus::Idle);

        let audits = observer.credential_logs();
        assert_eq!(audits.len(), 1);
        assert!(audits[0].contains("Alpha is using key 'Main' (Load Balanced) for Perception."));
        assert_eq!(
            observer.statuses("Alpha"),
            vec![MinionStatus::Perceiving, MinionStatus::Idle]
        );
    }

    #[tokio::test]
    async fn silent_plan_still_updates_state() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::Structured(silent_json(&[(
            "Steven", 12,
        )]))]);
        let legion = TestLegion::new(factory).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);

        let outcome = perceive(
            legion.state(),
            &RecordingObserver::default(),
            &channel,
            alpha,
            &trigger("Steven", "hello"),
            "",
        )
        .await;

        assert!(matches!(outcome, PerceptionOutcome::Planned { .. }));
        let stored = legion.state().roster.get_by_name("Alpha").unwrap();
        assert_eq!(stored.opinions["Steven"], 12);
    }

    #[tokio::test]
    async fn parse_failure_leaves_state_untouched() {
        let factory = ScriptedFactory::new(vec![ScriptedReply::Structured(
            r#"{"action": "SPEAK"}"#.to_string(),
        )]);
        let legion = TestLegion::new(factory).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let outcome = perceive(
            legion.state(),
            &observer,
            &channel,
            alpha.clone(),
            &trigger("Steven", "hello"),
            "",
        )
        .await;

        assert!(matches!(
            outcome,
            PerceptionOutcome::Failed { error: LegionError::DecisionParse(_), .. }
        ));
        let stored = legion.state().roster.get_by_name("Alpha").unwrap();
        assert_eq!(stored.opinions, alpha.opinions);
        assert!(stored.last_diary.is_none());

        let diagnostics = observer.error_notices();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].starts_with("Error during Alpha's perception stage"));
    }

    #[tokio::test]
    async fn missing_credential_fails_without_model_call() {
        let factory = ScriptedFactory::new(vec![]);
        let legion = TestLegion::new(factory.clone()).await;
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let outcome = perceive(
            legion.state(),
            &observer,
            &channel,
            alpha,
            &trigger("Steven", "hello"),
            "",
        )
        .await;

        assert!(matches!(
            outcome,
            PerceptionOutcome::Failed { error: LegionError::CredentialUnavailable { .. }, .. }
        ));
        assert!(factory.calls().is_empty());
        assert!(observer.credential_logs()[0].contains("(None) for Perception"));
    }

    #[tokio::test]
    async fn own_message_is_never_perceived() {
        let factory = ScriptedFactory::new(vec![]);
        let legion = TestLegion::new(factory.clone()).await;
        legion.add_credential("Main");
        let alpha = legion.add_minion("Alpha");
        let channel = legion.group_channel(&["Alpha"]);
        let observer = RecordingObserver::default();

        let outcome = perceive(
            legion.state(),
            &observer,
            &channel,
            alpha,
            &trigger("Alpha", "I said a thing"),
            "",
        )
        .await;

        assert!(matches!(outcome, PerceptionOutcome::SelfTrigger { .. }));
        assert!(factory.calls().is_empty());
        assert!(observer.credential_logs().is_empty());
    }
}
