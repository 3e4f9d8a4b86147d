//! Turn scheduler: fan perception out, order the speakers, run responses in turn.

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, info_span, Instrument};

use legion_types::channel::Channel;
use legion_types::diary::{PerceptionPlan, TurnDecision};
use legion_types::message::ChatMessage;
use legion_types::minion::Minion;

use crate::observer::TurnObserver;
use crate::state::LegionState;
use crate::storage::KvStore;

use super::perception::{PerceptionOutcome, Trigger, perceive};
use super::prompt::TranscriptView;
use super::response::respond;

/// What started a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// A commander message. Every willing minion speaks.
    Commander,
    /// An autonomous-loop tick. Only the fastest willing minion speaks.
    Autonomous,
}

/// A minion that chose to speak, with what it plans to say.
#[derive(Debug, Clone)]
pub struct Speaker {
    pub minion: Minion,
    pub plan: PerceptionPlan,
    pub response_plan: String,
    pub latency_ms: u64,
}

/// Perception outcomes sorted into what happens next.
#[derive(Debug, Default)]
pub struct TurnOrder {
    /// Ascending by predicted latency; ties keep perception order.
    pub speakers: Vec<Speaker>,
    pub silent: Vec<Minion>,
    pub self_triggered: Vec<Minion>,
    pub failed: Vec<Minion>,
}

pub fn order_turns(outcomes: Vec<PerceptionOutcome>) -> TurnOrder {
    let mut order = TurnOrder::default();
    for outcome in outcomes {
        match outcome {
            PerceptionOutcome::Planned { minion, plan } => match &plan.decision {
                TurnDecision::Speak {
                    response_plan,
                    predicted_response_time,
                } => order.speakers.push(Speaker {
                    response_plan: response_plan.clone(),
                    latency_ms: *predicted_response_time,
                    minion,
                    plan,
                }),
                TurnDecision::StaySilent => order.silent.push(minion),
            },
            PerceptionOutcome::SelfTrigger { minion } => order.self_triggered.push(minion),
            PerceptionOutcome::Failed { minion, .. } => order.failed.push(minion),
        }
    }
    order.speakers.sort_by_key(|s| s.latency_ms);
    order
}

/// What a batch produced.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    /// Terminal messages from the response stage, in speaking order.
    pub responses: Vec<ChatMessage>,
    pub silent: Vec<String>,
    pub failed: Vec<String>,
}

/// Run one full perception, ordering, and response cycle for `channel`.
pub async fn run_batch<K: KvStore>(
    state: &LegionState<K>,
    observer: &dyn TurnObserver,
    channel: &Channel,
    trigger: &Trigger,
    mode: BatchMode,
) -> BatchReport {
    let span = info_span!("legion.batch", channel = %channel.name, mode = ?mode);
    async {
        let mut report = BatchReport::default();

        let eligible = state.roster.resolve_members(&channel.members);
        if eligible.is_empty() {
            state
                .notice(
                    ChatMessage::system(
                        channel.id,
                        format!("No minions in #{} to respond.", channel.name),
                    ),
                    observer,
                )
                .await;
            return report;
        }

        let window = state
            .transcripts
            .window(&channel.id, state.config.history_window);
        let history = TranscriptView::from_messages(&window, state.commander());
        let rendered = history.render();

        let perceptions: Vec<_> = eligible
            .into_iter()
            .map(|minion| perceive(state, observer, channel, minion, trigger, &rendered))
            .collect();
        let outcomes = join_all(perceptions).await;
        state.persist_minions().await;

        let order = order_turns(outcomes);
        report.failed = order.failed.iter().map(|m| m.name.clone()).collect();

        for minion in &order.silent {
            state
                .notice(
                    ChatMessage::system(
                        channel.id,
                        format!("{} chose to remain silent.", minion.name),
                    ),
                    observer,
                )
                .await;
            report.silent.push(minion.name.clone());
        }
        for minion in &order.self_triggered {
            debug!(minion = %minion.name, "Skipped perception of own message");
            report.silent.push(minion.name.clone());
        }

        let mut speakers = order.speakers;
        if speakers.is_empty() {
            state
                .notice(
                    ChatMessage::system(channel.id, "All minions stayed silent this turn."),
                    observer,
                )
                .await;
            return report;
        }
        if mode == BatchMode::Autonomous {
            speakers.truncate(1);
        }

        info!(
            speakers = ?speakers.iter().map(|s| (&s.minion.name, s.latency_ms)).collect::<Vec<_>>(),
            "Speaking order decided"
        );

        let mut transcript = history;
        for speaker in &speakers {
            let message = respond(
                state,
                observer,
                &channel.id,
                &speaker.minion,
                &speaker.plan,
                &speaker.response_plan,
                &transcript.render(),
            )
            .await;
            if !message.is_error() {
                transcript.push_minion(&speaker.minion.name, &message.content);
            }
            report.responses.push(message);
        }
        report
    }
    .instrument(span)
    .await
}
