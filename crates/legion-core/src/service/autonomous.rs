//! Autonomous mode: swarm channels that keep talking on their own.
//!
//! Starting the loop arms a delayed tick. When a tick fires it runs one
//! batch (only the fastest willing minion speaks) against the channel's last
//! conversational message, then arms the next tick while the channel is still
//! active. Pausing cancels a pending tick; a batch already running completes.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use legion_types::channel::{Channel, ChannelId, ChannelKind};
use legion_types::error::LegionError;
use legion_types::event::LegionEvent;
use legion_types::message::{ChatMessage, SYSTEM_SENDER_NAME};

use crate::autonomous::AutonomousLoop;
use crate::storage::KvStore;
use crate::turn::{BatchMode, BatchReport, Trigger, run_batch};

use super::{LegionService, run_detached};

/// Minions a swarm needs before it can talk to itself.
pub const MIN_SWARM_SIZE: usize = 2;

impl<K: KvStore + 'static> LegionService<K> {
    /// Turn autonomous mode on and schedule the first batch.
    pub async fn start_auto_mode(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        let channel = self.swarm_channel(id)?;
        self.ensure_swarm_size(&channel).await?;

        let channel = self.state.channels.set_auto_mode(id, true)?;
        self.state.persist_channels().await;
        self.publish_auto_mode(id, true);
        info!(channel = %channel.name, delay = ?channel.auto_mode_delay, "Autonomous mode started");
        self.schedule_next(*id);
        Ok(channel)
    }

    /// Turn autonomous mode off. A batch already in flight runs to completion.
    pub async fn pause_auto_mode(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        let channel = self.state.channels.set_auto_mode(id, false)?;
        let cancelled = self.autonomous.disarm(id);
        self.state.persist_channels().await;
        self.publish_auto_mode(id, false);
        info!(channel = %channel.name, cancelled, "Autonomous mode paused");
        Ok(channel)
    }

    /// Run the next autonomous batch now, without waiting for the timer.
    ///
    /// Like a commander message, the batch runs on its own task and completes
    /// even if the caller stops waiting.
    pub async fn trigger_autonomous(&self, id: &ChannelId) -> Result<BatchReport, LegionError> {
        self.swarm_channel(id)?;
        let (service, id) = (self.clone(), *id);
        run_detached(async move { service.run_autonomous_cycle(&id).await }).await?
    }

    /// Re-arm timers for channels that were active when the process stopped.
    pub fn resume_auto_mode(&self) -> usize {
        let active: Vec<ChannelId> = self
            .state
            .channels
            .list()
            .into_iter()
            .filter(|c| c.auto_mode_active)
            .map(|c| c.id)
            .collect();
        for id in &active {
            self.schedule_next(*id);
        }
        active.len()
    }

    pub fn is_auto_pending(&self, id: &ChannelId) -> bool {
        self.autonomous.is_pending(id)
    }

    fn swarm_channel(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        let channel = self.state.channels.get(id)?;
        if channel.kind != ChannelKind::AutonomousSwarm {
            return Err(LegionError::validation(format!(
                "#{} is not an autonomous swarm channel",
                channel.name
            )));
        }
        Ok(channel)
    }

    /// Post the "requires at least two" diagnostic and fail if the swarm is too small.
    async fn ensure_swarm_size(&self, channel: &Channel) -> Result<(), LegionError> {
        let eligible = self.state.roster.resolve_members(&channel.members).len();
        if eligible >= MIN_SWARM_SIZE {
            return Ok(());
        }
        let text = format!(
            "Autonomous mode requires at least {MIN_SWARM_SIZE} minions in #{}; it has {eligible}.",
            channel.name
        );
        warn!(channel = %channel.name, eligible, "Autonomous swarm too small");
        self.state
            .notice(ChatMessage::system_error(channel.id, &text), self.observer.as_ref())
            .await;
        Err(LegionError::Validation(text))
    }

    fn publish_auto_mode(&self, id: &ChannelId, active: bool) {
        self.state.events.publish(LegionEvent::AutoModeChanged {
            channel_id: *id,
            active,
        });
    }

    /// Arm the next tick. The delay is drawn now, so range edits apply from
    /// the next cycle on.
    fn schedule_next(&self, id: ChannelId) {
        let Some(delay) = self.state.channels.delay_of(&id) else {
            return;
        };
        let wait = AutonomousLoop::draw_delay(&delay);
        let tick = self.autonomous.arm(id);
        debug!(channel_id = %id, wait_ms = wait.as_millis() as u64, "Autonomous tick armed");

        let service = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tick.token.cancelled() => {
                    debug!(channel_id = %id, "Autonomous tick cancelled");
                    return;
                }
                _ = sleep(wait) => {}
            }
            service.autonomous.fired(&id, tick.generation);
            service.autonomous_tick(id).await;
        });
    }

    async fn autonomous_tick(&self, id: ChannelId) {
        if !self.state.channels.is_auto_active(&id) {
            return;
        }
        if let Err(err) = self.run_autonomous_cycle(&id).await {
            debug!(channel_id = %id, error = %err, "Autonomous cycle ended early");
        }
        if self.state.channels.is_auto_active(&id) && !self.autonomous.is_pending(&id) {
            self.schedule_next(id);
        }
    }

    /// One autonomous batch. Refuses to run on a busy channel and pauses a
    /// swarm that has shrunk below two minions.
    async fn run_autonomous_cycle(&self, id: &ChannelId) -> Result<BatchReport, LegionError> {
        let channel = self.state.channels.get(id)?;
        let Some(_guard) = self.autonomous.try_begin(channel.id) else {
            debug!(channel = %channel.name, "Batch already in flight; skipping tick");
            return Ok(BatchReport::default());
        };

        if let Err(err) = self.ensure_swarm_size(&channel).await {
            if channel.auto_mode_active {
                self.state.channels.set_auto_mode(id, false)?;
                self.autonomous.disarm(id);
                self.state.persist_channels().await;
                self.publish_auto_mode(id, false);
            }
            return Err(err);
        }

        let trigger = match self.state.transcripts.last_conversational(id) {
            Some(last) => Trigger {
                sender: last.sender_name,
                content: last.content,
            },
            None => Trigger {
                sender: SYSTEM_SENDER_NAME.to_string(),
                content: "The channel is quiet. Start a conversation.".to_string(),
            },
        };
        info!(channel = %channel.name, trigger_sender = %trigger.sender, "Autonomous batch starting");

        Ok(run_batch(
            &self.state,
            self.observer.as_ref(),
            &channel,
            &trigger,
            BatchMode::Autonomous,
        )
        .await)
    }
}
