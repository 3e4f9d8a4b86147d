//! `legion say`: post a commander message and stream the replies.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use console::style;

use legion_core::observer::{NoopObserver, TurnObserver};
use legion_types::channel::ChannelId;
use legion_types::message::{ChatMessage, MessageId, MessageState, SenderKind};
use legion_types::minion::MinionStatus;

use crate::cli::print_json;
use crate::state::AppState;

/// Prints streamed replies to the terminal as they arrive.
///
/// Speakers respond one at a time, so deltas from different minions never
/// interleave.
pub struct ConsoleObserver {
    /// Also print credential audits and status changes.
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_message(&self, message: &ChatMessage) {
        if message.sender_kind != SenderKind::Minion {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = match message.state {
            MessageState::Streaming => write!(
                out,
                "\n  {} ",
                style(format!("{}:", message.sender_name)).cyan().bold()
            ),
            MessageState::Finalized => writeln!(out),
            MessageState::Errored => writeln!(out, "\n  {}", style(&message.content).red()),
        };
        let _ = out.flush();
    }

    fn on_delta(&self, _channel: &ChannelId, _message: &MessageId, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{text}");
        let _ = out.flush();
    }

    fn on_status(&self, _channel: &ChannelId, minion: &str, status: MinionStatus) {
        if self.verbose && status != MinionStatus::Idle {
            eprintln!("  {}", style(format!("{minion} is {status}...")).dim());
        }
    }

    fn on_notice(&self, message: &ChatMessage) {
        if message.is_credential_log {
            if self.verbose {
                eprintln!("  {}", style(&message.content).dim());
            }
        } else if message.is_error() {
            eprintln!("  {} {}", style("!").yellow().bold(), message.content);
        } else {
            eprintln!("  {}", style(&message.content).dim());
        }
    }
}

pub async fn say(state: &AppState, channel: &str, text: &str, json: bool, verbose: bool) -> Result<()> {
    let channel = state.legion.find_channel(channel)?;
    let observer: Arc<dyn TurnObserver> = if json {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ConsoleObserver::new(verbose))
    };
    let legion = state.legion.clone().with_observer(observer);

    let report = legion.submit_message(&channel.id, text).await?;

    if json {
        return print_json(&report);
    }
    if report.responses.is_empty() {
        println!(
            "\n  {}",
            style(format!("No one in #{} chose to reply.", channel.name)).dim()
        );
    }
    println!();
    Ok(())
}
