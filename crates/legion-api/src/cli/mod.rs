//! CLI command definitions for the `legion` binary.
//!
//! Uses clap derive macros. Commands follow a noun-verb pattern
//! (e.g., `legion minion add`, `legion channel list`).

pub mod channel;
pub mod key;
pub mod minion;
pub mod say;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run a legion of AI minions that converse with you and each other.
#[derive(Parser)]
#[command(name = "legion", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logging (-v for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry to stdout.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST and WebSocket server.
    Serve {
        /// Port to listen on (defaults to config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage minions.
    Minion {
        #[command(subcommand)]
        action: MinionCommand,
    },

    /// Manage channels.
    Channel {
        #[command(subcommand)]
        action: ChannelCommand,
    },

    /// Manage API keys in the credential pool.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Post a message as the commander and stream the replies.
    Say {
        /// Channel name or id.
        channel: String,

        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum MinionCommand {
    /// List minions.
    #[command(alias = "ls")]
    List,

    /// Create a minion.
    Add {
        name: String,

        /// Who this minion is.
        #[arg(long)]
        persona: String,

        /// Model id (defaults to config).
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature, 0.0 to 1.0.
        #[arg(long, default_value_t = legion_types::minion::default_temperature())]
        temperature: f64,

        /// Pin the minion to one key (name or id).
        #[arg(long)]
        key: Option<String>,
    },

    /// Delete a minion.
    #[command(alias = "rm")]
    Remove {
        /// Minion name or id.
        minion: String,
    },
}

#[derive(Subcommand)]
pub enum ChannelCommand {
    /// List channels.
    #[command(alias = "ls")]
    List,

    /// Create a channel.
    Add {
        name: String,

        /// group, autonomous_swarm, or system_log.
        #[arg(long, default_value = "group")]
        kind: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Member minion (repeatable).
        #[arg(long = "member")]
        members: Vec<String>,
    },

    /// Delete a channel and its transcript.
    #[command(alias = "rm")]
    Remove {
        /// Channel name or id.
        channel: String,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// List keys with masked secrets.
    #[command(alias = "ls")]
    List,

    /// Add a key.
    Add {
        name: String,

        /// The API key.
        #[arg(long, env = "LEGION_API_KEY", hide_env_values = true)]
        secret: String,
    },

    /// Delete a key, unpinning any minion that used it.
    #[command(alias = "rm")]
    Remove {
        /// Key name or id.
        key: String,
    },
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
