//! Legion CLI and REST API entry point.
//!
//! Binary name: `legion`
//!
//! Parses CLI arguments, initializes the database and the engine, then
//! dispatches to a command handler or starts the server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use legion_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};

use cli::{ChannelCommand, Cli, Commands, KeyCommand, MinionCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state or logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "legion", &mut std::io::stdout());
        return Ok(());
    }

    let tracing_options = TracingOptions {
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        verbose: cli.verbose > 0,
        // One-shot commands stay quiet unless asked; the server logs at info.
        quiet: cli.quiet || (cli.verbose == 0 && !matches!(cli.command, Commands::Serve { .. })),
        otel: cli.otel,
    };
    init_tracing(&tracing_options).map_err(|e| anyhow::anyhow!("{e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Minion { action } => match action {
            MinionCommand::List => cli::minion::list_minions(&state, cli.json).await?,
            MinionCommand::Add {
                name,
                persona,
                model,
                temperature,
                key,
            } => {
                cli::minion::add_minion(&state, name, persona, model, temperature, key, cli.json)
                    .await?
            }
            MinionCommand::Remove { minion } => {
                cli::minion::remove_minion(&state, &minion, cli.json).await?
            }
        },

        Commands::Channel { action } => match action {
            ChannelCommand::List => cli::channel::list_channels(&state, cli.json).await?,
            ChannelCommand::Add {
                name,
                kind,
                description,
                members,
            } => {
                cli::channel::add_channel(&state, name, &kind, description, members, cli.json)
                    .await?
            }
            ChannelCommand::Remove { channel } => {
                cli::channel::remove_channel(&state, &channel, cli.json).await?
            }
        },

        Commands::Key { action } => match action {
            KeyCommand::List => cli::key::list_keys(&state, cli.json).await?,
            KeyCommand::Add { name, secret } => {
                cli::key::add_key(&state, &name, &secret, cli.json).await?
            }
            KeyCommand::Remove { key } => cli::key::remove_key(&state, &key, cli.json).await?,
        },

        Commands::Say { channel, text } => {
            cli::say::say(&state, &channel, &text.join(" "), cli.json, cli.verbose > 0).await?
        }

        Commands::Serve { port, host } => {
            let server = &state.legion.config().server;
            let addr = format!(
                "{}:{}",
                host.unwrap_or_else(|| server.host.clone()),
                port.unwrap_or(server.port)
            );

            let resumed = state.legion.resume_auto_mode();
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Legion API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                if resumed > 0 {
                    println!("  Resumed autonomous mode in {resumed} channel(s)");
                }
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
