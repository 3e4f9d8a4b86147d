//! Channel management CLI commands: list, add, remove.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use legion_types::channel::{ChannelKind, CreateChannelRequest};

use crate::cli::print_json;
use crate::state::AppState;

pub async fn list_channels(state: &AppState, json: bool) -> Result<()> {
    let channels = state.legion.list_channels();
    if json {
        return print_json(&channels);
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Members").fg(Color::White),
        Cell::new("Auto").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
    ]);
    for channel in &channels {
        let auto = if channel.auto_mode_active {
            Cell::new("running").fg(Color::Green)
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };
        let messages = state
            .legion
            .list_messages(&channel.id)
            .map(|m| m.len())
            .unwrap_or(0);
        table.add_row(vec![
            Cell::new(format!("#{}", channel.name)).fg(Color::Cyan),
            Cell::new(channel.kind.to_string()),
            Cell::new(channel.members.join(", ")),
            auto,
            Cell::new(messages),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn add_channel(
    state: &AppState,
    name: String,
    kind: &str,
    description: String,
    members: Vec<String>,
    json: bool,
) -> Result<()> {
    let kind: ChannelKind = kind.parse().map_err(anyhow::Error::msg)?;
    let channel = state
        .legion
        .add_channel(CreateChannelRequest {
            name,
            description,
            kind,
            members,
            auto_mode_delay: None,
        })
        .await?;

    if json {
        return print_json(&channel);
    }
    println!(
        "  {} Channel '#{}' created ({})",
        style("✓").green().bold(),
        style(&channel.name).bold(),
        channel.kind
    );
    Ok(())
}

pub async fn remove_channel(state: &AppState, channel: &str, json: bool) -> Result<()> {
    let existing = state.legion.find_channel(channel)?;
    let removed = state.legion.remove_channel(&existing.id).await?;
    if json {
        return print_json(&removed);
    }
    println!(
        "  {} Channel '#{}' removed",
        style("✓").green().bold(),
        style(&removed.name).bold()
    );
    Ok(())
}
