//! Credential pool CLI commands: list, add, remove.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::cli::print_json;
use crate::state::AppState;

pub async fn list_keys(state: &AppState, json: bool) -> Result<()> {
    let keys = state.legion.list_credentials();
    if json {
        return print_json(&keys);
    }

    if keys.is_empty() {
        println!();
        println!(
            "  {} No keys stored. Add one with: {}",
            style("i").blue().bold(),
            style("legion key add Primary --secret AIza...").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Secret").fg(Color::White),
        Cell::new("Added").fg(Color::White),
    ]);
    for key in &keys {
        table.add_row(vec![
            Cell::new(&key.name).fg(Color::Cyan),
            Cell::new(&key.masked_secret),
            Cell::new(key.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn add_key(state: &AppState, name: &str, secret: &str, json: bool) -> Result<()> {
    let view = state.legion.add_credential(name, secret).await?;
    if json {
        return print_json(&view);
    }
    println!(
        "  {} Key '{}' added ({})",
        style("✓").green().bold(),
        style(&view.name).bold(),
        view.masked_secret
    );
    Ok(())
}

pub async fn remove_key(state: &AppState, key: &str, json: bool) -> Result<()> {
    let existing = state.legion.find_credential(key)?;
    let removed = state.legion.remove_credential(&existing.id).await?;
    if json {
        return print_json(&removed);
    }
    println!(
        "  {} Key '{}' removed",
        style("✓").green().bold(),
        style(&removed.name).bold()
    );
    Ok(())
}
