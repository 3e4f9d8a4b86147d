//! Minion management CLI commands: list, add, remove.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use legion_types::minion::{CreateMinionRequest, Minion};

use crate::cli::print_json;
use crate::state::AppState;

pub async fn list_minions(state: &AppState, json: bool) -> Result<()> {
    let minions = state.legion.list_minions();
    if json {
        return print_json(&minions);
    }

    if minions.is_empty() {
        println!();
        println!(
            "  {} No minions yet. Create one with: {}",
            style("i").blue().bold(),
            style("legion minion add Alpha --persona \"...\"").yellow()
        );
        println!();
        return Ok(());
    }

    let credentials = state.legion.list_credentials();
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Temp").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("Opinions").fg(Color::White),
    ]);

    for minion in &minions {
        let key = minion
            .credential_id
            .and_then(|id| credentials.iter().find(|c| c.id == id))
            .map_or_else(|| "pool".to_string(), |c| c.name.clone());
        table.add_row(vec![
            Cell::new(&minion.name).fg(Color::Cyan),
            Cell::new(&minion.model_id),
            Cell::new(format!("{:.1}", minion.temperature)),
            Cell::new(key),
            Cell::new(opinion_summary(minion)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} minion{}",
        style(minions.len()).bold(),
        if minions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

fn opinion_summary(minion: &Minion) -> String {
    minion
        .opinions
        .iter()
        .map(|(name, score)| format!("{name} {score}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn add_minion(
    state: &AppState,
    name: String,
    persona: String,
    model: Option<String>,
    temperature: f64,
    key: Option<String>,
    json: bool,
) -> Result<()> {
    let credential_id = match key {
        Some(key) => Some(state.legion.find_credential(&key)?.id),
        None => None,
    };
    let model_id = model.unwrap_or_else(|| state.legion.config().provider.default_model.clone());

    let minion = state
        .legion
        .add_minion(CreateMinionRequest {
            name,
            model_id,
            model_name: None,
            persona,
            temperature,
            credential_id,
        })
        .await?;

    if json {
        return print_json(&minion);
    }
    println!(
        "  {} Minion '{}' created ({})",
        style("✓").green().bold(),
        style(&minion.name).bold(),
        minion.model_id
    );
    Ok(())
}

pub async fn remove_minion(state: &AppState, minion: &str, json: bool) -> Result<()> {
    let existing = state.legion.find_minion(minion)?;
    let removed = state.legion.remove_minion(&existing.id).await?;

    if json {
        return print_json(&removed);
    }
    println!(
        "  {} Minion '{}' removed",
        style("✓").green().bold(),
        style(&removed.name).bold()
    );
    Ok(())
}
