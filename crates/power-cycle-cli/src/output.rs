//! Human-readable and JSON output for the CLI.

use power_cycle_control::{BatchTotals, RunSummary};
use power_cycle_core::EntitySummary;

/// Print the entity listing as an aligned table.
pub fn print_entities(entities: &[EntitySummary]) {
    let width = entities
        .iter()
        .map(|e| e.id.as_str().len())
        .max()
        .unwrap_or(2)
        .max(2);

    println!("{:<width$}  {:<12}  NAME", "ID", "POWER");
    for entity in entities {
        let power = entity
            .power_state
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!("{:<width$}  {:<12}  {}", entity.id, power, entity.name);
    }
}

/// Print the final run summary.
pub fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let status = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    println!("Run {status} after {} iteration(s)", summary.iterations);
    println!("  {}", totals_line("power-on ", &summary.power_on));
    println!("  {}", totals_line("power-off", &summary.power_off));
    Ok(())
}

fn totals_line(label: &str, totals: &BatchTotals) -> String {
    format!(
        "{label}: {} batches, {} accepted, {} failed",
        totals.batches, totals.succeeded, totals.failed
    )
}
