mod tables;

use crate::results::RunResults;
use session_tunnel_model::{ClientSession, RunRecord};
use tables::{ErrorTypeRow, RunRow, ScenarioRow, SessionRow, SummaryRow};
use tabled::settings::Style;
use tabled::Table;

/// Print the summary, per scenario and per error type tables for a run.
pub fn print_results_summary(results: &RunResults) {
    println!("\nRun {}", results.run.run_id);
    let mut table = Table::new([SummaryRow::from(results)]);
    table.with(Style::modern());
    println!("{table}");

    if !results.scenarios.is_empty() {
        println!("\nScenarios");
        let rows = results
            .scenarios
            .iter()
            .map(|(scenario, breakdown)| ScenarioRow::new(scenario, breakdown))
            .collect::<Vec<_>>();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    if !results.errors_by_type.is_empty() {
        println!("\nErrors");
        let rows = results
            .errors_by_type
            .iter()
            .map(|(error_type, breakdown)| ErrorTypeRow::new(*error_type, breakdown))
            .collect::<Vec<_>>();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }
}

/// Print one line per session, in the order they were spawned.
pub fn print_sessions(sessions: &[ClientSession]) {
    if sessions.is_empty() {
        println!("\nNo sessions");
        return;
    }

    println!("\nSessions");
    let mut table = Table::new(sessions.iter().map(SessionRow::from));
    table.with(Style::modern());
    println!("{table}");
}

pub fn print_run_list(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("No runs found");
        return;
    }

    let mut table = Table::new(runs.iter().map(RunRow::from));
    table.with(Style::modern());
    println!("{table}");
}
