//! CLI entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `dashmanager_core` linkage.
//! - Open the dashboard from `DASHMANAGER_*` env vars and print counters.
//!
//! Usage: `dashmanager [ping|stats]` (defaults to `ping`).

use dashmanager_core::{open_dashboard_from_env, DashConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let command = std::env::args().nth(1).unwrap_or_else(|| "ping".to_string());
    match command.as_str() {
        "ping" => {
            println!("dashmanager_core ping={}", dashmanager_core::ping());
            println!("dashmanager_core version={}", dashmanager_core::core_version());
            ExitCode::SUCCESS
        }
        "stats" => stats(),
        other => {
            eprintln!("unknown command `{other}`; expected `ping` or `stats`");
            ExitCode::from(2)
        }
    }
}

fn stats() -> ExitCode {
    let mode = match DashConfig::from_env() {
        Ok(config) => config.store.name(),
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let sync = match open_dashboard_from_env() {
        Ok(sync) => sync,
        Err(err) => {
            eprintln!("open failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let stats = sync.stats();
    println!("store={mode}");
    println!("people={}", stats.people);
    println!("groups={}", stats.groups);
    println!("locations={} visited={}", stats.locations, stats.visited_locations);
    println!("territories={}", stats.territories);
    ExitCode::SUCCESS
}
