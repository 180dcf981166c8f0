use clap::{Args, Parser, Subcommand};
use session_tunnel_catalog::ScenarioPreset;
use session_tunnel_instruments::DEFAULT_SAMPLE_LIMIT;
use session_tunnel_model::RunStatus;
use std::path::PathBuf;

/// Default path of the JSON file runs are persisted to.
pub const DEFAULT_STORE_PATH: &str = "session_tunnel_store.json";

#[derive(Debug, Parser)]
#[command(name = "session-tunnel", about, long_about = None)]
pub struct SessionTunnelCli {
    /// Path of the JSON file runs, sessions and errors are stored in
    #[clap(long, env = "SESSION_TUNNEL_STORE", default_value = DEFAULT_STORE_PATH, global = true)]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a run and follow it until it finishes
    Run(RunArgs),
    /// List stored runs, newest first
    List {
        #[clap(long)]
        status: Option<RunStatus>,

        #[clap(long, default_value = "20")]
        limit: usize,
    },
    /// Show the results of a run
    Results {
        run_id: String,

        /// Include one line per session
        #[clap(long, default_value = "false")]
        sessions: bool,

        /// Print the results as JSON instead of tables
        #[clap(long, default_value = "false")]
        json: bool,

        /// Number of sample messages to show per error type
        #[clap(long, default_value_t = DEFAULT_SAMPLE_LIMIT)]
        samples: usize,
    },
    /// Delete the data a run left behind, or every run older than a number of days
    Cleanup(CleanupArgs),
    /// List the built-in scenarios and personas
    Catalog,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// A TOML run file. Flags given on the command line override values from the file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Run every scenario in a preset with weight 1. One of all, critical, smoke, chat or ecommerce.
    #[clap(long)]
    pub preset: Option<ScenarioPreset>,

    /// Add a scenario to the run. Specify the scenario and its weight in the format `id:weight`.
    /// For example `--scenario=browse_and_buy:3`.
    ///
    /// Specifying the weight is optional and will default to 1.
    ///
    /// You can specify multiple scenarios by using the flag multiple times. Scenarios given here
    /// replace the preset and the scenarios from the run file.
    #[clap(long, short, value_parser = parse_scenario_weight)]
    pub scenario: Vec<(String, u32)>,

    /// Restrict the personas sessions are played by. Can be given more than once.
    #[clap(long, short)]
    pub persona: Vec<String>,

    /// The maximum number of sessions running at the same time
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Milliseconds between spawn ticks
    #[clap(long)]
    pub spawn_interval_ms: Option<u64>,

    /// The number of seconds to spawn sessions for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Stop spawning after this many sessions
    #[clap(long)]
    pub max_clients: Option<u64>,

    /// Milliseconds to wait for in-flight sessions when the run ends
    #[clap(long)]
    pub grace_period_ms: Option<u64>,

    /// Seed scenario and persona selection so runs spawn in a repeatable order
    #[clap(long)]
    pub seed: Option<u64>,

    /// Prefix for every record sessions create in the target system
    #[clap(long)]
    pub test_data_prefix: Option<String>,

    /// Keep the resources sessions created instead of deleting them when the run ends
    #[clap(long, default_value = "false")]
    pub no_cleanup: bool,

    /// Scale step durations and think time. Use a value below 1 to simulate faster users.
    #[clap(long, default_value_t = 1.0, value_parser = parse_time_scale)]
    pub time_scale: f64,

    /// Probability that any simulated step fails with a network error
    #[clap(long, default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by
    /// anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Append a JSON line describing the finished run to this file
    #[clap(long)]
    pub summary_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Clean up a single run
    #[clap(long, conflicts_with = "days_old")]
    pub run_id: Option<String>,

    /// Clean up every run that started more than this many days ago
    #[clap(long, default_value = "7")]
    pub days_old: u32,
}

fn parse_scenario_weight(s: &str) -> anyhow::Result<(String, u32)> {
    let mut parts = s.split(':');
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .ok_or(anyhow::anyhow!("No id specified for scenario"))?;

    let weight = match parts.next() {
        Some(weight) => weight
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid weight for scenario {id}: {e}"))?,
        None => 1,
    };

    Ok((id, weight))
}

fn parse_time_scale(s: &str) -> anyhow::Result<f64> {
    let scale = s
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Invalid time scale {s}: {e}"))?;
    if !scale.is_finite() || scale < 0.0 {
        anyhow::bail!("Time scale must be a finite number of at least 0, got {s}");
    }
    Ok(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scenario_weight_defaults_to_one() {
        assert_eq!(
            ("quick_browse".to_string(), 1),
            parse_scenario_weight("quick_browse").unwrap()
        );
        assert_eq!(
            ("browse_and_buy".to_string(), 3),
            parse_scenario_weight("browse_and_buy:3").unwrap()
        );
    }

    #[test]
    fn bad_scenario_weight_is_rejected() {
        assert!(parse_scenario_weight(":2").is_err());
        assert!(parse_scenario_weight("quick_browse:many").is_err());
    }

    #[test]
    fn time_scale_must_be_finite_and_not_negative() {
        assert_eq!(0.25, parse_time_scale("0.25").unwrap());
        assert_eq!(0.0, parse_time_scale("0").unwrap());
        for bad in ["inf", "NaN", "-1", "1e400", "fast"] {
            assert!(parse_time_scale(bad).is_err(), "{bad} was accepted");
        }
    }

    #[test]
    fn parses_a_run_command() {
        let cli = SessionTunnelCli::try_parse_from([
            "session-tunnel",
            "run",
            "--scenario",
            "quick_browse:2",
            "--persona",
            "startup_sarah",
            "--duration",
            "30",
            "--no-progress",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(vec![("quick_browse".to_string(), 2)], args.scenario);
        assert_eq!(vec!["startup_sarah".to_string()], args.persona);
        assert_eq!(Some(30), args.duration);
        assert!(args.no_progress);
    }
}
