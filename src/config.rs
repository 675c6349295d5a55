use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::LoadError;
use crate::executor::RunPlan;
use crate::models::dsl_model::{default_stages, MetricProfile, RunParameters, RunRequest, Stage};

/// Command-line configuration for the worker.
#[derive(Parser, Debug, Clone)]
#[command(name = "loadforge-endpoint-worker", about = "Endpoint catalog load-test worker")]
pub struct Cli {
    /// Tracing filter, e.g. `info` or `loadforge_endpoint_worker=debug`.
    /// Falls back to RUST_LOG when not a valid filter.
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one load test and print the results
    Run(RunArgs),
    /// Accept load tests over a WebSocket at /ws
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// API base URL, e.g. https://api.example.com/v1
    #[arg(long, env = "BASE_URL", default_value = "")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "TOKEN", default_value = "", hide_env_values = true)]
    pub token: String,

    /// Instrument symbol for the find-by-symbol endpoint
    #[arg(long, env = "INSTR_SYMBOL", default_value = "")]
    pub instrument_symbol: String,

    /// Instrument token for find-by-token and prediction endpoints
    #[arg(long, env = "INSTR_TOKEN", default_value = "")]
    pub instrument_token: String,

    /// Ramp stage as <duration>:<target>. Repeat for multiple stages.
    /// Defaults to 10s:5 followed by 15s:20.
    #[arg(long = "stage")]
    pub stages: Vec<Stage>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Pause after each iteration in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub think_time_ms: u64,

    /// Latency check threshold in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub threshold_ms: u64,

    /// Which aggregates to record
    #[arg(long, value_enum, default_value_t = MetricProfile::Full)]
    pub metrics: MetricProfile,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "WORKER_BIND")]
    pub bind: String,
}

impl RunArgs {
    pub fn to_request(&self) -> RunRequest {
        RunRequest {
            params: RunParameters {
                base_url: self.base_url.clone(),
                token: self.token.clone(),
                instrument_symbol: self.instrument_symbol.clone(),
                instrument_token: self.instrument_token.clone(),
            },
            stages: if self.stages.is_empty() {
                default_stages()
            } else {
                self.stages.clone()
            },
            metrics: self.metrics,
            timeout_ms: Some(self.timeout_ms),
            think_time_ms: Some(self.think_time_ms),
            threshold_ms: Some(self.threshold_ms),
        }
    }

    pub fn to_plan(&self) -> Result<RunPlan, LoadError> {
        RunPlan::from_request(self.to_request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "loadforge-endpoint-worker",
            "run",
            "--base-url",
            "http://api",
            "--token",
            "abc",
            "--stage",
            "1s:2",
            "--stage",
            "2s:4",
            "--metrics",
            "latency",
            "--timeout-ms",
            "500",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        let plan = args.to_plan().unwrap();
        assert_eq!(plan.params.base_url, "http://api");
        assert_eq!(plan.params.token, "abc");
        assert_eq!(
            plan.stages,
            vec![
                Stage::new(Duration::from_secs(1), 2),
                Stage::new(Duration::from_secs(2), 4)
            ]
        );
        assert_eq!(plan.options.profile, MetricProfile::Latency);
        assert_eq!(plan.options.request_timeout, Duration::from_millis(500));
        assert_eq!(plan.options.think_time, Duration::from_secs(1));
    }

    #[test]
    fn rejects_bad_stage() {
        let result = Cli::try_parse_from(["loadforge-endpoint-worker", "run", "--stage", "fast:2"]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_has_default_bind() {
        let cli = Cli::try_parse_from(["loadforge-endpoint-worker", "serve"]).unwrap();
        match cli.command {
            Command::Serve(args) => assert!(!args.bind.is_empty()),
            Command::Run(_) => panic!("expected serve subcommand"),
        }
    }
}
