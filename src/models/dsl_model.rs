use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::error::LoadError;

/// A load-test request as received by the worker, either over the
/// WebSocket control channel or assembled from CLI flags.
#[derive(Debug, Deserialize, Clone)]
pub struct RunRequest {
    #[serde(default)]
    pub params: RunParameters,

    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,

    #[serde(default)]
    pub metrics: MetricProfile,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub think_time_ms: Option<u64>,

    #[serde(default)]
    pub threshold_ms: Option<u64>,
}

/// Values substituted into endpoint URL templates. Empty values are passed
/// through as-is; the target API decides what an empty symbol means.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RunParameters {
    pub base_url: String,
    pub token: String,
    pub instrument_symbol: String,
    pub instrument_token: String,
}

impl fmt::Debug for RunParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunParameters")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "<empty>" } else { "<redacted>" })
            .field("instrument_symbol", &self.instrument_symbol)
            .field("instrument_token", &self.instrument_token)
            .finish()
    }
}

/// One ramp stage: move linearly from the previous target to `target`
/// virtual users over `duration`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

impl std::str::FromStr for Stage {
    type Err = LoadError;

    /// Parses `<duration>:<target>`, e.g. `15s:20`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .ok_or_else(|| LoadError::InvalidStage(s.to_string(), "expected <duration>:<target>".into()))?;
        let duration = parse_duration(duration)?;
        let target = target
            .trim()
            .parse::<u64>()
            .map_err(|e| LoadError::InvalidStage(s.to_string(), e.to_string()))?;
        Ok(Stage { duration, target })
    }
}

pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(10), 5),
        Stage::new(Duration::from_secs(15), 20),
    ]
}

/// Which aggregates a run records. Checks are always evaluated.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetricProfile {
    /// Pass/fail checks only.
    Checks,
    /// Checks plus per-endpoint latency trends.
    Latency,
    /// Latency and size trends plus status-class and failure counters.
    #[default]
    Full,
}

impl MetricProfile {
    pub fn tracks_latency(self) -> bool {
        matches!(self, MetricProfile::Latency | MetricProfile::Full)
    }

    pub fn tracks_size(self) -> bool {
        self == MetricProfile::Full
    }

    pub fn tracks_status(self) -> bool {
        self == MetricProfile::Full
    }
}

/// Parses `<n>ms`, `<n>s`, `<n>m` or `<n>h`.
pub fn parse_duration(s: &str) -> Result<Duration, LoadError> {
    let s = s.trim();
    let invalid = |msg: &str| LoadError::InvalidDuration(s.to_string(), msg.to_string());

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid("missing unit (ms, s, m, h)"))?;
    let (value, unit) = s.split_at(split);
    if value.is_empty() {
        return Err(invalid("missing numeric value"));
    }
    let value: u64 = value.parse().map_err(|_| invalid("numeric value out of range"))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => return Err(invalid("unknown unit, use ms, s, m or h")),
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("duration out of range"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}ms", duration.as_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_with_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10d").is_err());
    }

    #[test]
    fn rejects_durations_that_overflow() {
        assert!(parse_duration("18446744073709551615s").is_ok());
        assert!(matches!(
            parse_duration("18446744073709551615m"),
            Err(LoadError::InvalidDuration(..))
        ));
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn parses_stage_definition() {
        let stage: Stage = "15s:20".parse().unwrap();
        assert_eq!(stage, Stage::new(Duration::from_secs(15), 20));
        assert!("15s".parse::<Stage>().is_err());
        assert!("15s:many".parse::<Stage>().is_err());
    }

    #[test]
    fn run_request_fills_defaults() {
        let request: RunRequest = serde_json::from_str(
            r#"{"params": {"base_url": "http://api.local", "token": "abc"}}"#,
        )
        .unwrap();

        assert_eq!(request.params.base_url, "http://api.local");
        assert_eq!(request.params.instrument_symbol, "");
        assert_eq!(request.stages, default_stages());
        assert_eq!(request.metrics, MetricProfile::Full);
        assert!(request.timeout_ms.is_none());
    }

    #[test]
    fn run_request_reads_stages_and_profile() {
        let request: RunRequest = serde_json::from_str(
            r#"{"stages": [{"duration": "500ms", "target": 2}], "metrics": "latency", "timeout_ms": 750}"#,
        )
        .unwrap();

        assert_eq!(request.stages, vec![Stage::new(Duration::from_millis(500), 2)]);
        assert_eq!(request.metrics, MetricProfile::Latency);
        assert_eq!(request.timeout_ms, Some(750));
    }

    #[test]
    fn metric_profiles_map_to_aggregates() {
        assert!(!MetricProfile::Checks.tracks_latency());
        assert!(MetricProfile::Latency.tracks_latency());
        assert!(!MetricProfile::Latency.tracks_size());
        assert!(MetricProfile::Full.tracks_size() && MetricProfile::Full.tracks_status());
    }

    #[test]
    fn debug_output_redacts_token() {
        let params = RunParameters {
            token: "secret".into(),
            ..Default::default()
        };
        assert!(!format!("{:?}", params).contains("secret"));
    }
}
