//! Error types for the agent.
//!
//! Missing telemetry is not an error: it produces a zero estimate and the
//! circuit is skipped. Everything here aborts the run.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or incomplete configuration, raised before any site is evaluated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("an API token is required (--token or PATHCAP_TOKEN)")]
    MissingToken,
    #[error("--path-policy requires both --path-min-down and --path-min-up")]
    IncompleteThresholds,
    #[error("percentile must be between 1 and 99, got {0}")]
    PercentileOutOfRange(u8),
    #[error("lookback must be at least one hour")]
    ZeroLookback,
    #[error("{name} must be a finite, non-negative number, got {value}")]
    InvalidMbps { name: &'static str, value: f64 },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log file path {0} does not name a file")]
    LogFile(PathBuf),
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A configured policy stack could not be found among the controller's stacks.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no path policy stack named '{0}'")]
    PolicyStack(String),
    #[error("no default path policy stack is defined")]
    DefaultPolicyStack,
}

/// Failure talking to the controller.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("login rejected: {0}")]
    Login(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Anything that stops a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    External(#[from] SourceError),
}
