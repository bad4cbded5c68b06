//! Run configuration.
//!
//! Values come from three layers, highest priority first: command-line
//! flags, `PATHCAP_*` environment variables (both handled by clap), and an
//! optional TOML file. The merged [`ConfigInput`] is resolved once into an
//! immutable [`Config`] that the run borrows.

use std::path::{Path, PathBuf};

use chrono::Duration;
use clap::Parser;
use serde::Deserialize;

use pathcap_common::classifier::Thresholds;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.elcapitan.cloudgenix.com";
pub const DEFAULT_HOURS: u32 = 4;
pub const DEFAULT_PERCENTILE: u8 = 95;
pub const DEFAULT_OPT_OUT_TAG: &str = "auto_bw:false";

/// Size WAN circuit bandwidth from path-capacity telemetry.
#[derive(Parser, Debug, Default)]
#[command(name = "pathcap-agent", about = "Set WAN circuit bandwidth from measured path capacity")]
pub struct Cli {
    /// API token used to authenticate to the controller.
    #[arg(short = 'c', long, env = "PATHCAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Controller API base URL.
    #[arg(long, env = "PATHCAP_API_URL")]
    pub api_url: Option<String>,

    /// TOML file with defaults for any of these options.
    #[arg(long, env = "PATHCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hours of telemetry to evaluate, counting back from now. [default: 4]
    #[arg(short = 'H', long, env = "PATHCAP_HOURS")]
    pub hours: Option<u32>,

    /// Bandwidth ceiling in Mbps; 0 disables it.
    #[arg(short = 'm', long = "max", env = "PATHCAP_MAX")]
    pub max_mbps: Option<f64>,

    /// Drop samples at or above this percentile before averaging. [default: 95]
    #[arg(short = 'p', long, env = "PATHCAP_PERCENTILE")]
    pub percentile: Option<u8>,

    /// Minimum download capacity (Mbps) for the high-bandwidth path policy.
    #[arg(long, env = "PATHCAP_PATH_MIN_DOWN")]
    pub path_min_down: Option<f64>,

    /// Minimum upload capacity (Mbps) for the high-bandwidth path policy.
    #[arg(long, env = "PATHCAP_PATH_MIN_UP")]
    pub path_min_up: Option<f64>,

    /// Name of the path policy stack to assign to high-bandwidth sites.
    #[arg(long, env = "PATHCAP_PATH_POLICY")]
    pub path_policy: Option<String>,

    /// Only process spoke sites carrying this tag.
    #[arg(short = 't', long, env = "PATHCAP_TAG")]
    pub tag: Option<String>,

    /// Circuits carrying this tag are left untouched. [default: auto_bw:false]
    #[arg(long, env = "PATHCAP_OPT_OUT_TAG")]
    pub opt_out_tag: Option<String>,

    /// Also write logs to this file, rotated daily.
    #[arg(long, env = "PATHCAP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'v', long, env = "PATHCAP_VERBOSE")]
    pub verbose: bool,
}

/// Unvalidated configuration, as read from a TOML file or the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub hours: Option<u32>,
    pub max_mbps: Option<f64>,
    pub percentile: Option<u8>,
    pub path_policy: Option<String>,
    pub path_min_down: Option<f64>,
    pub path_min_up: Option<f64>,
    pub tag: Option<String>,
    pub opt_out_tag: Option<String>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
}

/// High-bandwidth policy switching: the stack to assign and the capacity a
/// circuit needs to earn it.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub name: String,
    pub thresholds: Thresholds,
}

/// Where the file log goes: rotated files are named
/// `<file_name>.<date>` inside `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub directory: PathBuf,
    pub file_name: String,
}

impl LogFile {
    fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Err(ConfigError::LogFile(path));
        };
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Ok(Self {
            directory: directory.to_path_buf(),
            file_name: file_name.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub lookback: Duration,
    pub percentile: u8,
    pub ceiling_mbps: Option<f64>,
    pub policy: Option<PolicyConfig>,
    pub site_tag: Option<String>,
    pub opt_out_tag: String,
    pub log_file: Option<LogFile>,
}

impl Cli {
    /// Merge flags over the optional config file and validate the result.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let file = match &self.config {
            Some(path) => ConfigInput::from_file(path)?,
            None => ConfigInput::default(),
        };
        self.to_input().overlay(file).resolve()
    }

    fn to_input(&self) -> ConfigInput {
        ConfigInput {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            hours: self.hours,
            max_mbps: self.max_mbps,
            percentile: self.percentile,
            path_policy: self.path_policy.clone(),
            path_min_down: self.path_min_down,
            path_min_up: self.path_min_up,
            tag: self.tag.clone(),
            opt_out_tag: self.opt_out_tag.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

impl ConfigInput {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(input)?)
    }

    /// Fill every unset field from `lower`.
    pub fn overlay(self, lower: ConfigInput) -> ConfigInput {
        ConfigInput {
            api_url: self.api_url.or(lower.api_url),
            token: self.token.or(lower.token),
            hours: self.hours.or(lower.hours),
            max_mbps: self.max_mbps.or(lower.max_mbps),
            percentile: self.percentile.or(lower.percentile),
            path_policy: self.path_policy.or(lower.path_policy),
            path_min_down: self.path_min_down.or(lower.path_min_down),
            path_min_up: self.path_min_up.or(lower.path_min_up),
            tag: self.tag.or(lower.tag),
            opt_out_tag: self.opt_out_tag.or(lower.opt_out_tag),
            log_file: self.log_file.or(lower.log_file),
        }
    }

    pub fn resolve(self) -> Result<Config, ConfigError> {
        let token = non_empty(self.token).ok_or(ConfigError::MissingToken)?;
        let base_url = non_empty(self.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let hours = self.hours.unwrap_or(DEFAULT_HOURS);
        if hours == 0 {
            return Err(ConfigError::ZeroLookback);
        }

        let percentile = self.percentile.unwrap_or(DEFAULT_PERCENTILE);
        if !(1..=99).contains(&percentile) {
            return Err(ConfigError::PercentileOutOfRange(percentile));
        }

        let ceiling_mbps = match self.max_mbps {
            Some(v) => Some(check_mbps("max", v)?).filter(|v| *v > 0.0),
            None => None,
        };

        let policy = match non_empty(self.path_policy) {
            Some(name) => match (self.path_min_down, self.path_min_up) {
                (Some(down), Some(up)) => Some(PolicyConfig {
                    name,
                    thresholds: Thresholds {
                        min_down_mbps: check_mbps("path_min_down", down)?,
                        min_up_mbps: check_mbps("path_min_up", up)?,
                    },
                }),
                _ => return Err(ConfigError::IncompleteThresholds),
            },
            None => None,
        };

        let log_file = match self.log_file.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Some(LogFile::from_path(path)?),
            None => None,
        };

        Ok(Config {
            api: ApiConfig { base_url, token },
            lookback: Duration::hours(i64::from(hours)),
            percentile,
            ceiling_mbps,
            policy,
            site_tag: non_empty(self.tag),
            opt_out_tag: non_empty(self.opt_out_tag)
                .unwrap_or_else(|| DEFAULT_OPT_OUT_TAG.to_string()),
            log_file,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn check_mbps(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidMbps { name, value })
    }
}
