//! Run configuration from command-line flags and environment variables.
//!
//! Only two flags exist, `-concurrency` and `-count`. Everything else
//! comes from the environment with defaults suitable for a local service.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use imago_core::error::CoreError;
use imago_core::job::BatchTemplate;

use crate::pool::RunPlan;
use crate::reporter::DEFAULT_REPORT_INTERVAL;
use crate::submitter::{DEFAULT_STATUS_TIMEOUT, REQUEST_TIMEOUT_GRACE};

/// Conversion service used when `IMAGO_SERVER_URL` is unset.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Long flags that may be written Go-style with a single dash.
const LONG_FLAGS: [&str; 2] = ["concurrency", "count"];

/// Load generator for the imago conversion service.
#[derive(Debug, Parser)]
#[command(name = "imago-loadgen", version)]
pub struct Cli {
    /// Number of concurrent workers.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: u32,

    /// Requests made by each worker.
    #[arg(long, default_value_t = 5)]
    pub count: u32,
}

impl Cli {
    /// Parse process arguments, accepting `-concurrency` as well as `--concurrency`.
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    pub fn plan(&self) -> RunPlan {
        RunPlan {
            concurrency: self.concurrency as usize,
            count: self.count,
        }
    }
}

/// Rewrite `-concurrency`/`-count` (optionally `=value`) to their `--` form.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(s) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = s.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("--{rest}"))
            } else {
                arg
            }
        })
        .collect()
}

/// Errors from environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("Invalid job template: {0}")]
    Template(#[from] CoreError),
}

/// Settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    /// Value of the `timeout` query parameter on status requests.
    pub status_timeout: Duration,
    pub report_interval: Duration,
    pub template: BatchTemplate,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `IMAGO_SERVER_URL`     | `http://localhost:3000` |
    /// | `STATUS_TIMEOUT_SECS`  | `300`                   |
    /// | `REPORT_INTERVAL_SECS` | `10`                    |
    /// | `IMAGO_SOURCE_URI`     | fixture source image    |
    /// | `IMAGO_OUTPUT_PREFIX`  | fixture output prefix   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("IMAGO_SERVER_URL")
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim()
            .to_string();
        if server_url.is_empty() {
            return Err(ConfigError::Empty {
                name: "IMAGO_SERVER_URL",
            });
        }

        let status_timeout = seconds(&lookup, "STATUS_TIMEOUT_SECS", DEFAULT_STATUS_TIMEOUT)?;
        if status_timeout.checked_add(REQUEST_TIMEOUT_GRACE).is_none() {
            return Err(ConfigError::InvalidSeconds {
                name: "STATUS_TIMEOUT_SECS",
                value: status_timeout.as_secs().to_string(),
            });
        }
        let report_interval = seconds(&lookup, "REPORT_INTERVAL_SECS", DEFAULT_REPORT_INTERVAL)?;

        let mut template = BatchTemplate::default();
        if let Some(source) = lookup("IMAGO_SOURCE_URI") {
            template.source = source;
        }
        if let Some(prefix) = lookup("IMAGO_OUTPUT_PREFIX") {
            template.output_prefix = prefix;
        }
        template.validate()?;

        Ok(Self {
            server_url,
            status_timeout,
            report_interval,
            template,
        })
    }

    /// Client-side bound on a single request, longer than the server's long-poll.
    pub fn request_timeout(&self) -> Duration {
        self.status_timeout.saturating_add(REQUEST_TIMEOUT_GRACE)
    }
}

fn seconds<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidSeconds { name, value }),
        },
    }
}
