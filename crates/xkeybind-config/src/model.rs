//! Configuration data model

use std::time::Duration;

use crate::error::SourceLocation;

/// Default refresh timeout, in milliseconds
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 5000;

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub bindings: Vec<BindingEntry>,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// X display to connect to; `$DISPLAY` when unset
    pub display: Option<String>,
    /// Bound on one mapping refresh; `None` waits forever
    pub refresh_timeout: Option<Duration>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            display: None,
            refresh_timeout: Some(Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// A `bind` entry: a binding string such as `"Mod4-j"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub spec: String,
    /// Where the entry was declared, for diagnostics
    pub location: Option<SourceLocation>,
}

impl BindingEntry {
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            location: None,
        }
    }
}

