//! # Logging & Tracing Infrastructure
//!
//! Provides structured logging with the `tracing` crate, supporting:
//! - JSON, pretty and compact output formats
//! - Module-level filtering through `EnvFilter`
//! - Helpers for keeping tokens and emails out of log lines
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug);
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!("Transfer tool started");
//! }
//! ```
//!
//! Credential values never go through `tracing` fields directly. Use
//! [`redact_if_sensitive`] when a field might carry one.

use crate::error::{Error, Result};
use bridge_traits::time::LogLevel;
use std::io;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are shown at the configured level. Everything else
/// defaults to `warn`.
const WORKSPACE_TARGETS: &[&str] = &[
    "lrsync_workspace",
    "core_runtime",
    "core_auth",
    "core_transfer",
    "provider_google_drive",
    "provider_lightroom",
    "bridge_desktop",
];

/// Noisy transport crates pinned to `warn`.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Minimum level for workspace crates
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_auth=debug,core_transfer=trace").
    /// Replaces the default per-crate filter entirely.
    pub filter: Option<String>,
    /// Emit span enter/exit events
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Initialize the global subscriber.
///
/// Call once during application startup.
///
/// # Errors
///
/// Returns [`Error::Config`] if the filter string is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    match config.format {
        LogFormat::Pretty => init_pretty_logging(&config, filter),
        LogFormat::Json => init_json_logging(&config, filter),
        LogFormat::Compact => init_compact_logging(&config, filter),
    }
}

/// Build the `EnvFilter` for a configuration.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter_string = match &config.filter {
        Some(custom) => custom.clone(),
        None => default_filter_string(config.level),
    };

    EnvFilter::try_new(&filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter {:?}: {}", filter_string, e)))
}

fn default_filter_string(level: LogLevel) -> String {
    let level = level.as_str();
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level)),
    );
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

fn span_events(enable: bool) -> tracing_subscriber::fmt::format::FmtSpan {
    if enable {
        tracing_subscriber::fmt::format::FmtSpan::ACTIVE
    } else {
        tracing_subscriber::fmt::format::FmtSpan::NONE
    }
}

fn init_error(e: impl std::fmt::Display) -> Error {
    Error::Config(format!("Failed to initialize logging: {}", e))
}

fn init_pretty_logging(config: &LoggingConfig, filter: EnvFilter) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_span_events(span_events(config.enable_spans))
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(init_error)
}

fn init_json_logging(config: &LoggingConfig, filter: EnvFilter) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(config.enable_spans)
        .with_span_list(config.enable_spans)
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(init_error)
}

fn init_compact_logging(config: &LoggingConfig, filter: EnvFilter) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(init_error)
}

/// Redact a field value when the field name suggests a credential, and mask
/// anything that looks like an email address.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("refresh_token", "1//0abc"), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("album", "Summer 2024"), "Summer 2024");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const SENSITIVE_FIELDS: &[&str] = &[
        "token",
        "password",
        "secret",
        "api_key",
        "authorization",
        "bearer",
        "auth_code",
    ];

    let field_lower = field_name.to_lowercase();
    if SENSITIVE_FIELDS.iter().any(|&f| field_lower.contains(f)) {
        return "[REDACTED]".to_string();
    }

    match value.find('@') {
        Some(at_pos) if value[at_pos..].contains('.') => {
            format!("{}***@[REDACTED]", &value[..1.min(at_pos)])
        }
        _ => value.to_string(),
    }
}

/// Strip a path to its final component.
///
/// ```
/// use core_runtime::logging::strip_path;
///
/// assert_eq!(strip_path("/home/user/tokens/google_token.json"), "google_token.json");
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_auth=trace")
            .with_spans(false)
            .with_target(true)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter, Some("core_auth=trace".to_string()));
        assert!(!config.enable_spans);
        assert!(config.display_target);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("access_token", "ya29.a0"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("client_secret", "GOCSPX"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("auth_code", "4/0Abc"), "[REDACTED]");

        let redacted = redact_if_sensitive("email", "user@example.com");
        assert!(redacted.starts_with('u'));
        assert!(redacted.contains("[REDACTED]"));

        assert_eq!(redact_if_sensitive("file_id", "1AbCd"), "1AbCd");
        assert_eq!(redact_if_sensitive("name", "IMG_0001.jpg"), "IMG_0001.jpg");
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(strip_path("/home/user/tokens/adobe_token.json"), "adobe_token.json");
        assert_eq!(strip_path("C:\\Users\\me\\tokens\\google_token.json"), "google_token.json");
        assert_eq!(strip_path("google_token.json"), "google_token.json");
        assert_eq!(strip_path("/var/log/"), "");
    }

    #[test]
    fn test_default_format() {
        #[cfg(debug_assertions)]
        assert_eq!(LogFormat::default(), LogFormat::Pretty);

        #[cfg(not(debug_assertions))]
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn test_build_filter_uses_level_for_workspace_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();

        assert!(filter.contains("core_transfer=debug"));
        assert!(filter.contains("provider_lightroom=debug"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("core_auth=trace,core_transfer=debug");
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("core_auth=trace"));
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_auth=[");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }
}
