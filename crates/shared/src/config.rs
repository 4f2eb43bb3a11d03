//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Report computation configuration.
    #[serde(default)]
    pub report: ReportConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which journal entries feed the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMoveSetting {
    /// Only posted entries.
    #[default]
    Posted,
    /// All entries, including drafts.
    All,
}

/// Report computation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// IANA timezone used to turn date windows into datetime windows.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Default target move for report instances.
    #[serde(default)]
    pub target_move: TargetMoveSetting,
    /// chrono format string for dates shown in column headers.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Rendered text of a KPI whose formula divides by zero.
    #[serde(default = "default_div_by_zero_marker")]
    pub div_by_zero_marker: String,
    /// Rendered text of a KPI whose formula fails.
    #[serde(default = "default_error_marker")]
    pub error_marker: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_div_by_zero_marker() -> String {
    "#DIV/0".to_string()
}

fn default_error_marker() -> String {
    "#ERR".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            target_move: TargetMoveSetting::default(),
            date_format: default_date_format(),
            div_by_zero_marker: default_div_by_zero_marker(),
            error_marker: default_error_marker(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "misbuilder=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("MISBUILDER").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
