pub const DEFAULT_LOG_FILTER: &str = "info,callwise=debug,tower_http=debug";

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl TracingConfig {
    pub fn new(environment: impl Into<String>, json_format: bool, default_filter: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            json_format,
            default_filter: default_filter.into(),
        }
    }

    /// `LOG_FORMAT=json` forces JSON output regardless of configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
            self.json_format = true;
        }
        self
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new("local", false, DEFAULT_LOG_FILTER)
    }
}
