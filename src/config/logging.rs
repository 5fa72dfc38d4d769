//! Logging configuration and initialization.

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. Called once, at startup.
    pub fn init(&self) {
        let filter = EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder().with_env_filter(filter);

        match self.format {
            LogFormat::Json => {
                let _ = subscriber.json().try_init();
            }
            LogFormat::Pretty => {
                let _ = subscriber.try_init();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_info() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn default_format_is_pretty() {
        assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);
    }
}
