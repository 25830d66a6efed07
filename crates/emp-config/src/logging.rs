use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Install the global subscriber. `RUST_LOG` takes precedence over the
    /// configured level.
    pub fn init(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.max_level().to_string()));

        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.json {
            tracing::subscriber::set_global_default(builder.json().finish())?;
        } else {
            tracing::subscriber::set_global_default(builder.finish())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        let config = |level: &str| LoggingConfig {
            level: level.to_string(),
            json: false,
        };

        assert_eq!(config("debug").max_level(), Level::DEBUG);
        assert_eq!(config("WARN").max_level(), Level::WARN);
        assert_eq!(config("verbose").max_level(), Level::INFO);
    }
}
