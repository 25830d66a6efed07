mod logging;

use emp_core::{Error, DEFAULT_CACHE_TTL};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use logging::LoggingConfig;

/// Settings of the publisher process. Every key maps to the upper-case
/// environment variable of the same name (`kafka_broker` ← `KAFKA_BROKER`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Comma-separated list of Kafka brokers
    pub kafka_broker: String,
    pub kafka_client_id: String,
    pub kafka_topic: String,

    pub mysql_host: String,
    pub mysql_port: u16,
    pub mysql_user: String,
    pub mysql_password: String,
    pub mysql_database: String,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,

    /// Milliseconds between two emissions
    pub publish_interval: u64,

    /// Seconds a cached snapshot lives
    pub cache_ttl: u64,

    pub log_level: String,
    pub log_json: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kafka_broker: "localhost:9092".to_string(),
            kafka_client_id: "employee-publisher".to_string(),
            kafka_topic: "employee-data".to_string(),
            mysql_host: "localhost".to_string(),
            mysql_port: 3306,
            mysql_user: "root".to_string(),
            mysql_password: "root".to_string(),
            mysql_database: "employees".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_db: 0,
            publish_interval: 5000,
            cache_ttl: DEFAULT_CACHE_TTL.as_secs(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl PublisherConfig {
    pub fn load(config_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = load_layered(config_dir.as_ref(), environment())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> emp_core::Result<()> {
        if self.publish_interval == 0 {
            return Err(Error::Configuration(
                "PUBLISH_INTERVAL must be greater than zero".to_string(),
            ));
        }
        if self.cache_ttl < 2 {
            return Err(Error::Configuration(
                "CACHE_TTL must be at least 2 seconds".to_string(),
            ));
        }
        if self.brokers().is_empty() {
            return Err(Error::Configuration("KAFKA_BROKER is empty".to_string()));
        }
        Ok(())
    }

    pub fn brokers(&self) -> Vec<String> {
        split_brokers(&self.kafka_broker)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Settings of the receiver process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Comma-separated list of Kafka brokers
    pub kafka_broker: String,
    pub kafka_client_id: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,

    pub log_level: String,
    pub log_json: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            kafka_broker: "localhost:9092".to_string(),
            kafka_client_id: "employee-receiver".to_string(),
            kafka_topic: "employee-data".to_string(),
            kafka_group_id: "employee-processor-group".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl ReceiverConfig {
    pub fn load(config_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = load_layered(config_dir.as_ref(), environment())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> emp_core::Result<()> {
        if self.brokers().is_empty() {
            return Err(Error::Configuration("KAFKA_BROKER is empty".to_string()));
        }
        if self.kafka_group_id.trim().is_empty() {
            return Err(Error::Configuration("KAFKA_GROUP_ID is empty".to_string()));
        }
        Ok(())
    }

    pub fn brokers(&self) -> Vec<String> {
        split_brokers(&self.kafka_broker)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }
}

/// Values stay strings here; numeric and boolean fields are converted on
/// deserialization, so `MYSQL_PASSWORD=007` keeps its leading zero.
fn environment() -> config::Environment {
    config::Environment::default()
}

fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Defaults, then `default.yaml` and `docker.yaml` from `config_dir`, then
/// environment variables.
fn load_layered<T>(config_dir: &Path, env: config::Environment) -> anyhow::Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let s = config::Config::builder()
        .add_source(config::Config::try_from(&T::default())?)
        .add_source(
            config::File::with_name(&config_dir.join("default.yaml").to_string_lossy())
                .required(false),
        )
        .add_source(
            config::File::with_name(&config_dir.join("docker.yaml").to_string_lossy())
                .required(false),
        )
        .add_source(env)
        .build()?;

    let config = s.try_deserialize()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let mut map = config::Map::new();
        for (k, v) in vars {
            map.insert(k.to_string(), v.to_string());
        }
        environment().source(Some(map))
    }

    fn missing_dir() -> std::path::PathBuf {
        std::env::temp_dir().join("emp-config-does-not-exist")
    }

    #[test]
    fn test_publisher_defaults() {
        let config: PublisherConfig = load_layered(&missing_dir(), env(&[])).unwrap();

        assert_eq!(config.brokers(), vec!["localhost:9092"]);
        assert_eq!(config.kafka_client_id, "employee-publisher");
        assert_eq!(config.kafka_topic, "employee-data");
        assert_eq!(config.redis_url(), "redis://localhost:6379");
        assert_eq!(config.publish_interval(), Duration::from_millis(5000));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_publisher_env_overrides() {
        let config: PublisherConfig = load_layered(
            &missing_dir(),
            env(&[
                ("KAFKA_BROKER", "kafka-1:9092, kafka-2:9092"),
                ("MYSQL_HOST", "db"),
                ("MYSQL_PASSWORD", "1234"),
                ("REDIS_PORT", "6380"),
                ("PUBLISH_INTERVAL", "250"),
            ]),
        )
        .unwrap();

        assert_eq!(config.brokers(), vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(config.mysql_host, "db");
        assert_eq!(config.mysql_password, "1234");
        assert_eq!(config.redis_port, 6380);
        assert_eq!(config.publish_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_numeric_looking_strings_are_kept_verbatim() {
        let config: PublisherConfig = load_layered(
            &missing_dir(),
            env(&[
                ("MYSQL_PASSWORD", "007"),
                ("MYSQL_USER", "TRUE"),
                ("MYSQL_DATABASE", "1.50"),
                ("LOG_JSON", "true"),
                ("CACHE_TTL", "60"),
            ]),
        )
        .unwrap();

        assert_eq!(config.mysql_password, "007");
        assert_eq!(config.mysql_user, "TRUE");
        assert_eq!(config.mysql_database, "1.50");
        assert!(config.log_json);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_publisher_validation() {
        let config = PublisherConfig {
            publish_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PublisherConfig {
            kafka_broker: " , ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_receiver_defaults_and_overrides() {
        let config: ReceiverConfig = load_layered(&missing_dir(), env(&[])).unwrap();
        assert_eq!(config.kafka_client_id, "employee-receiver");
        assert_eq!(config.kafka_group_id, "employee-processor-group");

        let config: ReceiverConfig =
            load_layered(&missing_dir(), env(&[("KAFKA_GROUP_ID", "analytics")])).unwrap();
        assert_eq!(config.kafka_group_id, "analytics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let path = std::env::temp_dir().join("emp-config-publisher-test.yaml");
        let config = PublisherConfig {
            mysql_database: "hr".to_string(),
            ..Default::default()
        };

        config.to_file(&path).unwrap();
        let loaded = PublisherConfig::from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.mysql_database, "hr");
        assert_eq!(loaded.publish_interval, 5000);
    }
}
