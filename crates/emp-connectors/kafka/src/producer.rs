use std::time::Duration;

use async_trait::async_trait;
use emp_core::{EmployeeMessage, Error, MessagePublisher, Result};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaProducerConfig {
    /// Kafka brokers
    pub brokers: Vec<String>,

    /// Topic to publish to
    pub topic: String,

    pub client_id: String,

    /// Upper bound on waiting for a delivery report
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

impl Default for KafkaProducerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "employee-data".to_string(),
            client_id: "employee-publisher".to_string(),
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

impl KafkaProducerConfig {
    fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    /// librdkafka settings. The murmur2 partitioner hashes the key the way
    /// the Java client does, so one `emp_no` always lands on one partition.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("client.id", &self.client_id)
            .set("acks", "all")
            .set("partitioner", "murmur2_random")
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        config
    }
}

pub(crate) fn owned_headers(message: &EmployeeMessage) -> OwnedHeaders {
    message
        .headers
        .iter()
        .fold(OwnedHeaders::new(), |headers, (key, value)| {
            headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            })
        })
}

/// Bus producer for employee messages
pub struct KafkaPublisher {
    config: KafkaProducerConfig,
    producer: FutureProducer,
}

impl KafkaPublisher {
    /// Create the producer and probe the cluster. Any failure here is a
    /// startup error.
    pub async fn connect(config: KafkaProducerConfig) -> Result<Self> {
        info!("Connecting to Kafka brokers: {:?}", config.brokers);

        let producer: FutureProducer = config
            .client_config()
            .create()
            .map_err(|e| Error::Startup(format!("Failed to create Kafka producer: {}", e)))?;

        let probe = producer.clone();
        let timeout = config.message_timeout();
        let topic = config.topic.clone();
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(topic.as_str()), Timeout::After(timeout))
                .map(|_| ())
        })
        .await
        .map_err(|e| Error::Startup(format!("Kafka metadata probe panicked: {}", e)))?
        .map_err(|e| Error::Startup(format!("Failed to reach Kafka brokers: {}", e)))?;

        info!("Connected to Kafka producer");
        Ok(Self { config, producer })
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, message: EmployeeMessage) -> Result<()> {
        let record = FutureRecord::to(&self.config.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_slice())
            .headers(owned_headers(&message));

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.config.message_timeout()))
            .await
            .map_err(|(e, _)| Error::PublishFailure(e.to_string()))?;

        debug!(
            "Delivered key {} to {}[{}] at offset {}",
            message.key, self.config.topic, partition, offset
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting Kafka producer");

        let producer = self.producer.clone();
        let timeout = self.config.message_timeout();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| Error::PublishFailure(format!("Producer flush panicked: {}", e)))?
            .map_err(|e| Error::PublishFailure(format!("Failed to flush producer: {}", e)))?;

        info!("Kafka producer disconnected");
        Ok(())
    }
}
