use std::time::Duration;

use emp_core::{Error, MessageHandler, ReceivedMessage, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Headers, Message};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConsumerConfig {
    /// Kafka brokers
    pub brokers: Vec<String>,

    /// Topic to consume from
    pub topic: String,

    /// Consumer group ID
    pub group_id: String,

    pub client_id: String,

    /// Where a group without committed offsets starts reading
    pub auto_offset_reset: String,
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "employee-data".to_string(),
            group_id: "employee-processor-group".to_string(),
            client_id: "employee-receiver".to_string(),
            auto_offset_reset: "earliest".to_string(),
        }
    }
}

impl KafkaConsumerConfig {
    /// Offsets are stored by hand once the handler returns and committed in
    /// the background by the group's auto-commit.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false");
        config
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscriberStatus {
    pub connected: bool,
    pub messages_received: u64,
    pub handler_errors: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

/// Errors after which the consumer cannot make progress on its own
pub(crate) fn is_fatal(error: &KafkaError) -> bool {
    matches!(error, KafkaError::Subscription(_))
        || error.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal)
}

pub(crate) fn to_received<M: Message>(message: &M) -> ReceivedMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| {
                    let value = h
                        .value
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                        .unwrap_or_default();
                    (h.key.to_string(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    ReceivedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned()),
        headers,
        payload: message.payload().map(|p| p.to_vec()),
    }
}

/// Consumer-group member feeding every delivered message to a handler
pub struct KafkaSubscriber {
    config: KafkaConsumerConfig,
    consumer: StreamConsumer,
    status: SubscriberStatus,
}

impl KafkaSubscriber {
    /// Probe the brokers, join the group and subscribe. Failures are
    /// startup errors.
    pub async fn connect(config: KafkaConsumerConfig) -> Result<Self> {
        info!(
            "Connecting to Kafka brokers {:?} as group '{}'",
            config.brokers, config.group_id
        );

        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| Error::Startup(format!("Failed to create Kafka consumer: {}", e)))?;

        let topic = config.topic.clone();
        let (consumer, probe) = tokio::task::spawn_blocking(move || {
            let probe = consumer
                .fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)
                .map(|_| ());
            (consumer, probe)
        })
        .await
        .map_err(|e| Error::Startup(format!("Kafka metadata probe panicked: {}", e)))?;
        probe.map_err(|e| Error::Startup(format!("Failed to reach Kafka brokers: {}", e)))?;
        info!("Connected to Kafka consumer");

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| Error::Startup(format!("Failed to subscribe: {}", e)))?;

        info!("Subscribed to topic: {}", config.topic);

        Ok(Self {
            config,
            consumer,
            status: SubscriberStatus {
                connected: true,
                ..Default::default()
            },
        })
    }

    pub fn status(&self) -> SubscriberStatus {
        self.status.clone()
    }

    /// Dispatch messages until `shutdown` is cancelled.
    ///
    /// The offset of a message is stored after the handler returns, whether
    /// it succeeded or not, so a malformed message is dropped rather than
    /// redelivered. Transient broker errors are logged; librdkafka rejoins
    /// the group on its own and resumes from the last committed offset. A
    /// fatal client error ends the loop and is returned.
    pub async fn run<H>(&mut self, handler: &H, shutdown: CancellationToken) -> Result<()>
    where
        H: MessageHandler + ?Sized,
    {
        info!("Consuming from '{}'", self.config.topic);

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                delivery = self.consumer.recv() => delivery,
            };

            match delivery {
                Ok(message) => {
                    self.status.messages_received += 1;
                    let received = to_received(&message);

                    if let Err(e) = handler.handle(&received).await {
                        error!(
                            "Error processing message {}[{}]@{}: {}",
                            received.topic, received.partition, received.offset, e
                        );
                        self.status.handler_errors += 1;
                        self.status.last_error = Some(e.to_string());
                    }

                    if let Err(e) = self.consumer.store_offset_from_message(&message) {
                        warn!("Failed to store offset {}: {}", received.offset, e);
                    }
                }
                Err(e) if is_fatal(&e) => {
                    error!("Fatal Kafka consumer error: {}", e);
                    self.status.errors += 1;
                    self.status.last_error = Some(e.to_string());
                    self.disconnect();
                    return Err(Error::ConsumeFailure(e.to_string()));
                }
                Err(e) => {
                    error!("Error receiving from Kafka: {}", e);
                    self.status.errors += 1;
                    self.status.last_error = Some(e.to_string());
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }

        self.disconnect();
        Ok(())
    }

    /// Commit stored offsets and leave the group
    pub fn disconnect(&mut self) {
        info!("Disconnecting from Kafka");

        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(_) => debug!("Committed consumer offsets"),
            Err(e) => warn!("Failed to commit offsets on shutdown: {}", e),
        }
        self.consumer.unsubscribe();

        self.status.connected = false;
        info!(
            received = self.status.messages_received,
            handler_errors = self.status.handler_errors,
            "Kafka consumer disconnected"
        );
    }
}
