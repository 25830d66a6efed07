mod consumer;
mod producer;

pub use consumer::{KafkaConsumerConfig, KafkaSubscriber, SubscriberStatus};
pub use producer::{KafkaProducerConfig, KafkaPublisher};
