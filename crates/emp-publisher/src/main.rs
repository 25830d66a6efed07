use clap::Parser;
use emp_config::PublisherConfig;
use emp_core::{shutdown, Emitter, EmitterConfig, CACHE_KEY};
use emp_kafka::{KafkaProducerConfig, KafkaPublisher};
use emp_mysql_source::{MysqlConfig, MysqlSource};
use emp_redis_cache::{RedisCacheConfig, RedisSnapshotCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound on closing the backends after a shutdown signal
const SHUTDOWN_WINDOW: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "emp-publisher")]
#[command(about = "Publishes active employee records to Kafka", long_about = None)]
struct Cli {
    /// Directory holding optional default.yaml / docker.yaml overrides
    #[arg(short, long, default_value = "config")]
    config_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = PublisherConfig::load(&cli.config_dir)?;
    config.logging().init()?;

    info!(
        "Starting employee publisher with config directory: {}",
        cli.config_dir
    );

    let shutdown = shutdown::shutdown_token();

    let publisher = KafkaPublisher::connect(KafkaProducerConfig {
        brokers: config.brokers(),
        topic: config.kafka_topic.clone(),
        client_id: config.kafka_client_id.clone(),
        ..Default::default()
    })
    .await
    .inspect_err(|e| error!("Error in main function: {}", e))?;

    let source = MysqlSource::new(MysqlConfig {
        host: config.mysql_host.clone(),
        port: config.mysql_port,
        username: config.mysql_user.clone(),
        password: config.mysql_password.clone(),
        database: config.mysql_database.clone(),
    });

    let cache = RedisSnapshotCache::new(RedisCacheConfig {
        url: config.redis_url(),
        key: CACHE_KEY.to_string(),
        ttl_secs: config.cache_ttl,
        database: config.redis_db,
    });

    let emitter = Arc::new(Emitter::new(
        Arc::new(source),
        Arc::new(cache),
        Arc::new(publisher),
        EmitterConfig::new(config.publish_interval(), config.cache_ttl()),
    ));

    let task = tokio::spawn(emitter.run(shutdown.clone()));

    shutdown.cancelled().await;
    match tokio::time::timeout(SHUTDOWN_WINDOW, task).await {
        Ok(Ok(())) => info!("Employee publisher stopped"),
        Ok(Err(e)) => error!("Emitter task failed: {}", e),
        Err(_) => warn!(
            "Backends did not close within {}s, exiting",
            SHUTDOWN_WINDOW.as_secs()
        ),
    }

    Ok(())
}
