use clap::Parser;
use emp_config::ReceiverConfig;
use emp_core::{shutdown, Analyzer};
use emp_kafka::{KafkaConsumerConfig, KafkaSubscriber};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "emp-receiver")]
#[command(about = "Consumes employee records from Kafka and logs their analysis", long_about = None)]
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
    let config = ReceiverConfig::load(&cli.config_dir)?;
    config.logging().init()?;

    info!(
        "Starting employee receiver with config directory: {}",
        cli.config_dir
    );

    let shutdown = shutdown::shutdown_token();

    let mut subscriber = KafkaSubscriber::connect(KafkaConsumerConfig {
        brokers: config.brokers(),
        topic: config.kafka_topic.clone(),
        group_id: config.kafka_group_id.clone(),
        client_id: config.kafka_client_id.clone(),
        ..Default::default()
    })
    .await
    .inspect_err(|e| error!("Error in main function: {}", e))?;

    let analyzer = Analyzer::new();
    subscriber.run(&analyzer, shutdown).await?;

    info!("Employee receiver stopped");
    Ok(())
}
