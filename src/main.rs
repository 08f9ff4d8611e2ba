use std::path::PathBuf;
use std::sync::Arc;

use topic_metrics::clock::SystemClock;
use topic_metrics::config::{ServerConfig, ENV_CONFIG_PATH};
use topic_metrics::server::MetricsServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
        .map(PathBuf::from);

    let config = ServerConfig::load(config_path.as_deref())?;
    let engine = Arc::new(config.build_engine(Arc::new(SystemClock::new()))?);

    let server = MetricsServer::bind(&config, engine).await?;
    server.run().await?;

    Ok(())
}
