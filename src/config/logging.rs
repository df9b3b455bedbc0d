use crate::config::app::PlcClientConfig;
use crate::error::{PlcError, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging(config: &PlcClientConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .map_err(|e| PlcError::Config(format!("invalid log level: {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match config.logging.format.as_str() {
        "json" => {
            let json_layer = tracing_subscriber::fmt::layer().json();
            subscriber.with(json_layer).init();
        }
        "pretty" => {
            let pretty_layer = tracing_subscriber::fmt::layer().pretty();
            subscriber.with(pretty_layer).init();
        }
        other => {
            return Err(PlcError::Config(format!("unsupported log format: {other}")));
        }
    }

    info!("logging initialized with level: {}", config.logging.level);
    Ok(())
}
