use std::sync::Arc;

use granite::config::Config;
use granite::logging::{self, LogChannel};
use granite::server::{self, ServerContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::load()?;
    let (log, events) = LogChannel::new(config.log.level);
    logging::spawn_sink(events, config.log.level);

    let context = match config.validate().and_then(|_| ServerContext::new(config, log.clone())) {
        Ok(context) => Arc::new(context),
        Err(e) => {
            log.fatal("invalid configuration", &e).await;
            // Not reached; the fatal event terminates the process.
            return Ok(());
        }
    };

    tokio::select! {
        res = server::run(context) => {
            if let Err(e) = res {
                log.fatal("fatal server error", &e).await;
            }
        }

        _ = tokio::signal::ctrl_c() => {
            log.info("shutdown signal received", vec![]);
            // Give the sink a beat to drain before the process exits.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}
