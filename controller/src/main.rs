mod client;
mod journal;
mod notify;
mod poll;
mod recovery;
#[cfg(test)]
mod testing;

use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coolwatch_common::{ConfigFile, ConfigOverrides, PollState, WatchdogConfig};

use crate::{client::NestClient, journal::RecordLog, notify::Notifier, poll::Watchdog};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = load_config().await?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if config.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let log = RecordLog::create(&config.output).await?;
    let api = NestClient::new(&config).context("failed to build http client")?;
    let notifier = Notifier::from_config(&config);

    info!(
        thermostat = %config.thermostat_id,
        minutes = config.minutes,
        webhooks = notifier.is_configured(),
        "starting cooling watchdog"
    );

    let mut watchdog = Watchdog::new(api, log, notifier, config.interval());

    tokio::select! {
        _ = watchdog.run(PollState::new()) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("shutdown requested");
        }
    }

    watchdog.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn load_config() -> anyhow::Result<WatchdogConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| env_override("COOLWATCH_CONFIG"));

    let file = match path {
        Some(path) => {
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("error reading config file {path}"))?;
            let file = serde_json::from_slice::<ConfigFile>(&raw)
                .with_context(|| format!("error parsing config file {path}"))?;
            Some(file)
        }
        None => None,
    };

    let overrides = ConfigOverrides {
        thermostat_id: env_override("COOLWATCH_THERMOSTAT_ID"),
        token: env_override("COOLWATCH_TOKEN"),
        minutes: env_override("COOLWATCH_MINUTES"),
        output: env_override("COOLWATCH_OUTPUT"),
        last_output: env_override("COOLWATCH_LAST_OUTPUT"),
        debug: env_override("COOLWATCH_DEBUG"),
        webhook_post: env_override("COOLWATCH_WEBHOOK_POST"),
        webhook_get: env_override("COOLWATCH_WEBHOOK_GET"),
        api_url: env_override("COOLWATCH_API_URL"),
    };

    Ok(WatchdogConfig::resolve(file, overrides)?)
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
