use std::sync::Arc;
use std::time::Duration;

use signal_alerts::api::{run_server, AppState};
use signal_alerts::constants::notify::{SHUTDOWN_MESSAGE, STARTUP_MESSAGE};
use signal_alerts::bus::drain_subscriber;
use signal_alerts::constants::{OUTCOME_BUS_CAPACITY, SUBSCRIBER_DRAIN_TIMEOUT};
use signal_alerts::kafka::{AlertConsumer, AuditPublisher, ClaimProcessor, TopicRouter};
use signal_alerts::notify::{Notifier, TelegramClient};
use signal_alerts::services::reporting::AlertReporter;
use signal_alerts::{AlertService, AppConfig, EventBus};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const BROKER_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Setup Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting alert-service...");

    // Load Configuration
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    info!("Configuration loaded:");
    info!("  Kafka brokers: {:?}", config.kafka.brokers);
    info!("  Decision topic: {}", config.kafka.decision_topic);
    info!("  Ranking topic: {}", config.kafka.ranking_topic);
    info!("  Min confidence: {:.2}", config.alerts.min_confidence);
    info!(
        "  Alert on BUY: {}, SELL: {}, WATCH: {}",
        config.alerts.alert_on_buy, config.alerts.alert_on_sell, config.alerts.alert_on_watch
    );
    info!("  Cooldown: {} minutes", config.alerts.cooldown_minutes);
    info!("  Telegram: {:?}", config.telegram);

    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    let event_bus = EventBus::new(OUTCOME_BUS_CAPACITY);

    let reporter = AlertReporter::new();
    let reporter_handle = reporter.start(&event_bus);

    let audit_handle = match &config.kafka.alert_topic {
        Some(topic) => {
            let publisher = Arc::new(AuditPublisher::new(&config.kafka.brokers, topic)?);
            Some(publisher.start(&event_bus))
        }
        None => {
            info!("ℹ️ KAFKA_ALERT_TOPIC not set - alert audit disabled");
            None
        }
    };

    let server_handle = config.health_addr.clone().map(|addr| {
        let state = Arc::new(AppState {
            reporter: reporter.clone(),
        });
        tokio::spawn(async move {
            if let Err(e) = run_server(&addr, state).await {
                error!("❌ Health endpoint failed: {}", e);
            }
        })
    });

    let notifier: Arc<dyn Notifier> = telegram.clone();
    let alert_service = Arc::new(AlertService::new(config.alerts.clone(), notifier, event_bus.clone()));

    let router = TopicRouter::new(&config.kafka.decision_topic, &config.kafka.ranking_topic);
    let processor = ClaimProcessor::new(router, alert_service, event_bus.clone());

    let mut consumer = match AlertConsumer::connect(&config.kafka, processor, BROKER_METADATA_TIMEOUT).await {
        Ok(consumer) => consumer,
        Err(e) => {
            error!("❌ Failed to create Kafka consumer: {}", e);
            return Err(e.into());
        }
    };

    consumer.start().await?;
    info!("Alert service running. Waiting for messages...");

    if let Err(e) = telegram.send_message(STARTUP_MESSAGE).await {
        warn!("⚠️ Failed to send startup notification: {}", e);
    }

    shutdown_signal().await;
    info!("Shutting down alert-service...");

    consumer.stop().await;

    if let Err(e) = telegram.send_message(SHUTDOWN_MESSAGE).await {
        warn!("⚠️ Failed to send shutdown notification: {}", e);
    }

    // The consumer holds the last publishers; once every bus handle is gone
    // the subscribers finish what is queued and exit.
    drop(consumer);
    drop(event_bus);
    if let Some(handle) = audit_handle {
        drain_subscriber("audit publisher", handle, SUBSCRIBER_DRAIN_TIMEOUT).await;
    }
    drain_subscriber("reporter", reporter_handle, SUBSCRIBER_DRAIN_TIMEOUT).await;

    reporter.log_summary();

    if let Some(handle) = server_handle {
        handle.abort();
    }

    info!("Alert service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
