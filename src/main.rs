//! Wiring & DI. Entry point: bootstrap adapters, inject into services, serve HTTP.
//! No business logic here.

use chat_streams::adapters::http::{AppState, ServiceSettings, create_router};
use chat_streams::adapters::notify::QueueNotifier;
use chat_streams::adapters::persistence::SqliteStore;
use chat_streams::integrations::IntegrationRegistry;
use chat_streams::ports::{ChatStore, NotificationSink};
use chat_streams::shared::config::AppConfig;
use chat_streams::usecases::{AuthService, NotificationWorker};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config not loaded, using defaults");
            AppConfig::default()
        }
    };

    // --- Integrations catalog: a bad declaration is a startup error ---
    let static_root = cfg.static_root();
    let registry = IntegrationRegistry::builtin(static_root.as_deref())
        .map_err(|e| anyhow::anyhow!("integration catalog: {}", e))?;
    info!(count = registry.len(), "integrations loaded");

    // --- Storage ---
    let data_dir = cfg.data_dir_or_default();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("create data dir: {}", e))?;
    let sqlite = SqliteStore::connect(&data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("open store: {}", e))?;
    info!(path = %sqlite.path().display(), "store opened");
    let store: Arc<dyn ChatStore> = Arc::new(sqlite);

    // --- Realm and service users ---
    let auth = AuthService::new(Arc::clone(&store));
    let boot = auth
        .bootstrap(
            &cfg.realm_settings(),
            cfg.bootstrap_owner(),
            cfg.notification_bot(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("bootstrap: {}", e))?;
    info!(
        realm = %boot.realm.name,
        bot_id = boot.notification_bot.id,
        owner = boot.owner.as_ref().map(|u| u.id),
        "realm ready"
    );

    // --- Notification queue: bounded; senders wait when the worker lags ---
    let queue_size = cfg.notification_queue_size_or_default();
    info!(queue_size, "notification queue buffer");
    let (notify_tx, notify_rx) = mpsc::channel(queue_size);
    let worker = NotificationWorker::new(Arc::clone(&store), notify_rx);
    tokio::spawn(async move {
        worker.run().await;
    });
    let notifier: Arc<dyn NotificationSink> = Arc::new(QueueNotifier::new(notify_tx));

    let state = AppState::new(
        store,
        notifier,
        registry,
        ServiceSettings {
            notification_bot_id: boot.notification_bot.id,
            email_gateway_domain: cfg.email_gateway_domain.clone(),
            topic_deletion: cfg.topic_deletion(),
        },
    );
    if cfg.email_gateway_domain.is_none() {
        warn!("STREAMS_EMAIL_GATEWAY_DOMAIN not set, channel email addresses disabled");
    }

    let app = create_router(state);
    let addr = cfg.bind_addr_or_default();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {}", addr, e))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
