use std::sync::Arc;

use crate::core::{
    alerts::{
        engine::{AlertEngine, EngineDeps},
        model::{Alert, Severity},
    },
    channels::{Channels, LogEmailSender, LogWhatsAppSender, WhatsAppAuditLog},
    clock::SystemClock,
    config::ConfigManager,
    notifications::{NotificationCenter, NotificationDeps, NotificationDraft, NotificationKind},
    platform::{LogPlatform, Permission},
    storage::{FileStore, KeyValueStore},
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn summarize(alerts: &[Alert]) {
    let unread = alerts.iter().filter(|a| !a.is_read).count();
    let critical = alerts.iter().filter(|a| a.is_open_critical()).count();
    log::info!(
        "Alerts: {} total, {} unread, {} open critical",
        alerts.len(),
        unread,
        critical
    );
}

/// Run the engine with log-only channels until Ctrl-C.
pub fn run() {
    init_logging();

    let config_manager = ConfigManager::from_env();
    let config = config_manager.load();
    log::info!("Using config {}", config_manager.path().display());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start tokio runtime: {}", e);
            return;
        }
    };

    runtime.block_on(async move {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        let clock = Arc::new(SystemClock);
        let channels = Channels {
            platform: Arc::new(LogPlatform::new(Permission::Default)),
            email: Arc::new(LogEmailSender),
            whatsapp: Arc::new(LogWhatsAppSender),
            audit: Arc::new(WhatsAppAuditLog::new(
                storage.clone(),
                config.whatsapp_log_limit,
            )),
            management_url: config.management_url.clone(),
        };

        let engine = Arc::new(AlertEngine::new(EngineDeps {
            storage: storage.clone(),
            clock: clock.clone(),
            channels: channels.clone(),
            generation_probability: config.generation_probability,
            rng_seed: config.rng_seed,
        }));
        let center = NotificationCenter::new(NotificationDeps {
            storage,
            clock,
            channels,
            rng_seed: config.rng_seed.map(|seed| seed.wrapping_add(1)),
        });

        if !center.request_permission() {
            log::warn!("Push notifications not permitted; other channels still active");
        }

        let subscription = engine.subscribe(summarize);
        if !engine.start(config.timer_intervals()) {
            return;
        }
        center.show_notification(NotificationDraft::new(
            "Alert engine running",
            format!(
                "Generating alerts every {}s, auto-resolving every {}s.",
                config.generation_interval_secs, config.auto_resolve_interval_secs
            ),
            NotificationKind::Info,
        ));

        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to wait for Ctrl-C: {}", e);
        }

        engine.shutdown();
        subscription.unsubscribe();

        let metrics = engine.metrics();
        let critical = metrics
            .alerts_by_severity
            .get(&Severity::Critical)
            .copied()
            .unwrap_or(0);
        log::info!(
            "Shutting down: {} alerts ({} critical), {:.0}% resolved, avg resolution {:.1} min",
            metrics.total_alerts,
            critical,
            metrics.resolution_rate * 100.0,
            metrics.average_resolution_time
        );
    });
}
