// Alert engine - owns the alert store and preference store, and exposes the
// lifecycle operations, queries, metrics and background timers.
//
// Flow for a new alert: store insert -> observers notified -> channel delivery.
// Every mutation goes through the same store lock, timers included.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::broadcaster::{Broadcaster, Observer, Subscription};
use super::dispatch::{DeliveryPlan, Dispatcher};
use super::generator::{SyntheticGenerator, SYSTEM_RESOLVER};
use super::metrics::AlertMetrics;
use super::model::{Alert, AlertDraft, AlertId};
use super::settings::{AlertSettings, PreferenceStore, SettingsPatch};
use super::store::AlertStore;
use crate::core::channels::Channels;
use crate::core::clock::{generate_id, Clock};
use crate::core::scheduler::{SchedulerHandle, TimerJob};
use crate::core::storage::KeyValueStore;

/// Collaborators and tunables for an engine instance
pub struct EngineDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub channels: Channels,
    pub generation_probability: f64,
    /// Fixed seed for reproducible ids and synthetic events
    pub rng_seed: Option<u64>,
}

/// Background timer periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerIntervals {
    pub generation: Duration,
    pub auto_resolve: Duration,
}

impl Default for TimerIntervals {
    fn default() -> Self {
        Self {
            generation: Duration::from_secs(30),
            auto_resolve: Duration::from_secs(60),
        }
    }
}

struct StoreState {
    store: AlertStore,
    /// Bumped on every visible change; stamps broadcasts
    version: u64,
}

pub struct AlertEngine {
    state: Mutex<StoreState>,
    preferences: Mutex<PreferenceStore>,
    broadcaster: Broadcaster<Alert>,
    dispatcher: Dispatcher,
    generator: SyntheticGenerator,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    timers: Mutex<Option<SchedulerHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl AlertEngine {
    /// Build an engine; settings are loaded from storage once, here.
    pub fn new(deps: EngineDeps) -> Self {
        let rng = match deps.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            state: Mutex::new(StoreState {
                store: AlertStore::new(),
                version: 0,
            }),
            preferences: Mutex::new(PreferenceStore::load(deps.storage)),
            broadcaster: Broadcaster::new(),
            dispatcher: Dispatcher::new(deps.channels),
            generator: SyntheticGenerator::new(deps.generation_probability),
            clock: deps.clock,
            rng: Mutex::new(rng),
            timers: Mutex::new(None),
        }
    }

    // ============================================
    // Observers & queries
    // ============================================

    /// Register an observer; it is called right away with the current alerts
    /// and then after every change, always newest-first.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[Alert]) + Send + Sync + 'static,
    {
        let (version, snapshot) = {
            let state = lock(&self.state);
            (state.version, Arc::<[Alert]>::from(state.store.alerts()))
        };
        let observer: Observer<Alert> = Arc::new(observer);
        self.broadcaster.subscribe(observer, version, snapshot)
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.state).store.alerts().to_vec()
    }

    pub fn alert(&self, id: &str) -> Option<Alert> {
        lock(&self.state).store.get(id).cloned()
    }

    pub fn unread_alerts(&self) -> Vec<Alert> {
        lock(&self.state).store.unread()
    }

    /// Critical alerts that are not resolved yet
    pub fn critical_alerts(&self) -> Vec<Alert> {
        lock(&self.state).store.critical()
    }

    pub fn metrics(&self) -> AlertMetrics {
        let state = lock(&self.state);
        AlertMetrics::compute(state.store.alerts())
    }

    // ============================================
    // Settings
    // ============================================

    pub fn settings(&self) -> AlertSettings {
        lock(&self.preferences).settings().clone()
    }

    /// Merge a partial update and persist it. Returns the new settings.
    pub fn update_settings(&self, patch: SettingsPatch) -> AlertSettings {
        let settings = lock(&self.preferences).update(patch);
        log::info!("Alert settings updated");
        settings
    }

    // ============================================
    // Generation & lifecycle
    // ============================================

    /// Create an alert from `draft`, notify observers, then start delivery.
    pub fn raise_alert(&self, draft: AlertDraft) -> Alert {
        self.raise_with_plan(draft).0
    }

    /// Like `raise_alert`, also reporting which channels were used.
    pub fn raise_with_plan(&self, draft: AlertDraft) -> (Alert, DeliveryPlan) {
        let settings = self.settings();
        let now = self.clock.now();
        let id = generate_id("alert", now, &mut *lock(&self.rng));
        let alert = build_alert(id, draft, &settings, now);

        self.mutate(|store| {
            store.insert(alert.clone());
            true
        });
        log::info!(
            "Alert raised: {} [{} / {}] {}",
            alert.id,
            alert.alert_type.as_str(),
            alert.severity.as_str(),
            alert.title
        );

        let plan = self
            .dispatcher
            .dispatch(&alert, &settings, self.clock.local_time(), now);
        (alert, plan)
    }

    /// Mark one alert read. Unknown or already-read ids are ignored.
    pub fn mark_as_read(&self, id: &str) -> bool {
        self.mutate(|store| store.mark_read(id))
    }

    pub fn mark_all_as_read(&self) {
        self.mutate(|store| store.mark_all_read());
    }

    /// Resolve an open alert. The first resolution wins; later calls, and
    /// unknown ids, are ignored and return false.
    pub fn resolve_alert(&self, id: &str, resolved_by: &str) -> bool {
        let now = self.clock.now();
        let resolved = self.mutate(|store| store.resolve(id, resolved_by, now));
        if resolved {
            log::info!("Alert {} resolved by {}", id, resolved_by);
        }
        resolved
    }

    /// One synthetic-generation timer tick.
    pub fn generation_tick(&self) -> Option<Alert> {
        let settings = self.settings();
        let draft = {
            let mut rng = lock(&self.rng);
            self.generator.maybe_generate(&mut *rng, &settings)
        }?;
        Some(self.raise_alert(draft))
    }

    /// One auto-resolution timer tick: close a random open alert, if any.
    pub fn auto_resolve_tick(&self) -> Option<AlertId> {
        let now = self.clock.now();
        let mut picked = None;
        self.mutate(|store| {
            let open = store.unresolved_ids();
            let choice = {
                let mut rng = lock(&self.rng);
                self.generator.pick_resolution(&mut *rng, &open).cloned()
            };
            match choice {
                Some(id) => {
                    let changed = store.resolve(&id, SYSTEM_RESOLVER, now);
                    picked = Some(id);
                    changed
                }
                None => false,
            }
        });
        if let Some(id) = &picked {
            log::info!("Alert {} auto-resolved", id);
        }
        picked
    }

    /// Apply `change` under the store lock; broadcast after releasing it if
    /// anything changed.
    fn mutate<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut AlertStore) -> bool,
    {
        let published = {
            let mut state = lock(&self.state);
            if change(&mut state.store) {
                state.version += 1;
                Some((state.version, Arc::<[Alert]>::from(state.store.alerts())))
            } else {
                None
            }
        };

        match published {
            Some((version, snapshot)) => {
                self.broadcaster.publish(version, snapshot);
                true
            }
            None => false,
        }
    }

    // ============================================
    // Background timers
    // ============================================

    /// Start the generation and auto-resolution timers on the current tokio
    /// runtime. Returns false if there is no runtime or timers already run.
    pub fn start(self: &Arc<Self>, intervals: TimerIntervals) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::error!("Alert engine timers need a tokio runtime; not started");
                return false;
            }
        };

        let mut timers = lock(&self.timers);
        if timers.is_some() {
            log::warn!("Alert engine timers already running");
            return false;
        }

        let generate: Weak<Self> = Arc::downgrade(self);
        let resolve: Weak<Self> = Arc::downgrade(self);
        let jobs = vec![
            TimerJob::new("alert-generation", intervals.generation, move || {
                match generate.upgrade() {
                    Some(engine) => {
                        engine.generation_tick();
                        true
                    }
                    None => false,
                }
            }),
            TimerJob::new("alert-auto-resolve", intervals.auto_resolve, move || {
                match resolve.upgrade() {
                    Some(engine) => {
                        engine.auto_resolve_tick();
                        true
                    }
                    None => false,
                }
            }),
        ];

        *timers = Some(SchedulerHandle::spawn(&runtime, jobs));
        log::info!(
            "Alert engine started (generation every {:?}, auto-resolve every {:?})",
            intervals.generation,
            intervals.auto_resolve
        );
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timers).is_some()
    }

    /// Stop background timers. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if let Some(timers) = lock(&self.timers).take() {
            timers.shutdown();
            log::info!("Alert engine stopped");
        }
    }
}

impl Drop for AlertEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_alert(
    id: AlertId,
    draft: AlertDraft,
    settings: &AlertSettings,
    now: chrono::DateTime<chrono::Utc>,
) -> Alert {
    let alert_type = draft.alert_type;
    let template = alert_type.template(draft.subject.as_ref());

    Alert {
        id,
        alert_type,
        severity: draft
            .severity
            .unwrap_or_else(|| settings.severity_for(alert_type)),
        title: draft.title.unwrap_or(template.title),
        message: draft.message.unwrap_or(template.message),
        subject: draft.subject,
        timestamp: now,
        is_read: false,
        action_required: alert_type.requires_action(),
        action_url: draft.action_url.or(template.action_url),
        action_text: draft.action_text.or(template.action_text),
        resolved_at: None,
        resolved_by: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::alerts::model::{AlertType, Severity, SubjectRef};
    use crate::core::alerts::settings::AlertTypeConfig;
    use crate::core::channels::tests::{RecordingEmail, RecordingWhatsApp};
    use crate::core::channels::WhatsAppAuditLog;
    use crate::core::clock::ManualClock;
    use crate::core::platform::tests::RecordingPlatform;
    use crate::core::storage::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    pub(crate) struct TestEngine {
        pub engine: Arc<AlertEngine>,
        pub clock: Arc<ManualClock>,
        pub platform: Arc<RecordingPlatform>,
        pub email: Arc<RecordingEmail>,
        pub whatsapp: Arc<RecordingWhatsApp>,
        pub storage: Arc<MemoryStore>,
    }

    pub(crate) fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    pub(crate) fn test_engine_with(storage: Arc<MemoryStore>, probability: f64) -> TestEngine {
        let clock = Arc::new(ManualClock::new(start_time()));
        let platform = Arc::new(RecordingPlatform::granted());
        let email = Arc::new(RecordingEmail::default());
        let whatsapp = Arc::new(RecordingWhatsApp::default());
        let engine = Arc::new(AlertEngine::new(EngineDeps {
            storage: storage.clone(),
            clock: clock.clone(),
            channels: Channels {
                platform: platform.clone(),
                email: email.clone(),
                whatsapp: whatsapp.clone(),
                audit: Arc::new(WhatsAppAuditLog::new(storage.clone(), 10)),
                management_url: "https://broker.example/settings".to_string(),
            },
            generation_probability: probability,
            rng_seed: Some(99),
        }));
        TestEngine {
            engine,
            clock,
            platform,
            email,
            whatsapp,
            storage,
        }
    }

    pub(crate) fn test_engine() -> TestEngine {
        test_engine_with(Arc::new(MemoryStore::new()), 1.0)
    }

    #[test]
    fn test_raise_fills_from_template_and_settings() {
        let t = test_engine();
        let alert = t.engine.raise_alert(AlertDraft::new(AlertType::SystemError).subject(
            SubjectRef::System {
                component: "insurer-gateway".to_string(),
            },
        ));

        assert!(alert.id.starts_with("alert_"));
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.message, "insurer-gateway reported an unexpected error.");
        assert!(!alert.action_required);
        assert!(alert.action_url.is_none());
        assert!(!alert.is_read);
        assert_eq!(alert.timestamp, start_time());
    }

    #[test]
    fn test_explicit_fields_win_over_template() {
        let t = test_engine();
        let alert = t.engine.raise_alert(
            AlertDraft::new(AlertType::QuoteExpiring)
                .severity(Severity::Low)
                .title("Custom")
                .message("Custom body")
                .action("/custom", "Go"),
        );

        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(alert.title, "Custom");
        assert_eq!(alert.action_url.as_deref(), Some("/custom"));
        assert!(alert.action_required);
    }

    #[test]
    fn test_severity_override_from_settings() {
        let t = test_engine();
        let mut types = HashMap::new();
        types.insert(
            AlertType::QuoteRequest,
            AlertTypeConfig {
                enabled: true,
                severity: Severity::Critical,
            },
        );
        t.engine.update_settings(SettingsPatch {
            alert_types: Some(types),
            ..SettingsPatch::default()
        });

        let alert = t.engine.raise_alert(AlertDraft::new(AlertType::QuoteRequest));
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(t.engine.critical_alerts().len(), 1);
    }

    #[test]
    fn test_disabled_type_is_stored_but_not_delivered() {
        let t = test_engine();
        let mut types = HashMap::new();
        types.insert(
            AlertType::PaymentDue,
            AlertTypeConfig {
                enabled: false,
                severity: Severity::High,
            },
        );
        t.engine.update_settings(SettingsPatch {
            alert_types: Some(types),
            ..SettingsPatch::default()
        });

        let (alert, plan) = t.engine.raise_with_plan(AlertDraft::new(AlertType::PaymentDue));
        assert!(plan.is_empty());
        assert_eq!(t.engine.alerts()[0].id, alert.id);
        assert!(t.platform.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle_operations_ignore_unknown_ids() {
        let t = test_engine();
        assert!(!t.engine.mark_as_read("nope"));
        assert!(!t.engine.resolve_alert("nope", "userA"));
        t.engine.mark_all_as_read();
        assert!(t.engine.alerts().is_empty());
    }

    #[test]
    fn test_resolution_latency_feeds_metrics() {
        let t = test_engine();
        let alert = t.engine.raise_alert(AlertDraft::new(AlertType::QuoteRequest));
        t.engine.raise_alert(AlertDraft::new(AlertType::QuoteRequest));

        t.clock.advance(chrono::Duration::minutes(15));
        assert!(t.engine.resolve_alert(&alert.id, "userA"));

        let metrics = t.engine.metrics();
        assert_eq!(metrics.total_alerts, 2);
        assert!((metrics.average_resolution_time - 15.0).abs() < 1e-9);
        assert!((metrics.resolution_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_generation_tick_respects_probability() {
        let t = test_engine_with(Arc::new(MemoryStore::new()), 0.0);
        assert!(t.engine.generation_tick().is_none());
        assert!(t.engine.alerts().is_empty());

        let t = test_engine();
        let alert = t.engine.generation_tick().unwrap();
        assert_eq!(t.engine.alerts()[0].id, alert.id);
        assert_eq!(alert.severity, t.engine.settings().severity_for(alert.alert_type));
    }

    #[test]
    fn test_auto_resolve_only_touches_open_alerts() {
        let t = test_engine();
        assert!(t.engine.auto_resolve_tick().is_none());

        let first = t.engine.raise_alert(AlertDraft::new(AlertType::QuoteRequest));
        let second = t.engine.raise_alert(AlertDraft::new(AlertType::PaymentDue));
        assert!(t.engine.resolve_alert(&first.id, "userA"));

        let picked = t.engine.auto_resolve_tick().unwrap();
        assert_eq!(picked, second.id);
        let resolved = t.engine.alert(&second.id).unwrap();
        assert_eq!(resolved.resolved_by.as_deref(), Some(SYSTEM_RESOLVER));
        assert_eq!(
            t.engine.alert(&first.id).unwrap().resolved_by.as_deref(),
            Some("userA")
        );

        assert!(t.engine.auto_resolve_tick().is_none());
    }

    #[test]
    fn test_start_without_runtime_refuses() {
        let t = test_engine();
        assert!(!t.engine.start(TimerIntervals::default()));
        assert!(!t.engine.is_running());
        t.engine.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_generate_and_stop() {
        let t = test_engine();
        assert!(t.engine.start(TimerIntervals {
            generation: Duration::from_secs(30),
            auto_resolve: Duration::from_secs(3600),
        }));
        assert!(!t.engine.start(TimerIntervals::default()));
        assert!(t.engine.is_running());

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(t.engine.alerts().len(), 1);

        t.engine.shutdown();
        t.engine.shutdown();
        assert!(!t.engine.is_running());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(300)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(t.engine.alerts().len(), 1);
    }
}
