// User-facing notification center.
//
// Keeps the newest-first notification list, persists it after every change,
// and reaches the user outside the app (push, email, WhatsApp) according to
// their notification preferences.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::model::{
    NotificationData, NotificationDraft, NotificationPreferences, PreferencesPatch,
    NOTIFICATIONS_KEY, PREFERENCES_KEY,
};
use crate::core::alerts::broadcaster::{Broadcaster, Observer, Subscription};
use crate::core::channels::{Channels, Outbound};
use crate::core::clock::{generate_id, Clock};
use crate::core::platform::Permission;
use crate::core::storage::{load_json, save_json, KeyValueStore};

const NOTIFICATION_ICON: &str = "/icons/notification.png";

pub struct NotificationDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub channels: Channels,
    pub rng_seed: Option<u64>,
}

struct CenterState {
    notifications: Vec<NotificationData>,
    preferences: NotificationPreferences,
    version: u64,
}

pub struct NotificationCenter {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    channels: Channels,
    state: Mutex<CenterState>,
    broadcaster: Broadcaster<NotificationData>,
    rng: Mutex<StdRng>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl NotificationCenter {
    /// Build a center, restoring the persisted list and preferences.
    pub fn new(deps: NotificationDeps) -> Self {
        let mut notifications: Vec<NotificationData> =
            load_json(deps.storage.as_ref(), NOTIFICATIONS_KEY).unwrap_or_default();
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let preferences = load_json(deps.storage.as_ref(), PREFERENCES_KEY).unwrap_or_default();
        let rng = match deps.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::debug!("Restored {} notifications", notifications.len());

        Self {
            storage: deps.storage,
            clock: deps.clock,
            channels: deps.channels,
            state: Mutex::new(CenterState {
                notifications,
                preferences,
                version: 0,
            }),
            broadcaster: Broadcaster::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[NotificationData]) + Send + Sync + 'static,
    {
        let (version, snapshot) = {
            let state = lock(&self.state);
            (state.version, Arc::<[NotificationData]>::from(state.notifications.as_slice()))
        };
        let observer: Observer<NotificationData> = Arc::new(observer);
        self.broadcaster.subscribe(observer, version, snapshot)
    }

    pub fn notifications(&self) -> Vec<NotificationData> {
        lock(&self.state).notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn preferences(&self) -> NotificationPreferences {
        lock(&self.state).preferences.clone()
    }

    /// Merge `patch` into the preferences and persist them.
    pub fn update_preferences(&self, patch: PreferencesPatch) -> NotificationPreferences {
        let mut state = lock(&self.state);
        state.preferences.apply(patch);
        if let Err(e) = save_json(self.storage.as_ref(), PREFERENCES_KEY, &state.preferences) {
            log::warn!("Failed to persist notification preferences: {}", e);
        }
        state.preferences.clone()
    }

    /// Ask the host for notification permission. Never fails: platform
    /// errors read as "not granted".
    pub fn request_permission(&self) -> bool {
        let platform = &self.channels.platform;
        if !platform.is_supported() {
            log::info!("Notifications are not supported on this platform");
            return false;
        }
        match platform.request_permission() {
            Ok(permission) => permission == Permission::Granted,
            Err(e) => {
                log::warn!("Notification permission request failed: {}", e);
                false
            }
        }
    }

    /// Store a new notification at the front of the list, then reach the user
    /// outside the app where the preferences allow it.
    pub fn show_notification(&self, draft: NotificationDraft) -> NotificationData {
        let now = self.clock.now();
        let id = generate_id("notification", now, &mut *lock(&self.rng));
        let notification = NotificationData {
            id,
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            timestamp: now,
            read: false,
            action_url: draft.action_url,
            action_text: draft.action_text,
            category: draft.category,
        };

        let mut preferences = None;
        self.mutate(|state| {
            state.notifications.insert(0, notification.clone());
            preferences = Some(state.preferences.clone());
            true
        });

        if let Some(preferences) = preferences {
            self.deliver(&notification, &preferences, now);
        }
        notification
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        self.mutate(|state| {
            match state.notifications.iter_mut().find(|n| n.id == id && !n.read) {
                Some(notification) => {
                    notification.read = true;
                    true
                }
                None => false,
            }
        })
    }

    pub fn mark_all_as_read(&self) -> bool {
        self.mutate(|state| {
            let mut changed = false;
            for notification in state.notifications.iter_mut().filter(|n| !n.read) {
                notification.read = true;
                changed = true;
            }
            changed
        })
    }

    pub fn delete_notification(&self, id: &str) -> bool {
        self.mutate(|state| {
            let before = state.notifications.len();
            state.notifications.retain(|n| n.id != id);
            state.notifications.len() != before
        })
    }

    /// Apply `change`; when it reports a change, persist the list under the
    /// lock and broadcast after releasing it.
    fn mutate<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut CenterState) -> bool,
    {
        let published = {
            let mut state = lock(&self.state);
            if !change(&mut *state) {
                None
            } else {
                if let Err(e) = save_json(self.storage.as_ref(), NOTIFICATIONS_KEY, &state.notifications) {
                    log::warn!("Failed to persist notifications: {}", e);
                }
                state.version += 1;
                Some((
                    state.version,
                    Arc::<[NotificationData]>::from(state.notifications.as_slice()),
                ))
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

    fn deliver(
        &self,
        notification: &NotificationData,
        preferences: &NotificationPreferences,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        if !preferences.outside_delivery_allowed(notification, self.clock.local_time()) {
            log::debug!("Notification {} kept in-app only", notification.id);
            return;
        }

        let outbound = Outbound {
            title: &notification.title,
            body: &notification.message,
            tag: &notification.id,
            kind: notification.kind.as_str(),
            action_url: notification.action_url.as_deref(),
            action_text: notification.action_text.as_deref(),
        };
        if preferences.push {
            self.channels.send_push(&outbound, NOTIFICATION_ICON);
        }
        if notification.kind.is_informational() {
            return;
        }
        if preferences.email {
            self.channels.send_email(&outbound, notification.title.clone());
        }
        if preferences.whatsapp {
            self.channels.send_whatsapp(&outbound, now);
        }
    }
}
