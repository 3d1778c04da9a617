// Alert delivery preferences (the preference store).
//
// Loaded once from the key/value store, merged with partial updates, and
// re-persisted in full after every change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::model::{Alert, AlertType, Severity};
use super::quiet_hours::{sending_allowed, QuietHours};
use crate::core::storage::{load_json, save_json, KeyValueStore};

pub const SETTINGS_KEY: &str = "alert_settings";

/// Per-type configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTypeConfig {
    pub enabled: bool,
    pub severity: Severity,
}

/// Process-wide alert settings - persisted under `alert_settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertSettings {
    pub enable_notifications: bool,
    pub enable_email_alerts: bool,
    pub enable_sms_alerts: bool,
    pub enable_push_alerts: bool,
    pub quiet_hours: QuietHours,
    pub alert_types: HashMap<AlertType, AlertTypeConfig>,
}

fn default_alert_types() -> HashMap<AlertType, AlertTypeConfig> {
    AlertType::all()
        .iter()
        .map(|alert_type| {
            (
                *alert_type,
                AlertTypeConfig {
                    enabled: true,
                    severity: alert_type.default_severity(),
                },
            )
        })
        .collect()
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enable_notifications: true,
            enable_email_alerts: true,
            enable_sms_alerts: false,
            enable_push_alerts: true,
            quiet_hours: QuietHours::default(),
            alert_types: default_alert_types(),
        }
    }
}

impl AlertSettings {
    /// Types missing from the map count as enabled.
    pub fn is_type_enabled(&self, alert_type: AlertType) -> bool {
        self.alert_types
            .get(&alert_type)
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    /// Configured severity for a type, falling back to the type's default
    pub fn severity_for(&self, alert_type: AlertType) -> Severity {
        self.alert_types
            .get(&alert_type)
            .map(|c| c.severity)
            .unwrap_or_else(|| alert_type.default_severity())
    }

    pub fn enabled_types(&self) -> Vec<AlertType> {
        AlertType::all()
            .iter()
            .copied()
            .filter(|t| self.is_type_enabled(*t))
            .collect()
    }

    /// Conditions shared by every proactive channel.
    fn delivery_open(&self, alert: &Alert, now: NaiveTime) -> bool {
        self.enable_notifications
            && self.is_type_enabled(alert.alert_type)
            && sending_allowed(now, &self.quiet_hours)
    }

    pub fn push_allowed(&self, alert: &Alert, now: NaiveTime) -> bool {
        self.enable_push_alerts && self.delivery_open(alert, now)
    }

    pub fn email_allowed(&self, alert: &Alert, now: NaiveTime) -> bool {
        self.enable_email_alerts
            && !alert.severity.is_informational()
            && self.delivery_open(alert, now)
    }

    pub fn sms_allowed(&self, alert: &Alert, now: NaiveTime) -> bool {
        self.enable_sms_alerts
            && !alert.severity.is_informational()
            && self.delivery_open(alert, now)
    }

    /// Merge a partial update. `alert_types` entries merge per type; every
    /// other present field replaces the current value.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.enable_notifications {
            self.enable_notifications = v;
        }
        if let Some(v) = patch.enable_email_alerts {
            self.enable_email_alerts = v;
        }
        if let Some(v) = patch.enable_sms_alerts {
            self.enable_sms_alerts = v;
        }
        if let Some(v) = patch.enable_push_alerts {
            self.enable_push_alerts = v;
        }
        if let Some(quiet_hours) = patch.quiet_hours {
            self.quiet_hours = quiet_hours;
        }
        if let Some(alert_types) = patch.alert_types {
            self.alert_types.extend(alert_types);
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub enable_notifications: Option<bool>,
    pub enable_email_alerts: Option<bool>,
    pub enable_sms_alerts: Option<bool>,
    pub enable_push_alerts: Option<bool>,
    pub quiet_hours: Option<QuietHours>,
    pub alert_types: Option<HashMap<AlertType, AlertTypeConfig>>,
}

/// Holds the live settings and writes them back on every change.
pub struct PreferenceStore {
    storage: Arc<dyn KeyValueStore>,
    settings: AlertSettings,
}

impl PreferenceStore {
    /// Load persisted settings, or defaults when absent or corrupt.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let settings = load_json(storage.as_ref(), SETTINGS_KEY).unwrap_or_default();
        Self { storage, settings }
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Merge `patch`, persist, and return the resulting settings.
    pub fn update(&mut self, patch: SettingsPatch) -> AlertSettings {
        self.settings.apply(patch);
        if let Err(e) = save_json(self.storage.as_ref(), SETTINGS_KEY, &self.settings) {
            log::warn!("Failed to persist alert settings: {}", e);
        }
        self.settings.clone()
    }
}
