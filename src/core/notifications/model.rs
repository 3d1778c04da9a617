use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::alerts::quiet_hours::{sending_allowed, QuietHours};

pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const PREFERENCES_KEY: &str = "notification_preferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Informational notifications never leave the app except as push.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::Info)
    }
}

/// Topic a notification belongs to; each one can be opted out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Quotes,
    Policies,
    Payments,
    Promotions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(default)]
    pub category: Option<NotificationCategory>,
}

/// What a caller supplies to `show_notification`; id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub category: Option<NotificationCategory>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            action_url: None,
            action_text: None,
            category: None,
        }
    }

    pub fn action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }

    pub fn category(mut self, category: NotificationCategory) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub push: bool,
    pub email: bool,
    pub whatsapp: bool,
    pub quotes: bool,
    pub policies: bool,
    pub payments: bool,
    pub promotions: bool,
    pub quiet_hours: QuietHours,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            push: true,
            email: true,
            whatsapp: false,
            quotes: true,
            policies: true,
            payments: true,
            promotions: false,
            quiet_hours: QuietHours::default(),
        }
    }
}

impl NotificationPreferences {
    /// Uncategorized notifications are always wanted.
    pub fn wants(&self, category: Option<NotificationCategory>) -> bool {
        match category {
            None => true,
            Some(NotificationCategory::Quotes) => self.quotes,
            Some(NotificationCategory::Policies) => self.policies,
            Some(NotificationCategory::Payments) => self.payments,
            Some(NotificationCategory::Promotions) => self.promotions,
        }
    }

    /// Whether anything may leave the app for `notification` at `now`.
    pub fn outside_delivery_allowed(&self, notification: &NotificationData, now: NaiveTime) -> bool {
        self.wants(notification.category) && sending_allowed(now, &self.quiet_hours)
    }

    pub fn apply(&mut self, patch: PreferencesPatch) {
        let PreferencesPatch {
            push,
            email,
            whatsapp,
            quotes,
            policies,
            payments,
            promotions,
            quiet_hours,
        } = patch;

        for (slot, value) in [
            (&mut self.push, push),
            (&mut self.email, email),
            (&mut self.whatsapp, whatsapp),
            (&mut self.quotes, quotes),
            (&mut self.policies, policies),
            (&mut self.payments, payments),
            (&mut self.promotions, promotions),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(quiet_hours) = quiet_hours {
            self.quiet_hours = quiet_hours;
        }
    }
}

/// Partial preferences update; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub push: Option<bool>,
    pub email: Option<bool>,
    pub whatsapp: Option<bool>,
    pub quotes: Option<bool>,
    pub policies: Option<bool>,
    pub payments: Option<bool>,
    pub promotions: Option<bool>,
    pub quiet_hours: Option<QuietHours>,
}
