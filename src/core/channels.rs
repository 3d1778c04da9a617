//! Outbound delivery channels shared by alerts and user notifications.
//!
//! Every send is best-effort: it runs isolated from the caller and from the
//! other channels, and its failure is only logged.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ChannelError;
use super::platform::{ClickHandler, NotificationPlatform, ShowOptions};
use super::storage::{load_json, save_json, KeyValueStore};

pub const WHATSAPP_LOG_KEY: &str = "whatsapp_log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub subject: String,
    pub body: String,
    /// Alert type or notification kind, e.g. `payment_due`, `warning`
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Hands an email to the outbound mail system. Must return quickly.
pub trait EmailSender: Send + Sync {
    fn send(&self, payload: &EmailPayload) -> Result<(), ChannelError>;
}

/// Hands a WhatsApp/SMS message to the outbound gateway. Must return quickly.
pub trait WhatsAppSender: Send + Sync {
    fn send(&self, payload: &WhatsAppPayload) -> Result<(), ChannelError>;
}

pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, payload: &EmailPayload) -> Result<(), ChannelError> {
        log::info!("[email] {} ({}): {}", payload.subject, payload.kind, payload.body);
        Ok(())
    }
}

pub struct LogWhatsAppSender;

impl WhatsAppSender for LogWhatsAppSender {
    fn send(&self, payload: &WhatsAppPayload) -> Result<(), ChannelError> {
        log::info!("[whatsapp] ({}) {}", payload.kind, payload.message.replace('\n', " | "));
        Ok(())
    }
}

/// Text sent over WhatsApp/SMS for an alert or notification.
pub fn format_whatsapp_message(title: &str, message: &str, management_url: &str) -> String {
    format!(
        "*{}*\n\n{}\n\nManage your notifications: {}",
        title, message, management_url
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sent_at: DateTime<Utc>,
}

/// Most-recent-N trail of WhatsApp messages, persisted under `whatsapp_log`.
pub struct WhatsAppAuditLog {
    storage: Arc<dyn KeyValueStore>,
    limit: usize,
    // serializes read-modify-write of the persisted list
    write_lock: Mutex<()>,
}

impl WhatsAppAuditLog {
    pub fn new(storage: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        Self {
            storage,
            limit,
            write_lock: Mutex::new(()),
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        load_json(self.storage.as_ref(), WHATSAPP_LOG_KEY).unwrap_or_default()
    }

    /// Append `entry`, keeping only the newest `limit` entries (oldest first).
    pub fn record(&self, entry: AuditEntry) {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut entries = self.entries();
        entries.push(entry);
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }

        if let Err(e) = save_json(self.storage.as_ref(), WHATSAPP_LOG_KEY, &entries) {
            log::warn!("Failed to persist WhatsApp audit trail: {}", e);
        }
    }
}

/// Everything needed to reach the user outside the app.
#[derive(Clone)]
pub struct Channels {
    pub platform: Arc<dyn NotificationPlatform>,
    pub email: Arc<dyn EmailSender>,
    pub whatsapp: Arc<dyn WhatsAppSender>,
    pub audit: Arc<WhatsAppAuditLog>,
    pub management_url: String,
}

/// One alert or notification as the outbound channels see it.
pub struct Outbound<'a> {
    pub title: &'a str,
    pub body: &'a str,
    /// Push tag, the alert or notification id
    pub tag: &'a str,
    /// Alert type or notification kind
    pub kind: &'a str,
    pub action_url: Option<&'a str>,
    pub action_text: Option<&'a str>,
}

impl Channels {
    /// Show a platform notification whose click focuses the app and opens
    /// the action URL, if any.
    pub fn send_push(&self, outbound: &Outbound<'_>, icon: &str) {
        let platform = self.platform.clone();
        let title = outbound.title.to_string();
        let options = ShowOptions {
            body: outbound.body.to_string(),
            icon: Some(icon.to_string()),
            tag: Some(outbound.tag.to_string()),
        };
        let action_url = outbound.action_url.map(str::to_string);

        run_isolated("push", move || {
            if !platform.can_show() {
                return Err(ChannelError::new("push", "permission not granted"));
            }
            let click_platform = platform.clone();
            let on_click: ClickHandler = Box::new(move || {
                click_platform.focus_window();
                if let Some(url) = &action_url {
                    click_platform.navigate(url);
                }
            });
            platform
                .show(&title, options, Some(on_click))
                .map_err(|e| ChannelError::new("push", e.to_string()))
        });
    }

    /// Email with the action appended as `<text>: <url>` when both are set.
    pub fn send_email(&self, outbound: &Outbound<'_>, subject: String) {
        let email = self.email.clone();
        let mut body = outbound.body.to_string();
        if let (Some(text), Some(url)) = (outbound.action_text, outbound.action_url) {
            body.push_str(&format!("\n\n{}: {}", text, url));
        }
        let payload = EmailPayload {
            subject,
            body,
            kind: outbound.kind.to_string(),
        };

        run_isolated("email", move || email.send(&payload));
    }

    /// WhatsApp message; recorded in the audit trail only once the gateway
    /// accepted it.
    pub fn send_whatsapp(&self, outbound: &Outbound<'_>, now: DateTime<Utc>) {
        let whatsapp = self.whatsapp.clone();
        let audit = Arc::clone(&self.audit);
        let payload = WhatsAppPayload {
            message: format_whatsapp_message(outbound.title, outbound.body, &self.management_url),
            kind: outbound.kind.to_string(),
        };

        run_isolated("whatsapp", move || {
            whatsapp.send(&payload)?;
            audit.record(AuditEntry {
                message: payload.message,
                kind: payload.kind,
                sent_at: now,
            });
            Ok(())
        });
    }
}

/// Run one channel send without letting its error or panic reach the caller.
///
/// Inside a tokio runtime the job goes to the blocking pool and the caller
/// returns immediately; without one it runs inline.
pub fn run_isolated<F>(channel: &'static str, job: F)
where
    F: FnOnce() -> Result<(), ChannelError> + Send + 'static,
{
    let task = move || match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => log::debug!("{} delivery handed off", channel),
        Ok(Err(e)) => log::warn!("{} delivery failed: {}", channel, e),
        Err(_) => log::error!("{} delivery panicked", channel),
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => task(),
    }
}
