// Fan-out of a freshly created alert to push, email and WhatsApp.
//
// Each channel is decided and sent independently. The alert is already in
// the store when this runs, so no channel outcome can undo its creation.

use chrono::{DateTime, NaiveTime, Utc};

use super::model::Alert;
use super::settings::AlertSettings;
use crate::core::channels::{Channels, Outbound};

const ALERT_ICON: &str = "/icons/alert.png";

/// Which channels an alert was handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryPlan {
    pub push: bool,
    pub email: bool,
    pub whatsapp: bool,
}

impl DeliveryPlan {
    pub fn for_alert(alert: &Alert, settings: &AlertSettings, local_time: NaiveTime) -> Self {
        Self {
            push: settings.push_allowed(alert, local_time),
            email: settings.email_allowed(alert, local_time),
            whatsapp: settings.sms_allowed(alert, local_time),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.push || self.email || self.whatsapp)
    }
}

pub struct Dispatcher {
    channels: Channels,
}

impl Dispatcher {
    pub fn new(channels: Channels) -> Self {
        Self { channels }
    }

    /// Decide and start delivery. Returns without waiting for any send.
    pub fn dispatch(
        &self,
        alert: &Alert,
        settings: &AlertSettings,
        local_time: NaiveTime,
        now: DateTime<Utc>,
    ) -> DeliveryPlan {
        let plan = DeliveryPlan::for_alert(alert, settings, local_time);
        if plan.is_empty() {
            log::debug!("Alert {} not delivered outside the app", alert.id);
            return plan;
        }

        let outbound = Outbound {
            title: &alert.title,
            body: &alert.message,
            tag: &alert.id,
            kind: alert.alert_type.as_str(),
            action_url: alert.action_url.as_deref(),
            action_text: alert.action_text.as_deref(),
        };
        if plan.push {
            self.channels.send_push(&outbound, ALERT_ICON);
        }
        if plan.email {
            let subject = format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.title);
            self.channels.send_email(&outbound, subject);
        }
        if plan.whatsapp {
            self.channels.send_whatsapp(&outbound, now);
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::model::{AlertType, Severity};
    use crate::core::alerts::store::tests::make_alert;
    use crate::core::channels::tests::{RecordingEmail, RecordingWhatsApp};
    use crate::core::channels::WhatsAppAuditLog;
    use crate::core::platform::tests::RecordingPlatform;
    use crate::core::platform::Permission;
    use crate::core::storage::MemoryStore;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct Harness {
        platform: Arc<RecordingPlatform>,
        email: Arc<RecordingEmail>,
        whatsapp: Arc<RecordingWhatsApp>,
        audit: Arc<WhatsAppAuditLog>,
        dispatcher: Dispatcher,
    }

    fn harness(platform: RecordingPlatform) -> Harness {
        let platform = Arc::new(platform);
        let email = Arc::new(RecordingEmail::default());
        let whatsapp = Arc::new(RecordingWhatsApp::default());
        let audit = Arc::new(WhatsAppAuditLog::new(Arc::new(MemoryStore::new()), 10));
        let dispatcher = Dispatcher::new(Channels {
            platform: platform.clone(),
            email: email.clone(),
            whatsapp: whatsapp.clone(),
            audit: audit.clone(),
            management_url: "https://broker.example/settings/notifications".to_string(),
        });
        Harness {
            platform,
            email,
            whatsapp,
            audit,
            dispatcher,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn all_channels() -> AlertSettings {
        AlertSettings {
            enable_sms_alerts: true,
            ..AlertSettings::default()
        }
    }

    fn high_alert() -> Alert {
        let mut alert = make_alert("alert_1", Severity::High, now());
        alert.alert_type = AlertType::PaymentDue;
        alert.title = "Payment due".to_string();
        alert.message = "Policy pol_9 is due.".to_string();
        alert.action_url = Some("/policies/pol_9".to_string());
        alert.action_text = Some("Review payment".to_string());
        alert
    }

    #[test]
    fn test_fans_out_to_every_enabled_channel() {
        let h = harness(RecordingPlatform::granted());
        let plan = h
            .dispatcher
            .dispatch(&high_alert(), &all_channels(), now().time(), now());

        assert_eq!(
            plan,
            DeliveryPlan {
                push: true,
                email: true,
                whatsapp: true
            }
        );

        let shown = h.platform.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].1.tag.as_deref(), Some("alert_1"));
        drop(shown);

        let email = h.email.sent.lock().unwrap();
        assert_eq!(email[0].subject, "[HIGH] Payment due");
        assert_eq!(email[0].kind, "payment_due");
        assert!(email[0].body.ends_with("Review payment: /policies/pol_9"));

        let whatsapp = h.whatsapp.sent.lock().unwrap();
        assert!(whatsapp[0].message.contains("*Payment due*"));
        assert!(whatsapp[0].message.contains("broker.example/settings/notifications"));
        assert_eq!(h.audit.entries().len(), 1);
    }

    #[test]
    fn test_push_click_focuses_and_navigates() {
        let h = harness(RecordingPlatform::granted());
        h.dispatcher
            .dispatch(&high_alert(), &all_channels(), now().time(), now());

        h.platform.click_last();
        assert!(h.platform.focused.load(Ordering::SeqCst));
        assert_eq!(*h.platform.navigated.lock().unwrap(), vec!["/policies/pol_9"]);
    }

    #[test]
    fn test_informational_alert_only_pushes() {
        let h = harness(RecordingPlatform::granted());
        let mut alert = high_alert();
        alert.severity = Severity::Low;

        let plan = h.dispatcher.dispatch(&alert, &all_channels(), now().time(), now());

        assert!(plan.push);
        assert!(!plan.email && !plan.whatsapp);
        assert!(h.email.sent.lock().unwrap().is_empty());
        assert!(h.whatsapp.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_channel_does_not_stop_others() {
        let platform = RecordingPlatform::granted();
        platform.fail_show.store(true, Ordering::SeqCst);
        let h = harness(platform);
        h.email.fail.store(true, Ordering::SeqCst);

        h.dispatcher
            .dispatch(&high_alert(), &all_channels(), now().time(), now());

        assert!(h.platform.shown.lock().unwrap().is_empty());
        assert!(h.email.sent.lock().unwrap().is_empty());
        assert_eq!(h.whatsapp.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_whatsapp_skips_audit() {
        let h = harness(RecordingPlatform::granted());
        h.whatsapp.panic_on_send.store(true, Ordering::SeqCst);

        h.dispatcher
            .dispatch(&high_alert(), &all_channels(), now().time(), now());

        assert!(h.audit.entries().is_empty());
        assert_eq!(h.email.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_push_needs_granted_permission() {
        let h = harness(RecordingPlatform::with_permission(Permission::Denied));
        let plan = h
            .dispatcher
            .dispatch(&high_alert(), &all_channels(), now().time(), now());

        // decided, but the platform refused
        assert!(plan.push);
        assert!(h.platform.shown.lock().unwrap().is_empty());
    }
}
