// Alert model types for configuration and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AlertId = String;

/// Business event classes the engine raises alerts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// A client asked for a new quote
    QuoteRequest,
    /// An issued quote is about to lapse
    QuoteExpiring,
    /// A policy installment is due
    PaymentDue,
    /// A policy is about to expire
    PolicyExpiring,
    /// A client has not interacted for a long time
    ClientInactive,
    /// Quote-to-policy conversion dropped below target
    ConversionRateLow,
    /// Internal failure of a collaborator
    SystemError,
    /// Operational performance degraded
    PerformanceAlert,
}

impl AlertType {
    /// Get the display name for this alert type
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::QuoteRequest => "Quote Request",
            Self::QuoteExpiring => "Quote Expiring",
            Self::PaymentDue => "Payment Due",
            Self::PolicyExpiring => "Policy Expiring",
            Self::ClientInactive => "Client Inactive",
            Self::ConversionRateLow => "Low Conversion Rate",
            Self::SystemError => "System Error",
            Self::PerformanceAlert => "Performance Alert",
        }
    }

    /// Wire name, as used in persisted settings and outbound payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteRequest => "quote_request",
            Self::QuoteExpiring => "quote_expiring",
            Self::PaymentDue => "payment_due",
            Self::PolicyExpiring => "policy_expiring",
            Self::ClientInactive => "client_inactive",
            Self::ConversionRateLow => "conversion_rate_low",
            Self::SystemError => "system_error",
            Self::PerformanceAlert => "performance_alert",
        }
    }

    /// Severity used when neither the caller nor the settings specify one
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::QuoteRequest => Severity::Medium,
            Self::QuoteExpiring => Severity::High,
            Self::PaymentDue => Severity::High,
            Self::PolicyExpiring => Severity::Medium,
            Self::ClientInactive => Severity::Low,
            Self::ConversionRateLow => Severity::Medium,
            Self::SystemError => Severity::Critical,
            Self::PerformanceAlert => Severity::Medium,
        }
    }

    /// Every type except `SystemError` asks the user to act.
    pub fn requires_action(&self) -> bool {
        !matches!(self, Self::SystemError)
    }

    /// Get all available alert types
    pub fn all() -> &'static [AlertType] {
        &[
            Self::QuoteRequest,
            Self::QuoteExpiring,
            Self::PaymentDue,
            Self::PolicyExpiring,
            Self::ClientInactive,
            Self::ConversionRateLow,
            Self::SystemError,
            Self::PerformanceAlert,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Low severity is the informational class: in-app only, no email or SMS.
    pub fn is_informational(&self) -> bool {
        *self == Severity::Low
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn all() -> &'static [Severity] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// Entity an alert is about, used for correlation by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubjectRef {
    Client { id: String, name: String },
    Quote { id: String, client: String },
    Policy { id: String, client: String },
    Payment { policy_id: String, amount_cents: u64 },
    Metric { name: String, value: f64, threshold: f64 },
    System { component: String },
}

/// Alert record. Owned by the alert store; lifecycle fields change only
/// through the engine's lifecycle operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub subject: Option<SubjectRef>,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub action_required: bool,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl Alert {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Critical alerts stay "critical" only while unresolved.
    pub fn is_open_critical(&self) -> bool {
        self.severity == Severity::Critical && !self.is_resolved()
    }
}

/// Partial alert accepted by `raise_alert`. Missing text and action fields come
/// from the type template; a missing severity comes from the settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Option<Severity>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub subject: Option<SubjectRef>,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
}

impl AlertDraft {
    pub fn new(alert_type: AlertType) -> Self {
        Self {
            alert_type,
            severity: None,
            title: None,
            message: None,
            subject: None,
            action_url: None,
            action_text: None,
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn subject(mut self, subject: SubjectRef) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }
}
