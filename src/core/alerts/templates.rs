// Per-type alert text and call-to-action templates.
//
// Every alert type owns its wording in a single match arm, so titles,
// messages and links can never drift apart between types.

use rand::seq::SliceRandom;
use rand::Rng;

use super::model::{AlertDraft, AlertType, SubjectRef};

/// Rendered text and action for one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTemplate {
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
}

impl AlertTemplate {
    fn new(title: &str, message: String) -> Self {
        Self {
            title: title.to_string(),
            message,
            action_url: None,
            action_text: None,
        }
    }

    fn with_action(mut self, url: String, text: &str) -> Self {
        self.action_url = Some(url);
        self.action_text = Some(text.to_string());
        self
    }
}

const CLIENTS: &[(&str, &str)] = &[
    ("cl_1042", "Maria Oliveira"),
    ("cl_2210", "Northwind Logistics"),
    ("cl_3307", "Joao Pereira"),
    ("cl_4518", "Harbor Dental Group"),
];

const COMPONENTS: &[&str] = &["insurer-gateway", "quote-pricing", "document-service"];

impl AlertType {
    /// Render this type's template, filling in details from `subject` when it
    /// carries the kind of entity the type expects.
    pub fn template(&self, subject: Option<&SubjectRef>) -> AlertTemplate {
        match self {
            Self::QuoteRequest => match subject {
                Some(SubjectRef::Quote { id, client }) => AlertTemplate::new(
                    "New quote request",
                    format!("{} requested a new quote ({}).", client, id),
                )
                .with_action(format!("/quotes/{}", id), "Review request"),
                _ => AlertTemplate::new("New quote request", "A client requested a new quote.".to_string())
                    .with_action("/quotes".to_string(), "View quotes"),
            },
            Self::QuoteExpiring => match subject {
                Some(SubjectRef::Quote { id, client }) => AlertTemplate::new(
                    "Quote expiring soon",
                    format!("Quote {} for {} expires soon.", id, client),
                )
                .with_action(format!("/quotes/{}", id), "Renew quote"),
                _ => AlertTemplate::new("Quote expiring soon", "A quote is about to expire.".to_string())
                    .with_action("/quotes".to_string(), "View quotes"),
            },
            Self::PaymentDue => match subject {
                Some(SubjectRef::Payment { policy_id, amount_cents }) => AlertTemplate::new(
                    "Payment due",
                    format!(
                        "An installment of {}.{:02} is due on policy {}.",
                        amount_cents / 100,
                        amount_cents % 100,
                        policy_id
                    ),
                )
                .with_action(format!("/policies/{}/payments", policy_id), "Review payment"),
                _ => AlertTemplate::new("Payment due", "A policy installment is due.".to_string())
                    .with_action("/policies".to_string(), "View policies"),
            },
            Self::PolicyExpiring => match subject {
                Some(SubjectRef::Policy { id, client }) => AlertTemplate::new(
                    "Policy expiring",
                    format!("Policy {} for {} is close to its expiry date.", id, client),
                )
                .with_action(format!("/policies/{}", id), "Start renewal"),
                _ => AlertTemplate::new("Policy expiring", "A policy is close to its expiry date.".to_string())
                    .with_action("/policies".to_string(), "View policies"),
            },
            Self::ClientInactive => match subject {
                Some(SubjectRef::Client { id, name }) => AlertTemplate::new(
                    "Inactive client",
                    format!("{} has had no activity in the last 30 days.", name),
                )
                .with_action(format!("/clients/{}", id), "Contact client"),
                _ => AlertTemplate::new("Inactive client", "A client has had no recent activity.".to_string())
                    .with_action("/clients".to_string(), "View clients"),
            },
            Self::ConversionRateLow => match subject {
                Some(SubjectRef::Metric { name, value, threshold }) => AlertTemplate::new(
                    "Conversion rate below target",
                    format!("{} is at {:.1}% (target {:.1}%).", name, value, threshold),
                )
                .with_action("/analytics".to_string(), "Open analytics"),
                _ => AlertTemplate::new(
                    "Conversion rate below target",
                    "Quote conversion dropped below target.".to_string(),
                )
                .with_action("/analytics".to_string(), "Open analytics"),
            },
            // System errors are informational for the broker: no action link
            Self::SystemError => match subject {
                Some(SubjectRef::System { component }) => AlertTemplate::new(
                    "System error",
                    format!("{} reported an unexpected error.", component),
                ),
                _ => AlertTemplate::new("System error", "An internal component reported an error.".to_string()),
            },
            Self::PerformanceAlert => match subject {
                Some(SubjectRef::Metric { name, value, threshold }) => AlertTemplate::new(
                    "Performance degraded",
                    format!("{} is at {:.0} (threshold {:.0}).", name, value, threshold),
                )
                .with_action("/admin/monitoring".to_string(), "View monitoring"),
                _ => AlertTemplate::new("Performance degraded", "Response times are above threshold.".to_string())
                    .with_action("/admin/monitoring".to_string(), "View monitoring"),
            },
        }
    }

    /// Invent a plausible subject for synthetic alerts of this type.
    pub fn sample_subject<R: Rng + ?Sized>(&self, rng: &mut R) -> SubjectRef {
        let (client_id, client) = *CLIENTS.choose(rng).unwrap_or(&CLIENTS[0]);
        let serial: u32 = rng.gen_range(1000..10000);

        match self {
            Self::QuoteRequest | Self::QuoteExpiring => SubjectRef::Quote {
                id: format!("q_{}", serial),
                client: client.to_string(),
            },
            Self::PaymentDue => SubjectRef::Payment {
                policy_id: format!("pol_{}", serial),
                amount_cents: rng.gen_range(5_000..250_000),
            },
            Self::PolicyExpiring => SubjectRef::Policy {
                id: format!("pol_{}", serial),
                client: client.to_string(),
            },
            Self::ClientInactive => SubjectRef::Client {
                id: client_id.to_string(),
                name: client.to_string(),
            },
            Self::ConversionRateLow => SubjectRef::Metric {
                name: "Monthly conversion".to_string(),
                value: rng.gen_range(5.0..15.0),
                threshold: 15.0,
            },
            Self::SystemError => SubjectRef::System {
                component: COMPONENTS.choose(rng).unwrap_or(&COMPONENTS[0]).to_string(),
            },
            Self::PerformanceAlert => SubjectRef::Metric {
                name: "Quote pricing p95 latency (ms)".to_string(),
                value: rng.gen_range(1200.0..4000.0),
                threshold: 1000.0,
            },
        }
    }

    /// A complete draft with sampled subject and rendered template.
    pub fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> AlertDraft {
        let subject = self.sample_subject(rng);
        let template = self.template(Some(&subject));

        let mut draft = AlertDraft::new(*self)
            .title(template.title)
            .message(template.message)
            .subject(subject);
        draft.action_url = template.action_url;
        draft.action_text = template.action_text;
        draft
    }
}
