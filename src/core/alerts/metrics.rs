// Derived alert statistics, recomputed from a snapshot on every request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::{Alert, AlertType, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMetrics {
    pub total_alerts: usize,
    pub unread_alerts: usize,
    /// Critical and still unresolved
    pub critical_alerts: usize,
    pub alerts_by_type: HashMap<AlertType, usize>,
    pub alerts_by_severity: HashMap<Severity, usize>,
    /// Mean minutes from creation to resolution over resolved alerts (0 if none)
    pub average_resolution_time: f64,
    /// resolved / total (0 if no alerts)
    pub resolution_rate: f64,
}

impl AlertMetrics {
    pub fn compute(alerts: &[Alert]) -> Self {
        let mut alerts_by_type = HashMap::new();
        let mut alerts_by_severity = HashMap::new();
        let mut unread_alerts = 0;
        let mut critical_alerts = 0;
        let mut resolved = 0usize;
        let mut resolution_minutes = 0.0f64;

        for alert in alerts {
            *alerts_by_type.entry(alert.alert_type).or_insert(0) += 1;
            *alerts_by_severity.entry(alert.severity).or_insert(0) += 1;

            if !alert.is_read {
                unread_alerts += 1;
            }
            if alert.is_open_critical() {
                critical_alerts += 1;
            }
            if let Some(resolved_at) = alert.resolved_at {
                resolved += 1;
                let millis = (resolved_at - alert.timestamp).num_milliseconds();
                resolution_minutes += millis as f64 / 60_000.0;
            }
        }

        let average_resolution_time = if resolved == 0 {
            0.0
        } else {
            resolution_minutes / resolved as f64
        };
        let resolution_rate = if alerts.is_empty() {
            0.0
        } else {
            resolved as f64 / alerts.len() as f64
        };

        Self {
            total_alerts: alerts.len(),
            unread_alerts,
            critical_alerts,
            alerts_by_type,
            alerts_by_severity,
            average_resolution_time,
            resolution_rate,
        }
    }
}
