// In-memory alert collection, kept newest-first.
//
// Lifecycle per alert:
//   unread & unresolved -> read & unresolved -> read & resolved
//   unread & unresolved -> unread & resolved
// Resolution is terminal. Nothing is ever removed.

use chrono::{DateTime, Utc};

use super::model::{Alert, AlertId};

#[derive(Default)]
pub struct AlertStore {
    alerts: Vec<Alert>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping timestamp-descending order. Among equal timestamps the
    /// latest insert comes first.
    pub fn insert(&mut self, alert: Alert) {
        let pos = self
            .alerts
            .partition_point(|existing| existing.timestamp > alert.timestamp);
        self.alerts.insert(pos, alert);
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn unread(&self) -> Vec<Alert> {
        self.alerts.iter().filter(|a| !a.is_read).cloned().collect()
    }

    pub fn critical(&self) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.is_open_critical())
            .cloned()
            .collect()
    }

    pub fn unresolved_ids(&self) -> Vec<AlertId> {
        self.alerts
            .iter()
            .filter(|a| !a.is_resolved())
            .map(|a| a.id.clone())
            .collect()
    }

    /// Returns true if the alert existed and was unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) if !alert.is_read => {
                alert.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns true if any alert changed.
    pub fn mark_all_read(&mut self) -> bool {
        let mut changed = false;
        for alert in self.alerts.iter_mut().filter(|a| !a.is_read) {
            alert.is_read = true;
            changed = true;
        }
        changed
    }

    /// Returns true if the alert existed and was still open. A resolved alert
    /// keeps its first `resolved_at` / `resolved_by` forever.
    pub fn resolve(&mut self, id: &str, resolved_by: &str, at: DateTime<Utc>) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) if !alert.is_resolved() => {
                alert.resolved_at = Some(at);
                alert.resolved_by = Some(resolved_by.to_string());
                true
            }
            _ => false,
        }
    }
}
