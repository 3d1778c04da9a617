// Operational alert system for the brokerage back office.
//
// Architecture:
// - model.rs: Alert, AlertType, Severity, SubjectRef, AlertDraft
// - templates.rs: Per-type title/message/action text, one match per type
// - quiet_hours.rs: HH:MM clock times and the quiet-hours gate
// - settings.rs: Per-user delivery preferences and their persistence
// - store.rs: Newest-first alert list and its lifecycle transitions
// - broadcaster.rs: Snapshot fan-out to subscribed observers
// - metrics.rs: Derived counts, resolution rate and latency
// - dispatch.rs: Push / email / WhatsApp delivery policy and sends
// - generator.rs: Synthetic alerts and auto-resolution picks
// - engine.rs: Orchestrates all of the above plus background timers

pub mod broadcaster;
pub mod dispatch;
pub mod engine;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod quiet_hours;
pub mod settings;
pub mod store;
pub mod templates;
