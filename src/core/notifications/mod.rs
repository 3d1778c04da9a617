// User-facing notifications: a lighter sibling of alerts with read/unread
// state, persistence and per-category opt-outs, but no resolution.

pub mod center;
pub mod model;

pub use center::{NotificationCenter, NotificationDeps};
pub use model::{
    NotificationCategory, NotificationData, NotificationDraft, NotificationKind,
    NotificationPreferences, PreferencesPatch,
};
