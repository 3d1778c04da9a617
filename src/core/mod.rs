pub mod alerts;
pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod notifications;
pub mod platform;
pub mod scheduler;
pub mod storage;
