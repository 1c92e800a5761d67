pub mod notifier;
pub mod ports;
pub mod service;

pub use notifier::{ChatBotNotifier, LogNotifier};
pub use ports::{ExpirationNotice, ExpirationNotifier, ScheduledJob};
pub use service::ExpirationScheduler;
