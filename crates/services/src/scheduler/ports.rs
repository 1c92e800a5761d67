use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::ports::ClientRecord;

/// Payload delivered when a token's end time passes. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirationNotice {
    pub token: String,
    pub name: String,
    pub email: String,
    pub profile: String,
    pub end: DateTime<Utc>,
}

impl ExpirationNotice {
    pub fn from_record(record: &ClientRecord) -> Self {
        Self {
            token: record.token.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            profile: record.profile.clone(),
            end: record.end,
        }
    }

    /// Human-readable message text
    pub fn message(&self) -> String {
        format!(
            "Subscription expired\nToken: {}\nClient: {}\nEmail: {}\nProfile: {}\nEnded: {}",
            self.token,
            self.name,
            self.email,
            self.profile,
            self.end.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// A one-shot job as seen by callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub token: String,
    pub fire_at: DateTime<Utc>,
}

/// Delivery channel for expiration notices
#[async_trait]
pub trait ExpirationNotifier: Send + Sync {
    async fn notify(&self, notice: &ExpirationNotice) -> anyhow::Result<()>;
}
