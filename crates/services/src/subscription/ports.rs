use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::operations::ports::OperationLogEntry;
use crate::ClientId;

/// Payment axis of a subscription. Independent of burn and expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Unpaid" => Some(PaymentStatus::Unpaid),
            "Paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// One issued subscription, as held by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub token: String,
    pub name: String,
    pub email: String,
    pub profile: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: PaymentStatus,
    pub payment_amount: Option<Decimal>,
    pub is_burned: bool,
    pub burn_reason: Option<String>,
    pub burn_date: Option<DateTime<Utc>>,
}

impl ClientRecord {
    /// Expiry is derived, never stored: `end < now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end < now
    }

    /// Inclusive window check used by the expiring listing
    pub fn expires_within(&self, now: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.end >= now && self.end <= until
    }

    /// Case-insensitive substring match over token, name, email and profile.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.token, &self.name, &self.email, &self.profile]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Fields supplied on registration; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewClientRecord {
    pub token: String,
    pub name: String,
    pub email: String,
    pub profile: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Append-only burn event
#[derive(Debug, Clone)]
pub struct NewBurnRecord {
    pub token: String,
    pub reason: String,
    pub burn_date: DateTime<Utc>,
    pub client_id: ClientId,
}

/// Burn event joined with the owning client's attributes, for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnedToken {
    pub token: String,
    pub reason: String,
    pub burn_date: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub profile: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStats {
    pub total: u64,
    pub paid: u64,
    pub unpaid: u64,
    /// `end < now`, regardless of payment or burn state
    pub expired: u64,
    pub burned: u64,
}

impl SubscriptionStats {
    /// Folds one record into the running counts
    pub fn count(&mut self, record: &ClientRecord, now: DateTime<Utc>) {
        self.total += 1;
        match record.status {
            PaymentStatus::Paid => self.paid += 1,
            PaymentStatus::Unpaid => self.unpaid += 1,
        }
        if record.is_expired(now) {
            self.expired += 1;
        }
        if record.is_burned {
            self.burned += 1;
        }
    }
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub client_id: ClientId,
    pub token: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Error types for subscription operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Invalid duration format: {0}")]
    InvalidDurationFormat(String),
    #[error("Could not generate a unique token after {attempts} attempts")]
    TokenSpaceExhausted { attempts: u32 },
    #[error("Token {0} not found")]
    NotFound(String),
    #[error("Token {0} is already burned")]
    AlreadyBurned(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Stored date could not be parsed: {value}")]
    DateParseFault { value: String },
}

impl SubscriptionError {
    /// Wraps any backend failure as `StoreUnavailable`
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for SubscriptionError {
    fn from(err: anyhow::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Repository trait for client and burn records.
///
/// Implementations must not rely on transactions or foreign keys being available;
/// integrity checks (existence, already-burned) live in the lifecycle service.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Check whether a token has ever been issued
    async fn exists(&self, token: &str) -> Result<bool, SubscriptionError>;

    /// Persist a new record with status Unpaid and a zero payment amount
    async fn insert(&self, record: NewClientRecord) -> Result<ClientId, SubscriptionError>;

    async fn get_by_token(&self, token: &str) -> Result<Option<ClientRecord>, SubscriptionError>;

    /// Set the payment status; the amount is only written when given
    async fn update_status(
        &self,
        token: &str,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<(), SubscriptionError>;

    async fn update_end(&self, token: &str, new_end: DateTime<Utc>)
        -> Result<(), SubscriptionError>;

    /// Set is_burned, burn_reason and burn_date together
    async fn mark_burned(
        &self,
        token: &str,
        reason: &str,
        burn_date: DateTime<Utc>,
    ) -> Result<(), SubscriptionError>;

    async fn insert_burn_record(&self, record: NewBurnRecord) -> Result<(), SubscriptionError>;

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError>;

    /// Burn events, newest burn first
    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError>;

    /// Records with `now <= end <= until`
    async fn list_expiring_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<SubscriptionStats, SubscriptionError>;
}

/// Service trait for the subscription lifecycle
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Issue a new token for a client and schedule its expiration notice
    async fn register(
        &self,
        name: &str,
        email: &str,
        profile: &str,
        duration: &str,
    ) -> Result<Registration, SubscriptionError>;

    /// Mark a subscription as paid. Idempotent.
    async fn pay(
        &self,
        token: &str,
        amount: Option<Decimal>,
    ) -> Result<ClientRecord, SubscriptionError>;

    /// Push the end date forward by whole days, relative to the current end
    async fn extend(&self, token: &str, days: i64) -> Result<DateTime<Utc>, SubscriptionError>;

    /// Permanently revoke a token
    async fn burn(&self, token: &str, reason: &str) -> Result<ClientRecord, SubscriptionError>;

    async fn get_client(&self, token: &str) -> Result<ClientRecord, SubscriptionError>;

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn list_expiring(&self, days: i64) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError>;

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError>;

    async fn stats(&self) -> Result<SubscriptionStats, SubscriptionError>;

    /// Newest operations first
    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError>;

    /// Re-arm expiration notices for every record whose end is still ahead.
    /// Returns how many were scheduled.
    async fn restore_schedule(&self) -> Result<usize, SubscriptionError>;
}
