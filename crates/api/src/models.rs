use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::operations::OperationLogEntry;
use services::subscription::{BurnedToken, ClientRecord, Registration, SubscriptionStats};
use utoipa::{IntoParams, ToSchema};

/// Request to issue a new subscription token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterClientRequest {
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Profile label appended to the token; must not contain whitespace
    pub profile: String,
    /// Whole number with optional unit suffix: `30` (days), `12h`, `45m`
    pub duration: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterClientResponse {
    pub client_id: i64,
    pub token: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<Registration> for RegisterClientResponse {
    fn from(r: Registration) -> Self {
        Self {
            client_id: r.client_id.as_i64(),
            token: r.token,
            start: r.start,
            end: r.end,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PayRequest {
    /// Amount received; omit to only flip the status
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtendRequest {
    /// Whole days added to the current end date
    pub days: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtendResponse {
    pub token: String,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BurnRequest {
    pub reason: String,
}

/// Client record as returned by the admin API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: i64,
    pub token: String,
    pub name: String,
    pub email: String,
    pub profile: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `Paid` or `Unpaid`
    pub status: String,
    #[schema(value_type = Option<String>)]
    pub payment_amount: Option<Decimal>,
    pub is_burned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_date: Option<DateTime<Utc>>,
    /// Computed at response time from `end`
    pub expired: bool,
}

impl ClientResponse {
    pub fn from_record(record: ClientRecord, now: DateTime<Utc>) -> Self {
        let expired = record.is_expired(now);
        Self {
            id: record.id.as_i64(),
            token: record.token,
            name: record.name,
            email: record.email,
            profile: record.profile,
            start: record.start,
            end: record.end,
            status: record.status.as_str().to_string(),
            payment_amount: record.payment_amount,
            is_burned: record.is_burned,
            burn_reason: record.burn_reason,
            burn_date: record.burn_date,
            expired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientListResponse {
    pub clients: Vec<ClientResponse>,
    pub total: usize,
}

impl ClientListResponse {
    pub fn from_records(records: Vec<ClientRecord>) -> Self {
        let now = Utc::now();
        let clients: Vec<ClientResponse> = records
            .into_iter()
            .map(|r| ClientResponse::from_record(r, now))
            .collect();
        let total = clients.len();
        Self { clients, total }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BurnedTokenResponse {
    pub token: String,
    pub reason: String,
    pub burn_date: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub profile: String,
}

impl From<BurnedToken> for BurnedTokenResponse {
    fn from(b: BurnedToken) -> Self {
        Self {
            token: b.token,
            reason: b.reason,
            burn_date: b.burn_date,
            name: b.name,
            email: b.email,
            profile: b.profile,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BurnedTokenListResponse {
    pub burned: Vec<BurnedTokenResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub total: u64,
    pub paid: u64,
    pub unpaid: u64,
    pub expired: u64,
    pub burned: u64,
}

impl From<SubscriptionStats> for StatsResponse {
    fn from(s: SubscriptionStats) -> Self {
        Self {
            total: s.total,
            paid: s.paid,
            unpaid: s.unpaid,
            expired: s.expired,
            burned: s.burned,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OperationResponse {
    pub id: i64,
    /// NEW, PAID, EXT or BURN
    pub op_type: String,
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub details: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    /// Display form of the client's name, when the client is still known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl From<OperationLogEntry> for OperationResponse {
    fn from(op: OperationLogEntry) -> Self {
        Self {
            id: op.id,
            op_type: op.op_type.as_str().to_string(),
            timestamp: op.timestamp,
            token: op.token,
            details: op.details,
            amount: op.amount,
            client_id: op.client_id.map(|id| id.as_i64()),
            client_name: op
                .client_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .map(display_name),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OperationListResponse {
    pub operations: Vec<OperationResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListClientsParams {
    /// Only return clients whose status is Unpaid
    #[serde(default)]
    pub unpaid: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive substring over token, name, email and profile
    pub q: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpiringParams {
    /// Window in days from now, inclusive
    pub days: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentOperationsParams {
    #[serde(default = "default_operations_limit")]
    pub limit: usize,
}

fn default_operations_limit() -> usize {
    10
}

/// `john_doe` -> `John Doe`, `AnnaAnna` -> `Anna`
pub fn display_name(raw: &str) -> String {
    collapse_repeated(raw.trim())
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Names entered twice in a row are stored doubled; show them once
fn collapse_repeated(name: &str) -> &str {
    let chars = name.chars().count();
    if chars < 2 || chars % 2 != 0 {
        return name;
    }
    let mid = name
        .char_indices()
        .nth(chars / 2)
        .map_or(name.len(), |(i, _)| i);
    let (first, second) = name.split_at(mid);
    if first == second {
        first
    } else {
        name
    }
}
