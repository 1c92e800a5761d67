use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::subscription::ports::SubscriptionError;
use crate::ClientId;

/// Kind of lifecycle mutation recorded in the operations log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    New,
    Paid,
    Ext,
    Burn,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::New => "NEW",
            OperationType::Paid => "PAID",
            OperationType::Ext => "EXT",
            OperationType::Burn => "BURN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "NEW" => Some(OperationType::New),
            "PAID" => Some(OperationType::Paid),
            "EXT" => Some(OperationType::Ext),
            "BURN" => Some(OperationType::Burn),
            _ => None,
        }
    }
}

/// Parameters for appending an operation log entry
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub op_type: OperationType,
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub details: String,
    pub amount: Decimal,
    pub client_id: Option<ClientId>,
}

/// A stored operation log entry, joined with the client's name when it is still known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: i64,
    pub op_type: OperationType,
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub details: String,
    pub amount: Decimal,
    pub client_id: Option<ClientId>,
    pub client_name: Option<String>,
}

/// Append-only audit trail. Never mutated, never rolled back with the record it describes.
#[async_trait]
pub trait OperationLogRepository: Send + Sync {
    async fn append_operation(&self, operation: NewOperation) -> Result<(), SubscriptionError>;

    /// Newest first by timestamp
    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError>;
}
