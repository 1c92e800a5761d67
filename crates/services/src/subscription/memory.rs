//! Process-local record store.
//!
//! Backs the `memory` storage backend and the service tests. Contents are lost on restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::ports::{
    BurnedToken, ClientRecord, ClientRepository, NewBurnRecord, NewClientRecord, PaymentStatus,
    SubscriptionError, SubscriptionStats,
};
use crate::operations::ports::{NewOperation, OperationLogEntry, OperationLogRepository};
use crate::ClientId;

#[derive(Default)]
struct State {
    clients: Vec<ClientRecord>,
    burn_records: Vec<NewBurnRecord>,
    operations: Vec<OperationLogEntry>,
    last_client_id: i64,
    last_operation_id: i64,
}

impl State {
    fn client_mut(&mut self, token: &str) -> Result<&mut ClientRecord, SubscriptionError> {
        self.clients
            .iter_mut()
            .find(|c| c.token == token)
            .ok_or_else(|| SubscriptionError::NotFound(token.to_string()))
    }

    fn insert(&mut self, record: NewClientRecord) -> ClientId {
        self.last_client_id += 1;
        let id = ClientId(self.last_client_id);
        self.clients.push(ClientRecord {
            id,
            token: record.token,
            name: record.name,
            email: record.email,
            profile: record.profile,
            start: record.start,
            end: record.end,
            status: PaymentStatus::Unpaid,
            payment_amount: Some(Decimal::ZERO),
            is_burned: false,
            burn_reason: None,
            burn_date: None,
        });
        id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    clients_unavailable: AtomicBool,
    operations_unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_clients(&self) -> Result<(), SubscriptionError> {
        if self.clients_unavailable.load(Ordering::SeqCst) {
            return Err(SubscriptionError::store("client store offline"));
        }
        Ok(())
    }

    /// Insert a record directly, bypassing the lifecycle service
    pub fn seed(&self, record: NewClientRecord) -> ClientId {
        self.state().insert(record)
    }

    /// Make every client/burn call fail with `StoreUnavailable`
    pub fn set_clients_unavailable(&self, unavailable: bool) {
        self.clients_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make operation log appends fail with `StoreUnavailable`
    pub fn set_operations_unavailable(&self, unavailable: bool) {
        self.operations_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    /// Every logged operation in append order
    pub fn operations(&self) -> Vec<OperationLogEntry> {
        self.state().operations.clone()
    }

    pub fn burn_records(&self) -> Vec<NewBurnRecord> {
        self.state().burn_records.clone()
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn exists(&self, token: &str) -> Result<bool, SubscriptionError> {
        self.check_clients()?;
        Ok(self.state().clients.iter().any(|c| c.token == token))
    }

    async fn insert(&self, record: NewClientRecord) -> Result<ClientId, SubscriptionError> {
        self.check_clients()?;
        Ok(self.state().insert(record))
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ClientRecord>, SubscriptionError> {
        self.check_clients()?;
        Ok(self
            .state()
            .clients
            .iter()
            .find(|c| c.token == token)
            .cloned())
    }

    async fn update_status(
        &self,
        token: &str,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<(), SubscriptionError> {
        self.check_clients()?;
        let mut state = self.state();
        let client = state.client_mut(token)?;
        client.status = status;
        if amount.is_some() {
            client.payment_amount = amount;
        }
        Ok(())
    }

    async fn update_end(
        &self,
        token: &str,
        new_end: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.check_clients()?;
        self.state().client_mut(token)?.end = new_end;
        Ok(())
    }

    async fn mark_burned(
        &self,
        token: &str,
        reason: &str,
        burn_date: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.check_clients()?;
        let mut state = self.state();
        let client = state.client_mut(token)?;
        client.is_burned = true;
        client.burn_reason = Some(reason.to_string());
        client.burn_date = Some(burn_date);
        Ok(())
    }

    async fn insert_burn_record(&self, record: NewBurnRecord) -> Result<(), SubscriptionError> {
        self.check_clients()?;
        self.state().burn_records.push(record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.check_clients()?;
        Ok(self.state().clients.clone())
    }

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.check_clients()?;
        Ok(self
            .state()
            .clients
            .iter()
            .filter(|c| c.status == PaymentStatus::Unpaid)
            .cloned()
            .collect())
    }

    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError> {
        self.check_clients()?;
        let state = self.state();
        let mut burned: Vec<BurnedToken> = state
            .burn_records
            .iter()
            .map(|burn| {
                let owner = state.clients.iter().find(|c| c.token == burn.token);
                BurnedToken {
                    token: burn.token.clone(),
                    reason: burn.reason.clone(),
                    burn_date: burn.burn_date,
                    name: owner.map(|c| c.name.clone()).unwrap_or_default(),
                    email: owner.map(|c| c.email.clone()).unwrap_or_default(),
                    profile: owner.map(|c| c.profile.clone()).unwrap_or_default(),
                }
            })
            .collect();
        burned.sort_by(|a, b| b.burn_date.cmp(&a.burn_date));
        Ok(burned)
    }

    async fn list_expiring_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.check_clients()?;
        let mut expiring: Vec<ClientRecord> = self
            .state()
            .clients
            .iter()
            .filter(|c| c.expires_within(now, until))
            .cloned()
            .collect();
        expiring.sort_by_key(|c| c.end);
        Ok(expiring)
    }

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.check_clients()?;
        let needle = query.to_lowercase();
        Ok(self
            .state()
            .clients
            .iter()
            .filter(|c| c.matches(&needle))
            .cloned()
            .collect())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<SubscriptionStats, SubscriptionError> {
        self.check_clients()?;
        let mut stats = SubscriptionStats::default();
        for client in &self.state().clients {
            stats.count(client, now);
        }
        Ok(stats)
    }
}

#[async_trait]
impl OperationLogRepository for InMemoryStore {
    async fn append_operation(&self, operation: NewOperation) -> Result<(), SubscriptionError> {
        if self.operations_unavailable.load(Ordering::SeqCst) {
            return Err(SubscriptionError::store("operations log offline"));
        }
        let mut state = self.state();
        state.last_operation_id += 1;
        let id = state.last_operation_id;
        state.operations.push(OperationLogEntry {
            id,
            op_type: operation.op_type,
            timestamp: operation.timestamp,
            token: operation.token,
            details: operation.details,
            amount: operation.amount,
            client_id: operation.client_id,
            client_name: None,
        });
        Ok(())
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError> {
        let state = self.state();
        let mut entries: Vec<OperationLogEntry> = state
            .operations
            .iter()
            .map(|entry| {
                let mut entry = entry.clone();
                entry.client_name = entry
                    .client_id
                    .and_then(|id| state.clients.iter().find(|c| c.id == id))
                    .map(|c| c.name.clone());
                entry
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }
}
