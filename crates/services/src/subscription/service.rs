use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::duration::parse_duration;
use super::ports::{
    BurnedToken, ClientRecord, ClientRepository, NewBurnRecord, NewClientRecord, PaymentStatus,
    Registration, SubscriptionError, SubscriptionService, SubscriptionStats,
};
use super::token::generate_unique_token;
use crate::operations::ports::{
    NewOperation, OperationLogEntry, OperationLogRepository, OperationType,
};
use crate::scheduler::{ExpirationNotice, ExpirationScheduler};
use crate::ClientId;

/// Configuration for SubscriptionServiceImpl
pub struct SubscriptionServiceConfig {
    pub client_repo: Arc<dyn ClientRepository>,
    pub operations_repo: Arc<dyn OperationLogRepository>,
    pub scheduler: Arc<ExpirationScheduler>,
}

pub struct SubscriptionServiceImpl {
    client_repo: Arc<dyn ClientRepository>,
    operations_repo: Arc<dyn OperationLogRepository>,
    scheduler: Arc<ExpirationScheduler>,
    /// Serialises read-modify-write sequences per token (pay, extend, burn)
    token_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Serialises token generation with the insert that claims it
    registration_lock: tokio::sync::Mutex<()>,
}

impl SubscriptionServiceImpl {
    pub fn new(config: SubscriptionServiceConfig) -> Self {
        Self {
            client_repo: config.client_repo,
            operations_repo: config.operations_repo,
            scheduler: config.scheduler,
            token_locks: Mutex::new(HashMap::new()),
            registration_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn token_lock(&self, token: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .token_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Entries nobody else holds are stale
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(token.to_string()).or_default().clone()
    }

    async fn load(&self, token: &str) -> Result<ClientRecord, SubscriptionError> {
        self.client_repo
            .get_by_token(token)
            .await?
            .ok_or_else(|| SubscriptionError::NotFound(token.to_string()))
    }

    /// Best-effort audit append; failures never reach the caller
    async fn log_operation(
        &self,
        op_type: OperationType,
        token: &str,
        details: String,
        amount: Decimal,
        client_id: ClientId,
    ) {
        let operation = NewOperation {
            op_type,
            timestamp: Utc::now(),
            token: token.to_string(),
            details,
            amount,
            client_id: Some(client_id),
        };
        if let Err(e) = self.operations_repo.append_operation(operation).await {
            tracing::error!(
                "Failed to append {} operation for token={}: {}",
                op_type.as_str(),
                token,
                e
            );
        }
    }

    fn schedule_notice(&self, record: &ClientRecord) {
        self.scheduler
            .schedule(ExpirationNotice::from_record(record));
    }
}

fn require_text(field: &str, value: &str) -> Result<String, SubscriptionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SubscriptionError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn days_delta(days: i64) -> Result<Duration, SubscriptionError> {
    Duration::try_days(days)
        .ok_or_else(|| SubscriptionError::InvalidArgument(format!("days out of range: {days}")))
}

#[async_trait]
impl SubscriptionService for SubscriptionServiceImpl {
    async fn register(
        &self,
        name: &str,
        email: &str,
        profile: &str,
        duration: &str,
    ) -> Result<Registration, SubscriptionError> {
        let name = require_text("name", name)?;
        let profile = require_text("profile", profile)?;
        if profile.chars().any(char::is_whitespace) {
            return Err(SubscriptionError::InvalidArgument(
                "profile must not contain whitespace".to_string(),
            ));
        }
        let delta = parse_duration(duration)?;

        let start = Utc::now();
        let end = start
            .checked_add_signed(delta)
            .ok_or_else(|| SubscriptionError::InvalidDurationFormat(duration.to_string()))?;

        let (client_id, token) = {
            let _guard = self.registration_lock.lock().await;
            let token = generate_unique_token(self.client_repo.as_ref(), &profile).await?;
            let client_id = self
                .client_repo
                .insert(NewClientRecord {
                    token: token.clone(),
                    name: name.clone(),
                    email: email.trim().to_string(),
                    profile: profile.clone(),
                    start,
                    end,
                })
                .await?;
            (client_id, token)
        };

        tracing::info!(
            "Registered client_id={} token={} profile={} end={}",
            client_id,
            token,
            profile,
            end
        );

        self.log_operation(
            OperationType::New,
            &token,
            format!("Profile: {}, Duration: {}", profile, duration.trim()),
            Decimal::ZERO,
            client_id,
        )
        .await;

        self.scheduler.schedule(ExpirationNotice {
            token: token.clone(),
            name,
            email: email.trim().to_string(),
            profile,
            end,
        });

        Ok(Registration {
            client_id,
            token,
            start,
            end,
        })
    }

    async fn pay(
        &self,
        token: &str,
        amount: Option<Decimal>,
    ) -> Result<ClientRecord, SubscriptionError> {
        if amount.is_some_and(|a| a.is_sign_negative() && !a.is_zero()) {
            return Err(SubscriptionError::InvalidArgument(
                "payment amount must not be negative".to_string(),
            ));
        }

        let lock = self.token_lock(token);
        let _guard = lock.lock().await;

        let mut record = self.load(token).await?;
        self.client_repo
            .update_status(token, PaymentStatus::Paid, amount)
            .await?;
        record.status = PaymentStatus::Paid;

        tracing::info!(
            "Marked token={} as paid (amount={:?})",
            token,
            amount.map(|a| a.to_string())
        );

        if let Some(amount) = amount {
            record.payment_amount = Some(amount);
            self.log_operation(
                OperationType::Paid,
                token,
                "Status changed to Paid".to_string(),
                amount,
                record.id,
            )
            .await;
        }

        Ok(record)
    }

    async fn extend(&self, token: &str, days: i64) -> Result<DateTime<Utc>, SubscriptionError> {
        if days <= 0 {
            return Err(SubscriptionError::InvalidArgument(format!(
                "days must be positive, got {days}"
            )));
        }
        let delta = days_delta(days)?;

        let lock = self.token_lock(token);
        let _guard = lock.lock().await;

        let mut record = self.load(token).await?;
        let new_end = record
            .end
            .checked_add_signed(delta)
            .ok_or_else(|| SubscriptionError::InvalidArgument(format!("days out of range: {days}")))?;
        self.client_repo.update_end(token, new_end).await?;

        tracing::info!(
            "Extended token={} by {} days: {} -> {}",
            token,
            days,
            record.end,
            new_end
        );
        record.end = new_end;

        self.log_operation(
            OperationType::Ext,
            token,
            format!("+{days} days"),
            Decimal::ZERO,
            record.id,
        )
        .await;

        if new_end > Utc::now() {
            self.schedule_notice(&record);
        }

        Ok(new_end)
    }

    async fn burn(&self, token: &str, reason: &str) -> Result<ClientRecord, SubscriptionError> {
        let reason = require_text("reason", reason)?;

        let lock = self.token_lock(token);
        let _guard = lock.lock().await;

        let mut record = self.load(token).await?;
        if record.is_burned {
            return Err(SubscriptionError::AlreadyBurned(token.to_string()));
        }

        let burn_date = Utc::now();
        self.client_repo
            .mark_burned(token, &reason, burn_date)
            .await?;
        self.client_repo
            .insert_burn_record(NewBurnRecord {
                token: token.to_string(),
                reason: reason.clone(),
                burn_date,
                client_id: record.id,
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    "Token={} marked burned but burn record was not written: {}",
                    token,
                    e
                )
            })?;

        tracing::info!("Burned token={} reason={}", token, reason);

        self.log_operation(
            OperationType::Burn,
            token,
            reason.clone(),
            Decimal::ZERO,
            record.id,
        )
        .await;

        record.is_burned = true;
        record.burn_reason = Some(reason);
        record.burn_date = Some(burn_date);
        Ok(record)
    }

    async fn get_client(&self, token: &str) -> Result<ClientRecord, SubscriptionError> {
        self.load(token).await
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.client_repo.list_all().await
    }

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.client_repo.list_unpaid().await
    }

    async fn list_expiring(&self, days: i64) -> Result<Vec<ClientRecord>, SubscriptionError> {
        if days < 0 {
            return Err(SubscriptionError::InvalidArgument(format!(
                "days must not be negative, got {days}"
            )));
        }
        let now = Utc::now();
        let until = now
            .checked_add_signed(days_delta(days)?)
            .ok_or_else(|| SubscriptionError::InvalidArgument(format!("days out of range: {days}")))?;
        self.client_repo.list_expiring_between(now, until).await
    }

    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError> {
        self.client_repo.list_burned().await
    }

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError> {
        let query = require_text("query", query)?;
        self.client_repo.search(&query).await
    }

    async fn stats(&self) -> Result<SubscriptionStats, SubscriptionError> {
        self.client_repo.stats(Utc::now()).await
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.operations_repo.recent_operations(limit).await
    }

    async fn restore_schedule(&self) -> Result<usize, SubscriptionError> {
        let now = Utc::now();
        let mut restored = 0;
        for record in self.client_repo.list_all().await? {
            if record.end > now {
                self.schedule_notice(&record);
                restored += 1;
            }
        }
        tracing::info!("Restored {} expiration jobs from stored end dates", restored);
        Ok(restored)
    }
}
