use crate::pool::DbPool;
use async_trait::async_trait;
use services::operations::ports::{
    NewOperation, OperationLogEntry, OperationLogRepository, OperationType,
};
use services::subscription::ports::SubscriptionError;

pub struct PostgresOperationLogRepository {
    pool: DbPool,
}

impl PostgresOperationLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationLogRepository for PostgresOperationLogRepository {
    async fn append_operation(&self, operation: NewOperation) -> Result<(), SubscriptionError> {
        tracing::debug!(
            "Repository: Appending {} operation for token={}",
            operation.op_type.as_str(),
            operation.token
        );

        let client = self.pool.get().await.map_err(SubscriptionError::store)?;
        client
            .execute(
                "INSERT INTO operations_log (timestamp, operation_type, token, details, amount, client_id)
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &operation.timestamp,
                    &operation.op_type.as_str(),
                    &operation.token,
                    &operation.details,
                    &operation.amount,
                    &operation.client_id,
                ],
            )
            .await
            .map_err(SubscriptionError::store)?;
        Ok(())
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError> {
        tracing::debug!("Repository: Fetching {} recent operations", limit);

        let client = self.pool.get().await.map_err(SubscriptionError::store)?;
        let rows = client
            .query(
                "SELECT o.id, o.timestamp, o.operation_type, o.token, o.details, o.amount,
                        o.client_id, c.name AS client_name
                 FROM operations_log o
                 LEFT JOIN clients c ON c.id = o.client_id
                 ORDER BY o.timestamp DESC, o.id DESC
                 LIMIT $1",
                &[&(limit.min(i64::MAX as usize) as i64)],
            )
            .await
            .map_err(SubscriptionError::store)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let op_type: String = row.get("operation_type");
                let Some(op_type) = OperationType::parse(&op_type) else {
                    tracing::warn!("Repository: Skipping operation with unknown type '{}'", op_type);
                    return None;
                };
                Some(OperationLogEntry {
                    id: row.get("id"),
                    op_type,
                    timestamp: row.get("timestamp"),
                    token: row.get("token"),
                    details: row.get("details"),
                    amount: row.get("amount"),
                    client_id: row.get("client_id"),
                    client_name: row.get("client_name"),
                })
            })
            .collect())
    }
}
