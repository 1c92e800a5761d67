use crate::pool::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use services::subscription::ports::{
    BurnedToken, ClientRecord, ClientRepository, NewBurnRecord, NewClientRecord, PaymentStatus,
    SubscriptionError, SubscriptionStats,
};
use services::ClientId;
use tokio_postgres::Row;

const CLIENT_COLUMNS: &str = "id, token, name, email, profile, start_date, end_date, status,
                              payment_amount, is_burned, burn_reason, burn_date";

pub struct PostgresClientRepository {
    pool: DbPool,
}

impl PostgresClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, SubscriptionError> {
        self.pool.get().await.map_err(SubscriptionError::store)
    }

    async fn query_clients(
        &self,
        filter: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<ClientRecord>, SubscriptionError> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients {filter}"),
                params,
            )
            .await
            .map_err(SubscriptionError::store)?;
        Ok(rows.iter().map(row_to_record).collect())
    }
}

fn row_to_record(row: &Row) -> ClientRecord {
    let status: String = row.get("status");
    ClientRecord {
        id: row.get("id"),
        token: row.get("token"),
        name: row.get("name"),
        email: row.get("email"),
        profile: row.get("profile"),
        start: row.get("start_date"),
        end: row.get("end_date"),
        status: PaymentStatus::parse(&status).unwrap_or_else(|| {
            tracing::warn!("Repository: Unknown payment status '{}', reading as Unpaid", status);
            PaymentStatus::Unpaid
        }),
        payment_amount: row.get("payment_amount"),
        is_burned: row.get("is_burned"),
        burn_reason: row.get("burn_reason"),
        burn_date: row.get("burn_date"),
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn not_found_if_untouched(updated: u64, token: &str) -> Result<(), SubscriptionError> {
    if updated == 0 {
        return Err(SubscriptionError::NotFound(token.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    async fn exists(&self, token: &str) -> Result<bool, SubscriptionError> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM clients WHERE token = $1)",
                &[&token],
            )
            .await
            .map_err(SubscriptionError::store)?;
        Ok(row.get(0))
    }

    async fn insert(&self, record: NewClientRecord) -> Result<ClientId, SubscriptionError> {
        tracing::info!(
            "Repository: Inserting client - token={}, profile={}",
            record.token,
            record.profile
        );

        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO clients (token, name, email, profile, start_date, end_date, status, payment_amount)
                 VALUES ($1, $2, $3, $4, $5, $6, 'Unpaid', 0)
                 RETURNING id",
                &[
                    &record.token,
                    &record.name,
                    &record.email,
                    &record.profile,
                    &record.start,
                    &record.end,
                ],
            )
            .await
            .map_err(SubscriptionError::store)?;

        Ok(row.get("id"))
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ClientRecord>, SubscriptionError> {
        tracing::debug!("Repository: Fetching client by token={}", token);

        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE token = $1"),
                &[&token],
            )
            .await
            .map_err(SubscriptionError::store)?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn update_status(
        &self,
        token: &str,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<(), SubscriptionError> {
        tracing::info!(
            "Repository: Updating status - token={}, status={}",
            token,
            status.as_str()
        );

        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE clients
                 SET status = $2, payment_amount = COALESCE($3, payment_amount)
                 WHERE token = $1",
                &[&token, &status.as_str(), &amount],
            )
            .await
            .map_err(SubscriptionError::store)?;

        not_found_if_untouched(updated, token)
    }

    async fn update_end(
        &self,
        token: &str,
        new_end: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        tracing::info!(
            "Repository: Updating end date - token={}, end={}",
            token,
            new_end
        );

        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE clients SET end_date = $2 WHERE token = $1",
                &[&token, &new_end],
            )
            .await
            .map_err(SubscriptionError::store)?;

        not_found_if_untouched(updated, token)
    }

    async fn mark_burned(
        &self,
        token: &str,
        reason: &str,
        burn_date: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        tracing::info!("Repository: Marking token={} as burned", token);

        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE clients
                 SET is_burned = TRUE, burn_reason = $2, burn_date = $3
                 WHERE token = $1",
                &[&token, &reason, &burn_date],
            )
            .await
            .map_err(SubscriptionError::store)?;

        not_found_if_untouched(updated, token)
    }

    async fn insert_burn_record(&self, record: NewBurnRecord) -> Result<(), SubscriptionError> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO burned_tokens (token, burn_reason, burn_date, client_id)
                 VALUES ($1, $2, $3, $4)",
                &[
                    &record.token,
                    &record.reason,
                    &record.burn_date,
                    &record.client_id,
                ],
            )
            .await
            .map_err(SubscriptionError::store)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        tracing::debug!("Repository: Listing all clients");
        self.query_clients("ORDER BY id", &[]).await
    }

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        tracing::debug!("Repository: Listing unpaid clients");
        self.query_clients("WHERE status = 'Unpaid' ORDER BY id", &[])
            .await
    }

    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError> {
        tracing::debug!("Repository: Listing burned tokens");

        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT b.token, b.burn_reason, b.burn_date,
                        COALESCE(c.name, '') AS name,
                        COALESCE(c.email, '') AS email,
                        COALESCE(c.profile, '') AS profile
                 FROM burned_tokens b
                 LEFT JOIN clients c ON c.id = b.client_id
                 ORDER BY b.burn_date DESC, b.id DESC",
                &[],
            )
            .await
            .map_err(SubscriptionError::store)?;

        Ok(rows
            .into_iter()
            .map(|row| BurnedToken {
                token: row.get("token"),
                reason: row.get("burn_reason"),
                burn_date: row.get("burn_date"),
                name: row.get("name"),
                email: row.get("email"),
                profile: row.get("profile"),
            })
            .collect())
    }

    async fn list_expiring_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ClientRecord>, SubscriptionError> {
        tracing::debug!(
            "Repository: Listing clients expiring between {} and {}",
            now,
            until
        );
        self.query_clients(
            "WHERE end_date >= $1 AND end_date <= $2 ORDER BY end_date",
            &[&now, &until],
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError> {
        tracing::debug!("Repository: Searching clients for '{}'", query);

        let pattern = like_pattern(query);
        self.query_clients(
            "WHERE token ILIKE $1 OR name ILIKE $1 OR email ILIKE $1 OR profile ILIKE $1
             ORDER BY id",
            &[&pattern],
        )
        .await
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<SubscriptionStats, SubscriptionError> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) AS total,
                        COUNT(*) FILTER (WHERE status = 'Paid') AS paid,
                        COUNT(*) FILTER (WHERE status <> 'Paid') AS unpaid,
                        COUNT(*) FILTER (WHERE end_date < $1) AS expired,
                        COUNT(*) FILTER (WHERE is_burned) AS burned
                 FROM clients",
                &[&now],
            )
            .await
            .map_err(SubscriptionError::store)?;

        let count = |column: &str| row.get::<_, i64>(column).max(0) as u64;
        Ok(SubscriptionStats {
            total: count("total"),
            paid: count("paid"),
            unpaid: count("unpaid"),
            expired: count("expired"),
            burned: count("burned"),
        })
    }
}
