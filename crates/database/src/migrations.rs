//! Schema bootstrap for the PostgreSQL backend.
//!
//! Migrations are applied in order and recorded in `schema_migrations`; each runs once.

use crate::pool::DbPool;

const MIGRATIONS: &[(i32, &str, &str)] = &[
    (
        1,
        "create_clients",
        "CREATE TABLE IF NOT EXISTS clients (
            id BIGSERIAL PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            profile TEXT NOT NULL,
            start_date TIMESTAMPTZ NOT NULL,
            end_date TIMESTAMPTZ NOT NULL,
            status TEXT NOT NULL DEFAULT 'Unpaid',
            payment_amount NUMERIC(12, 2) DEFAULT 0,
            is_burned BOOLEAN NOT NULL DEFAULT FALSE,
            burn_reason TEXT,
            burn_date TIMESTAMPTZ,
            CONSTRAINT clients_end_after_start CHECK (end_date >= start_date)
        );
        CREATE INDEX IF NOT EXISTS idx_clients_end_date ON clients (end_date);
        CREATE INDEX IF NOT EXISTS idx_clients_status ON clients (status);",
    ),
    (
        2,
        "create_burned_tokens",
        "CREATE TABLE IF NOT EXISTS burned_tokens (
            id BIGSERIAL PRIMARY KEY,
            token TEXT NOT NULL,
            burn_reason TEXT NOT NULL,
            burn_date TIMESTAMPTZ NOT NULL,
            client_id BIGINT NOT NULL REFERENCES clients (id)
        );
        CREATE INDEX IF NOT EXISTS idx_burned_tokens_burn_date ON burned_tokens (burn_date DESC);",
    ),
    (
        3,
        "create_operations_log",
        "CREATE TABLE IF NOT EXISTS operations_log (
            id BIGSERIAL PRIMARY KEY,
            timestamp TIMESTAMPTZ NOT NULL,
            operation_type TEXT NOT NULL,
            token TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
            client_id BIGINT
        );
        CREATE INDEX IF NOT EXISTS idx_operations_log_timestamp ON operations_log (timestamp DESC);",
    ),
];

pub async fn run(pool: &DbPool) -> anyhow::Result<()> {
    let mut client = pool.get().await?;

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

    let applied: Vec<i32> = client
        .query("SELECT version FROM schema_migrations", &[])
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();

    for (version, name, sql) in MIGRATIONS {
        if applied.contains(version) {
            continue;
        }
        tracing::info!("Applying migration V{}__{}", version, name);

        let txn = client.transaction().await?;
        txn.batch_execute(sql).await?;
        txn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
            &[version, name],
        )
        .await?;
        txn.commit().await?;
    }

    tracing::info!("Database schema up to date ({} migrations)", MIGRATIONS.len());
    Ok(())
}
