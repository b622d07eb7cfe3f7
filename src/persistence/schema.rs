use anyhow::Result;
use sqlx::PgPool;

/// Create the account and ledger tables if they do not exist
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL schema...");

    sqlx::query(CREATE_ACCOUNTS_TABLE)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create accounts table", e))?;

    sqlx::query(CREATE_TRANSFERS_TABLE)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create transfers table", e))?;

    for ddl in CREATE_TRANSFERS_INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create transfers index", e))?;
    }

    tracing::info!("PostgreSQL schema initialized successfully");
    Ok(())
}

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts_tb (
    owner       TEXT PRIMARY KEY,
    balance     BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

// Append-only: the transfer path never updates or deletes rows here
const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers_tb (
    id           BIGSERIAL PRIMARY KEY,
    transfer_id  TEXT NOT NULL UNIQUE,
    from_owner   TEXT NOT NULL,
    to_owner     TEXT NOT NULL,
    amount       BIGINT NOT NULL CHECK (amount > 0),
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TRANSFERS_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers_tb (from_owner)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers_tb (to_owner)",
];
