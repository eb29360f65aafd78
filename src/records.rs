//! Persistent tier of the component id store, the `component_ids` table

use crate::{component_id::Lifespan, error::StoreError, serializer::FormatError};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// One row of the `component_ids` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    pub token: Uuid,
    /// Payload in the text encoding of [`crate::serializer`]
    pub payload: String,
    pub last_used_at: DateTime<Utc>,
    pub lifespan: Lifespan,
}

impl ComponentRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let token: String = row.try_get("token")?;
        let last_used: i64 = row.try_get("last_used")?;
        let lifespan: String = row.try_get("lifespan")?;

        let token = Uuid::parse_str(&token)
            .map_err(|e| FormatError::new(format!("stored token `{}` is invalid: {}", token, e)))?;
        let last_used_at = Utc
            .timestamp_millis_opt(last_used)
            .single()
            .ok_or_else(|| FormatError::new(format!("stored timestamp {} is invalid", last_used)))?;

        Ok(Self {
            token,
            payload: row.try_get("payload")?,
            last_used_at,
            lifespan: lifespan.parse()?,
        })
    }
}

/// A row removed by [`ComponentRecords::delete_stale`], exactly as it was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedRecord {
    pub token: String,
    pub payload: String,
}

/// All operations are single statements, so they are atomic and safe to call concurrently.
#[derive(Clone)]
pub struct ComponentRecords {
    pool: SqlitePool,
}

impl ComponentRecords {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns false without touching the existing row if `token` is already taken
    pub async fn insert_if_absent(
        &self,
        token: Uuid,
        payload: &str,
        lifespan: Lifespan,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            "INSERT INTO component_ids (token, payload, last_used, lifespan) VALUES (?, ?, ?, ?)
            ON CONFLICT (token) DO NOTHING",
        )
        .bind(token.to_string())
        .bind(payload)
        .bind(now.timestamp_millis())
        .bind(lifespan.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    pub async fn lookup(&self, token: Uuid) -> Result<Option<ComponentRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT token, payload, last_used, lifespan FROM component_ids WHERE token = ?",
        )
        .bind(token.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(ComponentRecord::from_row).transpose()
    }

    /// Refreshes `last_used`. The timestamp never moves backwards, and a record that has been
    /// evicted in the meantime is simply not found. Returns whether a row was updated.
    pub async fn touch(&self, token: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let rows_affected =
            sqlx::query("UPDATE component_ids SET last_used = MAX(last_used, ?) WHERE token = ?")
                .bind(now.timestamp_millis())
                .bind(token.to_string())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Removes every non-permanent record last used before `cutoff` and returns what was
    /// removed. The rows are already gone when this returns, so they are handed back undecoded;
    /// a row whose columns can't even be read as text is logged and left out.
    pub async fn delete_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DeletedRecord>, StoreError> {
        let rows = sqlx::query(
            "DELETE FROM component_ids WHERE lifespan != ? AND last_used < ?
            RETURNING token, payload",
        )
        .bind(Lifespan::Permanent.as_str())
        .bind(cutoff.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut deleted = Vec::with_capacity(rows.len());
        for row in &rows {
            let token = row.try_get::<String, _>("token");
            let payload = row.try_get::<String, _>("payload");
            match (token, payload) {
                (Ok(token), Ok(payload)) => deleted.push(DeletedRecord { token, payload }),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Deleted an unreadable component id row: {}", e)
                }
            }
        }
        Ok(deleted)
    }

    /// Writes a row as is, bypassing every check
    #[cfg(test)]
    pub(crate) async fn insert_raw(
        &self,
        token: &str,
        payload: &str,
        last_used: i64,
        lifespan: &str,
    ) {
        sqlx::query(
            "INSERT INTO component_ids (token, payload, last_used, lifespan) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(payload)
        .bind(last_used)
        .bind(lifespan)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}
