use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::models::{AccessLevel, ShareGrant};
use crate::error::{AppError, AppResult};

// ============================================================================
// Trip Share Repository
// ============================================================================

pub struct TripShareRepository;

impl TripShareRepository {
    /// Insert a grant unless one already exists for (trip, account).
    ///
    /// Returns `true` when a row was written. Concurrent calls for the same
    /// pair resolve to a single row through the composite primary key.
    pub async fn insert_if_absent(
        pool: &SqlitePool,
        trip_id: &str,
        account_id: &str,
        access_level: AccessLevel,
    ) -> AppResult<bool> {
        let now = chrono::Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO trip_shares (trip_id, account_id, access_level, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (trip_id, account_id) DO NOTHING
            "#,
        )
        .bind(trip_id)
        .bind(account_id)
        .bind(access_level.as_str())
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Find the grant for a single (trip, account) pair.
    pub async fn find(
        pool: &SqlitePool,
        trip_id: &str,
        account_id: &str,
    ) -> AppResult<Option<ShareGrant>> {
        let row = sqlx::query(
            r#"
            SELECT trip_id, account_id, access_level, created_at
            FROM trip_shares
            WHERE trip_id = ? AND account_id = ?
            "#,
        )
        .bind(trip_id)
        .bind(account_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| grant_from_row(&r)).transpose()
    }

    /// All grants for a trip, oldest first.
    pub async fn list_for_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<ShareGrant>> {
        let rows = sqlx::query(
            r#"
            SELECT trip_id, account_id, access_level, created_at
            FROM trip_shares
            WHERE trip_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(grant_from_row).collect()
    }
}

fn grant_from_row(r: &SqliteRow) -> AppResult<ShareGrant> {
    let level: String = r.get("access_level");
    let access_level = AccessLevel::try_from(level.as_str())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(ShareGrant {
        trip_id: r.get("trip_id"),
        account_id: r.get("account_id"),
        access_level,
        created_at: r.get("created_at"),
    })
}
