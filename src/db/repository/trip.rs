use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{NewTrip, Trip};
use crate::error::{AppError, AppResult};

// ============================================================================
// Trip Repository
// ============================================================================

pub struct TripRepository;

impl TripRepository {
    pub async fn create<'e, E>(executor: E, owner_account_id: &str, new: &NewTrip) -> AppResult<Trip>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trips (id, owner_account_id, name, start_date, end_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, owner_account_id, name, start_date, end_date, created_at
            "#,
        )
        .bind(&id)
        .bind(owner_account_id)
        .bind(&new.name)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Trip>> {
        sqlx::query_as::<_, Trip>(
            r#"
            SELECT id, owner_account_id, name, start_date, end_date, created_at
            FROM trips
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Trips owned by the account, oldest first.
    pub async fn list_owned(pool: &SqlitePool, account_id: &str) -> AppResult<Vec<Trip>> {
        sqlx::query_as::<_, Trip>(
            r#"
            SELECT id, owner_account_id, name, start_date, end_date, created_at
            FROM trips
            WHERE owner_account_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Trips shared with the account through a grant, oldest grant first.
    pub async fn list_shared_with(pool: &SqlitePool, account_id: &str) -> AppResult<Vec<Trip>> {
        sqlx::query_as::<_, Trip>(
            r#"
            SELECT t.id, t.owner_account_id, t.name, t.start_date, t.end_date, t.created_at
            FROM trips t
            JOIN trip_shares s ON s.trip_id = t.id
            WHERE s.account_id = ?
            ORDER BY s.created_at, t.rowid
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
