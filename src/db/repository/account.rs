use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::Account;
use crate::error::{AppError, AppResult};

// ============================================================================
// Account Repository
// ============================================================================

pub struct AccountRepository;

impl AccountRepository {
    /// Insert a new account. `email` must already be normalized.
    ///
    /// The unique index on `email` turns a concurrent duplicate registration
    /// into `AppError::Conflict`.
    pub async fn create(
        pool: &SqlitePool,
        email: &str,
        password_hash: &str,
    ) -> AppResult<Account> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => AppError::Database(other),
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Account>> {
        sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Look up an account by normalized email.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<Account>> {
        sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
