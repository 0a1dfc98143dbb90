use sqlx::SqlitePool;

use crate::db::{Account, AccountRepository};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_CHARS: usize = 8;
/// bcrypt ignores everything past 72 bytes; longer passwords are refused
/// instead of being silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Registers accounts and checks email/password pairs.
pub struct CredentialService {
    cost: u32,
    /// Verified against when no account matches, so unknown emails cost the
    /// same bcrypt work as known ones.
    dummy_hash: String,
}

impl CredentialService {
    pub fn new(cost: u32) -> AppResult<Self> {
        let dummy_hash = bcrypt::hash("dummy-password-for-timing", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    /// Trim and lowercase an email address.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn validate_email(email: &str) -> AppResult<()> {
        let invalid = || AppError::Validation("Invalid email address".to_string());

        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.contains('@')
            || email.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return Err(invalid());
        }

        Ok(())
    }

    pub fn validate_password(password: &str) -> AppResult<()> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_CHARS
            )));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {} bytes long",
                MAX_PASSWORD_BYTES
            )));
        }
        Ok(())
    }

    /// Create an account. Fails with `Conflict` if the email is taken.
    pub async fn register(
        &self,
        pool: &SqlitePool,
        email: &str,
        password: &str,
    ) -> AppResult<Account> {
        let email = Self::normalize_email(email);
        Self::validate_email(&email)?;
        Self::validate_password(password)?;

        if AccountRepository::find_by_email(pool, &email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let account = AccountRepository::create(pool, &email, &password_hash).await?;

        tracing::info!("Registered account {}", account.id);
        Ok(account)
    }

    /// Check an email/password pair. Unknown email and wrong password both
    /// fail with `Unauthorized`.
    pub async fn verify(
        &self,
        pool: &SqlitePool,
        email: &str,
        password: &str,
    ) -> AppResult<Account> {
        let email = Self::normalize_email(email);
        // Never stored, so never a match; bcrypt would only see the first 72 bytes.
        let too_long = password.len() > MAX_PASSWORD_BYTES;

        match AccountRepository::find_by_email(pool, &email).await? {
            Some(account) => {
                let matches = check_password(password, &account.password_hash).await?;
                if matches && !too_long {
                    Ok(account)
                } else {
                    tracing::debug!("Password mismatch for account {}", account.id);
                    Err(AppError::Unauthorized)
                }
            }
            None => {
                let _ = check_password(password, &self.dummy_hash).await?;
                tracing::debug!("Login attempt for unknown email");
                Err(AppError::Unauthorized)
            }
        }
    }

    async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing task failed: {}", e)))?
            .map_err(AppError::PasswordHash)
    }
}

/// bcrypt comparison runs on the blocking pool; the digest comparison inside
/// `bcrypt::verify` is constant-time.
async fn check_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task failed: {}", e)))?
        .map_err(AppError::PasswordHash)
}
