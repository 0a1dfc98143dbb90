use std::env;
use std::str::FromStr;

use serde::Deserialize;

/// Upper bound on `JWT_EXPIRATION_MINUTES` (one year).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS. `*` allows any origin (without credentials).
    /// Read from env var `CORS_ALLOWED_ORIGIN`.
    pub cors_allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of issued access tokens.
    pub expiration_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// bcrypt work factor (4..=31).
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds after which one request of the per-IP auth quota is replenished
    pub auth_replenish_seconds: u64,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    /// Read from env var `LOG_FORMAT` (`json` or `text`).
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PORT", 8080)?,
                cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                    .unwrap_or_else(|_| "*".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/travel.db".to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_minutes: env_or("JWT_EXPIRATION_MINUTES", 60)?,
            },
            password: PasswordConfig {
                bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            rate_limit: RateLimitConfig {
                auth_replenish_seconds: env_or("RATE_LIMIT_AUTH_REPLENISH_SECONDS", 3)?,
                auth_burst: env_or("RATE_LIMIT_AUTH_BURST", 10)?,
            },
            logging: LoggingConfig {
                json: matches!(
                    env::var("LOG_FORMAT").map(|v| v.to_lowercase()).as_deref(),
                    Ok("json")
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue("JWT_SECRET".to_string()));
        }
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.jwt.expiration_minutes) {
            return Err(ConfigError::InvalidValue(
                "JWT_EXPIRATION_MINUTES".to_string(),
            ));
        }
        if !(4..=31).contains(&self.password.bcrypt_cost) {
            return Err(ConfigError::InvalidValue("BCRYPT_COST".to_string()));
        }
        if self.rate_limit.auth_replenish_seconds == 0 || self.rate_limit.auth_burst == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_AUTH_REPLENISH_SECONDS / RATE_LIMIT_AUTH_BURST".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
/// A value that is present but does not parse is an error.
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_allowed_origin: "*".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/travel.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_minutes: 60,
            },
            password: PasswordConfig {
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            rate_limit: RateLimitConfig {
                auth_replenish_seconds: 3,
                auth_burst: 10,
            },
            logging: LoggingConfig { json: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_uses_default_when_unset() {
        let v: u32 = env_or("TRAVEL_PLANNER_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        env::set_var("TRAVEL_PLANNER_TEST_BAD_PORT", "eighty");
        let err = env_or::<u16>("TRAVEL_PLANNER_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(k) if k == "TRAVEL_PLANNER_TEST_BAD_PORT"));
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(k)) if k == "JWT_SECRET"
        ));
    }

    #[test]
    fn validate_bounds_token_lifetime() {
        let mut config = Config::default();
        config.jwt.secret = "not-a-real-secret".to_string();

        for minutes in [0, -5, MAX_TOKEN_TTL_MINUTES + 1, i64::MAX] {
            config.jwt.expiration_minutes = minutes;
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::InvalidValue(ref k)) if k == "JWT_EXPIRATION_MINUTES"
                ),
                "{} minutes was accepted",
                minutes
            );
        }

        config.jwt.expiration_minutes = MAX_TOKEN_TTL_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_accepts_sane_config() {
        let mut config = Config::default();
        config.jwt.secret = "not-a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }
}
