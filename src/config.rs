use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Server settings read from the environment (and `.env` when present)
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    /// Account created on first start when the database has no users
    pub owner: Option<OwnerAccount>,
}

#[derive(Debug, Clone)]
pub struct OwnerAccount {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = try_load("PORT", "8069")?;
        let database_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "rapport.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            "default_jwt_secret_change_me".to_string()
        });

        let owner = match (env::var("OWNER_USERNAME"), env::var("OWNER_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(OwnerAccount { username, password })
            }
            _ => None,
        };

        Ok(Self {
            port,
            database_path,
            jwt_secret,
            owner,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        log::info!("{} not set, using default: {}", key, default);
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
