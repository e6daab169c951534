//! Service configuration loaded from the environment

use anyhow::{anyhow, bail, Context, Result};
use jsonwebtoken::Algorithm;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    /// HMAC signing key, at least 32 bytes
    pub secret_key: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub email_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub cache_ttl: Duration,
    pub cache_timeout: Duration,
    pub store_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub avatar_dir: PathBuf,
    pub avatar_base_url: String,
    /// Externally visible URL used in confirmation links. Falls back to
    /// the request's `Host` header when unset.
    pub public_base_url: Option<String>,
    pub mail_max_attempts: u32,
    pub mail_queue_capacity: usize,
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e).context("Failed to read .env file");
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{} must be set", key));

        let secret_key = required("SECRET_KEY")?;
        if secret_key.len() < MIN_SECRET_LEN {
            bail!("SECRET_KEY must be at least {} bytes long", MIN_SECRET_LEN);
        }

        let jwt_algorithm = match var("JWT_ALGORITHM").as_deref() {
            None => Algorithm::HS256,
            Some(name) => parse_algorithm(name)?,
        };

        let bcrypt_cost: u32 = parse_or(&var, "BCRYPT_COST", 12)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {}", bcrypt_cost);
        }

        let public_base_url = var("PUBLIC_BASE_URL").filter(|url| !url.trim().is_empty());
        if let Some(url) = &public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("PUBLIC_BASE_URL must be an http(s) URL, got {}", url);
            }
        }

        Ok(Self {
            mongo_uri: required("MONGO_DB_URI")?,
            mongo_db_name: var("MONGO_DB_NAME").unwrap_or_else(|| "contacts".to_string()),
            secret_key,
            jwt_algorithm,
            access_token_ttl: chrono::Duration::minutes(parse_or(
                &var,
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                15,
            )?),
            refresh_token_ttl: chrono::Duration::days(parse_or(
                &var,
                "REFRESH_TOKEN_EXPIRE_DAYS",
                7,
            )?),
            email_token_ttl: chrono::Duration::days(parse_or(&var, "EMAIL_TOKEN_EXPIRE_DAYS", 7)?),
            bcrypt_cost,
            cache_ttl: Duration::from_secs(parse_or(&var, "CACHE_TTL_SECONDS", 900)?),
            cache_timeout: Duration::from_millis(parse_or(&var, "CACHE_TIMEOUT_MS", 200)?),
            store_timeout: Duration::from_millis(parse_or(&var, "STORE_TIMEOUT_MS", 3000)?),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 8000)?,
            avatar_dir: PathBuf::from(var("AVATAR_DIR").unwrap_or_else(|| "./avatars".to_string())),
            avatar_base_url: var("AVATAR_BASE_URL").unwrap_or_else(|| "/avatars".to_string()),
            public_base_url,
            mail_max_attempts: parse_or(&var, "MAIL_MAX_ATTEMPTS", 3)?,
            mail_queue_capacity: parse_or(&var, "MAIL_QUEUE_CAPACITY", 1024)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("Unsupported JWT_ALGORITHM {}, expected HS256, HS384 or HS512", other),
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value {:?} for {}: {}", raw, key, e)),
    }
}
