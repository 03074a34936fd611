/// Configuration management for the API server
///
/// # Environment Variables
///
/// | Variable | Default |
/// |---|---|
/// | `API_HOST` | `0.0.0.0` |
/// | `API_PORT` | `8080` |
/// | `CORS_ORIGINS` | `*` (comma-separated list otherwise) |
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `JWT_SECRET` | required, at least 32 characters |
/// | `REDIS_URL` | unset disables rate limiting |
/// | `RATE_LIMIT_PER_MINUTE` | `60` |
///
/// # Example
///
/// ```no_run
/// use habitrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Listening on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret. Generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// `None` disables rate limiting
    pub redis_url: Option<String>,

    /// Sustained requests per minute per user; also the burst size
    pub per_minute: u32,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("API_PORT") {
            Some(value) => value.parse::<u16>().context("API_PORT must be a port number")?,
            None => 8080,
        };

        let cors_origins = parse_origins(var("CORS_ORIGINS").as_deref().unwrap_or("*"));

        let database_url = var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;
        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            None => 10,
        };
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let secret = var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        let per_minute = match var("RATE_LIMIT_PER_MINUTE") {
            Some(value) => value
                .parse::<u32>()
                .context("RATE_LIMIT_PER_MINUTE must be a positive integer")?,
            None => 60,
        };
        if per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_PER_MINUTE must be at least 1");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret },
            rate_limit: RateLimitConfig {
                redis_url: var("REDIS_URL"),
                per_minute,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// `*` means any origin and yields an empty list
fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return Vec::new();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
