use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::env;

use crate::utils::cookies::SameSite;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_pool_size: u32,
    pub database_connect_timeout: u64,
    pub redis_url: String,
    pub redis_pool_size: u32,
    pub redis_connect_timeout: u64,
    pub signing_secret: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_cookie_ttl_days: u64,
    pub webhook_url: Option<String>,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub port: u16,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow!("DATABASE_URL environment variable is required"))?;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| anyhow!("REDIS_URL environment variable is required"))?;

        // The credential codec cannot run without this; fail at startup rather
        // than on the first issuance.
        let signing_secret = env::var("SIGNING_SECRET")
            .map_err(|_| anyhow!("SIGNING_SECRET environment variable is required"))?;
        if signing_secret.is_empty() {
            return Err(anyhow!("SIGNING_SECRET must not be empty"));
        }

        let database_pool_size = env_parse("DATABASE_POOL_SIZE", 10);
        let database_connect_timeout = env_parse("DATABASE_CONNECT_TIMEOUT_SECS", 3);
        let redis_pool_size = env_parse("REDIS_POOL_SIZE", 8);
        let redis_connect_timeout = env_parse("REDIS_CONNECT_TIMEOUT_SECS", 5);
        let access_token_ttl_minutes = env_parse("ACCESS_TOKEN_TTL_MINUTES", 30);
        let refresh_cookie_ttl_days = env_parse("REFRESH_COOKIE_TTL_DAYS", 7);
        let port = env_parse("PORT", 3000);

        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|url| !url.is_empty());

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| v != "false")
            .unwrap_or(true);

        let cookie_same_site = match env::var("COOKIE_SAME_SITE").as_deref() {
            Ok("lax") => SameSite::Lax,
            Ok("none") => SameSite::None,
            _ => SameSite::Strict,
        };

        Ok(Config {
            database_url,
            database_pool_size,
            database_connect_timeout,
            redis_url,
            redis_pool_size,
            redis_connect_timeout,
            signing_secret,
            access_token_ttl_minutes,
            refresh_cookie_ttl_days,
            webhook_url,
            cookie_secure,
            cookie_same_site,
            port,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
