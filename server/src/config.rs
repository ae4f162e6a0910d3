use anyhow::{Context, Result, anyhow};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};

#[derive(Clone)]
pub struct AppConfig {
    pub cookie_key: Key,
    pub cors_allowed_origins: Vec<String>,
    pub session_ttl_days: i64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cookie_secret =
            std::env::var("COOKIE_SECRET_BASE64").context("COOKIE_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(cookie_secret.trim())
            .context("invalid COOKIE_SECRET_BASE64")?;
        if secret_bytes.len() < 32 {
            return Err(anyhow!(
                "COOKIE_SECRET_BASE64 must decode to at least 32 bytes"
            ));
        }
        let cookie_key = Key::derive_from(&secret_bytes);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let session_ttl_days = std::env::var("SESSION_TTL_DAYS")
            .ok()
            .map(|raw| raw.parse::<i64>().context("invalid SESSION_TTL_DAYS"))
            .transpose()?
            .unwrap_or(30);

        Ok(Self {
            cookie_key,
            cors_allowed_origins,
            session_ttl_days,
        })
    }
}
