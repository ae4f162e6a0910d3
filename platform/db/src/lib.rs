//! Database primitives shared by the server binary and tests.

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Deserialize;
use thiserror::Error;

/// Shared connection handle alias. sea-orm pools internally.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error(transparent)]
    Connect(#[from] sea_orm::DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }
}

/// Open a connection pool from the given settings.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    let mut options = ConnectOptions::new(url);
    options.max_connections(settings.max_connections);
    Ok(Database::connect(options).await?)
}
