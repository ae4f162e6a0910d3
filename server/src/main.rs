use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use entity::{dispositions, users, waste_types};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, QueryFilter,
    sea_query::OnConflict,
};
use tracing::info;
use uuid::Uuid;

use server::{
    auth,
    config::AppConfig,
    http::{self, AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "wastetrack-server", version, about = "Wastetrack waste-disposal tracking server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Seed the bootstrap admin account and default reference data.
    Seed,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed => run_seed().await,
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = Arc::new(AppConfig::load()?);
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let cookie_key = config.cookie_key.clone();
    let state = AppState {
        pool,
        config,
        cookie_key,
    };
    http::serve((&cmd).into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

const DEFAULT_WASTE_TYPES: &[&str] = &["General", "Hazardous", "Recyclable", "Organic"];
const DEFAULT_DISPOSITIONS: &[&str] = &["Landfill", "Incineration", "Recycling", "Composting"];

async fn run_seed() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;

    let email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let password = std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD missing")?;

    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email.clone()))
        .one(&pool)
        .await?;
    if existing.is_none() {
        let now = Utc::now();
        users::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Administrator".to_string()),
            email: Set(email.clone()),
            password_hash: Set(auth::hash_password(&password)?),
            role: Set(users::Role::Admin),
            permission_level: Set(users::PermissionLevel::Edit),
            status: Set(users::AccountStatus::Active),
            department: Set(None),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&pool)
        .await?;
        info!(%email, "seeded admin account");
    } else {
        info!(%email, "admin account already present");
    }

    for name in DEFAULT_WASTE_TYPES {
        let insert = waste_types::Entity::insert(waste_types::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set((*name).to_string()),
            svg: Set(None),
        })
        .on_conflict(
            OnConflict::column(waste_types::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec(&pool)
        .await;
        ignore_conflict(insert)?;
    }
    for name in DEFAULT_DISPOSITIONS {
        let insert = dispositions::Entity::insert(dispositions::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set((*name).to_string()),
            svg: Set(None),
        })
        .on_conflict(
            OnConflict::column(dispositions::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec(&pool)
        .await;
        ignore_conflict(insert)?;
    }

    info!("reference data seeded");
    Ok(())
}

fn ignore_conflict<T>(result: Result<T, DbErr>) -> Result<()> {
    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
