//! Registered users and their home coordinates, stored in SQLite.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions, sqlite::SqliteRow};
use tracing::{info, warn};

use crate::models::{Coordinate, UserRecord, ValidatedUser};
use crate::{CloudburstError, Result};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Store a new user; fails with `DuplicateEmail` if the email is taken
    async fn create(&self, user: ValidatedUser) -> Result<UserRecord>;
    async fn list_all(&self) -> Result<Vec<UserRecord>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
}

fn storage_error(e: sqlx::Error) -> CloudburstError {
    CloudburstError::storage(e.to_string())
}

/// SQLite-backed directory.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(db_path: &str, max_connections: u32) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CloudburstError::storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let db_url = format!("sqlite:{db_path}?mode=rwc");
        info!("Connecting to user database: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .map_err(storage_error)?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        // every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_error)?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    async fn run_migrations(&self) -> Result<()> {
        let migration_sql = include_str!("../migrations/001_init.sql");

        for statement in migration_sql.split(';') {
            let statement: String = statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }

            if let Err(e) = sqlx::query(statement).execute(&self.pool).await {
                if e.to_string().contains("already exists") {
                    continue;
                }
                warn!("Migration statement failed: {}", e);
                return Err(storage_error(e));
            }
        }
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    let created_at: String = row.try_get("created_at").map_err(storage_error)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| CloudburstError::storage(format!("Invalid created_at '{created_at}': {e}")))?
        .with_timezone(&Utc);

    Ok(UserRecord {
        username: row.try_get("username").map_err(storage_error)?,
        email: row.try_get("email").map_err(storage_error)?,
        city: row.try_get("city").map_err(storage_error)?,
        address: row.try_get("address").map_err(storage_error)?,
        home_coordinate: Coordinate {
            latitude: row.try_get("latitude").map_err(storage_error)?,
            longitude: row.try_get("longitude").map_err(storage_error)?,
        },
        created_at,
    })
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create(&self, user: ValidatedUser) -> Result<UserRecord> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, city, address, latitude, longitude, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.city)
        .bind(&user.address)
        .bind(user.home_coordinate.latitude)
        .bind(user.home_coordinate.longitude)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Registered user {} in {}", user.username, user.city);
                Ok(UserRecord {
                    username: user.username,
                    email: user.email,
                    city: user.city,
                    address: user.address,
                    home_coordinate: user.home_coordinate,
                    created_at,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CloudburstError::duplicate_email(user.email))
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(
            "SELECT username, email, city, address, latitude, longitude, created_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT username, email, city, address, latitude, longitude, created_at FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(user_from_row).transpose()
    }
}
