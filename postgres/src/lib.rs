//! `PostgreSQL` store for the blood-bank lifecycle.
//!
//! [`PostgresStore`] implements [`BloodBankStore`] on a `sqlx` connection pool.
//! Each [`PostgresUnitOfWork`] wraps one database transaction, so a service
//! call either commits every row it touched or none of them.
//!
//! # Example
//!
//! ```ignore
//! use bloodbank_postgres::{PostgresConfig, PostgresStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect(&PostgresConfig::from_env()?).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

mod rows;
mod unit;

pub use unit::PostgresUnitOfWork;

use bloodbank_core::{
    BloodBank, BloodBankError, BloodBankStore, Facility, InventoryUnit, Result, UnitOfWork, User,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::time::Duration;

/// Default pool size when `BLOODBANK_DB_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl PostgresConfig {
    /// Settings for `url` with the default pool size.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: 30,
        }
    }

    /// Load `DATABASE_URL` and the `BLOODBANK_DB_*` pool settings, reading a
    /// `.env` file first if one exists.
    ///
    /// Unset or unparseable pool settings fall back to [`PostgresConfig::new`].
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let url = env::var("DATABASE_URL")
            .map_err(|_| BloodBankError::Storage("DATABASE_URL is not set".to_string()))?;
        let defaults = Self::new(url);
        Ok(Self {
            max_connections: env::var("BLOODBANK_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            min_connections: env::var("BLOODBANK_DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_connections),
            connect_timeout: env::var("BLOODBANK_DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connect_timeout),
            ..defaults
        })
    }
}

/// `PostgreSQL`-backed [`BloodBankStore`].
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if the database is unreachable.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| BloodBankError::Storage(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BloodBankError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Directory and stock provisioning
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a facility.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if the insert fails.
    pub async fn register_facility(&self, facility: &Facility) -> Result<()> {
        sqlx::query("INSERT INTO facilities (id, facility_name) VALUES ($1, $2)")
            .bind(*facility.id.as_uuid())
            .bind(&facility.facility_name)
            .execute(&self.pool)
            .await
            .map_err(|e| BloodBankError::Storage(format!("Failed to register facility: {e}")))?;
        Ok(())
    }

    /// Register a blood bank.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if the insert fails.
    pub async fn register_blood_bank(&self, bank: &BloodBank) -> Result<()> {
        sqlx::query(
            "INSERT INTO blood_banks (id, facility_id, blood_bank_name) VALUES ($1, $2, $3)",
        )
        .bind(*bank.id.as_uuid())
        .bind(*bank.facility_id.as_uuid())
        .bind(&bank.blood_bank_name)
        .execute(&self.pool)
        .await
        .map_err(|e| BloodBankError::Storage(format!("Failed to register blood bank: {e}")))?;
        Ok(())
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if the insert fails.
    pub async fn register_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, facility_id, name) VALUES ($1, $2, $3)")
            .bind(*user.id.as_uuid())
            .bind(user.facility_id.map(|id| *id.as_uuid()))
            .bind(&user.name)
            .execute(&self.pool)
            .await
            .map_err(|e| BloodBankError::Storage(format!("Failed to register user: {e}")))?;
        Ok(())
    }

    /// Stock a blood bank with a new unit.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Storage`] if the insert fails.
    pub async fn stock(&self, unit: &InventoryUnit) -> Result<()> {
        let mut tx = self.begin().await?;
        tx.insert_inventory_unit(unit).await?;
        tx.commit().await
    }
}

impl BloodBankStore for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BloodBankError::Storage(format!("Failed to start transaction: {e}")))?;
        Ok(PostgresUnitOfWork::new(tx))
    }
}
