//! SQLite connection pool and schema.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::StorageConfig;
use crate::storage::StorageError;

const MEMORY_PATH: &str = ":memory:";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SqliteStorage owns the connection pool. Data access goes through the
/// free functions of the `storage` module on a connection or transaction
/// obtained from here.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

/// SqliteStorageConfig holds SQLite storage configuration.
#[derive(Debug, Clone)]
pub struct SqliteStorageConfig {
    /// Path to the SQLite database file, or ":memory:".
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            path: "storefront.db".to_string(),
            max_connections: 5,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl From<&StorageConfig> for SqliteStorageConfig {
    fn from(cfg: &StorageConfig) -> Self {
        let defaults = Self::default();
        Self {
            path: cfg.path.clone(),
            max_connections: cfg.max_connections.unwrap_or(defaults.max_connections),
            busy_timeout: if cfg.busy_timeout.is_zero() {
                defaults.busy_timeout
            } else {
                cfg.busy_timeout
            },
        }
    }
}

impl SqliteStorage {
    /// Opens (creating if missing) the database and applies the schema.
    pub async fn new(config: SqliteStorageConfig) -> Result<Self, StorageError> {
        let in_memory = config.path == MEMORY_PATH;

        let mut options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let mut pool_options = SqlitePoolOptions::new();

        if in_memory {
            // Each connection to ":memory:" is a separate database, so keep exactly one alive.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(config.max_connections);
        }

        let pool = pool_options.connect_with(options).await?;

        let storage = Self { pool };

        storage.migrate().await?;

        info!(path = %config.path, "SQLite storage initialized");
        Ok(storage)
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::new(SqliteStorageConfig {
            path: MEMORY_PATH.to_string(),
            ..SqliteStorageConfig::default()
        })
        .await
    }

    /// Starts a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        Ok(self.pool.begin().await?)
    }

    /// Checks out a connection for standalone reads and writes.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        Ok(self.pool.acquire().await?)
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs database migrations to create the schema.
    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        price TEXT NOT NULL,
        stock INTEGER NOT NULL CHECK (stock >= 0),
        sales INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS addresses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        receiver TEXT NOT NULL,
        phone TEXT NOT NULL,
        detail TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_addresses_user ON addresses(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        selected INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, product_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        order_number TEXT NOT NULL UNIQUE,
        total_amount TEXT NOT NULL,
        status TEXT NOT NULL,
        payment_status TEXT NOT NULL,
        address_id INTEGER NOT NULL REFERENCES addresses(id),
        payment_time TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id INTEGER NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        price TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
    r#"
    CREATE TABLE IF NOT EXISTS logistics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL UNIQUE REFERENCES orders(id) ON DELETE CASCADE,
        tracking_no TEXT NOT NULL DEFAULT '',
        carrier TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        shipping_fee TEXT NOT NULL,
        shipped_at TEXT,
        delivered_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS logistics_traces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        logistics_id INTEGER NOT NULL REFERENCES logistics(id) ON DELETE CASCADE,
        location TEXT NOT NULL,
        status TEXT NOT NULL,
        description TEXT NOT NULL,
        trace_time TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_traces_logistics ON logistics_traces(logistics_id, trace_time)",
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id),
        method TEXT NOT NULL,
        amount TEXT NOT NULL,
        trade_no TEXT,
        status TEXT NOT NULL,
        pay_time TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payments_order ON payments(order_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_trade_no ON payments(trade_no) WHERE trade_no IS NOT NULL",
    r#"
    CREATE TABLE IF NOT EXISTS payment_callbacks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        payment_id INTEGER NOT NULL REFERENCES payments(id) ON DELETE CASCADE,
        trade_no TEXT NOT NULL,
        status TEXT NOT NULL,
        raw_data TEXT NOT NULL,
        received_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_callbacks_payment ON payment_callbacks(payment_id)",
];
