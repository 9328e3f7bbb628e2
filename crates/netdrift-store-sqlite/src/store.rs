// crates/netdrift-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Storage Backend
// Description: Durable intent, snapshot, event, subscription, and delivery
//              storage over one SQLite database.
// Purpose: Survive restarts without losing intent history or queued deliveries.
// Dependencies: netdrift-core, rusqlite, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! All records persist as JSON blobs alongside the columns needed for
//! querying, so the stored shape is exactly the wire shape. Writes for one
//! `(device, scope)` pair run inside a transaction on a single shared
//! connection, which linearizes them; SQLite's busy timeout covers contention
//! from other processes. Loads that fail to decode report corruption and
//! fail closed.
//! Security posture: database contents are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use netdrift_core::CanonicalTree;
use netdrift_core::ConfigSnapshot;
use netdrift_core::DeliveryQueue;
use netdrift_core::DeliveryStatus;
use netdrift_core::DeviceId;
use netdrift_core::DriftEvent;
use netdrift_core::DriftEventLog;
use netdrift_core::IntentRecord;
use netdrift_core::IntentScope;
use netdrift_core::IntentStore;
use netdrift_core::SnapshotStore;
use netdrift_core::StoreError;
use netdrift_core::SubscriptionRegistry;
use netdrift_core::Timestamp;
use netdrift_core::WebhookDelivery;
use netdrift_core::WebhookSubscription;
use netdrift_core::core::identifiers::DeliveryId;
use netdrift_core::core::identifiers::EventId;
use netdrift_core::core::identifiers::SubscriptionId;
use netdrift_core::hashing::hash_tree;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store failure taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Corrupt(message)
            | SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Invalid(message) => Self::Corrupt(message),
        }
    }
}

/// Maps a `rusqlite` error to the store taxonomy.
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable storage backend over one `SQLite` database.
///
/// # Invariants
/// - `intent_versions`, `drift_events`, and `deliveries` are append-only;
///   only status columns of `deliveries` and the JSON blob they summarize
///   are updated in place.
pub struct SqliteStore {
    /// Shared connection; the mutex linearizes all access.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the database at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema version is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.path.is_dir() {
            return Err(SqliteStoreError::Invalid(
                "store path must be a file, not a directory".to_string(),
            ));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let mut connection =
            Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
        apply_pragmas(&connection, config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquires the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS intents (
                    device_id TEXT NOT NULL,
                    scope_key TEXT NOT NULL,
                    latest_version INTEGER NOT NULL,
                    active INTEGER NOT NULL,
                    PRIMARY KEY (device_id, scope_key)
                );
                CREATE TABLE IF NOT EXISTS intent_versions (
                    device_id TEXT NOT NULL,
                    scope_key TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    record_json BLOB NOT NULL,
                    PRIMARY KEY (device_id, scope_key, version),
                    FOREIGN KEY (device_id, scope_key)
                        REFERENCES intents(device_id, scope_key) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS snapshots (
                    device_id TEXT NOT NULL PRIMARY KEY,
                    snapshot_json BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS drift_events (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id TEXT NOT NULL UNIQUE,
                    device_id TEXT NOT NULL,
                    scope_key TEXT NOT NULL,
                    event_json BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_drift_events_device
                    ON drift_events (device_id, seq);
                CREATE TABLE IF NOT EXISTS subscriptions (
                    subscription_id TEXT NOT NULL PRIMARY KEY,
                    active INTEGER NOT NULL,
                    subscription_json BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS deliveries (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    delivery_id TEXT NOT NULL UNIQUE,
                    subscription_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    next_attempt_at INTEGER NOT NULL,
                    delivery_json BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_deliveries_subscription
                    ON deliveries (subscription_id, seq);",
            )
            .map_err(|err| db_err(&err))?;
            info!(schema_version = SCHEMA_VERSION, "sqlite schema initialized");
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Codec
// ============================================================================

/// Serializes a record as its JSON blob.
fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SqliteStoreError> {
    serde_json::to_vec(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Decodes a stored JSON blob, failing closed on corruption.
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SqliteStoreError> {
    serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Stable status column value matching the record's wire form.
const fn status_column(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Succeeded => "succeeded",
        DeliveryStatus::Failed => "failed",
        DeliveryStatus::DeadLettered => "dead_lettered",
    }
}

// ============================================================================
// SECTION: Intent Store
// ============================================================================

/// Not-found error for a `(device, scope)` pair.
fn intent_not_found(device_id: &DeviceId, scope: &IntentScope) -> StoreError {
    StoreError::IntentNotFound {
        device_id: device_id.to_string(),
        scope: scope.storage_key(),
    }
}

/// Reads the latest stored record for a pair inside a transaction.
fn latest_record(
    tx: &Transaction<'_>,
    device_id: &str,
    scope_key: &str,
) -> Result<Option<(IntentRecord, bool)>, SqliteStoreError> {
    let head: Option<(i64, bool)> = tx
        .query_row(
            "SELECT latest_version, active FROM intents
             WHERE device_id = ?1 AND scope_key = ?2",
            params![device_id, scope_key],
            |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
        )
        .optional()
        .map_err(|err| db_err(&err))?;
    let Some((latest_version, active)) = head else {
        return Ok(None);
    };
    let bytes: Vec<u8> = tx
        .query_row(
            "SELECT record_json FROM intent_versions
             WHERE device_id = ?1 AND scope_key = ?2 AND version = ?3",
            params![device_id, scope_key, latest_version],
            |row| row.get(0),
        )
        .map_err(|err| db_err(&err))?;
    Ok(Some((decode(&bytes)?, active)))
}

impl IntentStore for SqliteStore {
    fn put_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
        raw_content: &serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<IntentRecord, StoreError> {
        let tree = CanonicalTree::canonicalize(raw_content)?;
        let canonical_content = tree.to_canonical_json()?;
        let content_hash = hash_tree(&tree)?;
        let scope_key = scope.storage_key();

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let latest = latest_record(&tx, device_id.as_str(), &scope_key)?;
        let actual = match &latest {
            Some((record, true)) => record.version,
            Some((_, false)) | None => 0,
        };
        if let Some(expected) = expected_version
            && expected != actual
        {
            return Err(StoreError::VersionConflict {
                device_id: device_id.to_string(),
                scope: scope_key,
                expected,
                actual,
            });
        }
        let now = Timestamp::now();
        let version = latest.as_ref().map_or(0, |(record, _)| record.version) + 1;
        let created_at = match &latest {
            Some((record, true)) => record.created_at,
            Some((_, false)) | None => now,
        };
        let record = IntentRecord {
            device_id: device_id.clone(),
            scope: scope.clone(),
            canonical_content,
            content_hash,
            version,
            created_at,
            updated_at: now,
        };
        let version_column =
            i64::try_from(version).map_err(|_| SqliteStoreError::Invalid(
                "intent version exceeds the storable range".to_string(),
            ))?;
        tx.execute(
            "INSERT INTO intents (device_id, scope_key, latest_version, active)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (device_id, scope_key)
             DO UPDATE SET latest_version = ?3, active = 1",
            params![device_id.as_str(), record.scope.storage_key(), version_column],
        )
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.execute(
            "INSERT INTO intent_versions (device_id, scope_key, version, record_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                device_id.as_str(),
                record.scope.storage_key(),
                version_column,
                encode(&record)?
            ],
        )
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(record)
    }

    fn get_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<IntentRecord, StoreError> {
        let scope_key = scope.storage_key();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        match latest_record(&tx, device_id.as_str(), &scope_key)? {
            Some((record, true)) => Ok(record),
            Some((_, false)) | None => Err(intent_not_found(device_id, scope)),
        }
    }

    fn list_intents(&self, device_id: &DeviceId) -> Result<Vec<IntentRecord>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT v.record_json
                 FROM intents i
                 JOIN intent_versions v
                   ON v.device_id = i.device_id
                  AND v.scope_key = i.scope_key
                  AND v.version = i.latest_version
                 WHERE i.device_id = ?1 AND i.active = 1
                 ORDER BY i.scope_key",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![device_id.as_str()], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut records = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            records.push(decode(&bytes)?);
        }
        Ok(records)
    }

    fn delete_intent(&self, device_id: &DeviceId, scope: &IntentScope) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE intents SET active = 0
                 WHERE device_id = ?1 AND scope_key = ?2 AND active = 1",
                params![device_id.as_str(), scope.storage_key()],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        if changed == 0 {
            return Err(intent_not_found(device_id, scope));
        }
        Ok(())
    }

    fn intent_history(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<IntentRecord>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT record_json FROM intent_versions
                 WHERE device_id = ?1 AND scope_key = ?2
                 ORDER BY version",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![device_id.as_str(), scope.storage_key()], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut records = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            records.push(decode(&bytes)?);
        }
        if records.is_empty() {
            return Err(intent_not_found(device_id, scope));
        }
        Ok(records)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute("SELECT 1", params![])
            .map(|_| ())
            .map_err(|err| StoreError::from(db_err(&err)))
    }
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

impl SnapshotStore for SqliteStore {
    fn put_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO snapshots (device_id, snapshot_json) VALUES (?1, ?2)
                 ON CONFLICT (device_id) DO UPDATE SET snapshot_json = ?2",
                params![snapshot.device_id.as_str(), encode(snapshot)?],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    fn get_snapshot(&self, device_id: &DeviceId) -> Result<Option<ConfigSnapshot>, StoreError> {
        let guard = self.lock()?;
        let bytes: Option<Vec<u8>> = guard
            .query_row(
                "SELECT snapshot_json FROM snapshots WHERE device_id = ?1",
                params![device_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        bytes.map(|bytes| decode(&bytes).map_err(StoreError::from)).transpose()
    }
}

// ============================================================================
// SECTION: Drift Event Log
// ============================================================================

impl DriftEventLog for SqliteStore {
    fn append_event(&self, event: &DriftEvent) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO drift_events (event_id, device_id, scope_key, event_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.event_id.to_string(),
                    event.device_id.as_str(),
                    event.scope.storage_key(),
                    encode(event)?
                ],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    fn get_event(&self, event_id: &EventId) -> Result<Option<DriftEvent>, StoreError> {
        let guard = self.lock()?;
        let bytes: Option<Vec<u8>> = guard
            .query_row(
                "SELECT event_json FROM drift_events WHERE event_id = ?1",
                params![event_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        bytes.map(|bytes| decode(&bytes).map_err(StoreError::from)).transpose()
    }

    fn events_for_device(&self, device_id: &DeviceId) -> Result<Vec<DriftEvent>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT event_json FROM drift_events
                 WHERE device_id = ?1 ORDER BY seq DESC",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![device_id.as_str()], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut events = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            events.push(decode(&bytes)?);
        }
        Ok(events)
    }

    fn events_for_scope(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<DriftEvent>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT event_json FROM drift_events
                 WHERE device_id = ?1 AND scope_key = ?2 ORDER BY seq DESC",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![device_id.as_str(), scope.storage_key()], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut events = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            events.push(decode(&bytes)?);
        }
        Ok(events)
    }
}

// ============================================================================
// SECTION: Subscription Registry
// ============================================================================

impl SubscriptionRegistry for SqliteStore {
    fn insert_subscription(&self, subscription: &WebhookSubscription) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO subscriptions (subscription_id, active, subscription_json)
                 VALUES (?1, ?2, ?3)",
                params![
                    subscription.subscription_id.to_string(),
                    i64::from(subscription.active),
                    encode(subscription)?
                ],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, StoreError> {
        let guard = self.lock()?;
        let bytes: Option<Vec<u8>> = guard
            .query_row(
                "SELECT subscription_json FROM subscriptions WHERE subscription_id = ?1",
                params![subscription_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        bytes.map(|bytes| decode(&bytes).map_err(StoreError::from)).transpose()
    }

    fn active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT subscription_json FROM subscriptions
                 WHERE active = 1 ORDER BY subscription_id",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut subscriptions = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            subscriptions.push(decode(&bytes)?);
        }
        Ok(subscriptions)
    }

    fn deactivate_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let bytes: Option<Vec<u8>> = tx
            .query_row(
                "SELECT subscription_json FROM subscriptions WHERE subscription_id = ?1",
                params![subscription_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let Some(bytes) = bytes else {
            return Err(StoreError::SubscriptionNotFound {
                subscription_id: subscription_id.to_string(),
            });
        };
        let mut subscription: WebhookSubscription = decode(&bytes)?;
        subscription.active = false;
        tx.execute(
            "UPDATE subscriptions SET active = 0, subscription_json = ?2
             WHERE subscription_id = ?1",
            params![subscription_id.to_string(), encode(&subscription)?],
        )
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Delivery Queue
// ============================================================================

/// Not-found error for a delivery identifier.
fn delivery_not_found(delivery_id: &DeliveryId) -> StoreError {
    StoreError::DeliveryNotFound {
        delivery_id: delivery_id.to_string(),
    }
}

impl SqliteStore {
    /// Applies a read-modify-write to one delivery row inside a transaction.
    fn update_delivery(
        &self,
        delivery_id: &DeliveryId,
        mutate: impl FnOnce(&mut WebhookDelivery) -> Result<(), StoreError>,
    ) -> Result<WebhookDelivery, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let bytes: Option<Vec<u8>> = tx
            .query_row(
                "SELECT delivery_json FROM deliveries WHERE delivery_id = ?1",
                params![delivery_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let Some(bytes) = bytes else {
            return Err(delivery_not_found(delivery_id));
        };
        let mut delivery: WebhookDelivery = decode(&bytes)?;
        mutate(&mut delivery)?;
        tx.execute(
            "UPDATE deliveries
             SET status = ?2, next_attempt_at = ?3, delivery_json = ?4
             WHERE delivery_id = ?1",
            params![
                delivery_id.to_string(),
                status_column(delivery.status),
                delivery.next_attempt_at.unix_millis(),
                encode(&delivery)?
            ],
        )
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(delivery)
    }
}

impl DeliveryQueue for SqliteStore {
    fn enqueue_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO deliveries
                 (delivery_id, subscription_id, status, next_attempt_at, delivery_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    delivery.delivery_id.to_string(),
                    delivery.subscription_id.to_string(),
                    status_column(delivery.status),
                    delivery.next_attempt_at.unix_millis(),
                    encode(delivery)?
                ],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    fn due_deliveries(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let guard = self.lock()?;
        // Per subscription, only the head of the unsettled queue is a
        // candidate; a not-yet-due head blocks its subscription (FIFO).
        let mut statement = guard
            .prepare(
                "SELECT d.delivery_json FROM deliveries d
                 WHERE d.status IN ('pending', 'failed')
                   AND d.seq = (
                       SELECT MIN(h.seq) FROM deliveries h
                       WHERE h.subscription_id = d.subscription_id
                         AND h.status IN ('pending', 'failed')
                   )
                   AND d.next_attempt_at <= ?1
                 ORDER BY d.seq
                 LIMIT ?2",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(params![now.unix_millis(), limit], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut deliveries = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| StoreError::from(db_err(&err)))?;
            deliveries.push(decode(&bytes)?);
        }
        Ok(deliveries)
    }

    fn get_delivery(
        &self,
        delivery_id: &DeliveryId,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let guard = self.lock()?;
        let bytes: Option<Vec<u8>> = guard
            .query_row(
                "SELECT delivery_json FROM deliveries WHERE delivery_id = ?1",
                params![delivery_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        bytes.map(|bytes| decode(&bytes).map_err(StoreError::from)).transpose()
    }

    fn mark_succeeded(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
    ) -> Result<(), StoreError> {
        self.update_delivery(delivery_id, |delivery| {
            delivery.status = DeliveryStatus::Succeeded;
            delivery.attempt_count = attempt_count;
            delivery.last_error = None;
            Ok(())
        })
        .map(|_| ())
    }

    fn mark_retry(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update_delivery(delivery_id, |delivery| {
            delivery.status = DeliveryStatus::Failed;
            delivery.attempt_count = attempt_count;
            delivery.next_attempt_at = next_attempt_at;
            delivery.last_error = Some(error.to_string());
            Ok(())
        })
        .map(|_| ())
    }

    fn mark_dead_lettered(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update_delivery(delivery_id, |delivery| {
            delivery.status = DeliveryStatus::DeadLettered;
            delivery.attempt_count = attempt_count;
            delivery.last_error = Some(error.to_string());
            Ok(())
        })
        .map(|_| ())
    }

    fn replay_delivery(
        &self,
        delivery_id: &DeliveryId,
        now: Timestamp,
    ) -> Result<WebhookDelivery, StoreError> {
        self.update_delivery(delivery_id, |delivery| {
            if delivery.status != DeliveryStatus::DeadLettered {
                return Err(StoreError::NotReplayable {
                    delivery_id: delivery.delivery_id.to_string(),
                    status: delivery.status,
                });
            }
            delivery.status = DeliveryStatus::Pending;
            delivery.next_attempt_at = now;
            Ok(())
        })
    }
}
