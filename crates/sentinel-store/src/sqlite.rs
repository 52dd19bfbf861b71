//! SQLite-backed stores (the server's default persistence: an embedded,
//! file-based store needs no separately operated database for a
//! single-process deployment).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use sentinel_core::{NotificationRecord, RunLogRecord, Signal, SignalId, UserId};

use crate::error::{Result, StoreError};
use crate::store::{CasResult, NotificationStore, RunLogStore, SignalStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS signals (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    last_triggered_at TEXT,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS signals_user_id_idx ON signals(user_id);
CREATE INDEX IF NOT EXISTS signals_is_active_idx ON signals(is_active);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    signal_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS notifications_signal_id_idx ON notifications(signal_id, created_at);

CREATE TABLE IF NOT EXISTS run_logs (
    id TEXT PRIMARY KEY,
    signal_id TEXT NOT NULL,
    evaluated_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS run_logs_signal_id_idx ON run_logs(signal_id, evaluated_at);
";

fn run_migrations(pool: &Pool<SqliteConnectionManager>) -> Result<()> {
    let conn = pool.get().map_err(|e| StoreError::Connection(e.to_string()))?;
    conn.execute_batch(SCHEMA).map_err(|e| StoreError::Backend(e.to_string()))
}

fn to_backend_error(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn signal_from_row(data: String) -> Result<Signal> {
    serde_json::from_str(&data).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Connection-pooled SQLite store for signals, notifications, and run logs.
/// Each entity's mutable fields live in a JSON column; `id`/`user_id`/
/// `is_active`/`last_triggered_at` are mirrored into real columns so the
/// scheduler's `list_active` scan and the worker's CAS stay index-backed.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if absent) a SQLite database file and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be built, or
    /// [`StoreError::Backend`] if migrations fail.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::new(manager).map_err(|e| StoreError::Connection(e.to_string()))?;
        run_migrations(&pool)?;
        Ok(Self { pool })
    }

    /// An in-memory SQLite database, useful for integration tests that want
    /// real SQL semantics without a file on disk.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::new(manager).map_err(|e| StoreError::Connection(e.to_string()))?;
        run_migrations(&pool)?;
        Ok(Self { pool })
    }

    fn pool(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SignalStore for SqliteStore {
    async fn create(&self, signal: Signal) -> Result<Signal> {
        let pool = self.clone();
        let stored = signal.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data = serde_json::to_string(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute(
                "INSERT INTO signals (id, user_id, is_active, last_triggered_at, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stored.id.to_string(),
                    stored.user_id.as_str(),
                    i64::from(stored.is_active),
                    stored.last_triggered_at.map(|t| t.to_rfc3339()),
                    data,
                ],
            )
            .map_err(to_backend_error)?;
            Ok(stored)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn get(&self, id: SignalId) -> Result<Option<Signal>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data: Option<String> = conn
                .query_row("SELECT data FROM signals WHERE id = ?1", params![id.to_string()], |row| row.get(0))
                .optional()
                .map_err(to_backend_error)?;
            data.map(signal_from_row).transpose()
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn update(&self, signal: Signal) -> Result<Signal> {
        let pool = self.clone();
        let stored = signal.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data = serde_json::to_string(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
            let rows = conn
                .execute(
                    "UPDATE signals SET is_active = ?2, last_triggered_at = ?3, data = ?4 WHERE id = ?1",
                    params![
                        stored.id.to_string(),
                        i64::from(stored.is_active),
                        stored.last_triggered_at.map(|t| t.to_rfc3339()),
                        data,
                    ],
                )
                .map_err(to_backend_error)?;
            if rows == 0 {
                return Err(StoreError::NotFound(stored.id.to_string()));
            }
            Ok(stored)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn delete(&self, id: SignalId) -> Result<bool> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let rows = conn
                .execute("DELETE FROM signals WHERE id = ?1", params![id.to_string()])
                .map_err(to_backend_error)?;
            Ok(rows > 0)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Signal>> {
        let pool = self.clone();
        let user_id = user_id.as_str().to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let mut stmt = conn
                .prepare("SELECT data FROM signals WHERE user_id = ?1")
                .map_err(to_backend_error)?;
            let rows = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(to_backend_error)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(to_backend_error)?
                .into_iter()
                .map(signal_from_row)
                .collect()
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn list_active(&self) -> Result<Vec<Signal>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let mut stmt = conn
                .prepare("SELECT data FROM signals WHERE is_active = 1")
                .map_err(to_backend_error)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(to_backend_error)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(to_backend_error)?
                .into_iter()
                .map(signal_from_row)
                .collect()
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn stamp_evaluated(&self, id: SignalId, at: DateTime<Utc>) -> Result<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data: Option<String> = conn
                .query_row("SELECT data FROM signals WHERE id = ?1", params![id.to_string()], |row| row.get(0))
                .optional()
                .map_err(to_backend_error)?;
            let Some(data) = data else {
                return Err(StoreError::NotFound(id.to_string()));
            };
            let mut signal = signal_from_row(data)?;
            signal.last_evaluated_at = Some(at);
            let data = serde_json::to_string(&signal).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute("UPDATE signals SET data = ?2 WHERE id = ?1", params![id.to_string(), data])
                .map_err(to_backend_error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn compare_and_set_triggered(
        &self,
        id: SignalId,
        expected_last_triggered_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<CasResult> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let current: Option<String> = conn
                .query_row(
                    "SELECT last_triggered_at FROM signals WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(to_backend_error)?;
            let current_ts = current
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
                .transpose()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            if current_ts != expected_last_triggered_at {
                return Ok(CasResult::Conflict {
                    current_last_triggered_at: current_ts,
                });
            }

            let data: Option<String> = conn
                .query_row("SELECT data FROM signals WHERE id = ?1", params![id.to_string()], |row| row.get(0))
                .optional()
                .map_err(to_backend_error)?;
            let Some(data) = data else {
                return Err(StoreError::NotFound(id.to_string()));
            };
            let mut signal = signal_from_row(data)?;
            signal.last_triggered_at = Some(at);
            let data = serde_json::to_string(&signal).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute(
                "UPDATE signals SET last_triggered_at = ?2, data = ?3 WHERE id = ?1",
                params![id.to_string(), at.to_rfc3339(), data],
            )
            .map_err(to_backend_error)?;
            Ok(CasResult::Ok)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert(&self, record: NotificationRecord) -> Result<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data = serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute(
                "INSERT INTO notifications (id, signal_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
                params![record.id.to_string(), record.signal_id.to_string(), record.created_at.to_rfc3339(), data],
            )
            .map_err(to_backend_error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<NotificationRecord>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let mut stmt = conn
                .prepare(
                    "SELECT data FROM notifications WHERE signal_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                )
                .map_err(to_backend_error)?;
            let rows = stmt
                .query_map(params![signal_id.to_string(), limit as i64], |row| row.get::<_, String>(0))
                .map_err(to_backend_error)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(to_backend_error)?
                .into_iter()
                .map(|data| serde_json::from_str(&data).map_err(|e| StoreError::Serialization(e.to_string())))
                .collect()
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl RunLogStore for SqliteStore {
    async fn insert(&self, record: RunLogRecord) -> Result<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let data = serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute(
                "INSERT INTO run_logs (id, signal_id, evaluated_at, data) VALUES (?1, ?2, ?3, ?4)",
                params![record.id.to_string(), record.signal_id.to_string(), record.evaluated_at.to_rfc3339(), data],
            )
            .map_err(to_backend_error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<RunLogRecord>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.pool()?;
            let mut stmt = conn
                .prepare("SELECT data FROM run_logs WHERE signal_id = ?1 ORDER BY evaluated_at DESC LIMIT ?2")
                .map_err(to_backend_error)?;
            let rows = stmt
                .query_map(params![signal_id.to_string(), limit as i64], |row| row.get::<_, String>(0))
                .map_err(to_backend_error)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(to_backend_error)?
                .into_iter()
                .map(|data| serde_json::from_str(&data).map_err(|e| StoreError::Serialization(e.to_string())))
                .collect()
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{ast::CompiledAst, condition::Logic, scope::Scope, signal::StoredDefinition, ChainId};
    use uuid::Uuid;

    fn signal(is_active: bool) -> Signal {
        let now = Utc::now();
        Signal {
            id: SignalId::new(),
            user_id: UserId::from("u1"),
            name: "test".into(),
            description: None,
            definition: StoredDefinition {
                version: 1,
                scope: Scope {
                    chain_ids: vec![ChainId(1)],
                    market_ids: None,
                    addresses: None,
                    protocol_tag: None,
                },
                window: None,
                logic: Logic::And,
                dsl: vec![],
                ast: CompiledAst {
                    logic: Logic::And,
                    conditions: vec![],
                },
            },
            webhook_url: "https://example.com/hook".into(),
            cooldown_minutes: 10,
            is_active,
            created_at: now,
            updated_at: now,
            last_evaluated_at: None,
            last_triggered_at: None,
        }
    }

    #[tokio::test]
    async fn create_get_delete_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = signal(true);
        store.create(s.clone()).await.unwrap();
        assert_eq!(store.get(s.id).await.unwrap(), Some(s.clone()));
        assert!(store.delete(s.id).await.unwrap());
        assert_eq!(store.get(s.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_active_filters_inactive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(signal(true)).await.unwrap();
        store.create(signal(false)).await.unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cas_conflict_on_mismatch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = signal(true);
        store.create(s.clone()).await.unwrap();
        let now = Utc::now();
        let result = store.compare_and_set_triggered(s.id, Some(now), now).await.unwrap();
        assert!(matches!(result, CasResult::Conflict { .. }));
    }

    #[tokio::test]
    async fn notification_and_run_log_inserts_are_queryable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let signal_id = SignalId::new();
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            signal_id,
            status: sentinel_core::NotificationStatus::Delivered,
            webhook_status: Some(200),
            error: None,
            retry_count: 0,
            duration_ms: 10,
            conditions_met: vec![],
            created_at: Utc::now(),
        };
        store.insert(record.clone()).await.unwrap();
        let fetched = NotificationStore::list_by_signal(&store, signal_id, 10).await.unwrap();
        assert_eq!(fetched, vec![record]);
    }
}
