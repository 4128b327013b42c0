//! Progress board on SQLite.
//!
//! Every write takes a fresh stamp from `progress_clock`. A delayed delete
//! remembers the stamp it saw when it was scheduled and only removes the
//! entry if that stamp is still current, so a refresh that lands during the
//! grace period keeps the entry alive.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mediadex_core::{MediadexConfig, ProgressUpdate};

use crate::error::ProgressError;
use crate::migrations;

/// Shared key/value status board.
///
/// Writes are last-write-wins. Keys outside the namespace are stored but not
/// returned by [`get_all`](Self::get_all).
pub struct ProgressStore {
    conn: Mutex<Connection>,
    namespace: String,
    exclude_delay: Duration,
}

impl ProgressStore {
    /// Open (or create) the board at `path`.
    pub fn open(
        path: &Path,
        namespace: &str,
        exclude_delay: Duration,
    ) -> Result<Self, ProgressError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ProgressError::Storage(format!("Failed to open database: {}", e)))?;
        // Other processes share the file.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| ProgressError::Storage(format!("Failed to set pragmas: {}", e)))?;
        migrations::run_migrations(&conn)?;

        info!("Progress board opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.to_string(),
            exclude_delay,
        })
    }

    /// Open an in-memory board (for testing).
    pub fn in_memory(namespace: &str, exclude_delay: Duration) -> Result<Self, ProgressError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ProgressError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.to_string(),
            exclude_delay,
        })
    }

    pub fn from_config(config: &MediadexConfig) -> Result<Self, ProgressError> {
        Self::open(
            &config.resolve(&config.progress.db_path),
            &config.progress.namespace,
            Duration::from_secs(config.progress.exclude_delay_secs),
        )
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, ProgressError>
    where
        F: FnOnce(&Connection) -> Result<T, ProgressError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ProgressError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Board key for a job or video name.
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.namespace, name)
    }

    /// Overwrite `key` with `value`. Returns the stamp of this write.
    pub fn set(&self, key: &str, value: &str) -> Result<i64, ProgressError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("UPDATE progress_clock SET value = value + 1 WHERE id = 1", [])?;
            let generation: i64 =
                tx.query_row("SELECT value FROM progress_clock WHERE id = 1", [], |row| {
                    row.get(0)
                })?;
            tx.execute(
                "INSERT INTO progress (key, value, generation, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    generation = excluded.generation,
                    updated_at = excluded.updated_at",
                params![key, value, generation, chrono::Utc::now().timestamp()],
            )?;
            tx.commit()?;
            Ok(generation)
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ProgressError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM progress WHERE key = ?1", [key], |row| {
                    Ok(decode_value(row.get_ref(0)?))
                })
                .optional()?;
            Ok(value)
        })
    }

    /// Every entry under the namespace.
    ///
    /// A value that is not text is reported as an error string in place of
    /// the value instead of failing the whole read.
    pub fn get_all(&self) -> Result<BTreeMap<String, String>, ProgressError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM progress
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt.query_map([&self.namespace], |row| {
                let key: String = row.get(0)?;
                Ok((key, decode_value(row.get_ref(1)?)))
            })?;

            let mut entries = BTreeMap::new();
            for row in rows {
                let (key, value) = row?;
                entries.insert(key, value);
            }
            Ok(entries)
        })
    }

    /// Remove `key` now. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool, ProgressError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM progress WHERE key = ?1", [key])? > 0))
    }

    fn generation(&self, key: &str) -> Result<Option<i64>, ProgressError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT generation FROM progress WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn delete_if_generation(&self, key: &str, generation: i64) -> Result<bool, ProgressError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM progress WHERE key = ?1 AND generation = ?2",
                params![key, generation],
            )? > 0)
        })
    }

    /// Schedule removal of `key` after `delay` on a background task.
    ///
    /// The entry is removed only if nothing wrote to it after this call.
    /// The returned handle may be dropped; the delete still runs. Must be
    /// called from within a Tokio runtime.
    pub fn delete_after_delay(
        self: &Arc<Self>,
        key: &str,
        delay: Duration,
    ) -> Result<JoinHandle<()>, ProgressError> {
        match self.generation(key)? {
            Some(generation) => Ok(self.expire_if_unchanged(key, generation, delay)),
            None => {
                let key = key.to_string();
                Ok(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    debug!(key = %key, "Nothing to expire");
                }))
            }
        }
    }

    /// Remove `key` after `delay` if its stamp is still `generation`.
    pub(crate) fn expire_if_unchanged(
        self: &Arc<Self>,
        key: &str,
        generation: i64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let key = key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store.delete_if_generation(&key, generation) {
                Ok(true) => debug!(key = %key, "Progress entry expired"),
                Ok(false) => debug!(key = %key, "Progress entry refreshed, kept"),
                Err(e) => warn!(key = %key, error = %e, "Failed to expire progress entry"),
            }
        })
    }

    /// Record a pushed update. An `Excluded` update also schedules the
    /// entry's removal after the configured grace delay.
    pub fn apply_update(
        self: &Arc<Self>,
        update: &ProgressUpdate,
    ) -> Result<Option<JoinHandle<()>>, ProgressError> {
        let key = self.key_for(&update.video_name);
        let generation = self.set(&key, &update.progress)?;
        debug!(key = %key, progress = %update.progress, "Progress updated");

        if update.is_excluded() {
            return Ok(Some(self.expire_if_unchanged(
                &key,
                generation,
                self.exclude_delay,
            )));
        }
        Ok(None)
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("namespace", &self.namespace)
            .finish()
    }
}

fn decode_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => "Error: value is not valid UTF-8".to_string(),
        },
        ValueRef::Integer(_) => "Error: unexpected value type integer".to_string(),
        ValueRef::Real(_) => "Error: unexpected value type real".to_string(),
        ValueRef::Null => "Error: unexpected value type null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Arc<ProgressStore> {
        Arc::new(ProgressStore::in_memory("video:", Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_set_then_get_all() {
        let store = board();
        store.set("video:X", "50").unwrap();
        let all = store.get_all().unwrap();
        assert_eq!(all.get("video:X").map(String::as_str), Some("50"));
    }

    #[test]
    fn test_set_overwrites() {
        let store = board();
        let first = store.set("video:X", "10").unwrap();
        let second = store.set("video:X", "20").unwrap();
        assert!(second > first);
        assert_eq!(store.get("video:X").unwrap().as_deref(), Some("20"));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_get_all_filters_namespace() {
        let store = board();
        store.set("video:a", "1").unwrap();
        store.set("other:b", "2").unwrap();
        store.set("videoless", "3").unwrap();
        let keys: Vec<String> = store.get_all().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["video:a".to_string()]);
    }

    #[test]
    fn test_get_all_reports_unexpected_types() {
        let store = board();
        store.set("video:ok", "42").unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO progress (key, value, generation, updated_at)
                     VALUES ('video:odd', 7, 0, 0)",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO progress (key, value, generation, updated_at)
                     VALUES ('video:bytes', X'3130', 0, 0)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all["video:ok"], "42");
        assert_eq!(all["video:bytes"], "10");
        assert!(all["video:odd"].starts_with("Error:"));
    }

    #[test]
    fn test_delete() {
        let store = board();
        store.set("video:X", "1").unwrap();
        assert!(store.delete("video:X").unwrap());
        assert!(!store.delete("video:X").unwrap());
        assert!(store.get("video:X").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_after_delay_removes_entry() {
        let store = board();
        store.set("video:X", "Excluded").unwrap();
        let handle = store
            .delete_after_delay("video:X", Duration::from_secs(5))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(store.get("video:X").unwrap().is_some());

        handle.await.unwrap();
        assert!(store.get("video:X").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_entry_survives_delayed_delete() {
        let store = board();
        store.set("video:X", "Excluded").unwrap();
        let handle = store
            .delete_after_delay("video:X", Duration::from_secs(5))
            .unwrap();

        store.set("video:X", "30").unwrap();
        handle.await.unwrap();
        assert_eq!(store.get("video:X").unwrap().as_deref(), Some("30"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_entry_survives_stale_delete() {
        let store = board();
        store.set("video:X", "Excluded").unwrap();
        let handle = store
            .delete_after_delay("video:X", Duration::from_secs(5))
            .unwrap();

        store.delete("video:X").unwrap();
        store.set("video:X", "5").unwrap();
        handle.await.unwrap();
        assert_eq!(store.get("video:X").unwrap().as_deref(), Some("5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_excluded_update_expires() {
        let store = board();
        let handle = store
            .apply_update(&ProgressUpdate::new("talk", "Excluded"))
            .unwrap()
            .expect("excluded schedules a delete");
        assert_eq!(store.get_all().unwrap()["video:talk"], "Excluded");

        handle.await.unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_expiry_uses_its_own_stamp() {
        let store = board();
        let excluded = store.set("video:talk", "Excluded").unwrap();
        // A newer write lands before the expiry is scheduled.
        store.set("video:talk", "10").unwrap();

        store
            .expire_if_unchanged("video:talk", excluded, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.get("video:talk").unwrap().as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_apply_regular_update_keeps_entry() {
        let store = board();
        let handle = store.apply_update(&ProgressUpdate::new("talk", "75")).unwrap();
        assert!(handle.is_none());
        assert_eq!(store.get("video:talk").unwrap().as_deref(), Some("75"));
    }

    #[test]
    fn test_concurrent_open_of_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    ProgressStore::open(&path, "video:", Duration::from_secs(5)).map(|_| ())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let store = ProgressStore::open(&path, "video:", Duration::from_secs(5)).unwrap();
        let applied: i64 = store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_file_board_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");
        let writer = ProgressStore::open(&path, "video:", Duration::from_secs(5)).unwrap();
        let reader = ProgressStore::open(&path, "video:", Duration::from_secs(5)).unwrap();

        writer.set("video:shared", "60").unwrap();
        assert_eq!(reader.get_all().unwrap()["video:shared"], "60");
    }
}
