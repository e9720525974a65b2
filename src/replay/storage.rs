//! SQLite-backed durable replay log.
//!
//! Two key/value namespaces: `replays` holds JSON-serialized entries keyed by
//! `"{unix_seconds}_{nano_suffix}"`, `metadata` holds small string/JSON blobs.
//! No operation retries internally; every call is independently retryable by
//! the caller.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::ReplayEntry;

/// Durable append-only replay log plus metadata store.
pub struct ReplayStorage {
    conn: Arc<Mutex<Connection>>,
    jsonl_dir: PathBuf,
}

impl ReplayStorage {
    /// Open (or create) the log at `db_path`; JSONL exports go to `jsonl_dir`.
    pub async fn open<P: AsRef<Path>>(db_path: P, jsonl_dir: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open replay db at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        info!("Replay storage open at {}", db_path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            jsonl_dir: jsonl_dir.as_ref().to_path_buf(),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS replays (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Store one entry. Returns the generated key.
    pub async fn store(&self, entry: &ReplayEntry) -> Result<String> {
        let conn = self.conn.lock().await;
        let key = entry_key(0);
        let value = serde_json::to_string(entry).context("Failed to serialize replay entry")?;
        conn.execute(
            "INSERT OR REPLACE INTO replays (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(key)
    }

    /// Store a batch in a single transaction. Returns the number written.
    pub async fn store_batch(&self, entries: &[ReplayEntry]) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for (i, entry) in entries.iter().enumerate() {
            let key = entry_key(i as u64);
            let value =
                serde_json::to_string(entry).context("Failed to serialize replay entry")?;
            tx.execute(
                "INSERT OR REPLACE INTO replays (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// Deserialize every stored entry, oldest key first. O(total stored).
    pub async fn load_all(&self) -> Result<Vec<ReplayEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT value FROM replays ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for value in rows {
            let value = value?;
            let entry: ReplayEntry = serde_json::from_str(&value)
                .context("Failed to deserialize replay entry")?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The `n` most recent entries, oldest first. Loads the full table.
    pub async fn load_recent(&self, n: usize) -> Result<Vec<ReplayEntry>> {
        let mut entries = self.load_all().await?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }

    /// Number of stored replay entries.
    pub async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM replays", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Write every entry as one JSON object per line under the JSONL
    /// directory. Returns the file path.
    pub async fn export_jsonl(&self, name: &str) -> Result<PathBuf> {
        let entries = self.load_all().await?;
        tokio::fs::create_dir_all(&self.jsonl_dir).await?;
        let path = self.jsonl_dir.join(format!("{}.jsonl", name));

        let mut lines = String::new();
        for entry in &entries {
            lines.push_str(&serde_json::to_string(entry)?);
            lines.push('\n');
        }
        tokio::fs::write(&path, lines)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Exported {} replay entries to {}", entries.len(), path.display());
        Ok(path)
    }

    /// Import entries from a JSONL file under the JSONL directory. Returns
    /// the number imported.
    pub async fn import_jsonl(&self, name: &str) -> Result<usize> {
        let path = self.jsonl_dir.join(format!("{}.jsonl", name));
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReplayEntry =
                serde_json::from_str(line).context("Failed to parse JSONL line")?;
            entries.push(entry);
        }

        let imported = self.store_batch(&entries).await?;
        info!("Imported {} replay entries from {}", imported, path.display());
        Ok(imported)
    }

    /// Read a metadata value.
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let value = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a metadata value.
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Consistent copy of the whole store via SQLite's online backup.
    pub async fn backup<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut dst = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open backup target {}", path.as_ref().display()))?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dst)?;
        backup.run_to_completion(64, std::time::Duration::from_millis(10), None)?;
        info!("Replay storage backed up to {}", path.as_ref().display());
        Ok(())
    }
}

/// Key format `"{unix_seconds}_{nano_suffix}"`; unique per write within the
/// same second. `bump` keeps keys distinct inside one batch on coarse clocks.
fn entry_key(bump: u64) -> String {
    let now = Utc::now();
    entry_key_at(now.timestamp(), now.timestamp_subsec_nanos(), bump)
}

/// Suffix overflow carries into the seconds field so bumped keys never sort
/// before earlier keys from the same second.
fn entry_key_at(secs: i64, nanos: u32, bump: u64) -> String {
    let total = nanos as u64 + bump;
    let secs = secs + (total / 1_000_000_000) as i64;
    format!("{}_{:09}", secs, total % 1_000_000_000)
}
