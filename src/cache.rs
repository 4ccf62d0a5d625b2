use std::collections::HashSet;
use std::path::Path;
use std::sync::{Condvar, Mutex};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::util::now_utc_string;

type Key = (String, String, String);

/// Persistent store of synthesized remediation scripts, keyed by
/// (section id, rule id, target OS). Lookups race-free within one
/// process: at most one synthesis runs per key at a time; concurrent
/// callers for the same key wait for the first call's result and then
/// re-read the store. Failed synthesis is never cached.
pub struct ScriptCache {
    connection: Mutex<Connection>,
    in_flight: Mutex<HashSet<Key>>,
    flight_done: Condvar,
}

impl ScriptCache {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS scripts (
                    section_id TEXT NOT NULL,
                    rule_id TEXT NOT NULL,
                    target_os TEXT NOT NULL,
                    script TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (section_id, rule_id, target_os)
                );",
            )
            .context("failed to ensure script cache schema")?;

        Ok(Self {
            connection: Mutex::new(connection),
            in_flight: Mutex::new(HashSet::new()),
            flight_done: Condvar::new(),
        })
    }

    pub fn lookup(&self, section_id: &str, rule_id: &str, target_os: &str) -> Result<Option<String>> {
        let connection = self.lock_connection()?;
        connection
            .query_row(
                "SELECT script FROM scripts
                 WHERE section_id = ?1 AND rule_id = ?2 AND target_os = ?3",
                params![section_id, rule_id, target_os],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query script cache")
    }

    pub fn cached_count(&self) -> Result<i64> {
        let connection = self.lock_connection()?;
        connection
            .query_row("SELECT COUNT(*) FROM scripts", [], |row| row.get(0))
            .context("failed to count cached scripts")
    }

    /// Returns the cached script for the key, or runs `produce` to
    /// synthesize it, stores the result, and returns it. Only one
    /// `produce` runs per key at a time; other callers block until the
    /// owner finishes and then retry the lookup. The in-flight marker is
    /// released on every exit path, including panics in `produce`.
    pub fn get_or_synthesize<F>(
        &self,
        section_id: &str,
        rule_id: &str,
        target_os: &str,
        produce: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let key: Key = (
            section_id.to_string(),
            rule_id.to_string(),
            target_os.to_string(),
        );

        loop {
            if let Some(script) = self.lookup(section_id, rule_id, target_os)? {
                return Ok(script);
            }

            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| anyhow!("script cache in-flight state poisoned"))?;
            if in_flight.insert(key.clone()) {
                break;
            }

            // Another caller owns this key; wait for its completion and
            // re-check the store.
            let guard = self
                .flight_done
                .wait(in_flight)
                .map_err(|_| anyhow!("script cache in-flight state poisoned"))?;
            drop(guard);
        }

        let _flight = FlightGuard { cache: self, key };

        let script = produce()?;
        self.store(section_id, rule_id, target_os, &script)?;
        Ok(script)
    }

    fn store(&self, section_id: &str, rule_id: &str, target_os: &str, script: &str) -> Result<()> {
        let connection = self.lock_connection()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO scripts
                 (section_id, rule_id, target_os, script, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![section_id, rule_id, target_os, script, now_utc_string()],
            )
            .context("failed to store script in cache")?;
        Ok(())
    }

    fn lock_connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("script cache connection poisoned"))
    }

    fn release(&self, key: &Key) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(key);
        }
        self.flight_done.notify_all();
    }
}

struct FlightGuard<'a> {
    cache: &'a ScriptCache,
    key: Key,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
