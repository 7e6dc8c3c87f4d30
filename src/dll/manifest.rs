//! The remote manifest of latest-known DLL versions and its local cache.
//!
//! The manifest is fetched as JSON and mirrored into a small SQLite database
//! so update checks work offline and stay fast. Entries per DLL name are
//! ordered newest-first, as published.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

/// One published DLL build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDll {
    pub version: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The published manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repository: String,
    /// Builds per DLL name, newest first.
    pub dlls: HashMap<String, Vec<ManifestDll>>,
}

impl Manifest {
    pub fn latest(&self, name: &str) -> Option<&ManifestDll> {
        self.dlls.get(name).and_then(|builds| builds.first())
    }
}

/// Fetch the manifest from `manifest_url`.
pub async fn fetch(client: &reqwest::Client, manifest_url: &str) -> Result<Manifest> {
    let url = Url::parse(manifest_url)
        .map_err(|e| Error::ManifestUnavailable(format!("bad manifest URL {manifest_url:?}: {e}")))?;

    info!("fetching DLL manifest from {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::ManifestUnavailable(e.to_string()))?
        .error_for_status()
        .map_err(|e| Error::ManifestUnavailable(e.to_string()))?;

    response
        .json::<Manifest>()
        .await
        .map_err(|e| Error::ManifestUnavailable(format!("malformed manifest: {e}")))
}

/// SQLite mirror of the manifest with a freshness timestamp.
///
/// rusqlite is blocking; async callers go through `spawn_blocking`.
pub struct ManifestCache {
    conn: Connection,
}

impl ManifestCache {
    /// Open or create the cache database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS manifest_dlls (
                name TEXT NOT NULL,
                position INTEGER NOT NULL,
                version TEXT NOT NULL,
                filename TEXT NOT NULL,
                url TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                release_date TEXT,
                notes TEXT,
                PRIMARY KEY (name, position)
            );
            CREATE TABLE IF NOT EXISTS manifest_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self { conn })
    }

    /// When the cache was last replaced from a fetched manifest.
    pub fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM manifest_meta WHERE key = 'last_refresh'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(ts) => match DateTime::parse_from_rfc3339(&ts) {
                Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
                Err(e) => {
                    warn!("unreadable last_refresh timestamp {:?}: {}", ts, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Fresh means refreshed within `ttl_hours`.
    pub fn is_fresh(&self, ttl_hours: u32) -> Result<bool> {
        match self.last_refresh()? {
            Some(ts) => Ok(Utc::now() - ts < Duration::hours(ttl_hours as i64)),
            None => Ok(false),
        }
    }

    /// Replace the cached manifest wholesale.
    pub fn replace(&mut self, manifest: &Manifest) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM manifest_dlls", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO manifest_dlls
                 (name, position, version, filename, url, sha256, size_bytes, release_date, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (name, builds) in &manifest.dlls {
                for (position, dll) in builds.iter().enumerate() {
                    stmt.execute(params![
                        name,
                        position as i64,
                        dll.version,
                        dll.filename,
                        dll.url,
                        dll.sha256,
                        dll.size as i64,
                        dll.release_date.map(|d| d.to_rfc3339()),
                        dll.notes,
                    ])?;
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO manifest_meta (key, value) VALUES ('last_refresh', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        let total: usize = manifest.dlls.values().map(Vec::len).sum();
        info!("cached manifest with {} builds", total);
        Ok(())
    }

    /// Latest known build for a DLL name, if the manifest lists it.
    pub fn latest(&self, name: &str) -> Result<Option<ManifestDll>> {
        self.conn
            .query_row(
                "SELECT version, filename, url, sha256, size_bytes, release_date, notes
                 FROM manifest_dlls WHERE name = ?1 ORDER BY position LIMIT 1",
                params![name],
                row_to_dll,
            )
            .optional()
            .map_err(Error::from)
    }

    /// A specific published build.
    pub fn get(&self, name: &str, version: &str) -> Result<Option<ManifestDll>> {
        self.conn
            .query_row(
                "SELECT version, filename, url, sha256, size_bytes, release_date, notes
                 FROM manifest_dlls WHERE name = ?1 AND version = ?2",
                params![name, version],
                row_to_dll,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM manifest_dlls", [], |row| row.get(0))?;
        Ok(count == 0)
    }
}

fn row_to_dll(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManifestDll> {
    let release_date: Option<String> = row.get(5)?;
    Ok(ManifestDll {
        version: row.get(0)?,
        filename: row.get(1)?,
        url: row.get(2)?,
        sha256: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        release_date: release_date
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        notes: row.get(6)?,
    })
}
