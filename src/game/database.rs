use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{is_tool_name, Game};
use crate::error::{Error, Result};

/// The result of the most recent scan, persisted as `games.json`.
///
/// A scan builds a fresh database and replaces this one wholesale; there is no
/// incremental merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameDatabase {
    games: BTreeMap<u64, Game>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GameDatabase {
    /// Load the persisted database. A missing file is an empty database.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no game database at {:?}", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io("reading game database", path, e)),
        };

        let db: GameDatabase = serde_json::from_str(&content)?;
        info!("loaded {} games from {:?}", db.games.len(), path);
        Ok(db)
    }

    /// Persist atomically: temp file in the target directory, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Config(format!("database path has no parent: {}", path.display())))?;
        crate::paths::ensure_dir(parent)?;

        let json = serde_json::to_string_pretty(self)?;
        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|e| Error::io("creating temp file", parent, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| Error::io("writing game database", path, e))?;
        temp.persist(path)
            .map_err(|e| Error::io("persisting game database", path, e.error))?;

        debug!("saved {} games to {:?}", self.games.len(), path);
        Ok(())
    }

    /// Insert a discovered game. Duplicate app ids keep the first discovery
    /// (libraries are scanned primary-root first). Returns false when the id
    /// was already present.
    pub fn insert(&mut self, game: Game) -> bool {
        match self.games.entry(game.app_id) {
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(game);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, app_id: u64) -> Option<&Game> {
        self.games.get(&app_id)
    }

    /// All games, Steam tooling filtered out, sorted by display name.
    pub fn list(&self) -> Vec<&Game> {
        let mut games: Vec<&Game> = self
            .games
            .values()
            .filter(|g| !is_tool_name(&g.name))
            .collect();
        games.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
