//! Keyed persistence stores: players by lowercase name, objects by
//! instance id.
//!
//! One JSON file per key. Both stores carry an internal mutex because
//! the save path can be hit from outside the world task's exactly-one-
//! mutator guarantee (shutdown hooks, background flush triggers).
//! Fields matching template defaults are omitted from rows via serde
//! defaults and resolved back on load.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use embermud_proto::{ObjectId, Vnum};

use crate::character::Player;
use crate::error::WorldError;
use crate::object::{Location, ObjectInstance, ObjectState};

/// Durable player records, keyed by lowercase character name.
#[derive(Debug)]
pub struct PlayerStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl PlayerStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WorldError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name.to_lowercase()))
    }

    /// Idempotent upsert.
    pub fn save(&self, player: &Player) -> Result<(), WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let row = serde_json::to_vec_pretty(player)?;
        write_atomic(&self.path(&player.name), &row)?;
        debug!(name = %player.name, "player saved");
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Option<Player>, WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn delete(&self, name: &str) -> Result<(), WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Durable row for one object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub vnum: Vnum,
    #[serde(default = "default_state", skip_serializing_if = "is_default_state")]
    pub state: ObjectState,
    pub location: Location,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insured: bool,
}

fn default_state() -> ObjectState {
    ObjectState::Normal
}
fn is_default_state(s: &ObjectState) -> bool {
    *s == ObjectState::Normal
}
fn is_false(v: &bool) -> bool {
    !*v
}

impl From<&ObjectInstance> for ObjectRecord {
    fn from(obj: &ObjectInstance) -> Self {
        Self {
            id: obj.id,
            vnum: obj.template.vnum,
            state: obj.state,
            location: obj.location,
            insured: obj.insured,
        }
    }
}

/// Durable object rows, keyed by instance id.
#[derive(Debug)]
pub struct ObjectStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ObjectStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WorldError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, id: ObjectId) -> PathBuf {
        self.dir.join(format!("{}.json", id.0))
    }

    pub fn save(&self, record: &ObjectRecord) -> Result<(), WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let row = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path(record.id), &row)?;
        Ok(())
    }

    pub fn load(&self, id: ObjectId) -> Result<Option<ObjectRecord>, WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path(id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn exists(&self, id: ObjectId) -> bool {
        self.path(id).exists()
    }

    pub fn delete(&self, id: ObjectId) -> Result<(), WorldError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target, so a
/// crash mid-write never truncates an existing row.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
