//! Account credentials behind a trait seam.
//!
//! The login machine only needs `save`/`verify`/`exists`; how passwords
//! are protected at rest is the implementor's concern. The provided
//! stores keep them verbatim, which is fine for tests and local play;
//! a production deployment wraps this trait around a real hash.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SessionError;

/// Account password storage, keyed case-insensitively by name.
pub trait Credentials: Send {
    /// Creates or replaces the password for a name.
    fn save(&mut self, name: &str, password: &str) -> Result<(), SessionError>;

    /// True if the password matches the stored one.
    fn verify(&self, name: &str, password: &str) -> bool;

    fn exists(&self, name: &str) -> bool;
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// In-memory credentials, for tests and throwaway servers.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    passwords: HashMap<String, String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Credentials for MemoryCredentials {
    fn save(&mut self, name: &str, password: &str) -> Result<(), SessionError> {
        self.passwords.insert(key(name), password.to_owned());
        Ok(())
    }

    fn verify(&self, name: &str, password: &str) -> bool {
        self.passwords.get(&key(name)).is_some_and(|p| p == password)
    }

    fn exists(&self, name: &str) -> bool {
        self.passwords.contains_key(&key(name))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialRow {
    name: String,
    password: String,
}

/// File-backed credentials: one JSON row per account under a directory.
///
/// The mutex covers the read-modify-write of a single row file; the
/// rest of the server only touches this from the world task, but saves
/// may also be triggered from shutdown handling.
#[derive(Debug)]
pub struct FileCredentials {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentials {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "credential store opened");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key(name)))
    }
}

impl Credentials for FileCredentials {
    fn save(&mut self, name: &str, password: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let row = CredentialRow {
            name: name.to_owned(),
            password: password.to_owned(),
        };
        write_atomic(&self.path(name), &serde_json::to_vec_pretty(&row)?)?;
        debug!(name, "credentials saved");
        Ok(())
    }

    fn verify(&self, name: &str, password: &str) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let Ok(bytes) = fs::read(self.path(name)) else {
            return false;
        };
        serde_json::from_slice::<CredentialRow>(&bytes)
            .is_ok_and(|row| row.password == password)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
