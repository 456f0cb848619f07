//! Player identity: a durable id plus a validated nickname.
//!
//! The id is generated once per profile and reused across runs.  Whether the
//! player has already passed the nickname screen is kept in a separate,
//! session-scoped store so a new process asks again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{NicknameError, Result};
use crate::types::PlayerId;

pub const MAX_NICKNAME_CHARS: usize = 10;

const PLAYER_ID_KEY: &str = "playerId";
const NICKNAME_KEY: &str = "nickname";
const ENTERED_KEY: &str = "enteredGame";

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// String key/value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Volatile storage; lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Durable storage backed by a single JSON object on disk.
///
/// The whole file is rewritten on every `set`; the store only ever holds a
/// handful of keys.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<Option<HashMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(None),
        }
    }

    /// `<dir>/identity.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("identity.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cached = self.values.lock();
        if cached.is_none() {
            *cached = Some(self.load()?);
        }
        Ok(cached.as_ref().and_then(|m| m.get(key).cloned()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut values = match self.values.get_mut().take() {
            Some(v) => v,
            None => self.load()?,
        };
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        *self.values.get_mut() = Some(values);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: PlayerId,
    pub nickname: Option<String>,
}

/// Trim and validate a nickname, returning the stored form.
pub fn validate_nickname(raw: &str) -> std::result::Result<String, NicknameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NicknameError::Empty);
    }
    if trimmed.chars().count() > MAX_NICKNAME_CHARS {
        return Err(NicknameError::TooLong {
            max: MAX_NICKNAME_CHARS,
        });
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(NicknameError::ContainsWhitespace);
    }
    Ok(trimmed.to_string())
}

pub struct IdentityStore {
    durable: Box<dyn KeyValueStore>,
    session: Box<dyn KeyValueStore>,
}

impl IdentityStore {
    pub fn new(durable: Box<dyn KeyValueStore>, session: Box<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Durable file store plus an in-memory session store.
    pub fn open(dir: &Path) -> Self {
        Self::new(
            Box::new(FileStore::in_dir(dir)),
            Box::new(MemoryStore::new()),
        )
    }

    /// Nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    /// Read the persisted id, generating and persisting one on first use.
    pub fn get_or_create_identity(&mut self) -> Result<Identity> {
        let id = match self.durable.get(PLAYER_ID_KEY)? {
            Some(id) if !id.is_empty() => PlayerId::new(id),
            _ => {
                let id = PlayerId::generate();
                self.durable.set(PLAYER_ID_KEY, id.as_str())?;
                log::info!("[identity] Created player id {}", id);
                id
            }
        };
        let nickname = self.durable.get(NICKNAME_KEY)?.filter(|n| !n.is_empty());
        Ok(Identity { id, nickname })
    }

    /// Validate and persist a nickname.  Storage is untouched on rejection.
    pub fn set_nickname(&mut self, raw: &str) -> Result<String> {
        let nickname = validate_nickname(raw)?;
        self.durable.set(NICKNAME_KEY, &nickname)?;
        Ok(nickname)
    }

    pub fn mark_entered(&mut self) -> Result<()> {
        self.session.set(ENTERED_KEY, "true")
    }

    pub fn has_entered(&self) -> Result<bool> {
        Ok(self.session.get(ENTERED_KEY)?.as_deref() == Some("true"))
    }
}
