//! Persistence for user-curated content such as favorites.

use crate::menu::ProviderId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to determine data directory")]
    DataDirNotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed store file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Ordered lists of item ids, one per provider.
pub trait FavoritesStore: Send + Sync {
    /// `None` when nothing was ever saved for `provider_id`.
    fn load(&self, provider_id: &ProviderId) -> Result<Option<Vec<String>>, StoreError>;

    fn save(&self, provider_id: &ProviderId, items: &[String]) -> Result<(), StoreError>;
}

/// All lists in one TOML table keyed by provider id.
#[derive(Debug)]
pub struct TomlFavoritesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TomlFavoritesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `favorites.toml` in the user data directory.
    pub fn in_data_dir() -> Result<Self, StoreError> {
        let dirs = directories::ProjectDirs::from("org", "orbit", "orbit")
            .ok_or(StoreError::DataDirNotFound)?;
        Ok(Self::new(dirs.data_dir().join("favorites.toml")))
    }

    fn read_all(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs_err::read_to_string(&self.path)?;
        Ok(toml::from_str(&text)?)
    }
}

impl FavoritesStore for TomlFavoritesStore {
    fn load(&self, provider_id: &ProviderId) -> Result<Option<Vec<String>>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(provider_id.as_str()))
    }

    fn save(&self, provider_id: &ProviderId, items: &[String]) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = self.read_all()?;
        all.insert(provider_id.to_string(), items.to_vec());
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(&self.path, toml::to_string(&all)?)?;
        log::debug!("saved {} favorites for {provider_id}", items.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFavoritesStore {
    lists: Mutex<HashMap<ProviderId, Vec<String>>>,
}

impl FavoritesStore for MemoryFavoritesStore {
    fn load(&self, provider_id: &ProviderId) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.lists.lock().get(provider_id).cloned())
    }

    fn save(&self, provider_id: &ProviderId, items: &[String]) -> Result<(), StoreError> {
        self.lists.lock().insert(provider_id.clone(), items.to_vec());
        Ok(())
    }
}
