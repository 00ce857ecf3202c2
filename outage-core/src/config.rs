use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    model::Address,
};

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    /// Example TOML:
    /// [default_address]
    /// city = "Kyiv"
    /// street = "Khreshchatyk"
    /// house = "10"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address: Option<Address>,
}

impl UserConfig {
    /// Replace the stored default address.
    pub fn set_default_address(&mut self, address: Address) {
        self.default_address = Some(address);
    }

    pub fn clear_default_address(&mut self) -> Option<Address> {
        self.default_address.take()
    }
}

/// Reads and writes [`UserConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config directory.
    pub fn from_default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Path to the config file, e.g. `~/.config/outage-checker/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("ua", "outage-checker", "outage-checker")
            .ok_or_else(|| Error::config("<unknown>", "Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load(&self) -> Result<UserConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(UserConfig::default());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| Error::config(&self.path, format!("failed to read: {e}")))?;

        let cfg: UserConfig = toml::from_str(&contents)
            .map_err(|e| Error::config(&self.path, format!("failed to parse: {e}")))?;

        if let Some(addr) = &cfg.default_address {
            Address::new(&addr.city, &addr.street, &addr.house).map_err(|e| {
                Error::config(&self.path, format!("invalid default address: {e}"))
            })?;
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    ///
    /// The file is written to a temporary sibling and renamed into place, so a
    /// failed save leaves the previous file untouched.
    pub fn save(&self, config: &UserConfig) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        fs::create_dir_all(parent).map_err(|e| {
            Error::config(&self.path, format!("failed to create {}: {e}", parent.display()))
        })?;

        let toml = toml::to_string_pretty(config)
            .map_err(|e| Error::config(&self.path, format!("failed to serialize: {e}")))?;

        // Dropping the temp file on any early return deletes it.
        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| Error::config(&self.path, format!("failed to create temp file: {e}")))?;
        tmp.write_all(toml.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::config(&self.path, format!("failed to write: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::config(&self.path, format!("failed to replace: {}", e.error)))?;

        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Load, apply `f`, save.
    pub fn update(&self, f: impl FnOnce(&mut UserConfig)) -> Result<UserConfig> {
        let mut cfg = self.load()?;
        f(&mut cfg);
        self.save(&cfg)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.toml"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), UserConfig::default());
    }

    #[test]
    fn saved_address_loads_back() {
        let (_dir, store) = store();
        let addr = Address::new("Kyiv", "Khreshchatyk", "10").unwrap();

        store.update(|cfg| cfg.set_default_address(addr.clone())).unwrap();

        assert_eq!(store.load().unwrap().default_address, Some(addr));
    }

    #[test]
    fn setting_new_address_replaces_old() {
        let (_dir, store) = store();
        let first = Address::new("Kyiv", "Khreshchatyk", "10").unwrap();
        let second = Address::new("Одеса", "Дерибасівська", "5А").unwrap();

        store.update(|cfg| cfg.set_default_address(first)).unwrap();
        store.update(|cfg| cfg.set_default_address(second.clone())).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.matches("[default_address]").count(), 1);
        assert_eq!(store.load().unwrap().default_address, Some(second));
    }

    #[test]
    fn clear_removes_address() {
        let (_dir, store) = store();
        store
            .update(|cfg| cfg.set_default_address(Address::new("a", "b", "c").unwrap()))
            .unwrap();

        store.update(|cfg| {
            cfg.clear_default_address();
        })
        .unwrap();

        assert_eq!(store.load().unwrap().default_address, None);
    }

    #[test]
    fn corrupt_file_is_config_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "default_address = [[[ not toml").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "got {err:?}");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn empty_address_part_is_config_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "[default_address]\ncity = \"Kyiv\"\nstreet = \"\"\nhouse = \"1\"\n",
        )
        .unwrap();

        assert!(matches!(store.load().unwrap_err(), Error::Config { .. }));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_dir, store) = store();
        store.save(&UserConfig::default()).unwrap();

        let entries: Vec<_> = fs::read_dir(store.path().parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failed_save_cleans_up_and_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let good = ConfigStore::new(dir.path().join("config.toml"));
        let addr = Address::new("Kyiv", "Khreshchatyk", "10").unwrap();
        good.update(|cfg| cfg.set_default_address(addr.clone())).unwrap();

        // A directory in the target's place makes the final rename fail.
        let blocked = ConfigStore::new(dir.path().join("blocked"));
        fs::create_dir(blocked.path()).unwrap();
        fs::write(blocked.path().join("keep"), "x").unwrap();

        let err = blocked.save(&UserConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "got {err:?}");

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["blocked", "config.toml"]);
        assert_eq!(good.load().unwrap().default_address, Some(addr));
    }
}
