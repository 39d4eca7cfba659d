//
// oxsync
//
// Copyright 2026 The oxsync contributors
//
// This file is part of oxsync.
//
// oxsync is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// oxsync is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with oxsync. If not, see <http://www.gnu.org/licenses/>.
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Namespaced key-value storage over the first available persistence engine.
//!
//! [`Storage::init`] probes, in order, a persistent JSON file store
//! ([`StorageMode::Local`]), an origin-scoped in-process store
//! ([`StorageMode::Scoped`]) and an sqlite3 store ([`StorageMode::Sql`]). If
//! none is available the storage runs in [`StorageMode::Fail`]: reads return
//! `None` and writes do nothing, which callers treat as an always-empty cache.
//!
//! Every logical key is stored as `prefix + key`. Entries written with the
//! `persistent` flag are stored as `prefix + "iwillstay." + key` and survive a
//! non-forced [`Storage::flush_storage`].

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::{conf::StorageConf, error::*, log};

pub mod local;
pub mod scoped;
#[cfg(feature = "sqlite3")]
pub mod sql;

pub use local::FileStore;
pub use scoped::ScopedStore;
#[cfg(feature = "sqlite3")]
pub use sql::SqlStore;

#[cfg(test)]
mod tests;

pub const DEFAULT_PREFIX: &str = "ox.";
/// Marker placed between the prefix and the logical key of entries that must
/// survive a non-forced flush.
pub const PERSISTENT_MARKER: &str = "iwillstay.";

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Persistent key-value store (JSON file).
    Local,
    /// Origin-scoped store living as long as the process.
    Scoped,
    /// Embedded SQL store.
    Sql,
    /// No backend available.
    Fail,
}

impl StorageMode {
    pub const PROBE_ORDER: [Self; 3] = [Self::Local, Self::Scoped, Self::Sql];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Scoped => "scoped",
            Self::Sql => "sql",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

/// A persistence engine: a flat map of string keys to string values.
///
/// Keys reaching a backend are already namespaced.
pub trait KeyValueStore: Debug + Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Removes every key in `keys` in one go.
    fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
    fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Debug)]
pub struct Storage {
    backend: Option<Box<dyn KeyValueStore>>,
    mode: StorageMode,
    prefix: String,
}

impl Storage {
    /// Selects a backend. With `conf.mode` set only that backend is tried.
    pub fn init(conf: &StorageConf) -> Self {
        let candidates: &[StorageMode] = match conf.mode {
            Some(StorageMode::Fail) => &[],
            Some(ref mode) => std::slice::from_ref(mode),
            None => &StorageMode::PROBE_ORDER,
        };
        for mode in candidates {
            match Self::probe(*mode, conf) {
                Ok(backend) => {
                    log::info!("Using {} storage backend", mode);
                    return Self::with_backend(backend, *mode, conf.prefix.clone());
                }
                Err(err) => {
                    log::debug!("Storage backend {} is not available: {}", mode, err);
                }
            }
        }
        log::warn!("No storage backend available, local caching is disabled");
        Self {
            backend: None,
            mode: StorageMode::Fail,
            prefix: conf.prefix.clone(),
        }
    }

    fn probe(mode: StorageMode, conf: &StorageConf) -> Result<Box<dyn KeyValueStore>> {
        match mode {
            StorageMode::Local => Ok(Box::new(FileStore::open(conf.directory.as_deref())?)),
            StorageMode::Scoped => {
                let origin = conf.origin.as_deref().ok_or_else(|| {
                    Error::new("Scoped storage requires an origin")
                        .set_kind(ErrorKind::NotSupported)
                })?;
                Ok(Box::new(ScopedStore::open(origin)))
            }
            #[cfg(feature = "sqlite3")]
            StorageMode::Sql => Ok(Box::new(SqlStore::open(
                conf.directory.as_deref(),
                conf.origin.as_deref(),
            )?)),
            #[cfg(not(feature = "sqlite3"))]
            StorageMode::Sql => Err(Error::new("sqlite3 support is not compiled in")
                .set_kind(ErrorKind::NotSupported)),
            StorageMode::Fail => {
                Err(Error::new("No storage backend").set_kind(ErrorKind::NotSupported))
            }
        }
    }

    /// Wraps an already opened backend.
    pub fn with_backend(
        backend: Box<dyn KeyValueStore>,
        mode: StorageMode,
        prefix: String,
    ) -> Self {
        Self {
            backend: Some(backend),
            mode,
            prefix,
        }
    }

    /// A storage without any backend.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            mode: StorageMode::Fail,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, new_val: impl Into<String>) {
        self.prefix = new_val.into();
    }

    /// The backend key of `key`. Logical keys starting with
    /// [`PERSISTENT_MARKER`] are rejected, since a plain entry under such a
    /// key would collide with the persistent entry of its remainder.
    fn effective_key(&self, key: &str, persistent: bool) -> Result<String> {
        if key.starts_with(PERSISTENT_MARKER) {
            return Err(Error::new(format!(
                "Storage key {:?} starts with the reserved marker {:?}",
                key, PERSISTENT_MARKER
            ))
            .set_kind(ErrorKind::ValueError));
        }
        Ok(if persistent {
            format!("{}{}{}", self.prefix, PERSISTENT_MARKER, key)
        } else {
            format!("{}{}", self.prefix, key)
        })
    }

    pub fn get_item(&self, key: &str, persistent: bool) -> Option<String> {
        let backend = self.backend.as_ref()?;
        let key = match self.effective_key(key, persistent) {
            Ok(key) => key,
            Err(err) => {
                log::error!("{}", err);
                return None;
            }
        };
        match backend.get(&key) {
            Ok(value) => value,
            Err(err) => {
                log::error!("Could not read storage entry {}: {}", key, err);
                None
            }
        }
    }

    /// Reads and parses a JSON entry. Unparsable entries are logged and read
    /// as missing.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str, persistent: bool) -> Option<T> {
        let text = self.get_item(key, persistent)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!(
                    "Storage entry {}{} is not valid JSON for {}: {}",
                    self.prefix,
                    key,
                    std::any::type_name::<T>(),
                    err
                );
                None
            }
        }
    }

    /// Like [`Storage::get_json`] but tells a missing entry apart from an
    /// unparsable one.
    pub fn try_get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        persistent: bool,
    ) -> Result<Option<T>> {
        let key = self.effective_key(key, persistent)?;
        let Some(backend) = self.backend.as_ref() else {
            return Ok(None);
        };
        let Some(text) = backend.get(&key)? else {
            return Ok(None);
        };
        let jd = &mut serde_json::Deserializer::from_str(&text);
        serde_path_to_error::deserialize(jd)
            .map(Some)
            .map_err(|err| {
                Error::new(format!("Storage entry {} is corrupt", key))
                    .set_details(format!("{} at {}", err, err.path()))
                    .set_kind(ErrorKind::Storage)
            })
    }

    pub fn set_item(&self, key: &str, value: &str, persistent: bool) -> Result<()> {
        let key = self.effective_key(key, persistent)?;
        let Some(backend) = self.backend.as_ref() else {
            debug!("No storage backend, dropping write of {}", key);
            return Ok(());
        };
        backend.set(&key, value)
    }

    pub fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        persistent: bool,
    ) -> Result<()> {
        if self.backend.is_none() {
            return self.effective_key(key, persistent).map(|_| ());
        }
        let text = serde_json::to_string(value)?;
        self.set_item(key, &text, persistent)
    }

    /// Removes both the plain and the persistent entry of `key`.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let keys = [
            self.effective_key(key, false)?,
            self.effective_key(key, true)?,
        ];
        let Some(backend) = self.backend.as_ref() else {
            return Ok(());
        };
        backend.remove_many(&keys)
    }

    /// Removes the entries of this namespace. Unless `force` is set,
    /// persistent entries are kept. Keys outside the namespace are never
    /// touched.
    pub fn flush_storage(&self, force: bool) -> Result<()> {
        let Some(backend) = self.backend.as_ref() else {
            return Ok(());
        };
        let persistent_prefix = format!("{}{}", self.prefix, PERSISTENT_MARKER);
        let doomed: Vec<String> = backend
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .filter(|k| force || !k.starts_with(&persistent_prefix))
            .collect();
        log::debug!(
            "Flushing {} storage entries (force = {})",
            doomed.len(),
            force
        );
        backend.remove_many(&doomed)
    }

    /// Number of entries in this namespace.
    pub fn len(&self) -> usize {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        match backend.keys() {
            Ok(keys) => keys.iter().filter(|k| k.starts_with(&self.prefix)).count(),
            Err(err) => {
                log::error!("Could not list storage entries: {}", err);
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
