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

//! Persistent key-value store kept as a JSON object in a single file.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use super::KeyValueStore;
use crate::{error::*, log};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "storage.json";
    pub const APPLICATION_PREFIX: &'static str = "oxsync";

    /// Opens the store in `directory`, or in the `XDG` data directory. A file
    /// that is not a JSON object of strings is discarded and the store starts
    /// empty.
    pub fn open(directory: Option<&Path>) -> Result<Self> {
        let path = match directory {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(Error::new(format!(
                        "Storage directory {} does not exist",
                        dir.display()
                    ))
                    .set_kind(ErrorKind::NotFound));
                }
                dir.join(Self::FILE_NAME)
            }
            None => xdg::BaseDirectories::with_prefix(Self::APPLICATION_PREFIX)?
                .place_data_file(Self::FILE_NAME)?,
        };
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!(
                        "Storage file {} is corrupt, starting with an empty store: {}",
                        path.display(),
                        err
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        let ret = Self {
            path,
            entries: Mutex::new(entries),
        };
        // Fail the probe now rather than on the first write.
        ret.write_out(&*ret.entries.lock()?)?;
        Ok(ret)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let write = || -> Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, entries)?;
            file.flush()?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &self.path)?;
            Ok(())
        };
        write().map_err(|err| {
            Error::new(format!("Could not write storage file {}", self.path.display()))
                .set_kind(ErrorKind::Storage)
                .set_source(Some(Arc::new(err)))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock()?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(err) = self.write_out(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key.to_string()])
    }

    fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock()?;
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.write_out(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock()?.keys().cloned().collect())
    }
}
