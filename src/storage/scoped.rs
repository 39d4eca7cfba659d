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

//! Origin-scoped store: one in-process map per origin, shared by every
//! [`ScopedStore`] opened for the same origin and gone when the process exits.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, OnceLock},
};

use super::KeyValueStore;
use crate::error::*;

type Area = Arc<Mutex<BTreeMap<String, String>>>;

fn areas() -> &'static Mutex<HashMap<String, Area>> {
    static AREAS: OnceLock<Mutex<HashMap<String, Area>>> = OnceLock::new();
    AREAS.get_or_init(Default::default)
}

#[derive(Debug)]
pub struct ScopedStore {
    area: Area,
}

impl ScopedStore {
    pub fn open(origin: &str) -> Self {
        let area = areas()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(origin.to_string())
            .or_default()
            .clone();
        Self { area }
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.area.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.area.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.area.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.area.lock()?.keys().cloned().collect())
    }
}
