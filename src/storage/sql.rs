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

//! Embedded SQL store: a single `storage (key, value)` table in an sqlite3
//! database.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use super::KeyValueStore;
use crate::{
    error::*,
    utils::sqlite3::{params, Connection, DatabaseDescription, OptionalExtension},
};

pub const DB: DatabaseDescription = DatabaseDescription {
    name: "storage",
    identifier: None,
    application_prefix: "oxsync",
    directory: None,
    init_script: Some(
        "CREATE TABLE IF NOT EXISTS storage (
            key   TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );",
    ),
    version: 1,
};

#[derive(Debug)]
pub struct SqlStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlStore {
    pub fn open(directory: Option<&Path>, origin: Option<&str>) -> Result<Self> {
        let mut description = DB;
        description.directory = directory.map(|d| d.to_path_buf().into());
        description.identifier = origin.map(|o| o.to_string().into());
        let conn = description.open_or_create_db()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl KeyValueStore for SqlStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO storage (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET \
             value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute("DELETE FROM storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM storage WHERE key = ?1")?;
            for key in keys {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
