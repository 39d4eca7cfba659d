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

//! Helpers for the sqlite3 databases the crate keeps on disk.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use rusqlite::{self, params, Connection, OptionalExtension};

use crate::{error::*, log};

/// A description for creating, opening and handling application databases.
#[derive(Clone, Debug)]
pub struct DatabaseDescription {
    /// A name that represents the function of this database, e.g. `storage`.
    pub name: &'static str,
    /// An optional identifier string that along with
    /// [`DatabaseDescription::name`] makes a specialized identifier for the
    /// database, e.g. an origin.
    pub identifier: Option<Cow<'static, str>>,
    /// The name of the application to use when storing the database in `XDG`
    /// directories.
    pub application_prefix: &'static str,
    /// Optionally override file system location instead of saving at `XDG` data
    /// directory.
    pub directory: Option<Cow<'static, Path>>,
    /// A script that initializes the schema of the database.
    pub init_script: Option<&'static str>,
    /// The current value of the `user_version` `PRAGMA` of the `sqlite3`
    /// database, used for schema versioning.
    pub version: u32,
}

impl DatabaseDescription {
    /// Returns whether the computed database path for this description exist.
    pub fn exists(&self) -> Result<bool> {
        let path = self.db_path()?;
        Ok(path.exists())
    }

    fn display_name(&self) -> String {
        format!(
            "{}{}{}",
            self.identifier.as_deref().unwrap_or_default(),
            if self.identifier.is_none() { "" } else { ":" },
            self.name,
        )
    }

    /// Returns the computed database path for this description.
    pub fn db_path(&self) -> Result<PathBuf> {
        let name: Cow<'static, str> = self.identifier.as_ref().map_or_else(
            || format!("{}.db", self.name).into(),
            |id| format!("{}_{}.db", id, self.name).into(),
        );

        for (field_name, field_value) in [
            ("name", self.name),
            ("identifier", self.identifier.as_deref().unwrap_or_default()),
            ("application_prefix", self.application_prefix),
        ] {
            if field_value.contains(std::path::MAIN_SEPARATOR) {
                return Err(Error::new(format!(
                    "Database description for `{}` field {} cannot contain current platform's \
                     path separator {}. Got: {}.",
                    self.display_name(),
                    field_name,
                    std::path::MAIN_SEPARATOR,
                    field_value,
                ))
                .set_kind(ErrorKind::ValueError));
            }
        }

        if let Some(directory) = self.directory.as_deref() {
            if !directory.is_dir() {
                return Err(Error::new(format!(
                    "Database description for `{}` expects a valid directory path value. Got: {}.",
                    self.display_name(),
                    directory.display()
                ))
                .set_kind(ErrorKind::ValueError));
            }
            return Ok(directory.join(name.as_ref()));
        }
        let data_dir =
            xdg::BaseDirectories::with_prefix(self.application_prefix).map_err(|err| {
                Error::new(format!(
                    "Could not create sqlite3 database file for `{}` in XDG data directory.",
                    self.display_name(),
                ))
                .set_details(format!(
                    "Could not open XDG data directory with prefix {}",
                    self.application_prefix
                ))
                .set_kind(ErrorKind::Platform)
                .set_source(Some(Arc::new(err)))
            })?;
        data_dir.place_data_file(name.as_ref()).map_err(|err| {
            Error::new(format!(
                "Could not create sqlite3 database file for `{}` in XDG data directory.",
                self.display_name(),
            ))
            .set_kind(ErrorKind::Platform)
            .set_source(Some(Arc::new(err)))
        })
    }

    /// Returns an [`rusqlite::Connection`] for this description.
    ///
    /// A database whose `user_version` does not match
    /// [`DatabaseDescription::version`] is removed and created again once.
    pub fn open_or_create_db(&self) -> Result<Connection> {
        let db_path = self.db_path()?;
        match self.open_inner(&db_path) {
            Ok(Some(conn)) => Ok(conn),
            Ok(None) => {
                self.reset_db()?;
                match self.open_inner(&db_path) {
                    Ok(Some(conn)) => Ok(conn),
                    Ok(None) => Err(Error::new(format!(
                        "{}: Database version mismatch, expected {}. Could not recreate database.",
                        db_path.display(),
                        self.version
                    ))
                    .set_kind(ErrorKind::Storage)),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(Error::new(format!(
                "{}: Could not open or create database",
                db_path.display()
            ))
            .set_kind(ErrorKind::Storage)
            .set_source(Some(Arc::new(err)))),
        }
    }

    /// Opens the database, returning `None` if its schema version is stale.
    fn open_inner(&self, db_path: &Path) -> Result<Option<Connection>> {
        let set_mode = !db_path.exists();
        if set_mode {
            log::info!("Creating {} database in {}", self.name, db_path.display());
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::new(10, 0))?;
        #[cfg(unix)]
        if set_mode {
            use std::os::unix::fs::PermissionsExt;

            let file = std::fs::File::open(db_path)?;
            let metadata = file.metadata()?;
            let mut permissions = metadata.permissions();

            permissions.set_mode(0o600); // Read/write for owner only.
            file.set_permissions(permissions)?;
        }
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version != 0_i32 && version as u32 != self.version {
            log::info!(
                "Database version mismatch, is {} but expected {}. Attempting to recreate \
                 database.",
                version,
                self.version
            );
            return Ok(None);
        }

        if version == 0 {
            conn.pragma_update(None, "user_version", self.version)?;
        }
        if let Some(s) = self.init_script {
            conn.execute_batch(s)?;
        }

        Ok(Some(conn))
    }

    /// Reset database to a clean slate.
    pub fn reset_db(&self) -> Result<()> {
        let db_path = self.db_path()?;
        if !db_path.exists() {
            return Ok(());
        }
        log::info!("Resetting {} database in {}", self.name, db_path.display());
        std::fs::remove_file(&db_path).map_err(|err| {
            Error::new(format!("{}: could not remove file", db_path.display()))
                .set_kind(ErrorKind::Platform)
                .set_source(Some(Arc::new(err)))
        })?;
        Ok(())
    }
}
