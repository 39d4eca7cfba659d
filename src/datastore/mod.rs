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

//! In-memory application state, its persistence and its initial loading.
//!
//! A [`Datastore`] owns the [`AppState`] behind a mutex, the [`Storage`] the
//! state is persisted to and the [`GroupwareApi`] it is fetched from. The
//! mutex is only locked for synchronous sections and never across an
//! `.await`. Events are sent to the [`DatastoreEventConsumer`] after the lock
//! is released.

use std::sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::{
    conf::{CalendarConf, Settings},
    error::*,
    groupware::{error::categorize, Connection, ErrorCategory, GroupwareApi, SessionInfo},
    log,
    storage::Storage,
};

pub mod calendar_rows;
pub mod events;
pub mod load;
pub mod restore;
pub mod snapshot;
pub mod state;

pub use calendar_rows::{CalendarRow, RowKey};
pub use events::{Alert, DatastoreEvent, DatastoreEventConsumer, ItemKey};
pub use restore::{RestoreReport, RestoreStep};
pub use snapshot::{Snapshot, Upsert};
pub use state::{AppState, ParticipantDirectory, UserData};

#[cfg(test)]
mod tests;

/// Logical storage keys.
pub mod keys {
    pub const FOLDER_TREE: &str = "folderTree";
    /// Stored as a persistent entry.
    pub const USER_DATA: &str = "userData";
    pub const CONTACTS: &str = "contacts";
    pub const CONTACT_FOLDERS: &str = "contactFolders";
    pub const APPOINTMENTS: &str = "appointments";
    pub const CALENDAR_FOLDERS: &str = "calendarFolders";
    pub const PARTICIPANTS: &str = "participants";
    pub const MAIL_FOLDERS: &str = "mailFolders";

    pub fn mails(folder: &str) -> String {
        format!("mails.{}", folder)
    }
}

#[derive(Debug)]
pub struct Datastore {
    pub(crate) calendar: CalendarConf,
    server_url: String,
    username: String,
    storage: Storage,
    pub(crate) api: Arc<dyn GroupwareApi>,
    state: Mutex<AppState>,
    pub(crate) refreshing: AtomicBool,
    event_consumer: DatastoreEventConsumer,
}

impl Datastore {
    /// Opens the configured storage and an HTTP connection to the configured
    /// server.
    pub fn new(settings: &Settings, event_consumer: DatastoreEventConsumer) -> Result<Self> {
        let api = Arc::new(Connection::new(&settings.server)?);
        let mut storage_conf = settings.storage.clone();
        if storage_conf.origin.is_none() {
            storage_conf.origin = settings.server.origin();
        }
        let storage = Storage::init(&storage_conf);
        Ok(Self::with_api(settings, storage, api, event_consumer))
    }

    pub fn with_api(
        settings: &Settings,
        storage: Storage,
        api: Arc<dyn GroupwareApi>,
        event_consumer: DatastoreEventConsumer,
    ) -> Self {
        Self {
            calendar: settings.calendar.clone(),
            server_url: settings.server.url.clone(),
            username: settings.server.username.clone(),
            storage,
            api,
            state: Mutex::new(AppState::default()),
            refreshing: AtomicBool::new(false),
            event_consumer,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn calendar_conf(&self) -> &CalendarConf {
        &self.calendar
    }

    /// Locks the state. The guard must not be held across an `.await`.
    pub fn state(&self) -> Result<MutexGuard<'_, AppState>> {
        Ok(self.state.lock()?)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&AppState) -> R) -> Result<R> {
        Ok(f(&*self.state()?))
    }

    pub fn has_session(&self) -> bool {
        self.with_state(AppState::has_session).unwrap_or(false)
    }

    pub(crate) fn emit(&self, event: DatastoreEvent) {
        (self.event_consumer)(event);
    }

    pub(crate) fn emit_all(&self, events: impl IntoIterator<Item = DatastoreEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Logs `err`, sends it to the view layer as an alert and returns the
    /// alert. An expired session is also dropped.
    pub fn handle_error(&self, err: &Error) -> Alert {
        let alert = Alert::from_error(err);
        match alert.error_id.as_deref() {
            Some(id) => log::error!("{} [error id {}]", err, id),
            None => log::error!("{}", err),
        }
        if categorize(err) == ErrorCategory::SessionExpired {
            log::info!("Session expired, dropping it");
            self.api.invalidate_session();
            if let Ok(mut state) = self.state.lock() {
                state.session = None;
            }
        }
        self.emit(DatastoreEvent::Alert(alert.clone()));
        alert
    }

    /// Writes `value` to storage. Failures are logged: the cache is best
    /// effort.
    pub(crate) fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T, persistent: bool) {
        if let Err(err) = self.storage.set_json(key, value, persistent) {
            log::error!("Could not persist {}: {}", key, err);
        }
    }

    pub(crate) fn unpersist(&self, key: &str) {
        if let Err(err) = self.storage.remove_item(key) {
            log::error!("Could not remove {} from storage: {}", key, err);
        }
    }

    /// Opens a session and records the user's identifiers.
    pub async fn login(&self) -> Result<SessionInfo> {
        let info = match self.api.login().await {
            Ok(info) => info,
            Err(err) => {
                self.handle_error(&err);
                return Err(err);
            }
        };
        let user = UserData {
            user_id: info.user_id,
            login_name: info
                .login_name
                .clone()
                .unwrap_or_else(|| self.username.clone()),
            server: self.server_url.clone(),
            language: info.locale.clone(),
        };
        self.persist(keys::USER_DATA, &user, true);
        let mut state = self.state()?;
        state.session = Some(info.clone());
        state.user = Some(user);
        Ok(info)
    }

    /// Closes the session and clears the cache. Unless `force` is set the
    /// user's identifiers are kept, in storage and in memory.
    pub async fn logout_and_flush(&self, force: bool) -> Result<()> {
        if let Err(err) = self.api.logout().await {
            log::warn!("Logout failed, dropping the session anyway: {}", err);
            self.api.invalidate_session();
        }
        {
            let mut state = self.state()?;
            let user = if force { None } else { state.user.take() };
            *state = AppState {
                user,
                ..AppState::default()
            };
        }
        self.storage.flush_storage(force)?;
        log::info!("Logged out, local cache flushed (force = {})", force);
        Ok(())
    }
}
