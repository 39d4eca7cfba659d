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

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use super::{
    calendar_rows::{self, CalendarRow, RowKey},
    snapshot::Snapshot,
};
use crate::{
    groupware::{
        Appointment, AppointmentKey, Contact, DirectoryEntry, Folder, MailHeader, Module,
        ParticipantKind, SessionInfo,
    },
    utils::datetime::{start_of_day, Timestamp},
};

/// Identifiers of the last logged in user.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UserData {
    pub user_id: u64,
    pub login_name: String,
    pub server: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Users, groups and resources taking part in cached appointments.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ParticipantDirectory {
    #[serde(default)]
    pub users: IndexMap<u64, DirectoryEntry>,
    #[serde(default)]
    pub groups: IndexMap<u64, DirectoryEntry>,
    #[serde(default)]
    pub resources: IndexMap<u64, DirectoryEntry>,
}

impl ParticipantDirectory {
    pub fn lookup(&self, kind: ParticipantKind, id: u64) -> Option<&DirectoryEntry> {
        match kind {
            ParticipantKind::User => self.users.get(&id),
            ParticipantKind::Group => self.groups.get(&id),
            ParticipantKind::Resource | ParticipantKind::ResourceGroup => {
                self.resources.get(&id)
            }
            ParticipantKind::External => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.resources.is_empty()
    }
}

/// Everything the client holds in memory.
#[derive(Debug, Default)]
pub struct AppState {
    pub session: Option<SessionInfo>,
    pub user: Option<UserData>,
    pub folders: IndexMap<String, Folder>,
    /// Folder ids each module's cache was last built from.
    pub synced_folders: BTreeMap<Module, BTreeSet<String>>,
    pub contacts: Snapshot<Contact>,
    pub appointments: Snapshot<Appointment>,
    pub calendar_rows: BTreeMap<RowKey, CalendarRow>,
    pub directory: ParticipantDirectory,
    /// Mail headers per mail folder id.
    pub mails: IndexMap<String, Snapshot<MailHeader>>,
    /// Unread mail count per mail folder id.
    pub unread: IndexMap<String, usize>,
}

impl AppState {
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Ids of the subscribed folders holding `module` records.
    pub fn folder_ids(&self, module: Module) -> BTreeSet<String> {
        self.folders
            .values()
            .filter(|f| f.content_module() == Some(module) && f.is_subscribed())
            .map(|f| f.id.clone())
            .collect()
    }

    pub fn set_folders(&mut self, folders: Vec<Folder>) {
        self.folders = folders.into_iter().map(|f| (f.id.clone(), f)).collect();
    }

    /// Replaces the folders of `module` with `folders`.
    pub fn replace_module_folders(&mut self, module: Module, folders: Vec<Folder>) {
        self.folders
            .retain(|_, f| f.content_module() != Some(module));
        self.folders
            .extend(folders.into_iter().map(|f| (f.id.clone(), f)));
    }

    pub fn synced_folders(&self, module: Module) -> BTreeSet<String> {
        self.synced_folders.get(&module).cloned().unwrap_or_default()
    }

    /// Regenerates every calendar row from the cached appointments.
    pub fn rebuild_calendar_rows(&mut self) {
        self.calendar_rows = self
            .appointments
            .iter()
            .flat_map(calendar_rows::expand)
            .map(|row| (row.key, row))
            .collect();
    }

    /// Removes the master and synthetic rows of an appointment.
    pub fn remove_rows(&mut self, key: &AppointmentKey) -> Vec<RowKey> {
        let doomed: Vec<RowKey> = self
            .calendar_rows
            .range(RowKey::master(*key)..)
            .take_while(|(k, _)| k.appointment == *key)
            .map(|(k, _)| *k)
            .collect();
        for k in &doomed {
            self.calendar_rows.remove(k);
        }
        doomed
    }

    /// Rows listed under the day `day` falls in, ordered by start time.
    pub fn rows_for_day(&self, day: Timestamp) -> Vec<&CalendarRow> {
        let day = start_of_day(day);
        let mut ret: Vec<&CalendarRow> = self
            .calendar_rows
            .values()
            .filter(|r| r.show_on_day == day)
            .collect();
        ret.sort_by_key(|r| (!r.full_time, r.start_date, r.key));
        ret
    }

    /// Recounts unread mails of `folder`. Returns the new count if it changed.
    pub fn recount_unread(&mut self, folder: &str) -> Option<usize> {
        let count = self
            .mails
            .get(folder)
            .map(|s| s.iter().filter(|m| !m.is_seen()).count())
            .unwrap_or(0);
        let previous = self.unread.insert(folder.to_string(), count);
        (previous != Some(count)).then_some(count)
    }

    pub fn unread_count(&self, folder: &str) -> usize {
        self.unread.get(folder).copied().unwrap_or(0)
    }

    pub fn total_unread(&self) -> usize {
        self.unread.values().sum()
    }
}
