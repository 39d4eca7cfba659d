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

//! Startup restore of the cached state from storage, used while offline.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;

use super::{keys, snapshot::Snapshot, state::*, Datastore};
use crate::{
    error::*,
    groupware::{Appointment, Contact, Folder, MailHeader, Module},
    log,
    storage::Storage,
};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RestoreStep {
    FolderTree,
    UserData,
    Contacts,
    ContactFolders,
    Appointments,
    CalendarFolders,
    Participants,
    MailFolders,
    /// The header list of one mail folder.
    Mails,
}

/// What [`Datastore::restore_data`] found.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<RestoreStep>,
    /// Steps without a stored entry.
    pub missing: Vec<RestoreStep>,
    /// Steps whose entry could not be read. Their state stays at the default.
    pub failed: Vec<(RestoreStep, Error)>,
    /// Mail folders whose header list was restored.
    pub mail_folders: Vec<String>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn has_failed(&self, step: RestoreStep) -> bool {
        self.failed.iter().any(|(s, _)| *s == step)
    }

    fn load<T: DeserializeOwned>(
        &mut self,
        storage: &Storage,
        step: RestoreStep,
        key: &str,
        persistent: bool,
    ) -> Option<T> {
        match storage.try_get_json::<T>(key, persistent) {
            Ok(Some(value)) => {
                self.restored.push(step);
                Some(value)
            }
            Ok(None) => {
                self.missing.push(step);
                None
            }
            Err(err) => {
                log::error!("Could not restore {:?} from storage: {}", step, err);
                self.failed.push((step, err));
                None
            }
        }
    }
}

impl Datastore {
    /// Loads the cached state back from storage. Every piece is read on its
    /// own: a missing or unreadable entry leaves that piece at its default
    /// and the rest is still restored.
    ///
    /// Fails if a session is open, since the state then belongs to the
    /// server.
    pub fn restore_data(&self) -> Result<RestoreReport> {
        let storage = self.storage();
        let mut state = self.state()?;
        if state.has_session() {
            return Err(Error::new(
                "Cannot restore cached data while a session is open",
            )
            .set_kind(ErrorKind::NotSupported));
        }
        let mut report = RestoreReport::default();

        if let Some(folders) =
            report.load::<Vec<Folder>>(storage, RestoreStep::FolderTree, keys::FOLDER_TREE, false)
        {
            state.set_folders(folders);
        }

        if let Some(user) =
            report.load::<UserData>(storage, RestoreStep::UserData, keys::USER_DATA, true)
        {
            state.user = Some(user);
        }

        if let Some(contacts) = report.load::<Snapshot<Contact>>(
            storage,
            RestoreStep::Contacts,
            keys::CONTACTS,
            false,
        ) {
            state.contacts = contacts;
        }
        if let Some(folders) = report.load::<BTreeSet<String>>(
            storage,
            RestoreStep::ContactFolders,
            keys::CONTACT_FOLDERS,
            false,
        ) {
            state.synced_folders.insert(Module::Contacts, folders);
        }

        if let Some(appointments) = report.load::<Snapshot<Appointment>>(
            storage,
            RestoreStep::Appointments,
            keys::APPOINTMENTS,
            false,
        ) {
            state.appointments = appointments;
        }
        if let Some(folders) = report.load::<BTreeSet<String>>(
            storage,
            RestoreStep::CalendarFolders,
            keys::CALENDAR_FOLDERS,
            false,
        ) {
            state.synced_folders.insert(Module::Calendar, folders);
        }
        if let Some(directory) = report.load::<ParticipantDirectory>(
            storage,
            RestoreStep::Participants,
            keys::PARTICIPANTS,
            false,
        ) {
            state.directory = directory;
        }
        state.rebuild_calendar_rows();

        let mail_folders = report
            .load::<Vec<String>>(storage, RestoreStep::MailFolders, keys::MAIL_FOLDERS, false)
            .unwrap_or_default();
        for folder in mail_folders {
            if let Some(mails) = report.load::<Snapshot<MailHeader>>(
                storage,
                RestoreStep::Mails,
                &keys::mails(&folder),
                false,
            ) {
                state.mails.insert(folder.clone(), mails);
                state.recount_unread(&folder);
                report.mail_folders.push(folder);
            }
        }

        log::info!(
            "Restored {} folders, {} contacts, {} appointments and {} mail folders from {} \
             storage ({} steps failed)",
            state.folders.len(),
            state.contacts.len(),
            state.appointments.len(),
            state.mails.len(),
            storage.mode(),
            report.failed.len()
        );
        Ok(report)
    }
}
