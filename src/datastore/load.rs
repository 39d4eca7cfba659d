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

//! Initial full loads of folders, appointments, contacts and mail headers,
//! and the batched per-folder fetch they share with the reconciler.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    events::{diff_events, DatastoreEvent, ItemKey},
    keys,
    snapshot::Snapshot,
    state::{AppState, ParticipantDirectory},
    Datastore,
};
use crate::{
    error::*,
    groupware::{
        columns::*, parse_rows, Appointment, Call, CallResponse, Contact, DirectoryEntry, Folder,
        MailHeader, Module, ParticipantKind, Record, Request,
    },
    log,
    utils::datetime::{now, Timestamp},
};

/// Content modules whose folders make up the folder tree.
pub const FOLDER_MODULES: [Module; 3] = [Module::Calendar, Module::Contacts, Module::Mail];

/// Records of a batched fetch with one call per folder.
#[derive(Debug)]
pub struct FolderBatch<R> {
    /// Records per folder that was fetched successfully.
    pub records: BTreeMap<String, Vec<R>>,
    /// Folders whose call failed. Their errors went through the error
    /// handler.
    pub failed: BTreeSet<String>,
    /// Newest server timestamp of the successful calls.
    pub max_timestamp: Option<Timestamp>,
}

impl<R> Default for FolderBatch<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            failed: BTreeSet::new(),
            max_timestamp: None,
        }
    }
}

impl<R> FolderBatch<R> {
    pub fn is_listed(&self, folder: &str) -> bool {
        self.records.contains_key(folder)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values().flatten()
    }
}

impl Datastore {
    /// Sends one call per folder in a single request. An `Err` means the
    /// request as a whole failed. Failed calls and calls with malformed rows
    /// are reported to the error handler and listed in
    /// [`FolderBatch::failed`].
    pub(crate) async fn fetch_per_folder<R: Record>(
        &self,
        folders: &[String],
        columns: &ColumnMap,
        make_call: impl Fn(&str) -> Call,
    ) -> Result<FolderBatch<R>> {
        let mut batch = FolderBatch::default();
        if folders.is_empty() {
            return Ok(batch);
        }
        let mut request = Request::new();
        for folder in folders {
            request.add_call(make_call(folder.as_str()));
        }
        let expected = request.len();
        let responses = self.api.multiple(request).await?;
        check_reply_len(&responses, expected)?;
        for (folder, response) in folders.iter().zip(responses) {
            let response = match response.into_result() {
                Ok(response) => response,
                Err(err) => {
                    self.handle_error(&Error::from(err).set_summary(format!(
                        "Could not fetch {} folder {}",
                        columns.module, folder
                    )));
                    batch.failed.insert(folder.clone());
                    continue;
                }
            };
            let rows = response.rows();
            let (records, mut errors) = parse_rows::<R>(&rows, columns);
            if !errors.is_empty() {
                let count = errors.len();
                let err = errors.swap_remove(0);
                self.handle_error(&err.set_summary(format!(
                    "{} malformed {} rows in folder {}",
                    count, columns.module, folder
                )));
                batch.failed.insert(folder.clone());
                continue;
            }
            if let Some(ts) = response.timestamp {
                batch.max_timestamp = Some(batch.max_timestamp.map_or(ts, |m| m.max(ts)));
            }
            batch.records.insert(folder.clone(), records);
        }
        Ok(batch)
    }

    /// Lists the folders of every content module. Modules whose call failed
    /// are missing from the result.
    pub(crate) async fn fetch_folder_tree(&self) -> Result<BTreeMap<Module, Vec<Folder>>> {
        let mut request = Request::new();
        for module in FOLDER_MODULES {
            request.add_call(Call::all_visible(module));
        }
        let expected = request.len();
        let responses = self.api.multiple(request).await?;
        check_reply_len(&responses, expected)?;
        let mut ret = BTreeMap::new();
        for (module, response) in FOLDER_MODULES.into_iter().zip(responses) {
            let response = match response.into_result() {
                Ok(response) => response,
                Err(err) => {
                    self.handle_error(
                        &Error::from(err)
                            .set_summary(format!("Could not list {} folders", module)),
                    );
                    continue;
                }
            };
            let (mut folders, errors) = parse_rows::<Folder>(&response.rows(), &FOLDER_COLUMNS);
            if let Some(err) = errors.into_iter().next() {
                self.handle_error(
                    &err.set_summary(format!("Malformed {} folder listing", module)),
                );
                continue;
            }
            for folder in folders.iter_mut() {
                if folder.module.is_empty() {
                    folder.module = module.as_str().to_string();
                }
            }
            folders.retain(|f| f.content_module() == Some(module));
            ret.insert(module, folders);
        }
        Ok(ret)
    }

    /// Applies a folder listing and persists the folder tree. Returns the
    /// subscribed folder ids per listed module, before and after.
    pub(crate) fn commit_folder_tree(
        &self,
        listing: BTreeMap<Module, Vec<Folder>>,
    ) -> Result<BTreeMap<Module, (BTreeSet<String>, BTreeSet<String>)>> {
        let mut changes = BTreeMap::new();
        let events = {
            let mut state = self.state()?;
            let old: BTreeMap<String, Folder> = state
                .folders
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (module, folders) in listing {
                let before = state.folder_ids(module);
                state.replace_module_folders(module, folders);
                changes.insert(module, (before, state.folder_ids(module)));
            }
            let tree: Vec<&Folder> = state.folders.values().collect();
            self.persist(keys::FOLDER_TREE, &tree, false);
            let new: BTreeMap<String, Folder> = state
                .folders
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            diff_events(&old, &new, |k| ItemKey::Folder(k.clone()))
        };
        self.emit_all(events);
        Ok(changes)
    }

    /// Fetches the folder tree. Fails with [`ErrorKind::Busy`] while a
    /// refresh is running.
    pub async fn load_folders(&self) -> Result<()> {
        let _guard = self.exclusive("load the folder tree")?;
        let listing = match self.fetch_folder_tree().await {
            Ok(listing) => listing,
            Err(err) => {
                self.handle_error(&err);
                return Err(err);
            }
        };
        self.commit_folder_tree(listing)?;
        Ok(())
    }

    /// Fetches every appointment of the configured window.
    pub async fn load_appointments(&self) -> Result<()> {
        let (start, end) = self.calendar.window(now());
        self.load_appointments_window(start, end).await
    }

    pub async fn load_appointments_window(&self, start: Timestamp, end: Timestamp) -> Result<()> {
        let _guard = self.exclusive("load appointments")?;
        self.reload_appointments(start, end).await.map_err(|err| {
            self.handle_error(&err);
            err
        })
    }

    /// Replaces the appointment cache with a full fetch of `[start, end)`.
    /// Folders whose call failed keep their cached appointments.
    pub(crate) async fn reload_appointments(&self, start: Timestamp, end: Timestamp) -> Result<()> {
        let folders: Vec<String> =
            self.with_state(|s| s.folder_ids(Module::Calendar).into_iter().collect())?;
        let batch = self
            .fetch_per_folder::<Appointment>(&folders, &CALENDAR_COLUMNS, |f| {
                Call::all(&CALENDAR_COLUMNS, f).window(start, end)
            })
            .await?;
        let fetched: Vec<Appointment> = batch.iter().cloned().collect();
        let directory = self.resolve_participants(&fetched).await;

        let events = {
            let mut state = self.state()?;
            let current = state.folder_ids(Module::Calendar);
            let mut records: Vec<Appointment> = state
                .appointments
                .iter()
                .filter(|a| batch.failed.contains(&a.folder_id) && current.contains(&a.folder_id))
                .cloned()
                .collect();
            records.extend(fetched.into_iter().filter(|a| current.contains(&a.folder_id)));
            let last_update = batch
                .max_timestamp
                .unwrap_or(state.appointments.last_update);
            state.appointments = Snapshot::new(records, last_update);
            let synced: BTreeSet<String> = folders
                .into_iter()
                .filter(|f| current.contains(f))
                .collect();
            state.synced_folders.insert(Module::Calendar, synced);
            state.directory = directory;
            let old_rows = std::mem::take(&mut state.calendar_rows);
            state.rebuild_calendar_rows();
            self.persist_calendar(&state);
            diff_events(&old_rows, &state.calendar_rows, |k| ItemKey::CalendarRow(*k))
        };
        self.emit_all(events);
        Ok(())
    }

    pub(crate) fn persist_calendar(&self, state: &AppState) {
        self.persist(keys::APPOINTMENTS, &state.appointments, false);
        self.persist(
            keys::CALENDAR_FOLDERS,
            &state.synced_folders(Module::Calendar),
            false,
        );
        self.persist(keys::PARTICIPANTS, &state.directory, false);
    }

    /// Fetches every contact of the subscribed contact folders.
    pub async fn load_contacts(&self) -> Result<()> {
        let _guard = self.exclusive("load contacts")?;
        self.reload_contacts().await.map_err(|err| {
            self.handle_error(&err);
            err
        })
    }

    pub(crate) async fn reload_contacts(&self) -> Result<()> {
        let folders: Vec<String> =
            self.with_state(|s| s.folder_ids(Module::Contacts).into_iter().collect())?;
        let batch = self
            .fetch_per_folder::<Contact>(&folders, &CONTACT_COLUMNS, |f| {
                Call::all(&CONTACT_COLUMNS, f)
                    .sort(CONTACT_COLUMNS.code("last_name"))
                    .order(Some("asc".to_string()))
            })
            .await?;

        let events = {
            let mut state = self.state()?;
            let current = state.folder_ids(Module::Contacts);
            let old: BTreeMap<u64, Contact> = state
                .contacts
                .iter()
                .map(|c| (c.id, c.clone()))
                .collect();
            let mut records: Vec<Contact> = state
                .contacts
                .iter()
                .filter(|c| batch.failed.contains(&c.folder_id) && current.contains(&c.folder_id))
                .cloned()
                .collect();
            let last_update = batch.max_timestamp.unwrap_or(state.contacts.last_update);
            records.extend(
                batch
                    .records
                    .into_values()
                    .flatten()
                    .filter(|c| current.contains(&c.folder_id)),
            );
            records.sort_by_cached_key(Contact::sort_name);
            state.contacts = Snapshot::new(records, last_update);
            let synced: BTreeSet<String> = folders
                .into_iter()
                .filter(|f| current.contains(f))
                .collect();
            state.synced_folders.insert(Module::Contacts, synced);
            self.persist_contacts(&state);
            let new: BTreeMap<u64, Contact> = state
                .contacts
                .iter()
                .map(|c| (c.id, c.clone()))
                .collect();
            diff_events(&old, &new, |k| ItemKey::Contact(*k))
        };
        self.emit_all(events);
        Ok(())
    }

    pub(crate) fn persist_contacts(&self, state: &AppState) {
        self.persist(keys::CONTACTS, &state.contacts, false);
        self.persist(
            keys::CONTACT_FOLDERS,
            &state.synced_folders(Module::Contacts),
            false,
        );
    }

    /// Fetches the headers of a mail folder, newest first.
    pub async fn load_mails(&self, folder: &str) -> Result<()> {
        let _guard = self.exclusive("load mail headers")?;
        let mut request = Request::new();
        request.add_call(
            Call::all(&MAIL_COLUMNS, folder)
                .sort(MAIL_COLUMNS.code("received_date"))
                .order(Some("desc".to_string())),
        );
        let result: Result<(Vec<MailHeader>, Option<Timestamp>)> = async {
            let response = self
                .api
                .multiple(request)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::new("Empty reply to mail listing")
                        .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation))
                })?
                .into_result()
                .map_err(|err| {
                    Error::from(err).set_summary(format!("Could not list mail folder {}", folder))
                })?;
            let (headers, errors) = parse_rows::<MailHeader>(&response.rows(), &MAIL_COLUMNS);
            if let Some(err) = errors.into_iter().next() {
                return Err(err.set_summary(format!("Malformed mail listing of {}", folder)));
            }
            Ok((headers, response.timestamp))
        }
        .await;
        let (headers, timestamp) = match result {
            Ok(r) => r,
            Err(err) => {
                self.handle_error(&err);
                return Err(err);
            }
        };

        let mut events = {
            let mut state = self.state()?;
            if !state.folders.is_empty()
                && state.folders.get(folder).and_then(Folder::content_module)
                    != Some(Module::Mail)
            {
                log::debug!("Mail folder {} is gone, dropping its listing", folder);
                return Ok(());
            }
            let old = state
                .mails
                .insert(
                    folder.to_string(),
                    Snapshot::new(headers, timestamp.unwrap_or_else(now)),
                )
                .unwrap_or_default();
            let mut events = mail_diff(folder, &old, &state.mails[folder]);
            if let Some(count) = state.recount_unread(folder) {
                events.push(DatastoreEvent::UnreadChanged {
                    folder: folder.to_string(),
                    count,
                });
            }
            self.persist_mails(&state, folder);
            events
        };
        events.retain(|e| !e.is_empty_change());
        self.emit_all(events);
        Ok(())
    }

    pub(crate) fn persist_mails(&self, state: &AppState, folder: &str) {
        if let Some(snapshot) = state.mails.get(folder) {
            self.persist(&keys::mails(folder), snapshot, false);
        }
        let folders: Vec<&String> = state.mails.keys().collect();
        self.persist(keys::MAIL_FOLDERS, &folders, false);
    }

    /// Looks up participants of `appointments` missing from the directory.
    /// Lookup failures are reported and leave the directory as it was.
    pub(crate) async fn resolve_participants(
        &self,
        appointments: &[Appointment],
    ) -> ParticipantDirectory {
        let mut directory = self
            .with_state(|s| s.directory.clone())
            .unwrap_or_default();
        let mut wanted: BTreeMap<Module, BTreeSet<u64>> = BTreeMap::new();
        for participant in appointments.iter().flat_map(|a| a.participants.iter()) {
            let Some(id) = participant.id else {
                continue;
            };
            let module = match participant.kind {
                ParticipantKind::User => Module::User,
                ParticipantKind::Group => Module::Group,
                ParticipantKind::Resource | ParticipantKind::ResourceGroup => Module::Resource,
                ParticipantKind::External => continue,
            };
            if directory.lookup(participant.kind, id).is_none() {
                wanted.entry(module).or_default().insert(id);
            }
        }
        if wanted.is_empty() {
            return directory;
        }

        let mut request = Request::new();
        let mut targets = vec![];
        for (module, ids) in &wanted {
            let columns = match module {
                Module::User => USER_COLUMNS,
                Module::Group => GROUP_COLUMNS,
                _ => RESOURCE_COLUMNS,
            };
            let ids: Vec<u64> = ids.iter().copied().collect();
            request.add_call(Call::list(&columns, &ids));
            targets.push(columns);
        }
        let expected = request.len();
        let responses = match self
            .api
            .multiple(request)
            .await
            .and_then(|responses| check_reply_len(&responses, expected).map(|()| responses))
        {
            Ok(responses) => responses,
            Err(err) => {
                log::warn!("Could not resolve appointment participants: {}", err);
                return directory;
            }
        };
        for (columns, response) in targets.iter().zip(responses) {
            let response = match response.into_result() {
                Ok(response) => response,
                Err(err) => {
                    self.handle_error(&Error::from(err).set_summary(format!(
                        "Could not look up {} entries",
                        columns.module
                    )));
                    continue;
                }
            };
            let (entries, errors) = parse_rows::<DirectoryEntry>(&response.rows(), columns);
            for err in errors {
                log::warn!("Skipping malformed {} entry: {}", columns.module, err);
            }
            let map = match columns.module {
                Module::User => &mut directory.users,
                Module::Group => &mut directory.groups,
                _ => &mut directory.resources,
            };
            map.extend(entries.into_iter().map(|e| (e.id, e)));
        }
        directory
    }
}

/// Fails with a protocol violation unless the batched reply has one element
/// per call.
pub(crate) fn check_reply_len(responses: &[CallResponse], expected: usize) -> Result<()> {
    if responses.len() == expected {
        return Ok(());
    }
    Err(Error::new(format!(
        "Batched reply has {} elements for {} calls",
        responses.len(),
        expected
    ))
    .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation)))
}

/// Change events between two listings of one mail folder.
pub(crate) fn mail_diff(
    folder: &str,
    old: &Snapshot<MailHeader>,
    new: &Snapshot<MailHeader>,
) -> Vec<DatastoreEvent> {
    let old: BTreeMap<String, &MailHeader> = old.iter().map(|m| (m.key(), m)).collect();
    let new: BTreeMap<String, &MailHeader> = new.iter().map(|m| (m.key(), m)).collect();
    diff_events(&old, &new, |id| ItemKey::Mail {
        folder: folder.to_string(),
        id: id.clone(),
    })
}
