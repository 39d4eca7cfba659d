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

use serde_json::{json, Value};

use super::{log_phase, CycleReport, CyclePhase};
use crate::{
    datastore::{events::ItemKey, snapshot::Upsert, Datastore, DatastoreEvent},
    error::*,
    groupware::{
        columns::{CONTACT_COLUMNS, CONTACT_ID_COLUMNS},
        Call, Contact, Module, ObjectId,
    },
    log,
};

const MODULE: Module = Module::Contacts;

impl Datastore {
    /// One contacts cycle. Same phases as the calendar cycle, without a date
    /// window.
    pub(crate) async fn reconcile_contacts(&self, report: &mut CycleReport) -> Result<()> {
        log_phase(MODULE, CyclePhase::FetchingDelta);
        let (folders, mut working) = {
            let state = self.state()?;
            let folders: Vec<String> = state.folder_ids(MODULE).into_iter().collect();
            (folders, state.contacts.clone())
        };
        let since = working.last_update;
        let delta = self
            .fetch_per_folder::<Contact>(&folders, &CONTACT_COLUMNS, |f| {
                Call::updates(&CONTACT_COLUMNS, f, since)
            })
            .await?;

        log_phase(MODULE, CyclePhase::Merging);
        let mut inserted = BTreeSet::new();
        let mut updated = BTreeSet::new();
        for contact in delta.iter() {
            match working.upsert(contact.clone()) {
                Upsert::Inserted => {
                    inserted.insert(contact.id);
                }
                Upsert::Updated => {
                    updated.insert(contact.id);
                }
                Upsert::Unchanged => {}
            }
        }
        if delta.failed.is_empty() {
            if let Some(ts) = delta.max_timestamp {
                working.advance(ts);
            }
        } else {
            report.failed_folders.extend(delta.failed.iter().cloned());
        }

        log_phase(MODULE, CyclePhase::FetchingFullList);
        let full = self
            .fetch_per_folder::<ObjectId>(&folders, &CONTACT_ID_COLUMNS, |f| {
                Call::all(&CONTACT_ID_COLUMNS, f)
            })
            .await?;
        report.failed_folders.extend(full.failed.iter().cloned());
        let present: BTreeSet<u64> = full.iter().map(|o| o.id).collect();
        let mut gone =
            working.retain(|c| !(full.is_listed(&c.folder_id) && !present.contains(&c.id)));

        let missing: BTreeMap<String, Vec<Value>> = full
            .records
            .iter()
            .map(|(folder, ids)| {
                let objects: Vec<Value> = ids
                    .iter()
                    .filter(|o| !working.contains(&o.id))
                    .map(|o| json!({ "id": o.id, "folder": folder }))
                    .collect();
                (folder.clone(), objects)
            })
            .filter(|(_, objects)| !objects.is_empty())
            .collect();
        let missing_folders: Vec<String> = missing.keys().cloned().collect();
        let fetched = self
            .fetch_per_folder::<Contact>(&missing_folders, &CONTACT_COLUMNS, |f| {
                Call::list_objects(&CONTACT_COLUMNS, missing.get(f).cloned().unwrap_or_default())
            })
            .await?;
        report.failed_folders.extend(fetched.failed.iter().cloned());
        for contact in fetched.iter() {
            if working.upsert(contact.clone()) == Upsert::Inserted {
                inserted.insert(contact.id);
            }
        }
        working.records.sort_by_cached_key(Contact::sort_name);

        let events = {
            let mut state = self.state()?;
            let current = state.folder_ids(MODULE);
            let stale: BTreeSet<&String> =
                folders.iter().filter(|f| !current.contains(*f)).collect();
            if !stale.is_empty() {
                log::debug!("Dropping contact results of removed folders {:?}", stale);
                gone.extend(working.retain(|c| !stale.contains(&c.folder_id)));
            }
            let removed: Vec<ItemKey> = gone.iter().map(|c| ItemKey::Contact(c.id)).collect();
            let is_kept = |id: &u64| working.contains(id);
            let inserted: Vec<ItemKey> = inserted
                .into_iter()
                .filter(is_kept)
                .map(ItemKey::Contact)
                .collect();
            let updated: Vec<ItemKey> = updated
                .into_iter()
                .filter(is_kept)
                .map(ItemKey::Contact)
                .collect();
            report.inserted += inserted.len();
            report.updated += updated.len();
            report.removed += removed.len();
            state.contacts = working;
            self.persist_contacts(&state);
            [
                DatastoreEvent::Removed(removed),
                DatastoreEvent::Inserted(inserted),
                DatastoreEvent::Updated(updated),
            ]
        };
        self.emit_all(events.into_iter().filter(|e| !e.is_empty_change()));
        self.emit(DatastoreEvent::ReconciliationComplete(MODULE));
        report.modules.push(MODULE);
        log_phase(MODULE, CyclePhase::Reconciled);
        Ok(())
    }
}
