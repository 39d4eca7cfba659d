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
    datastore::{
        calendar_rows, events::ItemKey, snapshot::Upsert, Datastore, DatastoreEvent, RowKey,
    },
    error::*,
    groupware::{
        columns::{CALENDAR_COLUMNS, CALENDAR_ID_COLUMNS},
        Appointment, AppointmentKey, Call, Module, ObjectId, Record,
    },
    log,
    utils::datetime::{timestamp_to_string, Timestamp},
};

const MODULE: Module = Module::Calendar;

impl Datastore {
    /// One calendar cycle over the window `[start, end)`.
    pub(crate) async fn reconcile_calendar(
        &self,
        start: Timestamp,
        end: Timestamp,
        report: &mut CycleReport,
    ) -> Result<()> {
        log_phase(MODULE, CyclePhase::FetchingDelta);
        let (folders, mut working) = {
            let state = self.state()?;
            let folders: Vec<String> = state.folder_ids(MODULE).into_iter().collect();
            (folders, state.appointments.clone())
        };
        let since = working.last_update;
        log::debug!(
            "Fetching calendar changes since {} in {} folders for {} - {}",
            timestamp_to_string(since),
            folders.len(),
            timestamp_to_string(start),
            timestamp_to_string(end)
        );
        let delta = self
            .fetch_per_folder::<Appointment>(&folders, &CALENDAR_COLUMNS, |f| {
                Call::updates(&CALENDAR_COLUMNS, f, since).window(start, end)
            })
            .await?;

        log_phase(MODULE, CyclePhase::Merging);
        let mut touched: BTreeSet<AppointmentKey> = BTreeSet::new();
        for appointment in delta.iter() {
            match working.upsert(appointment.clone()) {
                Upsert::Inserted => {
                    report.inserted += 1;
                    touched.insert(appointment.key());
                }
                Upsert::Updated => {
                    report.updated += 1;
                    touched.insert(appointment.key());
                }
                Upsert::Unchanged => {}
            }
        }
        if delta.failed.is_empty() {
            if let Some(ts) = delta.max_timestamp {
                working.advance(ts);
            }
        } else {
            log::warn!(
                "Calendar changes of {} folders could not be fetched, keeping timestamp {}",
                delta.failed.len(),
                working.last_update
            );
            report.failed_folders.extend(delta.failed.iter().cloned());
        }

        log_phase(MODULE, CyclePhase::FetchingFullList);
        let full = self
            .fetch_per_folder::<ObjectId>(&folders, &CALENDAR_ID_COLUMNS, |f| {
                Call::all(&CALENDAR_ID_COLUMNS, f).window(start, end)
            })
            .await?;
        report.failed_folders.extend(full.failed.iter().cloned());
        let present: BTreeSet<AppointmentKey> =
            full.iter().map(ObjectId::appointment_key).collect();
        let mut gone = working.retain(|a| {
            !(full.is_listed(&a.folder_id)
                && a.overlaps(start, end)
                && !present.contains(&a.key()))
        });

        let missing: BTreeMap<String, Vec<Value>> = full
            .records
            .iter()
            .map(|(folder, ids)| {
                let objects: Vec<Value> = ids
                    .iter()
                    .filter(|o| !working.contains(&o.appointment_key()))
                    .map(|o| match o.recurrence_position {
                        Some(position) => json!({
                            "id": o.id,
                            "folder": folder,
                            "recurrence_position": position,
                        }),
                        None => json!({ "id": o.id, "folder": folder }),
                    })
                    .collect();
                (folder.clone(), objects)
            })
            .filter(|(_, objects)| !objects.is_empty())
            .collect();
        let missing_folders: Vec<String> = missing.keys().cloned().collect();
        if !missing_folders.is_empty() {
            log::debug!(
                "Fetching listed appointments missing from the cache in {:?}",
                missing_folders
            );
        }
        let fetched = self
            .fetch_per_folder::<Appointment>(&missing_folders, &CALENDAR_COLUMNS, |f| {
                Call::list_objects(&CALENDAR_COLUMNS, missing.get(f).cloned().unwrap_or_default())
            })
            .await?;
        report.failed_folders.extend(fetched.failed.iter().cloned());
        for appointment in fetched.iter() {
            if working.upsert(appointment.clone()) == Upsert::Inserted {
                report.inserted += 1;
                touched.insert(appointment.key());
            }
        }

        let changed: Vec<Appointment> = touched
            .iter()
            .filter_map(|k| working.get(k).cloned())
            .collect();
        let directory = self.resolve_participants(&changed).await;

        let events = {
            let mut state = self.state()?;
            let current = state.folder_ids(MODULE);
            let stale: BTreeSet<&String> =
                folders.iter().filter(|f| !current.contains(*f)).collect();
            if !stale.is_empty() {
                log::debug!("Dropping calendar results of removed folders {:?}", stale);
                gone.extend(working.retain(|a| !stale.contains(&a.folder_id)));
            }
            report.removed += gone.len();
            state.appointments = working;

            let mut removed: Vec<RowKey> = vec![];
            let mut inserted: Vec<RowKey> = vec![];
            let mut updated: Vec<RowKey> = vec![];
            for appointment in &gone {
                removed.extend(state.remove_rows(&appointment.key()));
            }
            for key in &touched {
                let Some(appointment) = state.appointments.get(key).cloned() else {
                    continue;
                };
                let before = state.remove_rows(key);
                for row in calendar_rows::expand(&appointment) {
                    if before.contains(&row.key) {
                        updated.push(row.key);
                    } else {
                        inserted.push(row.key);
                    }
                    state.calendar_rows.insert(row.key, row);
                }
                removed.extend(
                    before
                        .into_iter()
                        .filter(|k| !state.calendar_rows.contains_key(k)),
                );
            }
            state.directory = directory;
            self.persist_calendar(&state);
            log::debug!(
                "Calendar cache now holds {} appointments as of {}",
                state.appointments.len(),
                timestamp_to_string(state.appointments.last_update)
            );
            let to_items = |keys: Vec<RowKey>| -> Vec<ItemKey> {
                keys.into_iter().map(ItemKey::CalendarRow).collect()
            };
            [
                DatastoreEvent::Removed(to_items(removed)),
                DatastoreEvent::Inserted(to_items(inserted)),
                DatastoreEvent::Updated(to_items(updated)),
            ]
        };
        self.emit_all(events.into_iter().filter(|e| !e.is_empty_change()));
        self.emit(DatastoreEvent::ReconciliationComplete(MODULE));
        report.modules.push(MODULE);
        log_phase(MODULE, CyclePhase::Reconciled);
        Ok(())
    }
}
