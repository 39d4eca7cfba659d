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

//! Mail folders have no usable change feed: every cycle lists the ids and
//! flags of each cached folder, fetches headers of new ids, updates changed
//! flags and drops ids the server no longer lists.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::{log_phase, CycleReport, CyclePhase};
use crate::{
    datastore::{events::ItemKey, Datastore, DatastoreEvent},
    error::*,
    groupware::{
        columns::{MAIL_COLUMNS, MAIL_ID_COLUMNS},
        Call, MailFlags, MailHeader, MailId, Module,
    },
    log,
    utils::datetime::now,
};

const MODULE: Module = Module::Mail;

impl Datastore {
    pub(crate) async fn reconcile_mail(&self, report: &mut CycleReport) -> Result<()> {
        let (folders, cached) = {
            let state = self.state()?;
            let known = state.folder_ids(MODULE);
            let folders: Vec<String> = state
                .mails
                .keys()
                .filter(|f| state.folders.is_empty() || known.contains(*f))
                .cloned()
                .collect();
            let cached: BTreeMap<String, BTreeSet<String>> = folders
                .iter()
                .map(|f| {
                    let ids = state.mails[f.as_str()].iter().map(|m| m.id.clone()).collect();
                    (f.clone(), ids)
                })
                .collect();
            (folders, cached)
        };

        log_phase(MODULE, CyclePhase::FetchingFullList);
        let listing = self
            .fetch_per_folder::<MailId>(&folders, &MAIL_ID_COLUMNS, |f| {
                Call::all(&MAIL_ID_COLUMNS, f)
                    .sort(MAIL_COLUMNS.code("received_date"))
                    .order(Some("desc".to_string()))
            })
            .await?;
        report.failed_folders.extend(listing.failed.iter().cloned());

        let new_ids: BTreeMap<String, Vec<String>> = listing
            .records
            .iter()
            .map(|(folder, ids)| {
                let known = cached.get(folder);
                let new: Vec<String> = ids
                    .iter()
                    .filter(|m| !known.map_or(false, |k| k.contains(&m.id)))
                    .map(|m| m.id.clone())
                    .collect();
                (folder.clone(), new)
            })
            .filter(|(_, new)| !new.is_empty())
            .collect();
        let header_folders: Vec<String> = new_ids.keys().cloned().collect();
        let headers = self
            .fetch_per_folder::<MailHeader>(&header_folders, &MAIL_COLUMNS, |f| {
                let data = new_ids
                    .get(f)
                    .map(|ids| {
                        ids.iter()
                            .map(|id| json!({ "id": id, "folder": f }))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Call::list_objects(&MAIL_COLUMNS, data)
            })
            .await?;
        report.failed_folders.extend(headers.failed.iter().cloned());

        log_phase(MODULE, CyclePhase::Merging);
        let mut events = vec![];
        {
            let mut state = self.state()?;
            for (folder, ids) in &listing.records {
                let flags: BTreeMap<&str, MailFlags> =
                    ids.iter().map(|m| (m.id.as_str(), m.flags)).collect();
                let order: BTreeMap<&str, usize> = ids
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (m.id.as_str(), i))
                    .collect();
                let item = |id: &str| ItemKey::Mail {
                    folder: folder.clone(),
                    id: id.to_string(),
                };
                let Some(snapshot) = state.mails.get_mut(folder.as_str()) else {
                    log::debug!("Mail folder {} was dropped during refresh", folder);
                    continue;
                };

                let gone = snapshot.retain(|m| flags.contains_key(m.id.as_str()));
                let mut updated = vec![];
                for header in snapshot.records.iter_mut() {
                    if let Some(new_flags) = flags.get(header.id.as_str()) {
                        if header.flags != *new_flags {
                            header.flags = *new_flags;
                            updated.push(item(&header.id));
                        }
                    }
                }
                let mut inserted = vec![];
                let headers_failed = headers.failed.contains(folder);
                if let Some(new_headers) = headers.records.get(folder) {
                    for header in new_headers {
                        if flags.contains_key(header.id.as_str())
                            && !snapshot.contains(&header.id)
                        {
                            inserted.push(item(&header.id));
                            snapshot.records.push(header.clone());
                        }
                    }
                }
                snapshot
                    .records
                    .sort_by_key(|m| order.get(m.id.as_str()).copied().unwrap_or(usize::MAX));
                if !headers_failed {
                    snapshot.advance(listing.max_timestamp.unwrap_or_else(now));
                }

                report.inserted += inserted.len();
                report.updated += updated.len();
                report.removed += gone.len();
                events.push(DatastoreEvent::Removed(
                    gone.iter().map(|m| item(&m.id)).collect(),
                ));
                events.push(DatastoreEvent::Inserted(inserted));
                events.push(DatastoreEvent::Updated(updated));
                if let Some(count) = state.recount_unread(folder) {
                    events.push(DatastoreEvent::UnreadChanged {
                        folder: folder.clone(),
                        count,
                    });
                }
                self.persist_mails(&state, folder);
            }
        }
        events.retain(|e| !e.is_empty_change());
        self.emit_all(events);
        self.emit(DatastoreEvent::ReconciliationComplete(MODULE));
        report.modules.push(MODULE);
        log_phase(MODULE, CyclePhase::Reconciled);
        Ok(())
    }
}
