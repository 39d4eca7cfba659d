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

use super::CycleReport;
use crate::{
    datastore::{events::ItemKey, keys, Datastore, DatastoreEvent},
    error::*,
    groupware::Module,
    log,
    utils::datetime::now,
};

impl Datastore {
    /// Refreshes the folder tree. A calendar or contacts cache built from a
    /// different folder set than the new one is rebuilt with a full fetch.
    /// Cached mail folders that disappeared are dropped.
    pub(crate) async fn reconcile_folders(&self, report: &mut CycleReport) -> Result<()> {
        let listing = self.fetch_folder_tree().await?;
        let changes = self.commit_folder_tree(listing)?;
        for (module, (_, after)) in changes {
            match module {
                Module::Calendar | Module::Contacts => {
                    let synced = self.with_state(|s| s.synced_folders(module))?;
                    if synced == after {
                        continue;
                    }
                    log::info!(
                        "{} folder set changed ({} -> {} folders), rebuilding its cache",
                        module,
                        synced.len(),
                        after.len()
                    );
                    if module == Module::Calendar {
                        let (start, end) = self.calendar.window(now());
                        self.reload_appointments(start, end).await?;
                    } else {
                        self.reload_contacts().await?;
                    }
                    report.rebuilt.push(module);
                    self.emit(DatastoreEvent::FolderSetChanged(module));
                }
                Module::Mail => {
                    let (removed, gone) = {
                        let mut state = self.state()?;
                        let gone: Vec<String> = state
                            .mails
                            .keys()
                            .filter(|f| !after.contains(*f))
                            .cloned()
                            .collect();
                        let mut removed = vec![];
                        for folder in &gone {
                            if let Some(snapshot) = state.mails.shift_remove(folder.as_str()) {
                                removed.extend(snapshot.records.into_iter().map(|m| {
                                    ItemKey::Mail {
                                        folder: folder.clone(),
                                        id: m.id,
                                    }
                                }));
                            }
                            state.unread.shift_remove(folder.as_str());
                        }
                        if !gone.is_empty() {
                            let folders: Vec<&String> = state.mails.keys().collect();
                            self.persist(keys::MAIL_FOLDERS, &folders, false);
                        }
                        (removed, gone)
                    };
                    if gone.is_empty() {
                        continue;
                    }
                    log::info!("Dropping cached mail of removed folders {:?}", gone);
                    for folder in &gone {
                        self.unpersist(&keys::mails(folder));
                    }
                    report.removed += removed.len();
                    report.rebuilt.push(module);
                    if !removed.is_empty() {
                        self.emit(DatastoreEvent::Removed(removed));
                    }
                    self.emit(DatastoreEvent::FolderSetChanged(module));
                }
                _ => {}
            }
        }
        self.emit(DatastoreEvent::ReconciliationComplete(Module::Folders));
        report.modules.push(Module::Folders);
        Ok(())
    }
}
