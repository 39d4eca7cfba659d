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

//! Reconciliation of the cached lists with the server.
//!
//! A cycle of a folder scoped module fetches the records changed since the
//! snapshot's `last_update` ([`CyclePhase::FetchingDelta`]), merges them into
//! a working copy of the snapshot ([`CyclePhase::Merging`]), then fetches the
//! full id list of the same folders ([`CyclePhase::FetchingFullList`]) and
//! drops cached records missing from it. The working copy replaces the cached
//! snapshot only once every fetch succeeded, so a failed request leaves the
//! cache and its timestamp as they were.
//!
//! At most one cycle runs at a time. [`Datastore::refresh`] returns
//! [`RefreshOutcome::AlreadyRunning`] while another one is in flight.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    datastore::Datastore,
    error::*,
    groupware::Module,
    log,
    utils::datetime::Timestamp,
};

pub mod calendar;
pub mod contacts;
pub mod folders;
pub mod mail;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshScope {
    /// Folder tree, then calendar, contacts and mail.
    All,
    Folders,
    Calendar,
    Contacts,
    Mail,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CyclePhase {
    Idle,
    FetchingDelta,
    Merging,
    FetchingFullList,
    Reconciled,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                Self::Idle => "idle",
                Self::FetchingDelta => "fetching delta",
                Self::Merging => "merging",
                Self::FetchingFullList => "fetching full list",
                Self::Reconciled => "reconciled",
            }
        )
    }
}

/// What a refresh changed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleReport {
    pub modules: Vec<Module>,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Folders whose calls failed during the refresh.
    pub failed_folders: Vec<String>,
    /// Modules whose cache was rebuilt after their folder set changed.
    pub rebuilt: Vec<Module>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefreshOutcome {
    AlreadyRunning,
    Completed(CycleReport),
}

/// Holds the refresh flag and clears it when dropped.
#[derive(Debug)]
pub struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) fn log_phase(module: Module, phase: CyclePhase) {
    log::debug!("{} cycle: {}", module, phase);
}

impl Datastore {
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Takes the refresh flag for a full load, so that a load and a refresh
    /// never commit over each other.
    pub(crate) fn exclusive(&self, what: &str) -> Result<RefreshGuard<'_>> {
        RefreshGuard::acquire(&self.refreshing).ok_or_else(|| {
            log::debug!("Cannot {} while a refresh is running", what);
            Error::new(format!("Cannot {} while a refresh is running", what))
                .set_kind(ErrorKind::Busy)
        })
    }

    /// Runs one reconciliation cycle over `scope`. A request failing as a
    /// whole aborts the refresh: the error is reported to the error handler
    /// and returned, and the caches of the aborted module stay untouched.
    pub async fn refresh(&self, scope: RefreshScope) -> Result<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            log::debug!("Refresh of {:?} skipped, another one is running", scope);
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        let mut report = CycleReport::default();
        let result = match scope {
            RefreshScope::All => self.refresh_all(&mut report).await,
            RefreshScope::Folders => self.reconcile_folders(&mut report).await,
            RefreshScope::Calendar => {
                let (start, end) = self.calendar.window(crate::utils::datetime::now());
                self.reconcile_calendar(start, end, &mut report).await
            }
            RefreshScope::Contacts => self.reconcile_contacts(&mut report).await,
            RefreshScope::Mail => self.reconcile_mail(&mut report).await,
        };
        self.finish(result, report)
    }

    pub async fn refresh_folders(&self) -> Result<RefreshOutcome> {
        self.refresh(RefreshScope::Folders).await
    }

    /// Runs a calendar cycle over `[start, end)` instead of the configured
    /// window.
    pub async fn refresh_calendar_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        let mut report = CycleReport::default();
        let result = self.reconcile_calendar(start, end, &mut report).await;
        self.finish(result, report)
    }

    async fn refresh_all(&self, report: &mut CycleReport) -> Result<()> {
        self.reconcile_folders(report).await?;
        let (start, end) = self.calendar.window(crate::utils::datetime::now());
        if !report.rebuilt.contains(&Module::Calendar) {
            self.reconcile_calendar(start, end, report).await?;
        }
        if !report.rebuilt.contains(&Module::Contacts) {
            self.reconcile_contacts(report).await?;
        }
        self.reconcile_mail(report).await
    }

    fn finish(&self, result: Result<()>, report: CycleReport) -> Result<RefreshOutcome> {
        match result {
            Ok(()) => {
                log::debug!("Refresh done: {:?}", report);
                Ok(RefreshOutcome::Completed(report))
            }
            Err(err) => {
                self.handle_error(&err);
                Err(err)
            }
        }
    }
}
