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

//! Notifications sent from the data store to the view layer.

use std::{fmt, ops::Deref, sync::Arc};

use super::calendar_rows::RowKey;
use crate::{
    error::Error,
    groupware::{error::categorize, ErrorCategory, Module, ServerError},
};

/// Identifies one displayed item.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ItemKey {
    /// A calendar row: an appointment's master row or one of its day rows.
    CalendarRow(RowKey),
    Contact(u64),
    Mail { folder: String, id: String },
    Folder(String),
}

/// A user facing error notice.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub category: ErrorCategory,
    /// Server side error id, for support requests.
    pub error_id: Option<String>,
}

impl Alert {
    pub fn from_error(err: &Error) -> Self {
        let category = categorize(err);
        let title = match category {
            ErrorCategory::SessionExpired => "Session expired",
            ErrorCategory::BadCredentials => "Login failed",
            ErrorCategory::Transport => "Connection error",
            ErrorCategory::Generic => "Error",
        };
        let server = err.source_as::<ServerError>();
        let message = match (category, server) {
            (_, Some(server)) => server.message(),
            (ErrorCategory::Transport, None) => format!("{} ({})", err.summary, err.kind),
            (_, None) => err.summary.to_string(),
        };
        Self {
            title: title.to_string(),
            message,
            category,
            error_id: server.and_then(|s| s.error_id.clone()),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}: {}", self.title, self.message)?;
        if let Some(id) = self.error_id.as_deref() {
            write!(fmt, " [{}]", id)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatastoreEvent {
    Inserted(Vec<ItemKey>),
    Updated(Vec<ItemKey>),
    Removed(Vec<ItemKey>),
    /// The folder set of a module changed and its cache was rebuilt.
    FolderSetChanged(Module),
    UnreadChanged { folder: String, count: usize },
    ReconciliationComplete(Module),
    Alert(Alert),
}

#[derive(Clone)]
pub struct DatastoreEventConsumer(Arc<dyn Fn(DatastoreEvent) + Send + Sync>);

impl DatastoreEventConsumer {
    pub fn new(b: Arc<dyn Fn(DatastoreEvent) + Send + Sync>) -> Self {
        Self(b)
    }

    /// A consumer that drops every event.
    pub fn discard() -> Self {
        Self(Arc::new(|_| {}))
    }
}

impl fmt::Debug for DatastoreEventConsumer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DatastoreEventConsumer")
    }
}

impl Deref for DatastoreEventConsumer {
    type Target = dyn Fn(DatastoreEvent) + Send + Sync;

    fn deref(&self) -> &Self::Target {
        &(*self.0)
    }
}

/// `Removed`, `Inserted` and `Updated` events turning `old` into `new`. Empty
/// events are left out.
pub fn diff_events<K: Ord, V: PartialEq>(
    old: &std::collections::BTreeMap<K, V>,
    new: &std::collections::BTreeMap<K, V>,
    item: impl Fn(&K) -> ItemKey,
) -> Vec<DatastoreEvent> {
    let removed: Vec<ItemKey> = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .map(&item)
        .collect();
    let mut inserted = vec![];
    let mut updated = vec![];
    for (k, v) in new {
        match old.get(k) {
            None => inserted.push(item(k)),
            Some(prev) if prev != v => updated.push(item(k)),
            Some(_) => {}
        }
    }
    [
        DatastoreEvent::Removed(removed),
        DatastoreEvent::Inserted(inserted),
        DatastoreEvent::Updated(updated),
    ]
    .into_iter()
    .filter(|e| !e.is_empty_change())
    .collect()
}

impl DatastoreEvent {
    /// Whether this is an `Inserted`, `Updated` or `Removed` event without
    /// items.
    pub fn is_empty_change(&self) -> bool {
        match self {
            Self::Inserted(keys) | Self::Updated(keys) | Self::Removed(keys) => keys.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::{ErrorKind, NetworkErrorKind};

    #[test]
    fn test_events_diff() {
        let old: BTreeMap<u64, &str> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
        let new: BTreeMap<u64, &str> = [(2, "b"), (3, "x"), (4, "d")].into_iter().collect();
        assert_eq!(
            diff_events(&old, &new, |k| ItemKey::Contact(*k)),
            vec![
                DatastoreEvent::Removed(vec![ItemKey::Contact(1)]),
                DatastoreEvent::Inserted(vec![ItemKey::Contact(4)]),
                DatastoreEvent::Updated(vec![ItemKey::Contact(3)]),
            ]
        );
        assert!(diff_events(&old, &old, |k| ItemKey::Contact(*k)).is_empty());
    }

    #[test]
    fn test_events_alert_from_error() {
        let err: Error = ServerError {
            code: Some("LGI-0006".into()),
            error: "The user name or password is incorrect.".into(),
            error_params: vec![],
            error_id: Some("1-2".into()),
        }
        .into();
        let alert = Alert::from_error(&err);
        assert_eq!(alert.category, ErrorCategory::BadCredentials);
        assert_eq!(alert.title, "Login failed");
        assert_eq!(alert.message, "The user name or password is incorrect.");
        assert_eq!(alert.error_id.as_deref(), Some("1-2"));

        let err = Error::new("Request to /ajax/multiple failed: HTTP 503 Service Unavailable")
            .set_kind(ErrorKind::Network(NetworkErrorKind::ServiceUnavailable));
        let alert = Alert::from_error(&err);
        assert_eq!(alert.category, ErrorCategory::Transport);
        assert!(alert.message.contains("503 Service Unavailable"));
        assert_eq!(alert.error_id, None);
    }
}
