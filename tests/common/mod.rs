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

//! Scripted backend and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use futures::channel::oneshot;
use oxsync::{
    datastore::Alert,
    error::{Error, ErrorKind, NetworkErrorKind, Result},
    groupware::{
        CallResponse, GroupwareApi, Request, ResultFuture, ServerError, SessionInfo,
    },
    storage::{ScopedStore, DEFAULT_PREFIX},
    Datastore, DatastoreEvent, DatastoreEventConsumer, Settings, Storage, StorageMode, Timestamp,
};
use serde_json::{json, Value};

/// 2024-03-05T00:00:00Z
pub const D0: Timestamp = 1_709_596_800_000;
pub const HOUR: Timestamp = 3_600_000;
pub const DAY: Timestamp = 86_400_000;

/// Window the calendar tests reconcile over.
pub const WINDOW: (Timestamp, Timestamp) = (D0 - 7 * DAY, D0 + 28 * DAY);

/// Backend that answers `multiple` requests from a queue of scripted
/// replies and records every request it receives.
#[derive(Debug, Default)]
pub struct MockApi {
    replies: Mutex<VecDeque<Result<Vec<CallResponse>>>>,
    requests: Mutex<Vec<Request>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    invalidated: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, responses: Vec<CallResponse>) {
        self.replies.lock().unwrap().push_back(Ok(responses));
    }

    pub fn fail(&self, err: Error) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn fail_network(&self) {
        self.fail(
            Error::new("Connection refused")
                .set_kind(ErrorKind::Network(NetworkErrorKind::ConnectionFailed)),
        );
    }

    /// The next `multiple` call waits until the sender side fires.
    pub fn gate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn invalidated(&self) -> usize {
        self.invalidated.load(Ordering::SeqCst)
    }
}

impl GroupwareApi for MockApi {
    fn login(&self) -> ResultFuture<'_, SessionInfo> {
        Box::pin(async {
            Ok(SessionInfo {
                session: "8e1bf7dd".into(),
                user_id: 3,
                login_name: Some("alice".into()),
                locale: Some("en_US".into()),
            })
        })
    }

    fn logout(&self) -> ResultFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn multiple(&self, request: Request) -> ResultFuture<'_, Vec<CallResponse>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| {
                Err(Error::new("No scripted reply left").set_kind(ErrorKind::Bug))
            })
        })
    }

    fn invalidate_session(&self) {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collects the events a datastore sends.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<DatastoreEvent>>>);

impl EventLog {
    pub fn consumer(&self) -> DatastoreEventConsumer {
        let events = self.0.clone();
        DatastoreEventConsumer::new(Arc::new(move |event| {
            events.lock().unwrap().push(event);
        }))
    }

    pub fn take(&self) -> Vec<DatastoreEvent> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                DatastoreEvent::Alert(alert) => Some(alert.clone()),
                _ => None,
            })
            .collect()
    }
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.url = "https://groupware.example.com".into();
    settings.server.username = "alice".into();
    settings
}

/// A storage namespace no other test shares.
pub fn scoped_storage() -> Storage {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let origin = format!("tests-{}.example.com", COUNTER.fetch_add(1, Ordering::SeqCst));
    Storage::with_backend(
        Box::new(ScopedStore::open(&origin)),
        StorageMode::Scoped,
        DEFAULT_PREFIX.to_string(),
    )
}

pub fn store_with(api: Arc<MockApi>, storage: Storage) -> (Datastore, EventLog) {
    let log = EventLog::default();
    let store = Datastore::with_api(&settings(), storage, api, log.consumer());
    (store, log)
}

pub fn store(api: Arc<MockApi>) -> (Datastore, EventLog) {
    store_with(api, scoped_storage())
}

pub fn ok(data: Value, timestamp: Timestamp) -> CallResponse {
    CallResponse::with_data(data, Some(timestamp))
}

pub fn server_error(code: &str, message: &str) -> CallResponse {
    CallResponse::from_error(ServerError {
        code: Some(code.into()),
        error: message.into(),
        error_params: vec![],
        error_id: Some("-1234-5".into()),
    })
}

pub fn folder_row(id: &str, module: &str) -> Value {
    json!([id, "1", format!("{} {}", module, id), module, 1, false, true, null])
}

/// Reply to a folder tree fetch: one listing per content module.
pub fn folder_tree(calendar: &[&str], contacts: &[&str], mail: &[&str]) -> Vec<CallResponse> {
    let rows = |ids: &[&str], module: &str| -> Value {
        Value::Array(ids.iter().map(|id| folder_row(id, module)).collect())
    };
    vec![
        ok(json!({ "private": rows(calendar, "calendar") }), D0),
        ok(json!({ "private": rows(contacts, "contacts") }), D0),
        ok(json!({ "private": rows(mail, "mail") }), D0),
    ]
}

pub fn appointment_row(
    id: u64,
    folder: &str,
    start: Timestamp,
    end: Timestamp,
    title: &str,
) -> Value {
    json!([
        id, folder, D0, title, start, end, null, null, null, null, null, null, false, null
    ])
}

pub fn appointment_id_row(id: u64, folder: &str) -> Value {
    json!([id, folder, null])
}

pub fn contact_row(id: u64, folder: &str, first_name: &str, last_name: &str) -> Value {
    json!([
        id,
        folder,
        D0,
        format!("{} {}", first_name, last_name),
        first_name,
        last_name,
        format!("{}@example.com", first_name.to_lowercase()),
        null,
        null,
        null,
        null,
        null
    ])
}

pub fn contact_id_row(id: u64, folder: &str) -> Value {
    json!([id, folder])
}

pub fn mail_id_row(id: &str, folder: &str, flags: u32) -> Value {
    json!([id, folder, flags])
}

pub fn mail_row(id: &str, folder: &str, subject: &str, received: Timestamp, flags: u32) -> Value {
    json!([
        id,
        folder,
        false,
        [["Bob", "bob@example.com"]],
        [[null, "alice@example.com"]],
        subject,
        2048,
        received,
        received,
        flags,
        0
    ])
}
