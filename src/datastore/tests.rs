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

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use futures::executor::block_on;

use super::*;
use crate::{
    groupware::{
        Appointment, CallResponse, Contact, Folder, MailFlags, MailHeader, Request, ResultFuture,
    },
    storage::{ScopedStore, StorageMode},
    utils::datetime::{Timestamp, DAY},
};

const D0: Timestamp = 1_709_596_800_000;
const HOUR: Timestamp = 3_600_000;

#[derive(Debug, Default)]
struct OfflineApi;

impl GroupwareApi for OfflineApi {
    fn login(&self) -> ResultFuture<'_, SessionInfo> {
        Box::pin(async {
            Ok(SessionInfo {
                session: "8e1bf7dd".into(),
                user_id: 3,
                login_name: Some("alice".into()),
                locale: Some("de_DE".into()),
            })
        })
    }

    fn logout(&self) -> ResultFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn multiple(&self, _request: Request) -> ResultFuture<'_, Vec<CallResponse>> {
        Box::pin(async {
            Err(Error::new("Connection refused")
                .set_kind(ErrorKind::Network(NetworkErrorKind::ConnectionFailed)))
        })
    }
}

fn scoped_storage() -> Storage {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let origin = format!("datastore-{}.test", COUNTER.fetch_add(1, Ordering::SeqCst));
    Storage::with_backend(
        Box::new(ScopedStore::open(&origin)),
        StorageMode::Scoped,
        crate::storage::DEFAULT_PREFIX.to_string(),
    )
}

fn datastore_with(storage: Storage) -> (Datastore, Arc<Mutex<Vec<DatastoreEvent>>>) {
    let events = Arc::new(Mutex::new(vec![]));
    let sink = events.clone();
    let consumer = DatastoreEventConsumer::new(Arc::new(move |event| {
        sink.lock().unwrap().push(event);
    }));
    let mut settings = Settings::default();
    settings.server.url = "https://groupware.example.com".into();
    settings.server.username = "alice".into();
    (
        Datastore::with_api(&settings, storage, Arc::new(OfflineApi), consumer),
        events,
    )
}

fn folder(id: &str, module: &str) -> Folder {
    Folder {
        id: id.into(),
        folder_id: Some("1".into()),
        title: id.into(),
        module: module.into(),
        kind: Some(1),
        subfolders: false,
        subscribed: Some(true),
        last_modified: None,
    }
}

fn appointment(id: u64, start: Timestamp, end: Timestamp) -> Appointment {
    Appointment {
        id,
        folder_id: "25".into(),
        last_modified: None,
        title: Some(format!("appointment {}", id)),
        start_date: start,
        end_date: end,
        note: None,
        recurrence_id: None,
        recurrence_position: None,
        recurrence_type: None,
        participants: vec![],
        location: None,
        full_time: false,
        shown_as: None,
    }
}

fn contact(id: u64) -> Contact {
    Contact {
        id,
        folder_id: "6".into(),
        last_modified: None,
        display_name: Some(format!("contact {}", id)),
        first_name: None,
        last_name: None,
        email1: None,
        email2: None,
        email3: None,
        telephone_business1: None,
        cellular_telephone1: None,
        company: None,
    }
}

fn mail(id: &str, flags: MailFlags) -> MailHeader {
    MailHeader {
        id: id.into(),
        folder_id: "default0/INBOX".into(),
        attachment: false,
        from: vec![],
        to: vec![],
        subject: Some(format!("mail {}", id)),
        size: None,
        sent_date: None,
        received_date: None,
        flags,
        color_label: None,
    }
}

fn write_cache(storage: &Storage) {
    storage
        .set_json(
            keys::FOLDER_TREE,
            &vec![folder("25", "calendar"), folder("6", "contacts")],
            false,
        )
        .unwrap();
    storage
        .set_json(
            keys::USER_DATA,
            &UserData {
                user_id: 3,
                login_name: "alice".into(),
                server: "https://groupware.example.com".into(),
                language: None,
            },
            true,
        )
        .unwrap();
    storage
        .set_json(keys::CONTACTS, &Snapshot::new(vec![contact(1), contact(2)], 40), false)
        .unwrap();
    storage
        .set_json(keys::CONTACT_FOLDERS, &["6"], false)
        .unwrap();
    storage
        .set_json(
            keys::APPOINTMENTS,
            &Snapshot::new(
                vec![
                    appointment(1, D0, D0 + 3 * DAY),
                    appointment(2, D0 + DAY + 9 * HOUR, D0 + DAY + 10 * HOUR),
                ],
                50,
            ),
            false,
        )
        .unwrap();
    storage
        .set_json(keys::MAIL_FOLDERS, &["default0/INBOX"], false)
        .unwrap();
    storage
        .set_json(
            &keys::mails("default0/INBOX"),
            &Snapshot::new(
                vec![mail("1", MailFlags::SEEN), mail("2", MailFlags::empty())],
                60,
            ),
            false,
        )
        .unwrap();
}

#[test]
fn test_datastore_restore_empty() {
    let (store, _) = datastore_with(scoped_storage());
    let report = store.restore_data().unwrap();
    assert!(report.is_clean());
    assert!(report.restored.is_empty());
    assert!(report.missing.contains(&RestoreStep::FolderTree));
    assert!(report.missing.contains(&RestoreStep::MailFolders));
    let state = store.state().unwrap();
    assert!(state.folders.is_empty());
    assert!(state.appointments.is_empty());
    assert_eq!(state.appointments.last_update, 0);
}

#[test]
fn test_datastore_restore_data() {
    let storage = scoped_storage();
    write_cache(&storage);
    let (store, _) = datastore_with(storage);
    let report = store.restore_data().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.mail_folders, vec!["default0/INBOX".to_string()]);
    assert!(report.missing.contains(&RestoreStep::Participants));
    assert!(report.missing.contains(&RestoreStep::CalendarFolders));

    let state = store.state().unwrap();
    assert_eq!(state.folders.len(), 2);
    assert_eq!(state.user.as_ref().map(|u| u.user_id), Some(3));
    assert_eq!(state.contacts.len(), 2);
    assert_eq!(state.contacts.last_update, 40);
    assert_eq!(
        state.synced_folders(crate::groupware::Module::Contacts),
        ["6".to_string()].into_iter().collect::<BTreeSet<String>>()
    );
    assert_eq!(state.appointments.len(), 2);
    assert_eq!(state.appointments.last_update, 50);
    // Master and two day rows for the first appointment, one for the second.
    assert_eq!(state.calendar_rows.len(), 4);
    assert_eq!(state.unread_count("default0/INBOX"), 1);
    assert_eq!(state.total_unread(), 1);
    assert!(!state.has_session());
}

#[test]
fn test_datastore_restore_isolates_failures() {
    let storage = scoped_storage();
    write_cache(&storage);
    storage.set_item(keys::CONTACTS, "{\"records\": [{", false).unwrap();
    storage
        .set_item(keys::FOLDER_TREE, "{\"not\": \"a list\"}", false)
        .unwrap();
    let (store, _) = datastore_with(storage);
    let report = store.restore_data().unwrap();
    assert!(!report.is_clean());
    assert!(report.has_failed(RestoreStep::Contacts));
    assert!(report.has_failed(RestoreStep::FolderTree));
    assert!(!report.has_failed(RestoreStep::Appointments));
    assert!(report.failed.iter().all(|(_, err)| err.kind.is_storage()));

    let state = store.state().unwrap();
    assert!(state.folders.is_empty());
    assert!(state.contacts.is_empty());
    assert_eq!(state.appointments.len(), 2);
    assert_eq!(state.mails.len(), 1);
    assert!(state.user.is_some());
}

#[test]
fn test_datastore_restore_requires_no_session() {
    let (store, _) = datastore_with(scoped_storage());
    block_on(store.login()).unwrap();
    assert!(store.has_session());
    let err = store.restore_data().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotSupported);
}

#[test]
fn test_datastore_restore_without_storage() {
    let (store, _) = datastore_with(Storage::disabled());
    let report = store.restore_data().unwrap();
    assert!(report.is_clean());
    assert!(report.restored.is_empty());
}

#[test]
fn test_datastore_login_and_flush() {
    let storage = scoped_storage();
    write_cache(&storage);
    let (store, _) = datastore_with(storage);
    let info = block_on(store.login()).unwrap();
    assert_eq!(info.user_id, 3);
    {
        let state = store.state().unwrap();
        let user = state.user.as_ref().unwrap();
        assert_eq!(user.login_name, "alice");
        assert_eq!(user.server, "https://groupware.example.com");
        assert_eq!(user.language.as_deref(), Some("de_DE"));
    }

    block_on(store.logout_and_flush(false)).unwrap();
    assert!(!store.has_session());
    assert!(store.with_state(|s| s.user.is_some()).unwrap());
    assert_eq!(store.storage().len(), 1);
    assert!(store
        .storage()
        .get_json::<UserData>(keys::USER_DATA, true)
        .is_some());
    assert!(store.storage().get_item(keys::CONTACTS, false).is_none());

    block_on(store.logout_and_flush(true)).unwrap();
    assert!(store.storage().is_empty());
    assert!(store.with_state(|s| s.user.is_none()).unwrap());
}

#[test]
fn test_datastore_session_expired_alert() {
    let (store, events) = datastore_with(scoped_storage());
    block_on(store.login()).unwrap();
    let err: Error = crate::groupware::ServerError {
        code: Some("SES-0203".into()),
        error: "Your session %s expired. Please start a new browser session.".into(),
        error_params: vec![serde_json::json!("8e1bf7dd")],
        error_id: Some("1234-56".into()),
    }
    .into();
    let alert = store.handle_error(&err);
    assert_eq!(alert.category, crate::groupware::ErrorCategory::SessionExpired);
    assert_eq!(
        alert.message,
        "Your session 8e1bf7dd expired. Please start a new browser session."
    );
    assert!(!store.has_session());
    assert_eq!(
        events.lock().unwrap().as_slice(),
        &[DatastoreEvent::Alert(alert)]
    );
}

#[test]
fn test_datastore_rows_for_day() {
    let (store, _) = datastore_with(scoped_storage());
    let mut state = store.state().unwrap();
    state.appointments = Snapshot::new(
        vec![
            appointment(1, D0, D0 + 3 * DAY),
            appointment(2, D0 + DAY + 9 * HOUR, D0 + DAY + 10 * HOUR),
            appointment(3, D0 + 2 * DAY + 8 * HOUR, D0 + 2 * DAY + 9 * HOUR),
        ],
        0,
    );
    state.rebuild_calendar_rows();

    let day0: Vec<u64> = state
        .rows_for_day(D0 + 12 * HOUR)
        .iter()
        .map(|r| r.key.appointment.id)
        .collect();
    assert_eq!(day0, vec![1]);

    let day1 = state.rows_for_day(D0 + DAY);
    assert_eq!(day1.len(), 2);
    assert!(day1[0].is_synthetic());
    assert_eq!(day1[0].key.appointment.id, 1);
    assert_eq!(day1[1].key.appointment.id, 2);
    assert!(!day1[1].is_synthetic());

    assert_eq!(state.rows_for_day(D0 + 2 * DAY).len(), 2);
    assert!(state.rows_for_day(D0 + 3 * DAY).is_empty());

    let removed = state.remove_rows(&crate::groupware::AppointmentKey::new(1, 0));
    assert_eq!(removed.len(), 3);
    assert_eq!(state.calendar_rows.len(), 2);
}
