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

use serde_json::json;

use super::{columns::*, objects::*, protocol::*, ServerError};
use crate::error::ErrorKind;

#[test]
fn test_groupware_request_serialization() {
    let mut req = Request::new();
    let idx = req.add_call(
        Call::updates(&CALENDAR_ID_COLUMNS, "25", 1_700_000_000_000).window(10, 20),
    );
    assert_eq!(idx, 0);
    let idx = req.add_call(Call::all_visible(Module::Contacts));
    assert_eq!(idx, 1);
    req.add_call(Call::list(&USER_COLUMNS, &[3, 7]));
    req.add_call(Call::list(&GROUP_COLUMNS, &[2]));
    assert_eq!(req.len(), 4);

    assert_eq!(
        serde_json::to_value(&req).unwrap(),
        json!([
            {
                "module": "calendar",
                "action": "updates",
                "folder": "25",
                "columns": "1,20,207",
                "timestamp": 1_700_000_000_000_i64,
                "start": 10,
                "end": 20,
                "ignore": "deleted"
            },
            {
                "module": "folders",
                "action": "allVisible",
                "columns": "1,20,300,301,302,304,314,5",
                "content_type": "contacts"
            },
            {
                "module": "user",
                "action": "list",
                "columns": "1,500,555",
                "data": [3, 7]
            },
            {
                "module": "group",
                "action": "list",
                "columns": "1,500",
                "data": [{"id": 2}]
            }
        ])
    );
}

#[test]
fn test_groupware_parse_multiple_response() {
    let body = r#"[
        {"data": [[1, 25, null]], "timestamp": 1700000000123},
        {
            "error": "Folder %1$s does not exist",
            "error_params": ["26"],
            "code": "FLD-0008",
            "error_id": "-17-4"
        }
    ]"#;
    let responses = parse_multiple_response(body, 2).unwrap();
    assert_eq!(responses[0].timestamp, Some(1_700_000_000_123));
    assert_eq!(responses[0].rows().len(), 1);
    assert!(responses[0].server_error().is_none());
    let err = responses[1].clone().into_result().unwrap_err();
    assert_eq!(err.code.as_deref(), Some("FLD-0008"));
    assert_eq!(err.message(), "Folder 26 does not exist");

    let err = parse_multiple_response(body, 3).unwrap_err();
    assert!(err.kind.is_transport());

    let err = parse_multiple_response("<html>Bad gateway</html>", 1).unwrap_err();
    assert!(err.kind.is_transport());

    let err = parse_multiple_response(
        r#"{"error": "Your session expired", "code": "SES-0203"}"#,
        1,
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Session);
    assert_eq!(
        err.source_as::<ServerError>().and_then(|e| e.code.as_deref()),
        Some("SES-0203")
    );
}

#[test]
fn test_groupware_rows_of_grouped_reply() {
    let response = CallResponse::with_data(
        json!({
            "private": [["25", "1", "Calendar", "calendar", 1, false, true, null]],
            "public": [["30", "2", "Team", "calendar", 2, false, null, null]],
            "shared": []
        }),
        None,
    );
    let rows = response.rows();
    assert_eq!(rows.len(), 2);
    let (folders, errors) = parse_rows::<Folder>(&rows, &FOLDER_COLUMNS);
    assert!(errors.is_empty());
    assert_eq!(folders[0].id, "25");
    assert_eq!(folders[0].folder_id.as_deref(), Some("1"));
    assert_eq!(folders[0].content_module(), Some(Module::Calendar));
    assert!(folders[0].is_subscribed());
    assert_eq!(folders[1].title, "Team");
}

#[test]
fn test_groupware_appointment_from_row() {
    let row = json!([
        1,
        25,
        1_709_500_000_000_i64,
        "Conference",
        1_709_596_800_000_i64,
        1_709_856_000_000_i64,
        null,
        null,
        null,
        null,
        [{"id": 3, "type": 1}, {"type": 5, "mail": "guest@example.com"}],
        "Berlin",
        true,
        1
    ]);
    let appointment = Appointment::from_row(&row).unwrap();
    assert_eq!(appointment.key(), AppointmentKey::new(1, 0));
    assert_eq!(appointment.folder_id, "25");
    assert_eq!(appointment.title.as_deref(), Some("Conference"));
    assert_eq!(appointment.days(), 3);
    assert!(appointment.is_multi_day());
    assert!(appointment.full_time);
    assert_eq!(appointment.participants.len(), 2);
    assert_eq!(appointment.participants[0].kind, ParticipantKind::User);
    assert_eq!(appointment.participants[1].kind, ParticipantKind::External);

    // Survives the storage round trip unchanged.
    let text = serde_json::to_string(&appointment).unwrap();
    let restored: Appointment = serde_json::from_str(&text).unwrap();
    assert_eq!(restored, appointment);

    let row = json!([1, 25, null, "x", null, null, null, null, null, null, null, null, null, null]);
    let err = Appointment::from_row(&row).unwrap_err();
    assert!(err.kind.is_transport());
    assert!(err.summary.contains("start_date"));
}

#[test]
fn test_groupware_mail_header_from_row() {
    let row = json!([
        "4711",
        "default0/INBOX",
        true,
        [["Alice", "alice@example.com"]],
        [[null, "bob@example.com"]],
        "Hello",
        2048,
        1_709_596_800_000_i64,
        1_709_596_900_000_i64,
        32 | 8,
        null
    ]);
    let header = MailHeader::from_row(&row).unwrap();
    assert_eq!(header.key(), "4711");
    assert!(header.is_seen());
    assert!(header.flags.contains(MailFlags::FLAGGED));
    assert_eq!(header.from[0], MailAddress(Some("Alice".into()), "alice@example.com".into()));
    assert_eq!(header.to[0].0, None);

    let text = serde_json::to_string(&header).unwrap();
    assert!(text.contains("\"flags\":40"));

    let id = MailId::from_row(&json!(["4712", "default0/INBOX", 0])).unwrap();
    assert_eq!(id.flags, MailFlags::empty());
}

#[test]
fn test_groupware_parse_rows_keeps_good_rows() {
    let data = json!([[1, 6], [2], ["x", 6], [3, "6"]]);
    let response = CallResponse::with_data(data, Some(5));
    let rows = response.rows();
    let (ids, errors) = parse_rows::<ObjectId>(&rows, &CONTACT_ID_COLUMNS);
    assert_eq!(ids.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(errors.len(), 2);
}
