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

//! Typed records built from the backend's positional rows.

use std::{fmt::Debug, hash::Hash};

use bitflags::bitflags;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::columns::*;
use crate::{
    error::*,
    utils::{
        datetime::{days_spanned, Timestamp},
        deserialize_opt_string_or_number, deserialize_string_or_number,
    },
};

/// A record type of one of the backend's list modules.
pub trait Record:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Key: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static;

    /// Columns requested for full records.
    const COLUMNS: ColumnMap;

    fn key(&self) -> Self::Key;

    /// Folder the record lives in, for folder scoped modules.
    fn folder_id(&self) -> Option<&str> {
        None
    }

    fn from_row(row: &Value) -> Result<Self> {
        Self::from_row_with(row, &Self::COLUMNS)
    }

    /// Builds a record from a row laid out according to `columns`.
    fn from_row_with(row: &Value, columns: &ColumnMap) -> Result<Self> {
        let object = Value::Object(columns.row_to_object(row)?);
        serde_path_to_error::deserialize(object).map_err(|err| {
            Error::new(format!(
                "Could not read {} record: {} at {}",
                columns.module,
                err,
                err.path()
            ))
            .set_details(row.to_string())
            .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation))
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct AppointmentKey {
    pub id: u64,
    /// `0` for non-recurring appointments and series masters.
    pub recurrence_position: u32,
}

impl AppointmentKey {
    pub const fn new(id: u64, recurrence_position: u32) -> Self {
        Self {
            id,
            recurrence_position,
        }
    }
}

impl std::fmt::Display for AppointmentKey {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}.{}", self.id, self.recurrence_position)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Appointment {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub folder_id: String,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default)]
    pub title: Option<String>,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub recurrence_id: Option<u64>,
    #[serde(default)]
    pub recurrence_position: Option<u32>,
    #[serde(default)]
    pub recurrence_type: Option<u8>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub full_time: bool,
    #[serde(default)]
    pub shown_as: Option<u8>,
}

impl Appointment {
    /// Number of calendar days the appointment touches.
    pub fn days(&self) -> u32 {
        days_spanned(self.start_date, self.end_date)
    }

    pub fn is_multi_day(&self) -> bool {
        self.days() > 1
    }

    pub fn overlaps(&self, start: Timestamp, end: Timestamp) -> bool {
        self.start_date < end && self.end_date > start
    }
}

impl Record for Appointment {
    type Key = AppointmentKey;
    const COLUMNS: ColumnMap = CALENDAR_COLUMNS;

    fn key(&self) -> AppointmentKey {
        AppointmentKey::new(self.id, self.recurrence_position.unwrap_or(0))
    }

    fn folder_id(&self) -> Option<&str> {
        Some(&self.folder_id)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ParticipantKind {
    User = 1,
    Group = 2,
    Resource = 3,
    ResourceGroup = 4,
    External = 5,
}

impl TryFrom<u8> for ParticipantKind {
    type Error = String;

    fn try_from(val: u8) -> std::result::Result<Self, String> {
        Ok(match val {
            1 => Self::User,
            2 => Self::Group,
            3 => Self::Resource,
            4 => Self::ResourceGroup,
            5 => Self::External,
            other => return Err(format!("unknown participant type {}", other)),
        })
    }
}

impl From<ParticipantKind> for u8 {
    fn from(val: ParticipantKind) -> Self {
        val as Self
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Participant {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Contact {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub folder_id: String,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email1: Option<String>,
    #[serde(default)]
    pub email2: Option<String>,
    #[serde(default)]
    pub email3: Option<String>,
    #[serde(default)]
    pub telephone_business1: Option<String>,
    #[serde(default)]
    pub cellular_telephone1: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl Contact {
    /// Name used to order the contact list: last name, then first name,
    /// falling back to the display name and the primary address.
    pub fn sort_name(&self) -> String {
        match (self.last_name.as_deref(), self.first_name.as_deref()) {
            (Some(last), Some(first)) => format!("{}, {}", last, first),
            (Some(last), None) => last.to_string(),
            (None, Some(first)) => first.to_string(),
            (None, None) => self
                .display_name
                .clone()
                .or_else(|| self.email1.clone())
                .unwrap_or_default(),
        }
    }
}

impl Record for Contact {
    type Key = u64;
    const COLUMNS: ColumnMap = CONTACT_COLUMNS;

    fn key(&self) -> u64 {
        self.id
    }

    fn folder_id(&self) -> Option<&str> {
        Some(&self.folder_id)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
    #[serde(from = "u32", into = "u32")]
    pub struct MailFlags: u32 {
        const ANSWERED  = 1;
        const DELETED   = 2;
        const DRAFT     = 4;
        const FLAGGED   = 8;
        const RECENT    = 16;
        const SEEN      = 32;
        const USER      = 64;
        const SPAM      = 128;
        const FORWARDED = 256;
    }
}

impl From<u32> for MailFlags {
    fn from(val: u32) -> Self {
        Self::from_bits_retain(val)
    }
}

impl From<MailFlags> for u32 {
    fn from(val: MailFlags) -> Self {
        val.bits()
    }
}

/// `[display name, address]` pair.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MailAddress(pub Option<String>, pub String);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MailHeader {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub folder_id: String,
    #[serde(default)]
    pub attachment: bool,
    #[serde(default)]
    pub from: Vec<MailAddress>,
    #[serde(default)]
    pub to: Vec<MailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub sent_date: Option<Timestamp>,
    #[serde(default)]
    pub received_date: Option<Timestamp>,
    #[serde(default)]
    pub flags: MailFlags,
    #[serde(default)]
    pub color_label: Option<u8>,
}

impl MailHeader {
    pub fn is_seen(&self) -> bool {
        self.flags.contains(MailFlags::SEEN)
    }
}

impl Record for MailHeader {
    type Key = String;
    const COLUMNS: ColumnMap = MAIL_COLUMNS;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn folder_id(&self) -> Option<&str> {
        Some(&self.folder_id)
    }
}

/// Row of the mail id listing: enough to diff a folder against its cache.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MailId {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub folder_id: String,
    #[serde(default)]
    pub flags: MailFlags,
}

impl Record for MailId {
    type Key = String;
    const COLUMNS: ColumnMap = MAIL_ID_COLUMNS;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn folder_id(&self) -> Option<&str> {
        Some(&self.folder_id)
    }
}

/// Row of the calendar and contact id listings used to detect deletions.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ObjectId {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub folder_id: String,
    #[serde(default)]
    pub recurrence_position: Option<u32>,
}

impl ObjectId {
    pub fn appointment_key(&self) -> AppointmentKey {
        AppointmentKey::new(self.id, self.recurrence_position.unwrap_or(0))
    }
}

impl Record for ObjectId {
    type Key = AppointmentKey;
    const COLUMNS: ColumnMap = CALENDAR_ID_COLUMNS;

    fn key(&self) -> AppointmentKey {
        self.appointment_key()
    }

    fn folder_id(&self) -> Option<&str> {
        Some(&self.folder_id)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Folder {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub id: String,
    /// Parent folder.
    #[serde(default, deserialize_with = "deserialize_opt_string_or_number")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub module: String,
    #[serde(default, rename = "type")]
    pub kind: Option<u8>,
    #[serde(default)]
    pub subfolders: bool,
    #[serde(default)]
    pub subscribed: Option<bool>,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
}

impl Folder {
    /// The content module whose records live in this folder.
    pub fn content_module(&self) -> Option<Module> {
        match self.module.as_str() {
            "calendar" => Some(Module::Calendar),
            "contacts" => Some(Module::Contacts),
            "mail" => Some(Module::Mail),
            _ => None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.unwrap_or(true)
    }
}

impl Record for Folder {
    type Key = String;
    const COLUMNS: ColumnMap = FOLDER_COLUMNS;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// A user, group or resource of the participant directories.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email1: Option<String>,
}

impl Record for DirectoryEntry {
    type Key = u64;
    const COLUMNS: ColumnMap = USER_COLUMNS;

    fn key(&self) -> u64 {
        self.id
    }
}

/// Reply of a successful login.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session: String,
    pub user_id: u64,
    #[serde(default, rename = "user")]
    pub login_name: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

/// Parses every row of `rows`. Rows that fail are returned next to the parsed
/// records so one malformed row does not hide the rest of a list.
pub fn parse_rows<R: Record>(rows: &[&Value], columns: &ColumnMap) -> (Vec<R>, Vec<Error>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut errors = vec![];
    for row in rows {
        match R::from_row_with(row, columns) {
            Ok(r) => records.push(r),
            Err(err) => errors.push(err),
        }
    }
    (records, errors)
}

