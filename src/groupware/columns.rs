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

//! Positional column codes of the backend and the field names they map to.
//!
//! List requests name the wanted fields with a comma separated list of
//! integer codes and the reply carries each record as an array in the same
//! order. [`ColumnMap::row_to_object`] turns such a row into a JSON object
//! keyed by field name, which is then deserialized into a named record.

use serde_json::{Map, Value};

use crate::error::*;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Calendar,
    Contacts,
    Mail,
    Folders,
    User,
    Group,
    Resource,
}

impl Module {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Contacts => "contacts",
            Self::Mail => "mail",
            Self::Folders => "folders",
            Self::User => "user",
            Self::Group => "group",
            Self::Resource => "resource",
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Column {
    pub code: u32,
    pub name: &'static str,
}

const fn col(code: u32, name: &'static str) -> Column {
    Column { code, name }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnMap {
    pub module: Module,
    pub columns: &'static [Column],
}

impl ColumnMap {
    /// The `columns` request parameter, e.g. `"1,20,201"`.
    pub fn param(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.code.to_string())
            .collect::<Vec<String>>()
            .join(",")
    }

    pub fn code(&self, name: &str) -> Option<u32> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.code)
    }

    pub fn name(&self, code: u32) -> Option<&'static str> {
        self.columns.iter().find(|c| c.code == code).map(|c| c.name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Converts a positional row into an object keyed by field name. Objects
    /// are passed through. `null` fields are dropped so that record defaults
    /// apply.
    pub fn row_to_object(&self, row: &Value) -> Result<Map<String, Value>> {
        match row {
            Value::Array(values) => {
                if values.len() != self.columns.len() {
                    return Err(Error::new(format!(
                        "{} row has {} columns, expected {} ({})",
                        self.module,
                        values.len(),
                        self.columns.len(),
                        self.param()
                    ))
                    .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation)));
                }
                Ok(self
                    .columns
                    .iter()
                    .zip(values.iter())
                    .filter(|(_, v)| !v.is_null())
                    .map(|(c, v)| (c.name.to_string(), v.clone()))
                    .collect())
            }
            Value::Object(map) => Ok(map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            other => Err(Error::new(format!(
                "{} row is neither an array nor an object: {}",
                self.module, other
            ))
            .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation))),
        }
    }
}

pub const CALENDAR_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Calendar,
    columns: &[
        col(1, "id"),
        col(20, "folder_id"),
        col(5, "last_modified"),
        col(200, "title"),
        col(201, "start_date"),
        col(202, "end_date"),
        col(203, "note"),
        col(206, "recurrence_id"),
        col(207, "recurrence_position"),
        col(209, "recurrence_type"),
        col(220, "participants"),
        col(400, "location"),
        col(401, "full_time"),
        col(402, "shown_as"),
    ],
};

/// Columns of the full id-list fetch used to detect deleted appointments.
pub const CALENDAR_ID_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Calendar,
    columns: &[col(1, "id"), col(20, "folder_id"), col(207, "recurrence_position")],
};

pub const CONTACT_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Contacts,
    columns: &[
        col(1, "id"),
        col(20, "folder_id"),
        col(5, "last_modified"),
        col(500, "display_name"),
        col(501, "first_name"),
        col(502, "last_name"),
        col(555, "email1"),
        col(556, "email2"),
        col(557, "email3"),
        col(542, "telephone_business1"),
        col(551, "cellular_telephone1"),
        col(569, "company"),
    ],
};

pub const CONTACT_ID_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Contacts,
    columns: &[col(1, "id"), col(20, "folder_id")],
};

pub const MAIL_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Mail,
    columns: &[
        col(600, "id"),
        col(601, "folder_id"),
        col(602, "attachment"),
        col(603, "from"),
        col(604, "to"),
        col(607, "subject"),
        col(608, "size"),
        col(609, "sent_date"),
        col(610, "received_date"),
        col(611, "flags"),
        col(102, "color_label"),
    ],
};

/// Columns of the per-folder mail listing that drives the id and flag diff.
pub const MAIL_ID_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Mail,
    columns: &[col(600, "id"), col(601, "folder_id"), col(611, "flags")],
};

pub const FOLDER_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Folders,
    columns: &[
        col(1, "id"),
        col(20, "folder_id"),
        col(300, "title"),
        col(301, "module"),
        col(302, "type"),
        col(304, "subfolders"),
        col(314, "subscribed"),
        col(5, "last_modified"),
    ],
};

pub const USER_COLUMNS: ColumnMap = ColumnMap {
    module: Module::User,
    columns: &[col(1, "id"), col(500, "display_name"), col(555, "email1")],
};

pub const GROUP_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Group,
    columns: &[col(1, "id"), col(500, "display_name")],
};

pub const RESOURCE_COLUMNS: ColumnMap = ColumnMap {
    module: Module::Resource,
    columns: &[col(1, "id"), col(500, "display_name"), col(555, "email1")],
};
