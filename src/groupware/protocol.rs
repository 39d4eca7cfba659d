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

//! The batched `multiple` endpoint: a request is a JSON array of calls and
//! the reply is an array with one element per call, in the same order.

use serde_json::Value;

use super::{columns::*, error::ServerError};
use crate::{error::*, utils::datetime::Timestamp};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Every object of a folder, optionally restricted to a date window.
    All,
    /// Objects changed since a timestamp.
    Updates,
    /// Objects by id.
    List,
    Get,
    /// Every folder of a content type the user can see.
    AllVisible,
}

/// One call of a batched request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Call {
    pub module: Module,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<Module>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Call {
    pub fn new(module: Module, action: Action) -> Self {
        Self {
            module,
            action,
            folder: None,
            columns: None,
            timestamp: None,
            start: None,
            end: None,
            content_type: None,
            ignore: None,
            sort: None,
            order: None,
            data: None,
        }
    }

    /// Records of `folder` changed since `since`, deletions excluded.
    pub fn updates(columns: &ColumnMap, folder: &str, since: Timestamp) -> Self {
        Self::new(columns.module, Action::Updates)
            .folder(Some(folder.to_string()))
            .columns(Some(columns.param()))
            .timestamp(Some(since))
            .ignore(Some("deleted".to_string()))
    }

    /// Every record of `folder`.
    pub fn all(columns: &ColumnMap, folder: &str) -> Self {
        Self::new(columns.module, Action::All)
            .folder(Some(folder.to_string()))
            .columns(Some(columns.param()))
    }

    /// Every folder of `content_type` the user can see.
    pub fn all_visible(content_type: Module) -> Self {
        Self::new(Module::Folders, Action::AllVisible)
            .content_type(Some(content_type))
            .columns(Some(FOLDER_COLUMNS.param()))
    }

    /// Directory objects by id.
    pub fn list(columns: &ColumnMap, ids: &[u64]) -> Self {
        let data = match columns.module {
            Module::User => Value::from(ids.to_vec()),
            _ => Value::Array(ids.iter().map(|id| serde_json::json!({ "id": id })).collect()),
        };
        Self::new(columns.module, Action::List)
            .columns(Some(columns.param()))
            .data(Some(data))
    }

    /// Folder records by id. Each element of `objects` is an `{id, folder}`
    /// object.
    pub fn list_objects(columns: &ColumnMap, objects: Vec<Value>) -> Self {
        Self::new(columns.module, Action::List)
            .columns(Some(columns.param()))
            .data(Some(Value::Array(objects)))
    }

    /// Restricts `all` and `updates` calls to `[start, end)`.
    pub fn window(self, start: Timestamp, end: Timestamp) -> Self {
        self.start(Some(start)).end(Some(end))
    }

    _impl!(folder: Option<String>);
    _impl!(columns: Option<String>);
    _impl!(timestamp: Option<Timestamp>);
    _impl!(start: Option<Timestamp>);
    _impl!(end: Option<Timestamp>);
    _impl!(content_type: Option<Module>);
    _impl!(ignore: Option<String>);
    _impl!(sort: Option<u32>);
    _impl!(order: Option<String>);
    _impl!(data: Option<Value>);
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Request {
    calls: Vec<Call>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `call` and returns its index in the reply.
    pub fn add_call(&mut self, call: Call) -> usize {
        self.calls.push(call);
        self.calls.len() - 1
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// One element of a batched reply.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CallResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
}

impl CallResponse {
    /// A successful reply carrying `data`.
    pub fn with_data(data: Value, timestamp: Option<Timestamp>) -> Self {
        Self {
            data,
            timestamp,
            ..Self::default()
        }
    }

    pub fn from_error(err: ServerError) -> Self {
        Self {
            error: Some(err.error),
            code: err.code,
            error_params: err.error_params,
            error_id: err.error_id,
            ..Self::default()
        }
    }

    pub fn server_error(&self) -> Option<ServerError> {
        self.error.as_ref().map(|error| ServerError {
            code: self.code.clone(),
            error: error.clone(),
            error_params: self.error_params.clone(),
            error_id: self.error_id.clone(),
        })
    }

    pub fn into_result(self) -> std::result::Result<Self, ServerError> {
        match self.server_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// The rows of `data`. `allVisible` replies group their rows by folder
    /// type in an object; those groups are concatenated.
    pub fn rows(&self) -> Vec<&Value> {
        match &self.data {
            Value::Array(rows) => rows.iter().collect(),
            Value::Object(groups) => groups
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .collect(),
            _ => vec![],
        }
    }
}

fn protocol_error(msg: String, body: &str) -> Error {
    Error::new(msg)
        .set_details(format!("Reply from server: {}", body))
        .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation))
}

/// Parses the reply of a batched request of `expected` calls. A top-level
/// error object, a body that is not JSON and a reply of the wrong length are
/// errors of the whole request.
pub fn parse_multiple_response(body: &str, expected: usize) -> Result<Vec<CallResponse>> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        protocol_error(format!("Server reply is not valid JSON: {}", err), body)
    })?;
    if value.get("error").is_some() {
        let err: ServerError = serde_json::from_value(value)
            .map_err(|err| protocol_error(format!("Malformed error reply: {}", err), body))?;
        return Err(err.into());
    }
    let jd = &mut serde_json::Deserializer::from_str(body);
    let responses: Vec<CallResponse> = serde_path_to_error::deserialize(jd).map_err(|err| {
        protocol_error(
            format!("Could not read batched reply: {} at {}", err, err.path()),
            body,
        )
    })?;
    if responses.len() != expected {
        return Err(protocol_error(
            format!(
                "Batched reply has {} elements for {} calls",
                responses.len(),
                expected
            ),
            body,
        ));
    }
    Ok(responses)
}
