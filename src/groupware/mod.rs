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

//! Client of the groupware backend's HTTP JSON interface.
//!
//! [`GroupwareApi`] is the seam between the data store and the network:
//! [`Connection`] implements it over HTTP, tests implement it with scripted
//! replies.

use std::{fmt::Debug, sync::Arc};

use futures::future::BoxFuture;

use crate::error::*;

pub mod columns;
pub mod connection;
pub mod error;
pub mod objects;
pub mod protocol;

pub use columns::{ColumnMap, Module};
pub use connection::Connection;
pub use error::{ErrorCategory, ServerError};
pub use objects::*;
pub use protocol::{Action, Call, CallResponse, Request};

#[cfg(test)]
mod tests;

pub type ResultFuture<'a, T> = BoxFuture<'a, Result<T>>;

pub trait GroupwareApi: Debug + Send + Sync {
    /// Opens a session with the configured credentials.
    fn login(&self) -> ResultFuture<'_, SessionInfo>;

    fn logout(&self) -> ResultFuture<'_, ()>;

    /// Sends all calls of `request` in one round trip. The reply holds one
    /// element per call, in order. Errors of single calls are reported inside
    /// their element; an `Err` means the whole request failed.
    fn multiple(&self, request: Request) -> ResultFuture<'_, Vec<CallResponse>>;

    /// Forgets the current session without contacting the server.
    fn invalidate_session(&self) {}
}

impl<T: GroupwareApi + ?Sized> GroupwareApi for Arc<T> {
    fn login(&self) -> ResultFuture<'_, SessionInfo> {
        (**self).login()
    }

    fn logout(&self) -> ResultFuture<'_, ()> {
        (**self).logout()
    }

    fn multiple(&self, request: Request) -> ResultFuture<'_, Vec<CallResponse>> {
        (**self).multiple(request)
    }

    fn invalidate_session(&self) {
        (**self).invalidate_session()
    }
}

/// Deserializes a server reply, reporting the JSON path of the first
/// mismatch.
pub fn deserialize_from_str<'de, T: serde::de::Deserialize<'de>>(s: &'de str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(s);
    match serde_path_to_error::deserialize(jd) {
        Ok(v) => Ok(v),
        Err(err) => Err(Error::new(format!(
            "Could not deserialize server JSON response: {} at {}. Reply from server: {}",
            err,
            err.path(),
            &s
        ))
        .set_source(Some(Arc::new(err)))
        .set_kind(ErrorKind::Network(NetworkErrorKind::ProtocolViolation))),
    }
}
