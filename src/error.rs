//
// oxsync - error module
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

//! Library error type.

use std::{borrow::Cow, io, result, str, string, sync::Arc};

pub mod network;
pub use network::NetworkErrorKind;

pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorKind {
    #[default]
    None,
    /// The backend rejected the session (expired or unknown session id).
    Session,
    /// The backend rejected the login credentials.
    Authentication,
    /// The backend returned an error object for a request.
    Backend,
    Configuration,
    Bug,
    Network(NetworkErrorKind),
    Timeout,
    Platform,
    Storage,
    NotFound,
    ValueError,
    NotImplemented,
    NotSupported,
    /// Another operation holds the cache.
    Busy,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                Self::None => "Error",
                Self::Session => "Session expired",
                Self::Authentication => "Authentication error",
                Self::Backend => "Server error",
                Self::Configuration => "Configuration error",
                Self::Bug => "Bug, please report this!",
                Self::Network(inner) => inner.as_str(),
                Self::Timeout => "Timeout",
                Self::Platform => "Platform/Runtime environment error",
                Self::Storage => "Local storage error",
                Self::NotFound => "Not found",
                Self::ValueError => "Invalid value",
                Self::NotImplemented => "Not implemented",
                Self::NotSupported => "Not supported",
                Self::Busy => "Busy",
            }
        )
    }
}

macro_rules! is_variant {
    ($n:ident, $($var:tt)+) => {
        #[inline]
        pub fn $n(&self) -> bool {
            matches!(self, Self::$($var)*)
        }
    };
}

impl ErrorKind {
    is_variant! { is_session, Session }
    is_variant! { is_authentication, Authentication }
    is_variant! { is_backend, Backend }
    is_variant! { is_configuration, Configuration }
    is_variant! { is_network, Network(_) }
    is_variant! { is_timeout, Timeout }
    is_variant! { is_storage, Storage }
    is_variant! { is_value_error, ValueError }
    is_variant! { is_busy, Busy }

    /// Whether this error means the server could not be reached or did not
    /// answer with a usable reply, as opposed to a per-request error reported
    /// inside a reply.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

#[derive(Clone, Debug)]
pub struct Error {
    pub summary: Cow<'static, str>,
    pub details: Option<Cow<'static, str>>,
    pub source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    pub kind: ErrorKind,
}

pub trait IntoError {
    fn set_err_summary<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>;

    fn set_err_details<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>;

    fn set_err_kind(self, kind: ErrorKind) -> Error;
}

pub trait ResultIntoError<T> {
    fn chain_err_summary<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>;

    fn chain_err_details<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>;

    fn chain_err_kind(self, kind: ErrorKind) -> Result<T>;
}

impl<I: Into<Error>> IntoError for I {
    #[inline]
    fn set_err_summary<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>,
    {
        let err: Error = self.into();
        err.set_summary(msg)
    }

    #[inline]
    fn set_err_details<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>,
    {
        let err: Error = self.into();
        err.set_details(msg)
    }

    #[inline]
    fn set_err_kind(self, kind: ErrorKind) -> Error {
        let err: Error = self.into();
        err.set_kind(kind)
    }
}

impl<T, I: Into<Error>> ResultIntoError<T> for std::result::Result<T, I> {
    #[inline]
    fn chain_err_summary<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>,
    {
        self.map_err(|err| err.set_err_summary(msg_fn()))
    }

    #[inline]
    fn chain_err_details<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>,
    {
        self.map_err(|err| err.set_err_details(msg_fn()))
    }

    #[inline]
    fn chain_err_kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|err| err.set_err_kind(kind))
    }
}

impl Error {
    pub fn new<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self {
            summary: msg.into(),
            details: None,
            source: None,
            kind: ErrorKind::None,
        }
    }

    pub fn set_details<M>(mut self, details: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        if let Some(old_details) = self.details.as_ref() {
            self.details = Some(format!("{}. {}", old_details, details.into()).into());
        } else {
            self.details = Some(details.into());
        }
        self
    }

    pub fn set_summary<M>(mut self, summary: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        let summary = summary.into();
        if !self.summary.is_empty() {
            self.details = Some(match self.details.take() {
                Some(details) => format!("{}. {}", self.summary, details).into(),
                None => self.summary,
            });
        }
        self.summary = summary;
        self
    }

    pub fn set_source(
        mut self,
        new_val: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = new_val;
        self
    }

    pub fn set_kind(mut self, new_val: ErrorKind) -> Self {
        self.kind = new_val;
        self
    }

    /// Returns the source error downcast to `E`, if it is one.
    pub fn source_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|s| s.downcast_ref::<E>())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}", self.summary)?;
        if let Some(details) = self.details.as_ref() {
            if !details.trim().is_empty() {
                writeln!(f, "{}", details)?;
            }
        }
        if let Some(source) = self.source.as_ref() {
            writeln!(f, "Caused by: {}", source)?;
        }
        if self.kind != ErrorKind::None {
            write!(f, "Error kind: {}", self.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|s| &(*(*s)) as _)
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => ErrorKind::ValueError,
            _ => ErrorKind::Platform,
        };
        Self::new(err.to_string())
            .set_kind(kind)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<string::FromUtf8Error> for Error {
    #[inline]
    fn from(err: string::FromUtf8Error) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::ValueError)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<str::Utf8Error> for Error {
    #[inline]
    fn from(err: str::Utf8Error) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::ValueError)
            .set_source(Some(Arc::new(err)))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    #[inline]
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::new(err.to_string()).set_kind(ErrorKind::Bug)
    }
}

impl From<std::num::ParseIntError> for Error {
    #[inline]
    fn from(err: std::num::ParseIntError) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::ValueError)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<serde_json::error::Error> for Error {
    #[inline]
    fn from(err: serde_json::error::Error) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::ValueError)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<toml::de::Error> for Error {
    #[inline]
    fn from(err: toml::de::Error) -> Self {
        Self::new("Could not parse configuration")
            .set_details(err.to_string())
            .set_kind(ErrorKind::Configuration)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<url::ParseError> for Error {
    #[inline]
    fn from(err: url::ParseError) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::Configuration)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<isahc::Error> for Error {
    #[inline]
    fn from(err: isahc::Error) -> Self {
        let kind = NetworkErrorKind::from(err.kind());
        Self::new(err.to_string())
            .set_kind(ErrorKind::Network(kind))
            .set_source(Some(Arc::new(err)))
    }
}

impl From<isahc::http::Error> for Error {
    #[inline]
    fn from(err: isahc::http::Error) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::Network(NetworkErrorKind::InvalidRequest))
            .set_source(Some(Arc::new(err)))
    }
}

#[cfg(feature = "sqlite3")]
impl From<rusqlite::Error> for Error {
    #[inline]
    fn from(err: rusqlite::Error) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::Storage)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<xdg::BaseDirectoriesError> for Error {
    #[inline]
    fn from(err: xdg::BaseDirectoriesError) -> Self {
        Self::new(err.to_string())
            .set_kind(ErrorKind::Platform)
            .set_source(Some(Arc::new(err)))
    }
}

impl From<Box<dyn std::error::Error + Sync + Send + 'static>> for Error {
    #[inline]
    fn from(err: Box<dyn std::error::Error + Sync + Send + 'static>) -> Self {
        Self::new(err.to_string()).set_source(Some(err.into()))
    }
}

impl From<&str> for Error {
    #[inline]
    fn from(msg: &str) -> Self {
        Self::new(msg.to_string())
    }
}

impl From<String> for Error {
    #[inline]
    fn from(msg: String) -> Self {
        Self::new(msg)
    }
}

impl<'a> From<Cow<'a, str>> for Error {
    #[inline]
    fn from(msg: Cow<'_, str>) -> Self {
        Self::new(msg.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_chaining() {
        let err = Error::new("could not read file")
            .set_summary("Could not restore contacts")
            .set_kind(ErrorKind::Storage);
        assert_eq!(err.summary, "Could not restore contacts");
        assert_eq!(err.details.as_deref(), Some("could not read file"));
        assert!(err.kind.is_storage());
        let display = err.to_string();
        assert!(display.contains("Could not restore contacts"));
        assert!(display.contains("Error kind: Local storage error"));
    }

    #[test]
    fn test_error_kind_transport() {
        assert!(ErrorKind::Network(NetworkErrorKind::ConnectionFailed).is_transport());
        assert!(ErrorKind::Timeout.is_transport());
        assert!(!ErrorKind::Backend.is_transport());
        assert!(!ErrorKind::Session.is_transport());
    }

    #[test]
    fn test_error_source_downcast() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_err);
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.source_as::<io::Error>().is_some());
        assert!(err.source_as::<serde_json::Error>().is_none());
    }
}
