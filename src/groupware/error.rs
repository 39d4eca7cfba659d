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

//! Error payloads returned by the groupware backend.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::{Error, ErrorKind};

/// Prefix of every code signalling an expired or invalid session.
pub const SESSION_CODE_PREFIX: &str = "SES-";
/// Login rejected because of wrong credentials.
pub const BAD_CREDENTIALS_CODE: &str = "LGI-0006";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorCategory {
    SessionExpired,
    BadCredentials,
    /// Connection failure or a reply that is not the expected JSON.
    Transport,
    Generic,
}

/// `{code, error, error_params, error_id}` as sent by the backend, either at
/// the top level of a reply or inside one element of a batched reply.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: Option<String>,
    pub error: String,
    #[serde(default)]
    pub error_params: Vec<Value>,
    #[serde(default)]
    pub error_id: Option<String>,
}

impl ServerError {
    pub fn category(&self) -> ErrorCategory {
        match self.code.as_deref() {
            Some(code) if code.starts_with(SESSION_CODE_PREFIX) => ErrorCategory::SessionExpired,
            Some(BAD_CREDENTIALS_CODE) => ErrorCategory::BadCredentials,
            _ => ErrorCategory::Generic,
        }
    }

    /// The error text with its parameters substituted.
    pub fn message(&self) -> String {
        format_error_message(&self.error, &self.error_params)
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(code) = self.code.as_deref() {
            write!(fmt, "{}: ", code)?;
        }
        write!(fmt, "{}", self.message())?;
        if let Some(id) = self.error_id.as_deref() {
            write!(fmt, " (error id {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        let kind = match err.category() {
            ErrorCategory::SessionExpired => ErrorKind::Session,
            ErrorCategory::BadCredentials => ErrorKind::Authentication,
            ErrorCategory::Transport | ErrorCategory::Generic => ErrorKind::Backend,
        };
        Self::new(err.message())
            .set_details(err.to_string())
            .set_kind(kind)
            .set_source(Some(std::sync::Arc::new(err)))
    }
}

/// Maps any crate error to the category the user is alerted with.
pub fn categorize(err: &Error) -> ErrorCategory {
    if let Some(server) = err.source_as::<ServerError>() {
        return server.category();
    }
    match err.kind {
        ErrorKind::Session => ErrorCategory::SessionExpired,
        ErrorKind::Authentication => ErrorCategory::BadCredentials,
        ref kind if kind.is_transport() => ErrorCategory::Transport,
        _ => ErrorCategory::Generic,
    }
}

fn param_to_str(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

/// Substitutes `%s`/`%d` (sequential) and `%N$s`/`%N$d` (positional, 1-based)
/// placeholders of `template` with `params`. `%%` is a literal percent sign.
/// Placeholders without a matching parameter are left as they are.
pub fn format_error_message(template: &str, params: &[Value]) -> String {
    let mut ret = String::with_capacity(template.len());
    let mut next = 0;
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        ret.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if let Some(after) = tail.strip_prefix('%') {
            ret.push('%');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix('s').or_else(|| tail.strip_prefix('d')) {
            match params.get(next) {
                Some(p) => ret.push_str(&param_to_str(p)),
                None => ret.push_str(&rest[pos..pos + 2]),
            }
            next += 1;
            rest = after;
            continue;
        }
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            let spec = &tail[digits..];
            if let Some(after) = spec
                .strip_prefix("$s")
                .or_else(|| spec.strip_prefix("$d"))
            {
                let index: usize = tail[..digits].parse().unwrap_or(0);
                match index.checked_sub(1).and_then(|i| params.get(i)) {
                    Some(p) => ret.push_str(&param_to_str(p)),
                    None => ret.push_str(&rest[pos..pos + 1 + digits + 2]),
                }
                rest = after;
                continue;
            }
        }
        ret.push('%');
        rest = tail;
    }
    ret.push_str(rest);
    ret
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_server_error_format_message() {
        assert_eq!(
            format_error_message("Folder %s not found in %s", &[json!("25"), json!("calendar")]),
            "Folder 25 not found in calendar"
        );
        assert_eq!(
            format_error_message("%2$s before %1$s", &[json!("a"), json!(2)]),
            "2 before a"
        );
        assert_eq!(format_error_message("100%% done", &[]), "100% done");
        assert_eq!(format_error_message("missing %s", &[]), "missing %s");
        assert_eq!(format_error_message("missing %3$s", &[json!(1)]), "missing %3$s");
        assert_eq!(format_error_message("trailing %", &[]), "trailing %");
        assert_eq!(format_error_message("%d items", &[json!(4)]), "4 items");
    }

    #[test]
    fn test_server_error_category() {
        let mut err = ServerError {
            code: Some("SES-0203".into()),
            error: "Your session %s expired.".into(),
            error_params: vec![json!("abc")],
            error_id: Some("-1234-5".into()),
        };
        assert_eq!(err.category(), ErrorCategory::SessionExpired);
        assert_eq!(
            err.to_string(),
            "SES-0203: Your session abc expired. (error id -1234-5)"
        );
        let e: Error = err.clone().into();
        assert_eq!(e.kind, ErrorKind::Session);
        assert_eq!(categorize(&e), ErrorCategory::SessionExpired);

        err.code = Some(BAD_CREDENTIALS_CODE.into());
        assert_eq!(err.category(), ErrorCategory::BadCredentials);
        err.code = Some("APP-0013".into());
        assert_eq!(err.category(), ErrorCategory::Generic);
        err.code = None;
        assert_eq!(err.category(), ErrorCategory::Generic);

        let e = Error::new("Connection failed").set_kind(ErrorKind::Network(
            crate::error::NetworkErrorKind::ConnectionFailed,
        ));
        assert_eq!(categorize(&e), ErrorCategory::Transport);
    }
}
