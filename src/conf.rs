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

//! Configuration for the groupware connection, local storage, calendar
//! window and logging, read from a TOML file.

use std::{path::PathBuf, time::Duration};

use crate::{
    error::{Error, ErrorKind, Result, ResultIntoError},
    storage::StorageMode,
    utils::{
        datetime::{self, Timestamp, DAY},
        logging::LogLevel,
    },
};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub server: ServerConf,
    #[serde(default)]
    pub storage: StorageConf,
    #[serde(default)]
    pub calendar: CalendarConf,
    #[serde(default)]
    pub log: LogConf,
}

impl Settings {
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).chain_err_summary(|| {
            format!("Could not read configuration file {}", path.display())
        })?;
        Self::from_toml_str(&text)
            .chain_err_summary(|| format!("Invalid configuration file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

fn default_base_path() -> String {
    "/ajax".to_string()
}

fn default_timeout() -> u64 {
    16
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConf {
    /// Server root, e.g. `https://groupware.example.com`.
    pub url: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// A shell command whose standard output is the password.
    #[serde(default)]
    pub password_command: Option<String>,
    /// Request timeout in seconds, `0` disables it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

impl ServerConf {
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::new("Configuration error: `server.url` must be set")
                .set_kind(ErrorKind::Configuration));
        }
        url::Url::parse(&self.url).chain_err_summary(|| {
            format!(
                "Configuration error: `server.url` is not a valid URL: {}",
                self.url
            )
        })?;
        if self.password.is_some() == self.password_command.is_some() {
            return Err(Error::new(
                "Configuration error: exactly one of `server.password` or \
                 `server.password_command` must be set",
            )
            .set_kind(ErrorKind::Configuration));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout))
        }
    }

    /// Get the server password, either directly from the `password` settings
    /// value, or by running the `password_command` and reading the output.
    pub fn password(&self) -> Result<String> {
        if let Some(cmd) = self.password_command.as_deref() {
            let output = std::process::Command::new("sh")
                .args(["-c", cmd])
                .stdin(std::process::Stdio::inherit())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .output()?;

            if output.status.success() {
                Ok(String::from_utf8(output.stdout)?
                    .trim_end_matches(['\n', '\r'])
                    .to_string())
            } else {
                Err(Error::new(format!(
                    "`password_command` `{}` returned {}: {}",
                    cmd,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ))
                .set_kind(ErrorKind::Configuration))
            }
        } else if let Some(pass) = self.password.as_ref() {
            Ok(pass.clone())
        } else {
            Err(Error::new("No password configured").set_kind(ErrorKind::Configuration))
        }
    }

    /// The host part of [`ServerConf::url`], used as the origin of the scoped
    /// store when none is configured.
    pub fn origin(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

fn default_prefix() -> String {
    crate::storage::DEFAULT_PREFIX.to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConf {
    /// Force a backend instead of probing.
    #[serde(default)]
    pub mode: Option<StorageMode>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Directory for the file and sqlite3 backends. Defaults to the `XDG`
    /// data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Origin of the scoped store. Without one the scoped store is not
    /// available.
    #[serde(default)]
    pub origin: Option<String>,
}

impl Default for StorageConf {
    fn default() -> Self {
        Self {
            mode: None,
            prefix: default_prefix(),
            directory: None,
            origin: None,
        }
    }
}

impl StorageConf {
    fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::new("Configuration error: `storage.prefix` cannot be empty")
                .set_kind(ErrorKind::Configuration));
        }
        Ok(())
    }
}

fn default_days_before() -> u32 {
    7
}

fn default_days_after() -> u32 {
    30
}

/// The date window appointments are fetched and reconciled for.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConf {
    #[serde(default = "default_days_before")]
    pub days_before: u32,
    #[serde(default = "default_days_after")]
    pub days_after: u32,
}

impl Default for CalendarConf {
    fn default() -> Self {
        Self {
            days_before: default_days_before(),
            days_after: default_days_after(),
        }
    }
}

impl CalendarConf {
    /// `[start, end)` window around the day `now` falls in.
    pub fn window(&self, now: Timestamp) -> (Timestamp, Timestamp) {
        let today = datetime::start_of_day(now);
        (
            today - i64::from(self.days_before) * DAY,
            today + (i64::from(self.days_after) + 1) * DAY,
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConf {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file path overriding the default one in the `XDG` data directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = r#"
[server]
url = "https://groupware.example.com"
username = "alice"
password = "hunter2"
timeout = 0

[storage]
mode = "sql"
prefix = "ox."
origin = "groupware.example.com"

[calendar]
days_before = 1
days_after = 2

[log]
level = "DEBUG"
"#;

    #[test]
    fn test_conf_parse() {
        let settings = Settings::from_toml_str(CONF).unwrap();
        assert_eq!(settings.server.base_path, "/ajax");
        assert_eq!(settings.server.timeout(), None);
        assert_eq!(settings.server.password().unwrap(), "hunter2");
        assert_eq!(settings.server.origin().as_deref(), Some("groupware.example.com"));
        assert_eq!(settings.storage.mode, Some(StorageMode::Sql));
        assert_eq!(settings.log.level, LogLevel::DEBUG);
        let (start, end) = settings.calendar.window(DAY * 10 + 5);
        assert_eq!(start, DAY * 9);
        assert_eq!(end, DAY * 13);
    }

    #[test]
    fn test_conf_defaults() {
        let settings = Settings::from_toml_str(
            r#"
[server]
url = "https://groupware.example.com"
username = "alice"
password_command = "echo secret"
"#,
        )
        .unwrap();
        assert_eq!(settings.storage.prefix, "ox.");
        assert_eq!(settings.storage.mode, None);
        assert_eq!(settings.calendar, CalendarConf::default());
        assert_eq!(settings.server.timeout(), Some(Duration::from_secs(16)));
        assert_eq!(settings.server.password().unwrap(), "secret");
    }

    #[test]
    fn test_conf_invalid() {
        let err = Settings::from_toml_str(
            r#"
[server]
url = "https://groupware.example.com"
username = "alice"
"#,
        )
        .unwrap_err();
        assert!(err.kind.is_configuration());

        let err = Settings::from_toml_str(
            r#"
[server]
url = "https://groupware.example.com"
username = "alice"
password = "x"
[storage]
prefix = ""
"#,
        )
        .unwrap_err();
        assert!(err.kind.is_configuration());

        let err = Settings::from_toml_str("[server]\nurl = 3\n").unwrap_err();
        assert!(err.kind.is_configuration());
    }
}
