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

#[cfg(not(test))]
use std::fs::OpenOptions;
use std::{
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
};

use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, PartialOrd, Serialize)]
#[repr(u8)]
pub enum LogLevel {
    OFF = 0,
    ERROR,
    WARN,
    #[default]
    INFO,
    DEBUG,
    TRACE,
}

impl From<u8> for LogLevel {
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => Self::OFF,
            1 => Self::ERROR,
            2 => Self::WARN,
            3 => Self::INFO,
            4 => Self::DEBUG,
            _ => Self::TRACE,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(l: Level) -> Self {
        match l {
            Level::Error => Self::ERROR,
            Level::Warn => Self::WARN,
            Level::Info => Self::INFO,
            Level::Debug => Self::DEBUG,
            Level::Trace => Self::TRACE,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::ERROR => Self::Error,
            LogLevel::WARN => Self::Warn,
            LogLevel::OFF | LogLevel::INFO => Self::Info,
            LogLevel::DEBUG => Self::Debug,
            LogLevel::TRACE => Self::Trace,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::OFF => Self::Off,
            LogLevel::ERROR => Self::Error,
            LogLevel::WARN => Self::Warn,
            LogLevel::INFO => Self::Info,
            LogLevel::DEBUG => Self::Debug,
            LogLevel::TRACE => Self::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::OFF => "OFF",
                Self::ERROR => "ERROR",
                Self::WARN => "WARN",
                Self::INFO => "INFO",
                Self::DEBUG => "DEBUG",
                Self::TRACE => "TRACE",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, PartialOrd, Serialize)]
pub enum Destination {
    File,
    #[default]
    Stderr,
    None,
}

struct FileOutput {
    writer: BufWriter<Box<dyn Write + Send>>,
    path: PathBuf,
}

/// A [`log::Log`] implementation that appends to a log file in the `XDG` data
/// directory and, if the `OXSYNC_DEBUG_STDERR` environment variable is set,
/// to stderr.
#[derive(Clone)]
pub struct StderrLogger {
    dest: Arc<Mutex<Option<FileOutput>>>,
    level: Arc<AtomicU8>,
    print_level: bool,
    print_module_names: bool,
    debug_dest: Destination,
}

impl std::fmt::Debug for StderrLogger {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct(stringify!(StderrLogger))
            .field("level", &LogLevel::from(self.level.load(Ordering::SeqCst)))
            .field("print_level", &self.print_level)
            .field("print_module_names", &self.print_module_names)
            .field("debug_dest", &self.debug_dest)
            .finish()
    }
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl StderrLogger {
    pub const APPLICATION_PREFIX: &'static str = "oxsync";
    pub const LOG_FILE_NAME: &'static str = "oxsync.log";

    pub fn new(level: LogLevel) -> Self {
        use std::sync::Once;

        static INIT_STDERR_LOGGING: Once = Once::new();

        #[cfg(not(test))]
        let logger = {
            let dest = match Self::open_default_log_file() {
                Ok(output) => Some(output),
                Err(err) => {
                    eprintln!("Could not create log file in XDG data directory: {err}");
                    None
                }
            };
            Self {
                dest: Arc::new(Mutex::new(dest)),
                level: Arc::new(AtomicU8::new(level as u8)),
                print_level: true,
                print_module_names: true,
                debug_dest: if std::env::var("OXSYNC_DEBUG_STDERR").is_ok() {
                    Destination::Stderr
                } else {
                    Destination::None
                },
            }
        };
        #[cfg(test)]
        let logger = {
            Self {
                dest: Arc::new(Mutex::new(Some(FileOutput {
                    writer: BufWriter::new(Box::new(std::io::stderr())),
                    path: PathBuf::new(),
                }))),
                level: Arc::new(AtomicU8::new(level as u8)),
                print_level: true,
                print_module_names: true,
                debug_dest: Destination::Stderr,
            }
        };

        #[cfg(feature = "debug-tracing")]
        log::set_max_level(
            if matches!(LevelFilter::from(logger.log_level()), LevelFilter::Off) {
                LevelFilter::Off
            } else {
                LevelFilter::Trace
            },
        );
        #[cfg(not(feature = "debug-tracing"))]
        log::set_max_level(LevelFilter::from(logger.log_level()));

        INIT_STDERR_LOGGING.call_once(|| {
            if let Err(err) = log::set_boxed_logger(Box::new(logger.clone())) {
                eprintln!("Could not install logger: {err}");
            }
        });
        logger
    }

    #[cfg(not(test))]
    fn open_default_log_file() -> crate::Result<FileOutput> {
        let data_dir = xdg::BaseDirectories::with_prefix(Self::APPLICATION_PREFIX)?;
        let path = data_dir.place_data_file(Self::LOG_FILE_NAME)?;
        Self::open_log_file(path)
    }

    #[cfg(not(test))]
    fn open_log_file(path: PathBuf) -> crate::Result<FileOutput> {
        let log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .open(&path)?;
        Ok(FileOutput {
            writer: BufWriter::new(Box::new(log_file)),
            path,
        })
    }

    pub fn log_level(&self) -> LogLevel {
        self.level.load(Ordering::SeqCst).into()
    }

    pub fn set_log_level(&mut self, new_val: LogLevel) {
        self.level.store(new_val as u8, Ordering::SeqCst);
        #[cfg(not(feature = "debug-tracing"))]
        log::set_max_level(LevelFilter::from(new_val));
    }

    #[cfg(not(test))]
    pub fn change_log_dest(&mut self, path: PathBuf) -> crate::Result<()> {
        let output = Self::open_log_file(path)?;
        *self.dest.lock()? = Some(output);
        Ok(())
    }

    pub fn log_dest(&self) -> Option<PathBuf> {
        self.dest
            .lock()
            .ok()
            .and_then(|d| d.as_ref().map(|d| d.path.clone()))
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        !["polling", "async_io", "isahc", "curl"]
            .iter()
            .any(|t| metadata.target().starts_with(t))
            && (metadata.level() <= Level::from(self.log_level())
                || !matches!(self.debug_dest, Destination::None))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        fn write(
            writer: &mut impl Write,
            record: &Record,
            (print_level, print_module_names): (bool, bool),
        ) -> Option<()> {
            writer
                .write_all(
                    super::datetime::timestamp_to_string(super::datetime::now()).as_bytes(),
                )
                .ok()?;
            writer.write_all(b" [").ok()?;
            if print_level {
                writer
                    .write_all(record.level().to_string().as_bytes())
                    .ok()?;
            }
            write!(writer, "]: ").ok()?;
            if print_module_names {
                write!(writer, "{}: ", record.metadata().target()).ok()?;
            }
            write!(writer, "{}", record.args()).ok()?;
            writer.write_all(b"\n").ok()?;
            writer.flush().ok()?;
            Some(())
        }

        let in_level = self.log_level() != LogLevel::OFF
            && LogLevel::from(record.metadata().level()) <= self.log_level();
        let opts = (self.print_level, self.print_module_names);
        match (self.debug_dest, in_level) {
            (Destination::None, false) => {}
            (Destination::None | Destination::File, _) => {
                _ = self.dest.lock().ok().and_then(|mut d| {
                    d.as_mut().and_then(|d| write(&mut d.writer, record, opts))
                });
            }
            (Destination::Stderr, true) => {
                _ = self.dest.lock().ok().and_then(|mut d| {
                    d.as_mut().and_then(|d| write(&mut d.writer, record, opts))
                });
                _ = write(&mut std::io::stderr(), record, opts);
            }
            (Destination::Stderr, false) => {
                _ = write(&mut std::io::stderr(), record, opts);
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut dest) = self.dest.lock() {
            if let Some(d) = dest.as_mut() {
                _ = d.writer.flush();
            }
        }
    }
}
