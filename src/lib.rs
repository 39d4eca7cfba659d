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

#![deny(
    rustdoc::redundant_explicit_links,
    unsafe_op_in_unsafe_fn,
    /* groups */
    clippy::correctness,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::style,
    /* restriction */
    clippy::dbg_macro,
    clippy::rc_buffer,
    clippy::as_underscore,
    clippy::assertions_on_result_states,
    /* rustdoc */
    rustdoc::broken_intra_doc_links,
    /* pedantic */
    clippy::doc_markdown,
    clippy::expect_fun_call,
    clippy::or_fun_call,
    clippy::large_futures,
    clippy::unused_enumerate_index,
)]
#![allow(
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::significant_drop_tightening,
    clippy::multiple_crate_versions,
    clippy::cognitive_complexity
)]
#![doc = include_str!("../README.md")]
//!
//! ## Description
//!
//! A crate that keeps a groupware client's data available offline:
//! - Persist namespaced entries through whichever storage engine is available
//!   with [`Storage`] (see module [`storage`])
//! - Talk to the groupware backend's batched JSON endpoint through the
//!   [`GroupwareApi`] trait (see module [`groupware`])
//! - Hold the application state and restore it from storage with
//!   [`Datastore`] (see module [`datastore`])
//! - Merge server deltas into the cached lists (see module [`reconcile`])
//!
//! Other exports are
//! - Configuration with [`Settings`] (see module [`conf`])
//! - A `debug` macro that works like `std::dbg` but goes through the `log`
//!   facade. (see [`debug` macro](debug!))

#[macro_use]
pub mod dbg {

    #[allow(clippy::redundant_closure)]
    #[macro_export]
    macro_rules! debug {
        ($val:literal) => {
            {
                if cfg!(feature="debug-tracing") {
                    $crate::log::debug!($val);
                }
                $val
            }
        };
        ($val:expr) => {
            if cfg!(feature="debug-tracing") {
                let stringify = stringify!($val);
                // `match` keeps the temporaries of `$val` alive for the whole arm.
                match $val {
                    tmp => {
                        $crate::log::debug!("{} = {:?}", stringify, tmp);
                        tmp
                    }
                }
            } else {
                $val
            }
        };
        ($fmt:literal, $($arg:tt)*) => {
            if cfg!(feature="debug-tracing") {
                $crate::log::debug!($fmt, $($arg)*);
            }
        };
    }
}

#[macro_use]
pub mod utils;

pub use utils::{
    datetime::Timestamp,
    logging::{LogLevel, StderrLogger},
};

pub mod conf;
pub use conf::*;
pub mod error;
pub use error::*;
pub mod storage;
pub use storage::{Storage, StorageMode};
pub mod groupware;
pub use groupware::{GroupwareApi, Module};
pub mod datastore;
pub use datastore::{AppState, Datastore, DatastoreEvent, DatastoreEventConsumer};
pub mod reconcile;
pub use reconcile::{RefreshOutcome, RefreshScope};

#[macro_use]
extern crate serde_derive;
pub extern crate log;

pub extern crate futures;
pub extern crate indexmap;
#[cfg(feature = "sqlite3")]
pub extern crate rusqlite;
pub extern crate serde_path_to_error;
pub extern crate smallvec;
pub extern crate smol;
