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

//! Timestamps as the groupware backend uses them: milliseconds since the Unix
//! epoch, in UTC.
//!
//! Calendar day arithmetic is done in UTC. The backend stores full-time
//! appointments at UTC midnight, so day boundaries of multi-day appointments
//! line up with UTC days.

use chrono::{SecondsFormat, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// One calendar day in milliseconds.
pub const DAY: Timestamp = 86_400_000;

pub fn now() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Start of the UTC day `timestamp` falls in.
pub fn start_of_day(timestamp: Timestamp) -> Timestamp {
    timestamp - timestamp.rem_euclid(DAY)
}

/// Number of calendar days the interval `[start, end)` touches, counted as
/// `ceil((end - start) / DAY)`. Empty or inverted intervals span zero days.
pub fn days_spanned(start: Timestamp, end: Timestamp) -> u32 {
    if end <= start {
        return 0;
    }
    let span = end - start;
    let days = span / DAY + i64::from(span % DAY != 0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// RFC 3339 rendering used in log lines.
pub fn timestamp_to_string(timestamp: Timestamp) -> String {
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => format!("@{}", timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_start_of_day() {
        // 2024-03-05T13:20:00Z
        let ts = 1_709_644_800_000;
        assert_eq!(start_of_day(ts), 1_709_596_800_000);
        assert_eq!(start_of_day(1_709_596_800_000), 1_709_596_800_000);
        assert_eq!(start_of_day(-1), -DAY);
    }

    #[test]
    fn test_datetime_days_spanned() {
        let d0 = 1_709_596_800_000;
        assert_eq!(days_spanned(d0, d0), 0);
        assert_eq!(days_spanned(d0, d0 - 1), 0);
        assert_eq!(days_spanned(d0, d0 + 1), 1);
        assert_eq!(days_spanned(d0, d0 + DAY), 1);
        assert_eq!(days_spanned(d0, d0 + DAY + 1), 2);
        assert_eq!(days_spanned(d0, d0 + 3 * DAY), 3);
    }

    #[test]
    fn test_datetime_to_string() {
        assert_eq!(timestamp_to_string(1_709_596_800_000), "2024-03-05T00:00:00Z");
    }
}
