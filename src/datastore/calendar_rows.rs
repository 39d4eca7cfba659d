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

//! Rows of the calendar list. Every appointment has a master row shown on its
//! start day; an appointment spanning N days gets N-1 more rows, one for each
//! following day.

use smallvec::SmallVec;

use crate::{
    groupware::{Appointment, AppointmentKey, Record},
    utils::datetime::{start_of_day, Timestamp, DAY},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RowKey {
    pub appointment: AppointmentKey,
    /// `0` for the master row, `k` for the row shown `k` days after the start
    /// day.
    pub day_index: u32,
}

impl RowKey {
    pub const fn master(appointment: AppointmentKey) -> Self {
        Self {
            appointment,
            day_index: 0,
        }
    }

    pub const fn is_master(&self) -> bool {
        self.day_index == 0
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CalendarRow {
    pub key: RowKey,
    /// Start of the day the row is listed under.
    pub show_on_day: Timestamp,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub title: Option<String>,
    pub location: Option<String>,
    pub folder_id: String,
    pub full_time: bool,
}

impl CalendarRow {
    pub fn is_synthetic(&self) -> bool {
        !self.key.is_master()
    }
}

pub type Rows = SmallVec<[CalendarRow; 4]>;

/// Number of synthetic rows of `appointment`.
pub fn synthetic_count(appointment: &Appointment) -> u32 {
    appointment.days().saturating_sub(1)
}

/// The master row of `appointment` followed by its synthetic rows.
pub fn expand(appointment: &Appointment) -> Rows {
    let key = appointment.key();
    let first_day = start_of_day(appointment.start_date);
    (0..=synthetic_count(appointment))
        .map(|day_index| CalendarRow {
            key: RowKey {
                appointment: key,
                day_index,
            },
            show_on_day: first_day + i64::from(day_index) * DAY,
            start_date: appointment.start_date,
            end_date: appointment.end_date,
            title: appointment.title.clone(),
            location: appointment.location.clone(),
            folder_id: appointment.folder_id.clone(),
            full_time: appointment.full_time,
        })
        .collect()
}

/// Keys of the rows [`expand`] generates for `appointment`.
pub fn row_keys(appointment: &Appointment) -> SmallVec<[RowKey; 4]> {
    let key = appointment.key();
    (0..=synthetic_count(appointment))
        .map(|day_index| RowKey {
            appointment: key,
            day_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const D0: Timestamp = 1_709_596_800_000;

    fn appointment(id: u64, start: Timestamp, end: Timestamp) -> Appointment {
        Appointment {
            id,
            folder_id: "25".into(),
            last_modified: None,
            title: Some(format!("appointment {}", id)),
            start_date: start,
            end_date: end,
            note: None,
            recurrence_id: None,
            recurrence_position: None,
            recurrence_type: None,
            participants: vec![],
            location: None,
            full_time: false,
            shown_as: None,
        }
    }

    #[test]
    fn test_calendar_rows_single_day() {
        let rows = expand(&appointment(1, D0 + 9 * 3_600_000, D0 + 10 * 3_600_000));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].key.is_master());
        assert_eq!(rows[0].show_on_day, D0);

        // Zero length and inverted appointments still get their master row.
        assert_eq!(expand(&appointment(2, D0, D0)).len(), 1);
        assert_eq!(expand(&appointment(3, D0, D0 - DAY)).len(), 1);
    }

    #[test]
    fn test_calendar_rows_multi_day() {
        for n in 2..=6_u32 {
            let a = appointment(1, D0, D0 + i64::from(n) * DAY);
            let rows = expand(&a);
            assert_eq!(rows.len() as u32, n);
            let synthetic: Vec<&CalendarRow> = rows.iter().filter(|r| r.is_synthetic()).collect();
            assert_eq!(synthetic.len() as u32, n - 1);
            for (k, row) in synthetic.iter().enumerate() {
                assert_eq!(row.show_on_day, D0 + (k as i64 + 1) * DAY);
                assert_eq!(row.start_date, D0);
            }
            assert_eq!(row_keys(&a).len() as u32, n);
        }

        // Starting mid-day: the day count is ceil(duration / day), and the
        // synthetic rows are listed from the following midnight.
        let afternoon = D0 + 15 * 3_600_000;
        let rows = expand(&appointment(1, afternoon, afternoon + 2 * DAY));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].show_on_day, D0);
        assert_eq!(rows[1].show_on_day, D0 + DAY);

        let rows = expand(&appointment(1, afternoon, afternoon + 2 * DAY + 1));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].show_on_day, D0 + 2 * DAY);

        // Crossing midnight in less than a day keeps a single row.
        assert_eq!(expand(&appointment(1, afternoon, afternoon + 18 * 3_600_000)).len(), 1);

        // A partial day counts as a day.
        assert_eq!(expand(&appointment(1, D0, D0 + DAY + 1)).len(), 2);
    }
}
