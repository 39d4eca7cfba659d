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

use crate::{groupware::Record, utils::datetime::Timestamp};

/// A cached list of records of one module (or one mail folder) and the
/// server timestamp it is current as of.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Snapshot<T> {
    pub records: Vec<T>,
    pub last_update: Timestamp,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            records: vec![],
            last_update: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

impl<T: Record> Snapshot<T> {
    pub fn new(records: Vec<T>, last_update: Timestamp) -> Self {
        Self {
            records,
            last_update,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.records.iter().position(|r| r.key() == *key)
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.position(key).map(|i| &self.records[i])
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.position(key).is_some()
    }

    /// Replaces the record with the same key in place, or appends it.
    pub fn upsert(&mut self, record: T) -> Upsert {
        match self.position(&record.key()) {
            Some(i) if self.records[i] == record => Upsert::Unchanged,
            Some(i) => {
                self.records[i] = record;
                Upsert::Updated
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.position(key).map(|i| self.records.remove(i))
    }

    /// Keeps the records `keep` returns `true` for and returns the others.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> Vec<T> {
        let (kept, removed): (Vec<T>, Vec<T>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| keep(r));
        self.records = kept;
        removed
    }

    /// Moves `last_update` forward to `timestamp`. Older timestamps are
    /// ignored.
    pub fn advance(&mut self, timestamp: Timestamp) {
        if timestamp > self.last_update {
            self.last_update = timestamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupware::Contact;

    fn contact(id: u64, name: &str) -> Contact {
        Contact {
            id,
            folder_id: "6".into(),
            last_modified: None,
            display_name: Some(name.into()),
            first_name: None,
            last_name: None,
            email1: None,
            email2: None,
            email3: None,
            telephone_business1: None,
            cellular_telephone1: None,
            company: None,
        }
    }

    #[test]
    fn test_snapshot_upsert() {
        let mut snapshot = Snapshot::new(vec![contact(1, "a"), contact(2, "b")], 10);
        assert_eq!(snapshot.upsert(contact(2, "b")), Upsert::Unchanged);
        assert_eq!(snapshot.upsert(contact(2, "c")), Upsert::Updated);
        assert_eq!(snapshot.upsert(contact(2, "c")), Upsert::Unchanged);
        assert_eq!(snapshot.upsert(contact(3, "d")), Upsert::Inserted);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.records[1].display_name.as_deref(), Some("c"));
    }

    #[test]
    fn test_snapshot_retain_and_advance() {
        let mut snapshot = Snapshot::new(vec![contact(1, "a"), contact(2, "b")], 10);
        let removed = snapshot.retain(|c| c.id != 1);
        assert_eq!(removed, vec![contact(1, "a")]);
        assert!(snapshot.contains(&2));
        assert!(!snapshot.contains(&1));

        snapshot.advance(5);
        assert_eq!(snapshot.last_update, 10);
        snapshot.advance(20);
        assert_eq!(snapshot.last_update, 20);
    }
}
