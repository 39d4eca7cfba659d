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

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn unique_origin(name: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}-{}.test",
        name,
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// One storage per backend mode, each in its own temporary directory.
fn all_modes() -> Vec<(tempfile::TempDir, Storage)> {
    let mut modes = vec![StorageMode::Local, StorageMode::Scoped];
    if cfg!(feature = "sqlite3") {
        modes.push(StorageMode::Sql);
    }
    modes
        .into_iter()
        .map(|mode| {
            let tmp = tempfile::tempdir().unwrap();
            let conf = StorageConf {
                mode: Some(mode),
                prefix: DEFAULT_PREFIX.to_string(),
                directory: Some(tmp.path().to_path_buf()),
                origin: Some(unique_origin(mode.as_str())),
            };
            let storage = Storage::init(&conf);
            assert_eq!(storage.mode(), mode);
            (tmp, storage)
        })
        .collect()
}

#[test]
fn test_storage_probe_order() {
    let tmp = tempfile::tempdir().unwrap();
    let conf = StorageConf {
        directory: Some(tmp.path().to_path_buf()),
        origin: Some(unique_origin("probe")),
        ..StorageConf::default()
    };
    assert_eq!(Storage::init(&conf).mode(), StorageMode::Local);

    // Without a usable directory the file store is skipped and the scoped
    // store wins.
    let conf = StorageConf {
        directory: Some(tmp.path().join("does-not-exist")),
        origin: Some(unique_origin("probe")),
        ..StorageConf::default()
    };
    assert_eq!(Storage::init(&conf).mode(), StorageMode::Scoped);

    // Nothing available.
    let conf = StorageConf {
        directory: Some(tmp.path().join("does-not-exist")),
        origin: None,
        ..StorageConf::default()
    };
    let storage = Storage::init(&conf);
    assert_eq!(storage.mode(), StorageMode::Fail);
    assert!(!storage.is_available());
}

#[test]
fn test_storage_round_trip_every_mode() {
    for (_tmp, storage) in all_modes() {
        for (key, value) in [
            ("folderTree", "[1,2,3]"),
            ("userData", "{\"user_id\":3}"),
            ("empty", ""),
            ("unicode ключ", "värde"),
        ] {
            storage.set_item(key, value, false).unwrap();
            assert_eq!(
                storage.get_item(key, false).as_deref(),
                Some(value),
                "mode {}",
                storage.mode()
            );
            storage.set_item(key, value, true).unwrap();
            assert_eq!(storage.get_item(key, true).as_deref(), Some(value));
        }
        storage.set_item("folderTree", "[4]", false).unwrap();
        assert_eq!(storage.get_item("folderTree", false).as_deref(), Some("[4]"));
        assert_eq!(storage.get_item("missing", false), None);
    }
}

#[test]
fn test_storage_flush_keeps_persistent_entries() {
    for (_tmp, storage) in all_modes() {
        storage.set_item("contacts", "[]", false).unwrap();
        storage.set_item("appointments", "[]", false).unwrap();
        storage.set_item("userData", "{}", true).unwrap();
        storage.set_item("language", "\"en_US\"", true).unwrap();
        assert_eq!(storage.len(), 4);

        storage.flush_storage(false).unwrap();
        assert_eq!(storage.get_item("contacts", false), None);
        assert_eq!(storage.get_item("appointments", false), None);
        assert_eq!(storage.get_item("userData", true).as_deref(), Some("{}"));
        assert_eq!(storage.get_item("language", true).as_deref(), Some("\"en_US\""));
        assert_eq!(storage.len(), 2);

        storage.flush_storage(true).unwrap();
        assert_eq!(storage.get_item("userData", true), None);
        assert!(storage.is_empty(), "mode {}", storage.mode());
    }
}

#[test]
fn test_storage_flush_leaves_other_namespaces() {
    let origin = unique_origin("namespaces");
    let conf = StorageConf {
        mode: Some(StorageMode::Scoped),
        origin: Some(origin.clone()),
        ..StorageConf::default()
    };
    let ours = Storage::init(&conf);
    let mut theirs = Storage::init(&conf);
    theirs.set_prefix("other.");
    assert_eq!(theirs.prefix(), "other.");

    ours.set_item("a", "1", false).unwrap();
    theirs.set_item("a", "2", false).unwrap();
    ours.flush_storage(true).unwrap();
    assert_eq!(ours.get_item("a", false), None);
    assert_eq!(theirs.get_item("a", false).as_deref(), Some("2"));
    assert_eq!(ours.len(), 0);
    assert_eq!(theirs.len(), 1);
}

#[test]
fn test_storage_remove_item_removes_both_variants() {
    for (_tmp, storage) in all_modes() {
        storage.set_item("session", "a", false).unwrap();
        storage.set_item("session", "b", true).unwrap();
        storage.remove_item("session").unwrap();
        assert_eq!(storage.get_item("session", false), None);
        assert_eq!(storage.get_item("session", true), None);
        storage.remove_item("never-written").unwrap();
    }
}

#[test]
fn test_storage_json_fails_softly() {
    #[derive(Debug, Deserialize, PartialEq, Serialize)]
    struct UserData {
        user_id: u64,
    }

    for (_tmp, storage) in all_modes() {
        storage
            .set_json("userData", &UserData { user_id: 7 }, true)
            .unwrap();
        assert_eq!(
            storage.get_json::<UserData>("userData", true),
            Some(UserData { user_id: 7 })
        );
        storage.set_item("userData", "{not json", false).unwrap();
        assert_eq!(storage.get_json::<UserData>("userData", false), None);
        assert!(storage
            .try_get_json::<UserData>("userData", false)
            .unwrap_err()
            .kind
            .is_storage());
        assert_eq!(storage.try_get_json::<UserData>("nothing", false).unwrap(), None);
    }
}

#[test]
fn test_storage_fail_mode_is_empty_cache() {
    let storage = Storage::init(&StorageConf {
        mode: Some(StorageMode::Fail),
        ..StorageConf::default()
    });
    assert_eq!(storage.mode(), StorageMode::Fail);
    storage.set_item("a", "1", false).unwrap();
    storage.set_json("b", &[1, 2, 3], true).unwrap();
    assert_eq!(storage.get_item("a", false), None);
    assert_eq!(storage.get_json::<Vec<u32>>("b", true), None);
    storage.remove_item("a").unwrap();
    storage.flush_storage(true).unwrap();
    assert_eq!(storage.len(), 0);
}

#[test]
fn test_storage_file_store_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let conf = StorageConf {
        mode: Some(StorageMode::Local),
        directory: Some(tmp.path().to_path_buf()),
        ..StorageConf::default()
    };
    {
        let storage = Storage::init(&conf);
        storage.set_item("contacts", "[1]", false).unwrap();
    }
    let storage = Storage::init(&conf);
    assert_eq!(storage.get_item("contacts", false).as_deref(), Some("[1]"));

    std::fs::write(tmp.path().join(FileStore::FILE_NAME), b"garbage").unwrap();
    let storage = Storage::init(&conf);
    assert_eq!(storage.mode(), StorageMode::Local);
    assert_eq!(storage.get_item("contacts", false), None);
}

#[test]
fn test_storage_rejects_marker_keys() {
    for (_tmp, storage) in all_modes() {
        storage.set_item("session", "kept", true).unwrap();
        let err = storage
            .set_item("iwillstay.session", "clobbered", false)
            .unwrap_err();
        assert!(err.kind.is_value_error());
        storage.remove_item("iwillstay.session").unwrap_err();
        storage
            .try_get_json::<String>("iwillstay.session", false)
            .unwrap_err();
        assert_eq!(storage.get_item("iwillstay.session", false), None);
        assert_eq!(storage.get_item("session", true).as_deref(), Some("kept"));
        assert_eq!(storage.len(), 1);
    }
}
