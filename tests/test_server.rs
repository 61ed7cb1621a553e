// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::thread;
use std::time::Duration;

use smipc::config::{ChannelOptions, ServerOptions};
use smipc::error::SmipcError;
use smipc::server::Server;

#[test]
fn rejects_matching_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let options = ServerOptions {
        s2c_suffix: ".same".to_string(),
        c2s_suffix: ".same".to_string(),
        ..ServerOptions::default()
    };
    let err = Server::open(dir.path(), options);
    assert!(matches!(err, Err(SmipcError::Config(_))));
}

#[test]
fn creates_root_directory_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");
    assert!(!root.exists());
    let server = Server::open(&root, ServerOptions::default()).unwrap();
    assert!(root.is_dir());
    drop(server);
}

#[test]
fn fails_on_non_directory_root_without_make_root() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"x").unwrap();
    let options = ServerOptions {
        make_root: false,
        ..ServerOptions::default()
    };
    let err = Server::open(&file_path, options);
    assert!(matches!(err, Err(SmipcError::Config(_))));
}

#[test]
fn duplicate_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::open(dir.path(), ServerOptions::default()).unwrap();

    let key = "dup";
    let root_for_client = dir.path().to_path_buf();
    let client_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        smipc::channel::Channel::connect_client(
            &root_for_client,
            "dup",
            ".p2s.smipc",
            ".s2p.smipc",
            ChannelOptions::default(),
        )
    });

    server.create(key, ChannelOptions::default()).unwrap();
    let _client = client_thread.join().unwrap().unwrap();

    let err = server.create(key, ChannelOptions::default());
    assert!(matches!(err, Err(SmipcError::Config(_))));
}

#[test]
fn close_unlinks_channel_and_len_tracks_bound_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::open(dir.path(), ServerOptions::default()).unwrap();

    let key = "closeable";
    let root_for_client = dir.path().to_path_buf();
    let client_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        smipc::channel::Channel::connect_client(
            &root_for_client,
            "closeable",
            ".p2s.smipc",
            ".s2p.smipc",
            ChannelOptions::default(),
        )
        .unwrap()
    });

    server.create(key, ChannelOptions::default()).unwrap();
    let _client = client_thread.join().unwrap();
    assert_eq!(server.len(), 1);

    server.close(key).unwrap();
    assert_eq!(server.len(), 0);
    assert!(server.close(key).is_err());
}
