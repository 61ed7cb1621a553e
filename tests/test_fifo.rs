// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use smipc::fifo::{DuplexPipe, Reader, TemporaryPipe, Writer};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_path(dir: &tempfile::TempDir, label: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.path()
        .join(format!("{label}-{}-{n}", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn reader_and_writer_round_trip_a_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = unique_path(&dir, "endpoint");
    let _pipe = TemporaryPipe::create_default(&path).unwrap();

    let read_path = path.clone();
    let reader_thread = thread::spawn(move || {
        let reader = Reader::open(&read_path).unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        buf
    });

    // Give the reader a moment to open before the writer does.
    thread::sleep(Duration::from_millis(20));
    let writer = Writer::open(&path).unwrap();
    writer.write_all(b"hello").unwrap();

    let received = reader_thread.join().unwrap();
    assert_eq!(&received, b"hello");
}

#[test]
fn duplex_pipe_opens_both_ends_without_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let a_to_b = unique_path(&dir, "a2b");
    let b_to_a = unique_path(&dir, "b2a");
    let _a_to_b_node = TemporaryPipe::create_default(&a_to_b).unwrap();
    let _b_to_a_node = TemporaryPipe::create_default(&b_to_a).unwrap();

    let a_to_b_for_b = a_to_b.clone();
    let b_to_a_for_b = b_to_a.clone();
    let side_b = thread::spawn(move || {
        // Side B writes to a_to_b's reverse direction: it writes on b_to_a
        // and reads from a_to_b.
        DuplexPipe::open(&b_to_a_for_b, &a_to_b_for_b, Duration::from_secs(2)).unwrap()
    });

    let side_a = DuplexPipe::open(&a_to_b, &b_to_a, Duration::from_secs(2)).unwrap();
    let side_b = side_b.join().unwrap();

    side_a.writer.write_all(b"ping").unwrap();
    let mut buf = [0u8; 4];
    side_b.reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");

    side_b.writer.write_all(b"pong").unwrap();
    let mut buf = [0u8; 4];
    side_a.reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"pong");
}

#[test]
fn duplex_pipe_times_out_without_a_peer() {
    let dir = tempfile::tempdir().unwrap();
    let a_to_b = unique_path(&dir, "lonely-a2b");
    let b_to_a = unique_path(&dir, "lonely-b2a");
    let _a_to_b_node = TemporaryPipe::create_default(&a_to_b).unwrap();
    let _b_to_a_node = TemporaryPipe::create_default(&b_to_a).unwrap();

    // Nobody opens b_to_a for writing, so the read side of DuplexPipe::open
    // never unblocks and the call must time out instead of hanging forever.
    let result = DuplexPipe::open(&a_to_b, &b_to_a, Duration::from_millis(100));
    assert!(result.is_err());
}
