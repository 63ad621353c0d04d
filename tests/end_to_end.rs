//! Store and index used together, the way a segment drives them.

use commitlog::{Config, Index, LogError, Store};
use std::fs::{self, OpenOptions};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn config(max_index_bytes: u64) -> Config {
    let mut config = Config::default();
    config.segment.max_index_bytes = max_index_bytes;
    config
}

#[test]
fn test_append_then_lookup() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("0.store")).unwrap();
    let index = Index::open(dir.path().join("0.index"), &config(1024)).unwrap();

    let (n, pos) = store.append(b"hello").unwrap();
    assert_eq!((n, pos), (13, 0));
    index.write(0, pos).unwrap();

    let (_, pos) = store.append(b"world!").unwrap();
    assert_eq!(pos, 13);
    index.write(1, pos).unwrap();

    assert_eq!(index.read(-1).unwrap(), (1, 13));
    assert_eq!(store.read(13).unwrap(), b"world!");

    let (_, first) = index.read(0).unwrap();
    assert_eq!(store.read(first).unwrap(), b"hello");
}

#[test]
fn test_close_truncates_index() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("0.index");

    let index = Index::open(&path, &config(1024)).unwrap();
    index.write(0, 0).unwrap();
    index.write(1, 13).unwrap();
    index.close().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 24);
}

#[test]
fn test_reopen_pair() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("0.store");
    let index_path = dir.path().join("0.index");
    let payloads: Vec<Vec<u8>> = (0..20).map(|i| format!("record {}", i).into_bytes()).collect();

    {
        let store = Store::open(&store_path).unwrap();
        let index = Index::open(&index_path, &config(1024)).unwrap();
        for (i, payload) in payloads.iter().enumerate() {
            let (_, pos) = store.append(payload).unwrap();
            index.write(i as u32, pos).unwrap();
        }
        index.close().unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&store_path).unwrap();
    let index = Index::open(&index_path, &config(1024)).unwrap();
    assert_eq!(index.entries().unwrap(), 20);
    assert_eq!(store.verify().unwrap(), 20);

    for (i, payload) in payloads.iter().enumerate() {
        let (off, pos) = index.read(i as i64).unwrap();
        assert_eq!(off, i as u32);
        assert_eq!(&store.read(pos).unwrap(), payload);
    }

    // New records continue where the old ones stopped.
    let (_, pos) = store.append(b"after reopen").unwrap();
    index.write(20, pos).unwrap();
    let (off, pos) = index.read(-1).unwrap();
    assert_eq!(off, 20);
    assert_eq!(store.read(pos).unwrap(), b"after reopen");
}

#[test]
fn test_index_full_signals_rollover() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("0.store")).unwrap();
    let index = Index::open(dir.path().join("0.index"), &config(3 * 12)).unwrap();

    let mut written = 0u32;
    loop {
        let (_, pos) = store.append(b"payload").unwrap();
        match index.write(written, pos) {
            Ok(()) => written += 1,
            Err(LogError::IndexFull { size, capacity }) => {
                assert_eq!(size, 36);
                assert_eq!(capacity, 36);
                break;
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(written, 3);
    assert_eq!(index.size().unwrap(), 36);
    assert_eq!(index.read(-1).unwrap(), (2, 30));
}

#[test]
fn test_caller_supplied_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let open = |name: &str| {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dir.path().join(name))
            .unwrap()
    };

    let config = Config::from_json(
        r#"{"segment": {"max_index_bytes": 120, "max_store_bytes": 64, "initial_offset": 16}}"#,
    )
    .unwrap();
    let store = Store::with_config(open("16.store"), &config).unwrap();
    let index = Index::new(open("16.index"), &config).unwrap();
    assert_eq!(index.capacity(), 120);

    let base = config.segment.initial_offset;
    for next in base..base + 2 {
        let (_, pos) = store.append(b"sixteen bytes!!!").unwrap();
        index.write((next - base) as u32, pos).unwrap();
    }

    // Two 24-byte records fit in 64 bytes, a third does not.
    assert!(matches!(
        store.append(b"sixteen bytes!!!"),
        Err(LogError::StoreFull { .. })
    ));
    assert_eq!(index.read(-1).unwrap(), (1, 24));
}
