mod common;
use crate::common::{TestResult, init_tracing};

use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;

use wmlkit::cache::{
    CacheDecision, CacheStore, FileCacheStore, IncrementalCache, MemoryCacheStore, PersistedCache,
};
use wmlkit::errors::WmlkitError;
use wmlkit::fs::mock::MockFileSystem;
use wmlkit::fs::{FileSystem, RealFileSystem};

fn mock_cache() -> (Arc<MockFileSystem>, IncrementalCache) {
    let fs = Arc::new(MockFileSystem::new());
    let cache = IncrementalCache::new(fs.clone());
    (fs, cache)
}

#[test]
fn unknown_file_is_not_skipped() {
    init_tracing();

    let (fs, cache) = mock_cache();
    fs.add_file_at("/addon/_main.cfg", "#define X\n#enddef", 1_000);

    assert!(!cache.should_skip(Path::new("/addon/_main.cfg")));
    assert_eq!(
        cache.decide(Path::new("/addon/_main.cfg")),
        CacheDecision::Proceed {
            modified: Some(1_000)
        }
    );
}

#[test]
fn processed_file_is_skipped_until_it_changes() {
    init_tracing();

    let (fs, cache) = mock_cache();
    let path = Path::new("/addon/units.cfg");
    fs.add_file_at(path, "[unit]\n[/unit]", 5_000);

    cache.mark_processed(path, 5_000);
    assert!(cache.should_skip(path));
    // Asking again changes nothing.
    assert!(cache.should_skip(path));

    fs.set_modified(path, 5_001);
    assert!(!cache.should_skip(path));

    cache.mark_processed(path, 5_001);
    assert!(cache.should_skip(path));
    assert_eq!(cache.timestamp_of(path), Some(5_001));
}

#[test]
fn unreadable_file_is_never_skipped() {
    init_tracing();

    let (_fs, cache) = mock_cache();
    let path = Path::new("/addon/gone.cfg");
    cache.mark_processed(path, 10);

    assert_eq!(
        cache.decide(path),
        CacheDecision::Proceed { modified: None }
    );
}

#[test]
fn relative_and_absolute_paths_share_one_entry() -> TestResult {
    init_tracing();

    let (_fs, cache) = mock_cache();
    let cwd = std::env::current_dir()?;
    cache.mark_processed(Path::new("scenarios/01.cfg"), 42);

    assert_eq!(cache.timestamp_of(&cwd.join("scenarios/01.cfg")), Some(42));
    assert_eq!(cache.len(), 1);

    Ok(())
}

#[test]
fn persisted_table_round_trips_through_memory_store() -> TestResult {
    init_tracing();

    let (_fs, cache) = mock_cache();
    cache.mark_processed(Path::new("/a.cfg"), 100);
    cache.mark_processed(Path::new("/b.cfg"), 200);

    let mut store = MemoryCacheStore::new();
    cache.save(&mut store)?;

    let persisted = store.read()?.expect("table was written");
    assert_eq!(persisted.files, vec!["/a.cfg", "/b.cfg"]);
    assert_eq!(persisted.timestamps, vec!["100", "200"]);

    let (_fs2, reloaded) = mock_cache();
    assert_eq!(reloaded.load(&store)?, 2);
    assert_eq!(reloaded.entries(), cache.entries());

    Ok(())
}

#[test]
fn mismatched_arrays_mean_no_cache() -> TestResult {
    init_tracing();

    let store = MemoryCacheStore::with_table(PersistedCache {
        files: vec!["/a.cfg".into(), "/b.cfg".into()],
        timestamps: vec!["100".into()],
    });

    let (_fs, cache) = mock_cache();
    cache.mark_processed(Path::new("/stale.cfg"), 1);
    assert_eq!(cache.load(&store)?, 0);
    assert!(cache.is_empty());

    Ok(())
}

#[test]
fn non_integer_timestamps_are_dropped_individually() -> TestResult {
    init_tracing();

    let store = MemoryCacheStore::with_table(PersistedCache {
        files: vec!["/a.cfg".into(), "/b.cfg".into()],
        timestamps: vec!["yesterday".into(), " 300 ".into()],
    });

    let (_fs, cache) = mock_cache();
    assert_eq!(cache.load(&store)?, 1);
    assert_eq!(cache.timestamp_of(Path::new("/b.cfg")), Some(300));
    assert_eq!(cache.timestamp_of(Path::new("/a.cfg")), None);

    Ok(())
}

#[test]
fn relative_keys_in_a_loaded_table_still_match() -> TestResult {
    init_tracing();

    let store = MemoryCacheStore::with_table(PersistedCache {
        files: vec!["a.cfg".into(), "b.cfg".into()],
        timestamps: vec!["100".into(), "200".into()],
    });

    let (fs, cache) = mock_cache();
    fs.add_file_at("a.cfg", "[unit]", 50);
    fs.add_file_at("b.cfg", "[unit]", 250);

    assert_eq!(cache.load(&store)?, 2);
    assert_eq!(cache.timestamp_of(Path::new("a.cfg")), Some(100));
    assert_eq!(
        cache.timestamp_of(&std::env::current_dir()?.join("b.cfg")),
        Some(200)
    );
    assert!(cache.should_skip(Path::new("a.cfg")));
    assert!(!cache.should_skip(Path::new("b.cfg")));

    Ok(())
}

#[test]
fn one_cache_shared_across_threads() -> TestResult {
    init_tracing();

    let fs = Arc::new(MockFileSystem::new());
    for i in 0..8 {
        fs.add_file_at(format!("/addon/file{i}.cfg"), "x", 1_000);
    }
    let cache = Arc::new(IncrementalCache::new(fs.clone()));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                let own = format!("/addon/file{i}.cfg");
                let neighbour = format!("/addon/file{}.cfg", (i + 1) % 8);
                for ts in 0..=1_000 {
                    cache.mark_processed(Path::new(&own), ts);
                    // Only ever observes a stored value or nothing.
                    let _ = cache.should_skip(Path::new(&neighbour));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(cache.len(), 8);
    for i in 0..8 {
        let path = format!("/addon/file{i}.cfg");
        assert_eq!(cache.timestamp_of(Path::new(&path)), Some(1_000));
        assert!(cache.should_skip(Path::new(&path)));
    }

    Ok(())
}

#[test]
fn file_store_writes_toml_atomically_and_reads_it_back() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("state").join("timestamps.toml");
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let mut store = FileCacheStore::new(&path, fs.clone());
    assert_eq!(store.read()?, None);

    let table = PersistedCache {
        files: vec!["/x.cfg".into()],
        timestamps: vec!["1718000000000".into()],
    };
    store.write(&table)?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("files"));
    assert!(text.contains("1718000000000"));
    assert_eq!(store.read()?, Some(table));

    // Nothing but the table itself is left behind in the directory.
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())?.collect();
    assert_eq!(leftovers.len(), 1);

    Ok(())
}

#[test]
fn corrupt_cache_file_is_a_cache_io_error() -> TestResult {
    init_tracing();

    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/cache.toml", "files = [1, 2");
    let store = FileCacheStore::new("/cache.toml", fs.clone());

    let cache = IncrementalCache::new(fs);
    match cache.load(&store) {
        Err(WmlkitError::CacheIo(msg)) => assert!(msg.contains("cache.toml")),
        other => panic!("expected CacheIo, got {other:?}"),
    }

    Ok(())
}

#[test]
fn clear_empties_the_table() {
    init_tracing();

    let (_fs, cache) = mock_cache();
    cache.mark_processed(Path::new("/a.cfg"), 1);
    cache.mark_processed(Path::new("/b.cfg"), 2);
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.entries().is_empty());
}

proptest! {
    /// After recording `recorded`, the file is skipped exactly when its
    /// current timestamp is not newer.
    #[test]
    fn skip_iff_stored_timestamp_not_older(recorded in -1_000_000i64..1_000_000, current in -1_000_000i64..1_000_000) {
        let (fs, cache) = mock_cache();
        let path = Path::new("/p/file.cfg");
        fs.add_file_at(path, "x", current);

        cache.mark_processed(path, recorded);
        prop_assert_eq!(cache.should_skip(path), recorded >= current);
        prop_assert_eq!(cache.is_up_to_date(path, current), recorded >= current);
    }

    /// Marking is an unconditional overwrite: the last value wins.
    #[test]
    fn last_mark_wins(stamps in proptest::collection::vec(any::<i64>(), 1..20)) {
        let (_fs, cache) = mock_cache();
        let path = Path::new("/p/file.cfg");
        for ts in &stamps {
            cache.mark_processed(path, *ts);
        }
        prop_assert_eq!(cache.timestamp_of(path), stamps.last().copied());
        prop_assert_eq!(cache.len(), 1);
    }
}
