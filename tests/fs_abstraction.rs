mod common;
use crate::common::{TestResult, init_tracing};

use std::path::Path;
use std::sync::Arc;

use wmlkit::cache::{FileCacheStore, IncrementalCache};
use wmlkit::fs::mock::MockFileSystem;
use wmlkit::fs::{FileSystem, RealFileSystem};

#[test]
fn mock_writes_always_move_the_clock_forward() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let path = Path::new("/addon/_main.cfg");
    fs.add_file(path, "v1");
    let first = fs.modified_millis(path)?;

    fs.write_atomic(path, b"v2")?;
    let second = fs.modified_millis(path)?;

    assert!(second > first);
    assert_eq!(fs.read_to_string(path)?, "v2");
    assert!(fs.is_dir(Path::new("/addon")));
    assert!(!fs.is_file(Path::new("/addon")));

    Ok(())
}

#[test]
fn cache_persists_through_the_mock_filesystem() -> TestResult {
    init_tracing();

    let fs = Arc::new(MockFileSystem::new());
    let input = Path::new("/addon/units.cfg");
    fs.add_file_at(input, "[unit]", 700);

    let cache = IncrementalCache::new(fs.clone());
    cache.mark_processed(input, 700);
    let mut store = FileCacheStore::new("/state/timestamps.toml", fs.clone());
    cache.save(&mut store)?;

    let text = fs.read_to_string(Path::new("/state/timestamps.toml"))?;
    assert!(text.contains("/addon/units.cfg"));
    assert!(text.contains("\"700\""));

    let reloaded = IncrementalCache::new(fs.clone());
    reloaded.load(&store)?;
    assert!(reloaded.should_skip(input));

    fs.set_modified(input, 701);
    assert!(!reloaded.should_skip(input));

    Ok(())
}

#[test]
fn real_filesystem_reports_millisecond_mtimes() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("a.cfg");
    let fs = RealFileSystem;

    fs.write_atomic(&path, b"[scenario]\n[/scenario]\n")?;
    let modified = fs.modified_millis(&path)?;
    // Some time after 2020-01-01.
    assert!(modified > 1_577_836_800_000);
    assert_eq!(fs.read_to_string(&path)?, "[scenario]\n[/scenario]\n");
    assert!(fs.modified_millis(&dir.path().join("missing.cfg")).is_err());

    Ok(())
}
