use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use tempfile::TempDir;
use treehash_core::PipelineCounters;
use treehash_scan::{DirId, FilterSyntax, NameFilter, VisitedDirs, Walker};

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("a/b/c")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::create_dir(root.join("empty")).unwrap();

    fs::write(root.join("top.txt"), "top").unwrap();
    fs::write(root.join("a/one.txt"), "1").unwrap();
    fs::write(root.join("a/b/two.txt"), "22").unwrap();
    fs::write(root.join("a/b/c/three.txt"), "333").unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "js").unwrap();

    temp
}

fn collect(walker: Walker, root: PathBuf) -> (Vec<PathBuf>, treehash_scan::WalkReport) {
    let mut stream = walker.walk(root, 2).unwrap();
    let paths: Vec<_> = stream.by_ref().map(|t| t.path).collect();
    (paths, stream.finish().unwrap())
}

#[test]
fn test_walk_finds_every_file_once() {
    let temp = create_test_tree();
    let (paths, report) = collect(
        Walker::new(NameFilter::disabled()).with_walkers(3),
        temp.path().to_path_buf(),
    );

    assert_eq!(paths.len(), 5);
    let unique: HashSet<_> = paths.iter().collect();
    assert_eq!(unique.len(), 5);
    assert!(paths.iter().all(|p| p.starts_with(temp.path())));
    assert!(report.completed);
    assert_eq!(report.files_emitted, 5);
    assert_eq!(report.dirs_visited, 7);
}

#[test]
fn test_walk_reports_sizes() {
    let temp = create_test_tree();
    let mut stream = Walker::new(NameFilter::disabled())
        .walk(temp.path(), 0)
        .unwrap();

    for task in stream.by_ref() {
        assert_eq!(task.size, fs::metadata(&task.path).unwrap().len());
    }
    assert!(stream.finish().unwrap().completed);
}

#[test]
fn test_filter_prunes_matching_directory() {
    let temp = create_test_tree();
    let filter = NameFilter::compile(Some("^node_modules$"), FilterSyntax::Regex);
    let (paths, report) = collect(Walker::new(filter), temp.path().to_path_buf());

    assert_eq!(paths.len(), 4);
    assert!(!paths.iter().any(|p| p.ends_with("index.js")));
    // The pruned directory and its child are never listed.
    assert_eq!(report.dirs_visited, 5);
}

#[test]
fn test_filter_applies_at_every_depth() {
    let temp = create_test_tree();
    let filter = NameFilter::compile(Some("^b$"), FilterSyntax::Regex);
    let (paths, _) = collect(Walker::new(filter), temp.path().to_path_buf());

    let names: HashSet<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains("one.txt"));
    assert!(!names.contains("two.txt"));
    assert!(!names.contains("three.txt"));
}

#[test]
fn test_glob_filter_on_files() {
    let temp = create_test_tree();
    let filter = NameFilter::compile(Some("*.txt"), FilterSyntax::Glob);
    let (paths, _) = collect(Walker::new(filter), temp.path().to_path_buf());

    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("index.js"));
}

#[test]
fn test_walk_into_counts_dispatched_files() {
    let temp = create_test_tree();
    let counters = Arc::new(PipelineCounters::new());
    let (tx, rx) = bounded(0);

    let consumer = thread::spawn(move || rx.iter().count());
    let report = Walker::new(NameFilter::disabled())
        .with_walkers(1)
        .walk_into(temp.path(), tx, Arc::clone(&counters))
        .unwrap();

    assert_eq!(consumer.join().unwrap(), 5);
    assert_eq!(report.files_emitted, 5);
    assert_eq!(counters.files_dispatched(), 5);
    assert_eq!(counters.dirs_visited(), 7);
}

#[test]
fn test_wide_tree_with_few_walkers() {
    let temp = TempDir::new().unwrap();
    for i in 0..200 {
        let dir = temp.path().join(format!("dir{i:03}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("file"), i.to_string()).unwrap();
    }

    let (paths, report) = collect(
        Walker::new(NameFilter::disabled()).with_walkers(2),
        temp.path().to_path_buf(),
    );
    assert_eq!(paths.len(), 200);
    assert_eq!(report.dirs_visited, 201);
}

#[test]
fn test_missing_root_is_a_warning() {
    let temp = TempDir::new().unwrap();
    let (paths, report) = collect(
        Walker::new(NameFilter::disabled()),
        temp.path().join("missing"),
    );
    assert!(paths.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.dirs_visited, 0);
}

#[cfg(unix)]
#[test]
fn test_visited_dirs_detects_repeat() {
    let temp = TempDir::new().unwrap();
    let metadata = fs::metadata(temp.path()).unwrap();
    let id = DirId::from_metadata(&metadata).unwrap();

    let visited = VisitedDirs::new();
    assert!(visited.first_visit(id));
    assert!(!visited.first_visit(id));
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_loop_terminates() {
    let temp = create_test_tree();
    std::os::unix::fs::symlink(temp.path(), temp.path().join("a/b/c/up")).unwrap();
    std::os::unix::fs::symlink(temp.path().join("top.txt"), temp.path().join("alias.txt"))
        .unwrap();

    let (skipped, _) = collect(Walker::new(NameFilter::disabled()), temp.path().to_path_buf());
    assert_eq!(skipped.len(), 5);

    let (followed, report) = collect(
        Walker::new(NameFilter::disabled()).with_follow_symlinks(true),
        temp.path().to_path_buf(),
    );
    assert_eq!(followed.len(), 6);
    assert!(report.completed);
}
