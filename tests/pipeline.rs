/*!
 * Integration tests through the public API
 */

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use indicatif::ProgressBar;

use ctxpack::{
    CancellationToken, ContextConfig, PackError, Pipeline, ScanConfig, Scanner, SectionState,
};
use tempfile::tempdir;

#[test]
fn test_tight_budget_keeps_leading_files() {
    let dir = tempdir().unwrap();
    for i in 0..10 {
        fs::write(dir.path().join(format!("file{}.txt", i)), "x".repeat(200)).unwrap();
    }

    let generous = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::new(1 << 20))
        .run()
        .unwrap();
    let end_of_third = generous
        .artifact
        .content
        .find("<file path=\"file3.txt\"")
        .unwrap();
    let budget = end_of_third + "</files>\n</context>\n".len();

    let output = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::new(budget))
        .run()
        .unwrap();
    let stats = &output.artifact.stats;
    assert_eq!(stats.files_included, 3);
    assert_eq!(
        stats.files_omitted,
        (3..10).map(|i| format!("file{}.txt", i)).collect::<Vec<_>>()
    );
    assert_eq!(stats.tree, SectionState::Complete);
    assert!(output.artifact.content.len() <= budget);
}

#[test]
fn test_invalid_configuration_fails_before_scanning() {
    let dir = tempdir().unwrap();

    let mut config = ScanConfig::new(dir.path());
    config.include_patterns = vec!["{unclosed".to_string()];
    let err = Scanner::new(config).scan().unwrap_err();
    assert!(matches!(err, PackError::InvalidPattern { .. }));

    let missing = ScanConfig::new(dir.path().join("missing"));
    let err = Pipeline::new(missing, ContextConfig::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, PackError::RootNotFound(_)));
}

#[test]
fn test_cancellation_before_run() {
    let dir = tempdir().unwrap();
    for i in 0..50 {
        let sub = dir.path().join(format!("d{}", i));
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("f.txt"), "content\n").unwrap();
    }

    let cancel = CancellationToken::new();
    let remote = cancel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(1));
        remote.cancel();
    });
    handle.join().unwrap();

    let output = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::default())
        .with_cancellation(cancel)
        .run()
        .unwrap();
    assert!(output.cancelled());
    assert!(output.scan.files.len() < 50);
    assert!(output.artifact.content.ends_with("</context>\n"));
}

#[test]
fn test_cancellation_while_scanning() {
    let dir = tempdir().unwrap();
    let total = 3000;
    for i in 0..total {
        let sub = dir.path().join(format!("d{:02}", i % 30));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("f{:04}.txt", i)), "content\n".repeat(20)).unwrap();
    }

    let cancel = CancellationToken::new();
    let progress = Arc::new(ProgressBar::hidden());
    let remote = cancel.clone();
    let watched = Arc::clone(&progress);
    // Cancel once the scan has accepted its first files
    let handle = thread::spawn(move || {
        while watched.position() < 10 {
            thread::yield_now();
        }
        remote.cancel();
    });

    let output = Pipeline::new(ScanConfig::new(dir.path()), ContextConfig::default())
        .with_cancellation(cancel)
        .with_progress(progress)
        .run()
        .unwrap();
    handle.join().unwrap();

    assert!(output.cancelled());
    assert!(output.scan.files.len() >= 10);
    assert!(output.scan.files.len() < total || output.artifact.stats.cancelled);
    assert!(output.artifact.content.ends_with("</context>\n"));
}
