/*!
 * End-to-end scenarios for ctxpack
 */

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use filetime::{set_file_mtime, FileTime};
use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::{tempdir, TempDir};

use crate::config::{ContextConfig, ScanConfig};
use crate::pipeline::Pipeline;
use crate::scanner::Scanner;
use crate::types::{ExclusionReason, FileKind, SkipReason};

fn write_file(root: &Path, rel: &str, contents: &[u8]) -> io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&path)?;
    file.write_all(contents)?;
    // Pin mtimes so summaries are comparable between runs
    set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0))
}

// Helper function to create a test directory structure
fn setup_test_directory() -> io::Result<TempDir> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();

    write_file(root, "file1.txt", b"This is a text file with content\n")?;
    write_file(root, "dir1/file2.txt", b"This is another text file\nwith multiple lines\n")?;
    write_file(root, "dir1/subdir/file3.txt", b"Nested file content\n")?;
    write_file(root, "dir2/notes.md", b"# Notes <draft> & ideas\n")?;
    write_file(root, ".git/config", b"[core]\n\trepositoryformatversion = 0\n")?;
    write_file(root, "binary.bin", &[0u8, 1u8, 2u8, 3u8])?;

    Ok(temp_dir)
}

// Root layout from the reference scenario: one text file, one binary, two ignored trees
fn setup_reference_scenario() -> io::Result<TempDir> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();

    write_file(root, "a.txt", &[b'a'; 50])?;
    let mut binary = vec![b'b'; 50];
    binary[10] = 0;
    write_file(root, "b.bin", &binary)?;
    write_file(root, ".git/config", b"[core]\n")?;
    write_file(root, "node_modules/x.js", b"module.exports = 1;\n")?;
    write_file(root, ".gitignore", b"node_modules/\n")?;

    Ok(temp_dir)
}

#[test]
fn test_reference_scenario() -> io::Result<()> {
    let temp_dir = setup_reference_scenario()?;

    let mut scan_config = ScanConfig::new(temp_dir.path());
    scan_config.respect_primary_ignore = true;
    scan_config.skip_binary = true;
    let output = Pipeline::new(scan_config, ContextConfig::new(1000)).run()?;

    assert_eq!(output.scan.paths(), vec!["a.txt"]);
    assert_eq!(output.scan.stats.skipped_binary, 1);
    assert_eq!(output.scan.stats.skipped_by_rule, 2);
    let pruned: Vec<_> = output
        .scan
        .skipped
        .iter()
        .filter(|s| matches!(s.reason, SkipReason::Rule { .. }))
        .map(|s| (s.path.as_str(), s.is_dir))
        .collect();
    assert_eq!(pruned, vec![(".git", true), ("node_modules", true)]);

    let artifact = &output.artifact;
    assert!(artifact.content.len() <= 1000);
    assert!(artifact.content.contains("<tree>"));
    assert!(artifact.content.contains("└── a.txt"));
    assert!(artifact.content.contains("<file path=\"a.txt\""));
    assert!(!artifact.content.contains("x.js"));
    assert_eq!(artifact.stats.files_included, 1);
    assert!(artifact.stats.files_omitted.is_empty());

    Ok(())
}

#[test]
fn test_determinism_across_worker_counts() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    for i in 0..30 {
        write_file(
            temp_dir.path(),
            &format!("pkg{}/mod{}/item{}.rs", i % 5, i % 3, i),
            format!("pub const N: usize = {};\n", i).as_bytes(),
        )?;
    }

    let context = ContextConfig {
        include_summary: true,
        ..ContextConfig::new(8192)
    };
    let run = |workers: usize| -> io::Result<_> {
        let mut config = ScanConfig::new(temp_dir.path());
        config.workers = workers;
        Ok(Pipeline::new(config, context.clone()).run()?)
    };

    let baseline = run(1)?;
    for workers in [1, 2, 8] {
        let other = run(workers)?;
        assert_eq!(baseline.scan.files, other.scan.files);
        assert_eq!(baseline.scan.skipped, other.scan.skipped);
        assert_eq!(baseline.artifact.content, other.artifact.content);
        assert_eq!(baseline.artifact.stats, other.artifact.stats);
    }
    // The small budget forces omissions, which must also be identical
    assert!(!baseline.artifact.stats.files_omitted.is_empty());

    Ok(())
}

#[test]
fn test_pruning_beats_include_patterns() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    write_file(temp_dir.path(), "generated/api/client.rs", b"// generated\n")?;
    write_file(temp_dir.path(), "src/lib.rs", b"pub mod api;\n")?;
    write_file(temp_dir.path(), ".ctxpackignore", b"generated/\n")?;

    for workers in [1, 4] {
        let mut config = ScanConfig::new(temp_dir.path());
        config.include_patterns = vec!["*.rs".to_string()];
        config.workers = workers;
        let result = Scanner::new(config).scan()?;

        assert_eq!(result.paths(), vec!["src/lib.rs"]);
        assert!(result.skipped.iter().any(|s| s.path == "generated"
            && s.reason
                == SkipReason::Rule {
                    rule: ExclusionReason::IgnoreFile
                }));
        assert!(result
            .skipped
            .iter()
            .all(|s| !s.path.starts_with("generated/")));
    }

    Ok(())
}

#[test]
fn test_monotonic_omission() -> io::Result<()> {
    let temp_dir = tempdir()?;
    for i in 0..8 {
        write_file(temp_dir.path(), &format!("f{}.txt", i), &vec![b'z'; 40 + i * 30])?;
    }
    let scan = Scanner::new(ScanConfig::new(temp_dir.path())).scan()?;
    let order = scan.paths().iter().map(|p| p.to_string()).collect::<Vec<_>>();

    let mut previous: Option<Vec<String>> = None;
    for budget in (300..3000).step_by(50) {
        let config = ContextConfig {
            include_tree: false,
            ..ContextConfig::new(budget)
        };
        let artifact = crate::assembler::ContextAssembler::new(config).assemble(&scan)?;
        let omitted = &artifact.stats.files_omitted;

        // Omitted files always form a suffix of the scan order
        assert_eq!(&order[order.len() - omitted.len()..], &omitted[..]);
        if let Some(previous) = &previous {
            assert!(omitted.len() <= previous.len());
        }
        previous = Some(omitted.clone());
    }

    Ok(())
}

#[test]
fn test_idempotent_classification() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let mut config = ScanConfig::new(temp_dir.path());
    config.skip_binary = false;

    let first = Scanner::new(config.clone()).scan()?;
    let second = Scanner::new(config).scan()?;
    let kinds = |r: &crate::types::ScanResult| {
        r.files
            .iter()
            .map(|f| (f.relative_path.clone(), f.kind))
            .collect::<Vec<_>>()
    };
    assert_eq!(kinds(&first), kinds(&second));
    assert!(kinds(&first).contains(&("binary.bin".to_string(), FileKind::Binary)));

    Ok(())
}

// Test ignore patterns
#[test]
fn test_ignore_patterns() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let mut config = ScanConfig::new(temp_dir.path());
    config.exclude_patterns = vec!["*.txt".to_string()];
    config.skip_binary = false;

    let result = Scanner::new(config).scan()?;
    assert_eq!(result.paths(), vec!["dir2/notes.md", "binary.bin"]);

    Ok(())
}

// Test include patterns
#[test]
fn test_include_patterns() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let mut config = ScanConfig::new(temp_dir.path());
    config.include_patterns = vec!["*.bin".to_string()];
    config.skip_binary = false;

    let result = Scanner::new(config).scan()?;
    assert_eq!(result.paths(), vec!["binary.bin"]);

    Ok(())
}

// Test that include globs naming a directory select its whole subtree
#[test]
fn test_include_directory_and_empty_include() -> io::Result<()> {
    let temp_dir = tempdir()?;
    write_file(temp_dir.path(), "docs/guide/a.md", b"# A\n")?;
    write_file(temp_dir.path(), "docs/b.md", b"# B\n")?;
    write_file(temp_dir.path(), "main.rs", b"fn main() {}\n")?;

    for pattern in ["docs", "docs/", "/docs"] {
        let mut config = ScanConfig::new(temp_dir.path());
        config.include_patterns = vec![pattern.to_string()];
        let result = Scanner::new(config).scan()?;
        assert_eq!(result.paths(), vec!["docs/guide/a.md", "docs/b.md"], "{}", pattern);
    }

    let mut config = ScanConfig::new(temp_dir.path());
    config.include_patterns = Vec::new();
    let result = Scanner::new(config).scan()?;
    assert_eq!(
        result.paths(),
        vec!["docs/guide/a.md", "docs/b.md", "main.rs"]
    );

    Ok(())
}

// Test handling of large files
#[test]
fn test_large_file_handling() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let line = "This is a line of text that will be repeated many times to create a large file.\n";
    write_file(temp_dir.path(), "large_file.txt", line.repeat(20_000).as_bytes())?;

    let output = Pipeline::new(ScanConfig::new(temp_dir.path()), ContextConfig::default()).run()?;

    assert!(!output.scan.paths().contains(&"large_file.txt"));
    assert_eq!(output.scan.stats.skipped_by_size, 1);
    assert!(!output.artifact.content.contains("repeated many times"));

    Ok(())
}

// Test respecting .gitignore files
#[test]
fn test_respect_gitignore() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    write_file(
        temp_dir.path(),
        ".gitignore",
        b"# Ignore all .txt files\n*.txt\n# But keep this one\n!file1.txt\n",
    )?;
    write_file(temp_dir.path(), "not_ignored.md", b"# This file shouldn't be ignored\n")?;

    let result = Scanner::new(ScanConfig::new(temp_dir.path())).scan()?;
    assert_eq!(
        result.paths(),
        vec!["dir2/notes.md", "file1.txt", "not_ignored.md"]
    );

    let mut config = ScanConfig::new(temp_dir.path());
    config.respect_primary_ignore = false;
    let result = Scanner::new(config).scan()?;
    assert!(result.paths().contains(&"dir1/file2.txt"));

    Ok(())
}

// Test document structure validity
#[test]
fn test_xml_validity() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let context = ContextConfig {
        include_summary: true,
        ..ContextConfig::default()
    };
    let output = Pipeline::new(ScanConfig::new(temp_dir.path()), context).run()?;
    assert!(output.artifact.content.contains("# Notes &lt;draft&gt; &amp; ideas"));

    let mut reader = Reader::from_str(&output.artifact.content);
    let mut depth = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => break,
            Err(e) => panic!("Error parsing XML: {}", e),
            _ => (),
        }
        buf.clear();
    }

    // If XML is well-formed, depth should be 0 at the end
    assert_eq!(depth, 0, "XML structure is not well-balanced");

    Ok(())
}
