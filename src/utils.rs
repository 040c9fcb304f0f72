/*!
 * Utility functions for ctxpack
 */

use std::cmp::Ordering;
use std::path::{Component, Path};

use once_cell::sync::Lazy;

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Render a relative path with `/` separators regardless of platform
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a posix-style parent and a child name
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Whether a file or directory name is hidden
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

/// Scan order of two relative file paths.
///
/// Depth-first: inside each directory, subdirectories come before files and
/// names compare byte-wise. This is the order a sorted traversal visits
/// files in, which differs from plain string order (`a/b` sorts before
/// `a.txt` here).
pub fn compare_relative_paths(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('/').collect();
    let b_parts: Vec<&str> = b.split('/').collect();

    for (i, (x, y)) in a_parts.iter().zip(b_parts.iter()).enumerate() {
        if x == y {
            continue;
        }
        let x_is_dir = i + 1 < a_parts.len();
        let y_is_dir = i + 1 < b_parts.len();
        return match (x_is_dir, y_is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.as_bytes().cmp(y.as_bytes()),
        };
    }

    a_parts.len().cmp(&b_parts.len())
}

/// Built-in ignore rules, applied before any ignore file so those can negate them
pub static DEFAULT_IGNORE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Version Control
        ".git/",
        ".svn/",
        ".hg/",
        ".bzr/",
        // OS Files
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        // Caches
        "__pycache__/",
        ".pytest_cache/",
        ".mypy_cache/",
        ".sass-cache/",
        "*.pyc",
        "*.swp",
    ]
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(12), "12 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_to_posix() {
        let path: PathBuf = ["src", "bin", "main.rs"].iter().collect();
        assert_eq!(to_posix(&path), "src/bin/main.rs");
        assert_eq!(join_relative("", "a.txt"), "a.txt");
        assert_eq!(join_relative("src", "a.txt"), "src/a.txt");
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name(".env"));
        assert!(!is_hidden_name("env"));
        assert!(!is_hidden_name("."));
    }

    #[test]
    fn test_compare_relative_paths() {
        let mut paths = vec![
            "z.txt",
            "a.txt",
            "a/b.txt",
            "b/c/d.txt",
            "b/a.txt",
            "B.txt",
        ];
        paths.sort_by(|a, b| compare_relative_paths(a, b));
        assert_eq!(
            paths,
            vec!["a/b.txt", "b/c/d.txt", "b/a.txt", "B.txt", "a.txt", "z.txt"]
        );
    }
}
