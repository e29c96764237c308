//! Parallel workspace scanning.
//!
//! Each worker reads, hashes and parses one file and sends the result back
//! over a channel; the caller merges results on its own thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use glob::{MatchOptions, Pattern};

use crate::config::Config;
use crate::errors::Result;
use crate::io::{fast_hash, read_tracked, FastHash};
use super::{parse_file, DocumentKind, ParsedFile};

/// One file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Workspace-relative path.
    pub path: PathBuf,
    pub hash: FastHash,
    /// Content, for text files.
    pub text: Option<String>,
    pub parsed: ParsedFile,
}

impl ScanResult {
    pub fn kind(&self) -> DocumentKind {
        self.parsed.kind()
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled ignore patterns.
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(config: &Config) -> Result<Self> {
        let patterns = config
            .ignore_patterns()
            .map(Pattern::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a workspace-relative path is ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }
}

/// Lists every file under `scope` that is not ignored, sorted by path.
/// `scope` is workspace-relative; empty means the whole workspace.
pub fn discover(root: &Path, scope: &Path, ignore: &IgnoreSet) -> Result<Vec<PathBuf>> {
    let base = root.join(scope);
    if base.is_file() {
        return Ok(vec![scope.to_path_buf()]);
    }

    let pattern = format!("{}/**/*", Pattern::escape(&base.to_string_lossy()));
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", e.path().display(), e.error());
                None
            }
        })
        .filter(|p| p.is_file())
        .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|p| !ignore.is_ignored(p))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Reads, hashes and parses one file.
pub fn scan_file(root: &Path, path: &Path) -> Result<ScanResult> {
    let bytes = read_tracked(&root.join(path))?;
    let hash = fast_hash(&bytes);
    let parsed = parse_file(path, &bytes);
    let text = match parsed {
        ParsedFile::Opaque => None,
        _ => String::from_utf8(bytes).ok(),
    };

    Ok(ScanResult {
        path: path.to_path_buf(),
        hash,
        text,
        parsed,
    })
}

/// Scans `paths` on a pool of `workers` threads. Files that cannot be read
/// are logged and left out. Results are sorted by path.
pub fn scan_paths(root: &Path, paths: &[PathBuf], workers: usize) -> Result<Vec<ScanResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;
    let (sender, receiver) = mpsc::channel::<Result<ScanResult>>();

    pool.scope(|scope| {
        for path in paths {
            let sender = sender.clone();
            scope.spawn(move |_| {
                let _ = sender.send(scan_file(root, path));
            });
        }
    });
    drop(sender);

    let mut results = Vec::with_capacity(paths.len());
    for outcome in receiver {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) if e.is_per_file() => tracing::warn!("{}", e),
            Err(e) => return Err(e),
        }
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Scanned {} file(s)", results.len());
    Ok(results)
}

/// Discovers and scans the files under `scope`.
pub fn scan(root: &Path, scope: &Path, config: &Config) -> Result<Vec<ScanResult>> {
    let ignore = IgnoreSet::new(config)?;
    let paths = discover(root, scope, &ignore)?;
    scan_paths(root, &paths, config.workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_applies_ignores() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for path in [".entwine/files.bin", "docs/a.md", "b.py", "target/x.o", ".git/HEAD", "build/out.txt"] {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, "x").unwrap();
        }
        let config = Config {
            ignore: vec!["build/**".to_string()],
            ..Config::default()
        };

        let paths = discover(root, Path::new(""), &IgnoreSet::new(&config).unwrap()).unwrap();
        assert_eq!(paths, vec![PathBuf::from("b.py"), PathBuf::from("docs/a.md")]);

        let scoped = discover(root, Path::new("docs"), &IgnoreSet::new(&config).unwrap()).unwrap();
        assert_eq!(scoped, vec![PathBuf::from("docs/a.md")]);
    }

    #[test]
    fn test_scan_parses_in_parallel() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 0..12 {
            fs::write(root.join(format!("doc{:02}.md", i)), format!("```python #b{}\nx\n```\n", i)).unwrap();
        }
        fs::write(root.join("image.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let results = scan(root, Path::new(""), &Config::default()).unwrap();

        assert_eq!(results.len(), 13);
        assert_eq!(results[0].path, PathBuf::from("doc00.md"));
        assert_eq!(results[0].parsed.blocks().len(), 1);
        assert_eq!(results[12].kind(), DocumentKind::Opaque);
        assert!(results[12].text.is_none());
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "text").unwrap();

        let results = scan_paths(
            dir.path(),
            &[PathBuf::from("a.md"), PathBuf::from("gone.md")],
            2,
        )
        .unwrap();
        assert_eq!(results.len(), 1);
    }
}
