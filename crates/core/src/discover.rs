use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Hard cap on traversal depth so a pathological tree (or a symlink loop on
/// platforms where `follow_links(false)` is not enough) cannot hang a scan.
const MAX_TRAVERSAL_DEPTH: usize = 64;

/// Extensions scanned when the caller does not narrow the set, lowercase,
/// without dot.
pub const DEFAULT_EXTENSIONS: &[&str] =
    &["bmp", "csv", "gif", "jpeg", "jpg", "pdf", "png", "txt"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("scan root not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("scan root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// Zero matching files is a reportable empty-case condition, not a crash.
    #[error("no supported files found under {}", .0.display())]
    NoMatches(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub root: PathBuf,
    pub recursive: bool,
    /// Matched case-insensitively, with or without a leading dot.
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            excludes: Vec::new(),
        }
    }
}

/// Walk the root and return the matching files, sorted lexicographically by
/// path and deduplicated, for deterministic downstream processing.
pub fn discover(
    options: &DiscoverOptions,
    warnings: &mut Vec<String>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let root = options.root.as_path();
    if !root.exists() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let extensions = normalize_extensions(&options.extensions);
    let excludes = ExcludeMatcher::new(&options.excludes, warnings);
    let max_depth = if options.recursive {
        MAX_TRAVERSAL_DEPTH
    } else {
        1
    };

    let walker = WalkDir::new(root).follow_links(false).max_depth(max_depth);
    let iter = walker.into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        !excludes.is_excluded(entry.path())
    });

    let mut files = BTreeSet::new();
    for item in iter {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(format!("walk error under {}: {}", root.display(), err));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_supported_extension(entry.path(), &extensions) {
            files.insert(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoMatches(root.to_path_buf()));
    }

    debug!(
        "discovered {} file(s) under {} ({} extension filter(s))",
        files.len(),
        root.display(),
        extensions.len()
    );

    // BTreeSet orders paths component-wise, which diverges from string order
    // when a separator compares against punctuation. The contract is string
    // order, so it is enforced explicitly.
    let mut files: Vec<PathBuf> = files.into_iter().collect();
    files.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    Ok(files)
}

fn normalize_extensions(extensions: &[String]) -> BTreeSet<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn has_supported_extension(path: &Path, extensions: &BTreeSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

pub(crate) struct ExcludeMatcher {
    globset: Option<GlobSet>,
    substrings: Vec<String>,
}

impl ExcludeMatcher {
    pub(crate) fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        if patterns.is_empty() {
            return Self {
                globset: None,
                substrings: Vec::new(),
            };
        }

        let mut builder = GlobSetBuilder::new();
        let mut substrings = Vec::new();
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }

            if is_plain_substring_pattern(pattern) {
                substrings.push(pattern.to_lowercase());
                continue;
            }

            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => {
                    warnings.push(format!(
                        "invalid exclude glob '{pattern}': {err}; using substring fallback."
                    ));
                    substrings.push(pattern.to_lowercase());
                }
            }
        }

        let globset = match builder.build() {
            Ok(set) => Some(set),
            Err(err) => {
                warnings.push(format!(
                    "failed to compile exclude glob set: {err}; glob excludes disabled."
                ));
                None
            }
        };

        Self {
            globset,
            substrings,
        }
    }

    pub(crate) fn is_excluded(&self, path: &Path) -> bool {
        if let Some(globset) = &self.globset {
            if globset.is_match(path) {
                return true;
            }
        }

        if self.substrings.is_empty() {
            return false;
        }

        let lowered = path.to_string_lossy().to_lowercase();
        self.substrings
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }
}

fn is_plain_substring_pattern(pattern: &str) -> bool {
    !pattern
        .chars()
        .any(|ch| matches!(ch, '*' | '?' | '[' | ']' | '{' | '}'))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::{discover, DiscoverOptions, DiscoveryError, ExcludeMatcher};

    fn options_for(root: &Path) -> DiscoverOptions {
        DiscoverOptions {
            root: root.to_path_buf(),
            ..DiscoverOptions::default()
        }
    }

    #[test]
    fn missing_root_is_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let options = options_for(&temp.path().join("does-not-exist"));
        let mut warnings = Vec::new();
        assert!(matches!(
            discover(&options, &mut warnings),
            Err(DiscoveryError::NotFound(_))
        ));
    }

    #[test]
    fn file_root_is_not_a_directory() {
        let temp = TempDir::new().expect("tempdir");
        let file = temp.path().join("notes.txt");
        fs::write(&file, "contents").expect("write");
        let options = options_for(&file);
        let mut warnings = Vec::new();
        assert!(matches!(
            discover(&options, &mut warnings),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }

    #[test]
    fn empty_directory_reports_no_matches() {
        let temp = TempDir::new().expect("tempdir");
        let options = options_for(temp.path());
        let mut warnings = Vec::new();
        assert!(matches!(
            discover(&options, &mut warnings),
            Err(DiscoveryError::NoMatches(_))
        ));
    }

    #[test]
    fn extension_matching_is_case_insensitive_and_sorted() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("b.TXT"), "b").expect("write");
        fs::write(temp.path().join("a.csv"), "a").expect("write");
        fs::write(temp.path().join("skip.bin"), "x").expect("write");

        let options = options_for(temp.path());
        let mut warnings = Vec::new();
        let files = discover(&options, &mut warnings).expect("discover");
        let names = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.csv", "b.TXT"]);
    }

    #[test]
    fn sorting_is_string_lexicographic() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("a");
        fs::create_dir(&nested).expect("mkdir");
        fs::write(nested.join("b.txt"), "b").expect("write");
        // '-' sorts before '/' as a string but after it component-wise
        fs::write(temp.path().join("a-thing.txt"), "a").expect("write");

        let options = options_for(temp.path());
        let mut warnings = Vec::new();
        let files = discover(&options, &mut warnings).expect("discover");
        let strings: Vec<String> = files
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted);
        assert!(strings[0].ends_with("a-thing.txt"));
    }

    #[test]
    fn non_recursive_mode_skips_subdirectories() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("top.txt"), "top").expect("write");
        let nested = temp.path().join("nested");
        fs::create_dir(&nested).expect("mkdir");
        fs::write(nested.join("deep.txt"), "deep").expect("write");

        let mut options = options_for(temp.path());
        options.recursive = false;
        let mut warnings = Vec::new();
        let files = discover(&options, &mut warnings).expect("discover");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("top.txt"));

        options.recursive = true;
        let files = discover(&options, &mut warnings).expect("discover");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn exclude_patterns_filter_matches() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("keep.txt"), "keep").expect("write");
        let noise = temp.path().join("node_modules");
        fs::create_dir(&noise).expect("mkdir");
        fs::write(noise.join("drop.txt"), "drop").expect("write");

        let mut options = options_for(temp.path());
        options.excludes = vec!["node_modules".to_string()];
        let mut warnings = Vec::new();
        let files = discover(&options, &mut warnings).expect("discover");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.txt"));
    }

    #[test]
    fn exclude_matcher_matches_glob_and_substring() {
        let mut warnings = Vec::new();
        let matcher = ExcludeMatcher::new(
            &[
                "**/*.tmp".to_string(),
                "[".to_string(),
                "node_modules".to_string(),
            ],
            &mut warnings,
        );

        assert!(matcher.is_excluded(Path::new("/case/a.tmp")));
        assert!(matcher.is_excluded(Path::new("/case/node_modules/pkg/index.js")));
        assert!(!matcher.is_excluded(Path::new("/case/evidence/log.txt")));
        assert!(!warnings.is_empty());
    }
}
