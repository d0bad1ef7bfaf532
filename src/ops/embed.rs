//! Embed directory provisioning.
//!
//! Sources can embed directories at compile time with directive lines such
//! as `//go:embed frontend/dist`. The compiler refuses to build when such a
//! directory is missing, which is common before the frontend has been built
//! for the first time. Every missing directory is created with a `gitkeep`
//! placeholder so the compile can proceed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::core::error::BuildError;
use crate::core::project::{EmbedConfig, Project};

/// Placeholder file written into created directories.
pub const PLACEHOLDER_FILE: &str = "gitkeep";

/// One embed directive found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedDetail {
    /// File the directive was found in
    pub source_file: PathBuf,
    /// Directory patterns are relative to
    pub base_dir: PathBuf,
    /// Directory part of the pattern, as written
    pub pattern: String,
}

impl EmbedDetail {
    /// The directory the directive needs.
    pub fn full_path(&self) -> PathBuf {
        if self.pattern.is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(&self.pattern)
        }
    }
}

/// Finds embed directives in a project.
pub trait EmbedScanner {
    fn scan(&self, root: &Path) -> Result<Vec<EmbedDetail>>;
}

/// Scans source files for directive lines.
pub struct SourceEmbedScanner {
    extension: String,
    directive: Regex,
    skip_dirs: Vec<PathBuf>,
}

impl SourceEmbedScanner {
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let pattern = format!(r"^\s*{}\s+(.+?)\s*$", regex::escape(&config.marker));
        let directive = Regex::new(&pattern)
            .with_context(|| format!("invalid embed marker `{}`", config.marker))?;

        Ok(SourceEmbedScanner {
            extension: config.extension.trim_start_matches('.').to_string(),
            directive,
            skip_dirs: Vec::new(),
        })
    }

    /// Scanner configured from a project manifest. The build directory is
    /// never scanned.
    pub fn for_project(project: &Project) -> Result<Self> {
        let mut scanner = Self::new(&project.embed)?;
        scanner.skip_dirs.push(project.build_dir());
        Ok(scanner)
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.')
            || name == "node_modules"
            || self.skip_dirs.iter().any(|d| d == entry.path())
    }

    fn scan_file(&self, path: &Path, details: &mut Vec<EmbedDetail>) -> Result<()> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        for line in contents.lines() {
            let Some(caps) = self.directive.captures(line) else {
                continue;
            };
            for pattern in split_patterns(&caps[1]) {
                if let Some(dir) = directory_part(&pattern) {
                    details.push(EmbedDetail {
                        source_file: path.to_path_buf(),
                        base_dir: base_dir.clone(),
                        pattern: dir,
                    });
                }
            }
        }
        Ok(())
    }
}

impl EmbedScanner for SourceEmbedScanner {
    fn scan(&self, root: &Path) -> Result<Vec<EmbedDetail>> {
        let mut details = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e));

        for entry in walker {
            let entry = entry.with_context(|| format!("failed to scan {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            self.scan_file(entry.path(), &mut details)?;
        }

        tracing::debug!("found {} embed directives under {}", details.len(), root.display());
        Ok(details)
    }
}

/// Split a directive's argument list. Patterns may be quoted with `"` or `` ` ``.
fn split_patterns(args: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    let mut chars = args.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' || c == '`' {
            chars.next();
            for ch in chars.by_ref() {
                if ch == c {
                    break;
                }
                token.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        if !token.is_empty() {
            patterns.push(token);
        }
    }
    patterns
}

/// The directory a pattern needs, relative to the source file.
///
/// Glob patterns need their non-glob prefix. A final segment that looks like
/// a file name (`index.html`) needs its parent. Returns `None` for patterns
/// that only name files next to the source.
fn directory_part(pattern: &str) -> Option<String> {
    let pattern = pattern.strip_prefix("all:").unwrap_or(pattern);
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

    let is_glob = |s: &str| s.contains(['*', '?', '[']);
    let dir_len = match segments.iter().position(|&s| is_glob(s)) {
        Some(idx) => idx,
        None => match segments.last() {
            Some(last) if last.find('.').is_some_and(|i| i > 0) => segments.len() - 1,
            Some(_) => segments.len(),
            None => 0,
        },
    };

    if dir_len == 0 {
        return None;
    }
    Some(segments[..dir_len].join("/"))
}

/// Create every directory referenced by an embed directive that does not
/// exist yet. Returns the directories created.
pub fn create_embed_directories(scanner: &dyn EmbedScanner, root: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    for detail in scanner.scan(root)? {
        let dir = detail.full_path();
        if dir.exists() {
            continue;
        }

        fs::create_dir_all(&dir).map_err(|e| BuildError::io("create directory", &dir, e))?;
        let placeholder = dir.join(PLACEHOLDER_FILE);
        fs::write(&placeholder, "").map_err(|e| BuildError::io("create", &placeholder, e))?;

        tracing::debug!(
            "created embed directory {} for {}",
            dir.display(),
            detail.source_file.display()
        );
        created.push(dir);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanner() -> SourceEmbedScanner {
        SourceEmbedScanner::new(&EmbedConfig::default()).unwrap()
    }

    #[test]
    fn test_directory_part() {
        assert_eq!(directory_part("frontend/dist").as_deref(), Some("frontend/dist"));
        assert_eq!(directory_part("all:frontend/dist").as_deref(), Some("frontend/dist"));
        assert_eq!(directory_part("frontend/dist/*").as_deref(), Some("frontend/dist"));
        assert_eq!(directory_part("static/*.css").as_deref(), Some("static"));
        assert_eq!(directory_part("web/index.html").as_deref(), Some("web"));
        assert_eq!(directory_part("./assets/.well-known").as_deref(), Some("assets/.well-known"));
        assert_eq!(directory_part("version.txt"), None);
        assert_eq!(directory_part("*.txt"), None);
    }

    #[test]
    fn test_split_patterns() {
        assert_eq!(
            split_patterns(r#"images "my docs" `raw`"#),
            vec!["images", "my docs", "raw"]
        );
    }

    #[test]
    fn test_scan_finds_directives() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("main.go"),
            "package main\n\n//go:embed all:frontend/dist\nvar assets embed.FS\n\n//go:embed  build/appicon.png\nvar icon []byte\n",
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        fs::write(tmp.path().join("pkg/web.go"), "//go:embed templates/*.tmpl\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "//go:embed ignored\n").unwrap();

        let details = scanner().scan(tmp.path()).unwrap();
        let paths: Vec<PathBuf> = details.iter().map(EmbedDetail::full_path).collect();

        assert_eq!(
            paths,
            vec![
                tmp.path().join("frontend/dist"),
                tmp.path().join("build"),
                tmp.path().join("pkg").join("templates"),
            ]
        );
        assert_eq!(details[0].source_file, tmp.path().join("main.go"));
    }

    #[test]
    fn test_scan_skips_hidden_and_vendor_dirs() {
        let tmp = TempDir::new().unwrap();
        for dir in [".git", "node_modules/pkg"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("x.go"), "//go:embed data\n").unwrap();
        }

        assert!(scanner().scan(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_custom_marker() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("lib.rs"), "// @embed assets/img\n").unwrap();
        let config = EmbedConfig {
            marker: "// @embed".to_string(),
            extension: ".rs".to_string(),
        };

        let details = SourceEmbedScanner::new(&config).unwrap().scan(tmp.path()).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].pattern, "assets/img");
    }

    #[test]
    fn test_create_embed_directories_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("main.go"), "//go:embed frontend/dist\n").unwrap();
        let scanner = scanner();

        let created = create_embed_directories(&scanner, tmp.path()).unwrap();
        let dist = tmp.path().join("frontend/dist");
        assert_eq!(created, vec![dist.clone()]);
        assert!(dist.join(PLACEHOLDER_FILE).is_file());

        let created = create_embed_directories(&scanner, tmp.path()).unwrap();
        assert!(created.is_empty());
        assert!(dist.join(PLACEHOLDER_FILE).is_file());
    }

    #[test]
    fn test_existing_directory_left_alone() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("main.go"), "//go:embed assets\n").unwrap();
        fs::create_dir_all(tmp.path().join("assets")).unwrap();

        create_embed_directories(&scanner(), tmp.path()).unwrap();
        assert!(!tmp.path().join("assets").join(PLACEHOLDER_FILE).exists());
    }

    #[test]
    fn test_build_dir_not_scanned() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new("app", tmp.path());
        fs::create_dir_all(project.build_dir()).unwrap();
        fs::write(project.build_dir().join("gen.go"), "//go:embed data\n").unwrap();

        let scanner = SourceEmbedScanner::for_project(&project).unwrap();
        assert!(scanner.scan(tmp.path()).unwrap().is_empty());
    }
}
