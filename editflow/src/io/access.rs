//! Access-control collaborator deciding whether a path may be edited.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

/// Name of the ignore file read from the workspace root.
pub const IGNORE_FILE: &str = ".editignore";

pub trait AccessControl: Send + Sync {
    /// `true` when `rel_path` (relative to the workspace root) may be touched.
    fn validate_access(&self, rel_path: &str) -> bool;
}

/// Permits every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn validate_access(&self, _rel_path: &str) -> bool {
        true
    }
}

/// Denies paths matched by `.gitignore`-syntax rules, including `!`
/// negation and `[...]` character classes. Later rules win.
#[derive(Debug, Clone)]
pub struct IgnoreFileAccess {
    rules: Gitignore,
}

impl IgnoreFileAccess {
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new("");
        add_patterns(&mut builder, patterns)?;
        Self::build(&builder)
    }

    /// Load `.editignore` from `root` (missing file means no rules) and append
    /// `extra` patterns from configuration.
    pub fn load(root: &Path, extra: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let path = root.join(IGNORE_FILE);
        if path.exists() {
            if let Some(err) = builder.add(&path) {
                return Err(err).with_context(|| format!("read {}", path.display()));
            }
        }
        add_patterns(&mut builder, extra)?;
        Self::build(&builder)
    }

    fn build(builder: &GitignoreBuilder) -> Result<Self> {
        let rules = builder.build().context("compile access patterns")?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for IgnoreFileAccess {
    fn default() -> Self {
        Self {
            rules: Gitignore::empty(),
        }
    }
}

impl AccessControl for IgnoreFileAccess {
    fn validate_access(&self, rel_path: &str) -> bool {
        let normalized = normalize(rel_path);
        let matched = self
            .rules
            .matched_path_or_any_parents(&normalized, false);
        match matched.inner() {
            Some(glob) if matched.is_ignore() => {
                debug!(path = rel_path, pattern = glob.original(), "access denied by pattern");
                false
            }
            _ => true,
        }
    }
}

fn add_patterns<I, S>(builder: &mut GitignoreBuilder, patterns: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for raw in patterns {
        let pattern = raw.as_ref().trim();
        builder
            .add_line(None, pattern)
            .with_context(|| format!("compile access pattern '{pattern}'"))?;
    }
    Ok(())
}

/// Root-relative form with `.`, `..` and leading separators resolved, so the
/// matcher never sees a path outside its root.
fn normalize(rel_path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(patterns: &[&str]) -> IgnoreFileAccess {
        IgnoreFileAccess::from_patterns(patterns).expect("patterns")
    }

    #[test]
    fn unanchored_name_matches_at_any_depth() {
        let acl = access(&[".env"]);
        assert!(!acl.validate_access(".env"));
        assert!(!acl.validate_access("config/.env"));
        assert!(acl.validate_access("config/.envrc"));
    }

    #[test]
    fn wildcard_extension() {
        let acl = access(&["*.pem"]);
        assert!(!acl.validate_access("certs/server.pem"));
        assert!(acl.validate_access("certs/server.pem.txt"));
    }

    #[test]
    fn directory_pattern_blocks_contents() {
        let acl = access(&["secrets/"]);
        assert!(!acl.validate_access("secrets/key.txt"));
        assert!(!acl.validate_access("app/secrets/key.txt"));
        assert!(acl.validate_access("secrets.txt"));
    }

    #[test]
    fn anchored_double_star() {
        let acl = access(&["/build/**/*.o"]);
        assert!(!acl.validate_access("build/x/y/z.o"));
        assert!(!acl.validate_access("./build/z.o"));
        assert!(acl.validate_access("src/build/z.o"));
    }

    #[test]
    fn negation_re_allows_a_later_match() {
        let acl = access(&["*.pem", "!public.pem"]);
        assert!(acl.validate_access("certs/public.pem"));
        assert!(!acl.validate_access("certs/private.pem"));
    }

    #[test]
    fn character_class_matches_any_listed_char() {
        let acl = access(&["*.[ch]"]);
        assert!(!acl.validate_access("src/main.c"));
        assert!(!acl.validate_access("include/main.h"));
        assert!(acl.validate_access("src/main.rs"));
    }

    #[test]
    fn parent_segments_cannot_escape_the_matcher() {
        let acl = access(&["/secret.txt"]);
        assert!(!acl.validate_access("docs/../secret.txt"));
        assert!(!acl.validate_access("/secret.txt"));
        assert!(acl.validate_access("docs/secret.txt"));
    }

    #[test]
    fn comments_and_blanks_are_ignored() {
        let acl = access(&["# comment", "", "   "]);
        assert!(acl.is_empty());
        assert!(acl.validate_access("anything"));
    }

    #[test]
    fn load_merges_ignore_file_and_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join(IGNORE_FILE), "*.lock\n").expect("write");
        let acl = IgnoreFileAccess::load(temp.path(), &["vendor/".to_string()]).expect("load");
        assert!(!acl.validate_access("Cargo.lock"));
        assert!(!acl.validate_access("vendor/lib.rs"));
        assert!(acl.validate_access("src/lib.rs"));
    }
}
