//! Root-relative aliases for absolute imports inside the project.
//!
//! An absolute path such as `/project/src/lib/Foo.svelte` is served by the
//! host as `/src/lib/Foo.svelte` when it is a real file inside the root,
//! outside dependency directories, and its first segment does not name an
//! installed package.

use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tracing::debug;

pub const DEPENDENCY_DIR: &str = "node_modules";

/// Memoized absolute path → alias mapping for one session.
///
/// Negative answers are memoized as well and nothing is ever invalidated; a
/// package installed after a path was first probed is not noticed.
#[derive(Debug)]
pub struct AliasResolver {
    root: Option<PathBuf>,
    enabled: bool,
    memo: RwLock<FxHashMap<PathBuf, Option<String>>>,
}

impl AliasResolver {
    pub fn new(root: Option<&Path>, enabled: bool) -> Self {
        Self {
            root: root.map(|root| root.to_path_buf().clean()),
            enabled,
            memo: RwLock::new(FxHashMap::default()),
        }
    }

    /// A resolver that never aliases.
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.root.is_some()
    }

    /// The alias for `path`, or `None` to leave resolution to the host.
    ///
    /// Filesystem probe failures count as "not aliasable".
    pub async fn resolve(&self, path: impl AsRef<Path>) -> Option<String> {
        let root = match (&self.root, self.enabled) {
            (Some(root), true) => root,
            _ => return None,
        };
        let path = path.as_ref();

        let cached = self.memo.read().get(path).cloned();
        if let Some(alias) = cached {
            return alias;
        }

        let alias = compute_alias(root, path).await;
        debug!(target: "svite", path = %path.display(), alias = ?alias, "resolved absolute import");
        self.memo.write().insert(path.to_path_buf(), alias.clone());
        alias
    }

    /// Number of memoized paths, aliasable or not.
    pub fn memoized(&self) -> usize {
        self.memo.read().len()
    }
}

async fn compute_alias(root: &Path, path: &Path) -> Option<String> {
    if !path.is_absolute() {
        return None;
    }

    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return None,
        Err(e) => {
            debug!(target: "svite", "cannot alias {}: {}", path.display(), e);
            return None;
        }
    }

    let relative = path.clean();
    let relative = relative.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }

    let first = *segments.first()?;
    if segments.contains(&DEPENDENCY_DIR) || is_installed_package(root, first).await {
        return None;
    }

    Some(format!("/{}", segments.join("/")))
}

/// Looks for `node_modules/<name>` from `root` up to the filesystem root.
async fn is_installed_package(root: &Path, name: &str) -> bool {
    let mut current = Some(root);
    while let Some(dir) = current {
        let candidate = dir.join(DEPENDENCY_DIR).join(name);
        if tokio::fs::metadata(&candidate).await.is_ok() {
            return true;
        }
        current = dir.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();
        fs::write(dir.path().join("src/components/Foo.svelte"), "<p/>").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn file_inside_root_is_aliased() {
        let dir = project();
        let resolver = AliasResolver::new(Some(dir.path()), true);
        let alias = resolver
            .resolve(dir.path().join("src/components/Foo.svelte"))
            .await;
        assert_eq!(alias.as_deref(), Some("/src/components/Foo.svelte"));
    }

    #[tokio::test]
    async fn dependency_files_are_not_aliased() {
        let dir = project();
        let resolver = AliasResolver::new(Some(dir.path()), true);
        assert!(resolver.resolve(dir.path().join("node_modules/pkg/index.js")).await.is_none());
    }

    #[tokio::test]
    async fn first_segment_naming_a_package_is_not_aliased() {
        let dir = project();
        fs::create_dir_all(dir.path().join("node_modules/src")).unwrap();
        let resolver = AliasResolver::new(Some(dir.path()), true);
        assert!(resolver.resolve(dir.path().join("src/components/Foo.svelte")).await.is_none());
    }

    #[tokio::test]
    async fn missing_and_outside_paths_are_not_aliased() {
        let dir = project();
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("x.svelte"), "").unwrap();

        let resolver = AliasResolver::new(Some(dir.path()), true);
        assert!(resolver.resolve(dir.path().join("src/Missing.svelte")).await.is_none());
        assert!(resolver.resolve(other.path().join("x.svelte")).await.is_none());
        assert!(resolver.resolve("src/components/Foo.svelte").await.is_none());
        assert!(resolver.resolve(dir.path().join("src")).await.is_none());
    }

    #[tokio::test]
    async fn negative_results_are_memoized() {
        let dir = project();
        let resolver = AliasResolver::new(Some(dir.path()), true);
        let later = dir.path().join("src/Later.svelte");

        assert!(resolver.resolve(&later).await.is_none());
        fs::write(&later, "").unwrap();
        assert!(resolver.resolve(&later).await.is_none());
        assert_eq!(resolver.memoized(), 1);
    }

    #[tokio::test]
    async fn disabled_resolver_never_aliases() {
        let dir = project();
        let resolver = AliasResolver::new(Some(dir.path()), false);
        assert!(!resolver.is_active());
        assert!(resolver.resolve(dir.path().join("src/components/Foo.svelte")).await.is_none());
        assert_eq!(resolver.memoized(), 0);
    }
}
