//! Workspace cache: at most one live [`SolutionHandle`] per normalized
//! solution path.
//!
//! All cache mutations (load on miss, apply, invalidate) and the staleness
//! check run under one mutex. Readers receive an `Arc` snapshot and release
//! the lock before walking it — a handle stays valid for its borrowed
//! lifetime even when a concurrent write evicts it from the cache.
//!
//! Staleness is time-gated: within the window a cached entry is trusted
//! without touching the filesystem; past it, the newest source mtime under
//! the solution directory is compared against the handle's load stamp.
//! Scan errors count as stale.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::error::{warn, Error, Result};
use crate::model::Compilation;
use crate::paths;
use crate::solution::{self, ProjectLayout, SolutionLayout};

/// Cooperative cancellation flag, checked at suspension points (file I/O,
/// per-project compilation, between refactor phases).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Error out of the current operation when cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::analysis_failed("operation cancelled"))
        } else {
            Ok(())
        }
    }
}

/// An immutable snapshot of a loaded solution: layout plus one compilation
/// per project. Owned by the manager, borrowed by requests via `Arc`.
pub struct SolutionHandle {
    pub layout: SolutionLayout,
    pub compilations: Vec<Arc<Compilation>>,
    pub loaded_at: SystemTime,
    /// Monotonically increasing across reloads of any path.
    pub generation: u64,
}

impl SolutionHandle {
    /// Directory every displayed path is made relative to.
    pub fn dir(&self) -> &Path {
        &self.layout.dir
    }

    /// Pick a project by name, or the first one when no name is given.
    pub fn compilation(&self, project_name: Option<&str>) -> Result<&Arc<Compilation>> {
        match project_name {
            None => self
                .compilations
                .first()
                .ok_or_else(|| Error::not_found("any project in the solution")),
            Some(name) => self
                .compilations
                .iter()
                .find(|c| c.project_name == name)
                .ok_or_else(|| Error::not_found(format!("project `{name}`"))),
        }
    }

    pub fn project(&self, project_name: &str) -> Result<&ProjectLayout> {
        self.layout
            .projects
            .iter()
            .find(|p| p.name == project_name)
            .ok_or_else(|| Error::not_found(format!("project `{project_name}`")))
    }

    /// Locate a document and its owning compilation (case-insensitive path
    /// compare, relative paths resolved against the solution directory).
    pub fn document(&self, file: &Path) -> Option<(&Arc<Compilation>, &crate::model::Document)> {
        let abs = paths::absolutize(self.dir(), file);
        for c in &self.compilations {
            if let Some(d) = c.document(&abs) {
                return Some((c, d));
            }
        }
        None
    }
}

/// One whole-file replacement produced by a refactoring.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub new_text: String,
}

/// Post-apply file rename (used when a renamed type owns its file).
#[derive(Debug, Clone)]
pub struct FileRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

struct CacheEntry {
    handle: Arc<SolutionHandle>,
    last_checked: Instant,
}

pub struct WorkspaceManager {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
    generation: AtomicU64,
    staleness_window: Duration,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceManager {
    pub fn new() -> Self {
        Self::with_staleness_window(Duration::from_secs(5))
    }

    pub fn with_staleness_window(window: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            staleness_window: window,
        }
    }

    /// Return a fresh handle for `path`, reloading when the cached one is
    /// stale or absent. A failed load leaves any existing entry untouched.
    pub fn acquire(&self, path: &Path, cancel: &CancelToken) -> Result<Arc<SolutionHandle>> {
        let key = paths::normalize(path);
        let mut cache = self.cache.lock().expect("workspace cache poisoned");

        if let Some(entry) = cache.get_mut(&key) {
            if entry.last_checked.elapsed() < self.staleness_window {
                return Ok(entry.handle.clone());
            }
            if !Self::is_stale(&entry.handle) {
                entry.last_checked = Instant::now();
                return Ok(entry.handle.clone());
            }
        }

        let handle = Arc::new(self.load(&key, cancel)?);
        cache.insert(
            key,
            CacheEntry {
                handle: handle.clone(),
                last_checked: Instant::now(),
            },
        );
        Ok(handle)
    }

    /// Convenience: acquire, then pick the named (or first) project.
    pub fn compilation(
        &self,
        path: &Path,
        project_name: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(Arc<SolutionHandle>, Arc<Compilation>)> {
        let handle = self.acquire(path, cancel)?;
        let compilation = handle.compilation(project_name)?.clone();
        Ok((handle, compilation))
    }

    /// Publish a refactoring's change set: write every file, run the optional
    /// rename, evict the handle — all inside a single lock window. A write
    /// failure after the first file still evicts, so the next read reflects
    /// whatever landed on disk.
    pub fn apply(
        &self,
        path: &Path,
        changes: &[FileChange],
        post_rename: Option<&FileRename>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let key = paths::normalize(path);
        let mut cache = self.cache.lock().expect("workspace cache poisoned");

        // Cancellation is honored before the first write, never between
        // writes: a half-applied change set must still invalidate.
        cancel.check()?;

        let mut written = 0usize;
        let mut failure: Option<String> = None;
        for change in changes {
            if let Err(e) = write_atomic(&change.path, &change.new_text) {
                failure = Some(format!("{}: {e}", change.path.display()));
                break;
            }
            written += 1;
        }

        if failure.is_none() {
            if let Some(rename) = post_rename {
                if rename.from.exists() {
                    if let Err(e) = std::fs::rename(&rename.from, &rename.to) {
                        failure = Some(format!(
                            "renaming {} -> {}: {e}",
                            rename.from.display(),
                            rename.to.display()
                        ));
                    }
                }
            }
        }

        cache.remove(&key);

        match failure {
            None => Ok(()),
            Some(reason) => Err(Error::ConflictFailed {
                reason: format!("{reason} ({written}/{} files written)", changes.len()),
            }),
        }
    }

    /// Drop the cached handle so the next read reloads from disk.
    pub fn invalidate(&self, path: &Path) {
        let key = paths::normalize(path);
        let mut cache = self.cache.lock().expect("workspace cache poisoned");
        cache.remove(&key);
    }

    fn is_stale(handle: &SolutionHandle) -> bool {
        match solution::latest_source_mtime(handle.dir()) {
            Ok(latest) => latest > handle.loaded_at,
            Err(e) => {
                warn(format!(
                    "staleness scan failed for {}: {e}; forcing reload",
                    handle.dir().display()
                ));
                true
            }
        }
    }

    fn load(&self, path: &Path, cancel: &CancelToken) -> Result<SolutionHandle> {
        let loaded_at = SystemTime::now();
        crate::debug_log!("[sharplens] loading {}", path.display());
        let layout = solution::load_layout(path)?;

        let mut compilations = Vec::with_capacity(layout.projects.len());
        for project in &layout.projects {
            cancel.check()?;
            compilations.push(Arc::new(Compilation::build(project)));
        }

        Ok(SolutionHandle {
            layout,
            compilations,
            loaded_at,
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }
}

/// Write through a sibling temp file + rename so a crash never leaves a
/// half-written source file.
fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("sharplens.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn seed_project(dir: &Path) -> PathBuf {
        let csproj = dir.join("App.csproj");
        std::fs::write(&csproj, "<Project Sdk=\"Microsoft.NET.Sdk\"><PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup></Project>").unwrap();
        std::fs::write(dir.join("A.cs"), "public class A { public void M() { } }").unwrap();
        csproj
    }

    #[test]
    fn cache_hit_returns_same_generation() {
        let tmp = TempDir::new().unwrap();
        let csproj = seed_project(tmp.path());
        let ws = WorkspaceManager::new();
        let cancel = CancelToken::new();

        let h1 = ws.acquire(&csproj, &cancel).unwrap();
        let h2 = ws.acquire(&csproj, &cancel).unwrap();
        assert_eq!(h1.generation, h2.generation);
    }

    #[test]
    fn modified_source_forces_reload_after_window() {
        let tmp = TempDir::new().unwrap();
        let csproj = seed_project(tmp.path());
        // Zero-width window: every acquire re-checks the filesystem.
        let ws = WorkspaceManager::with_staleness_window(Duration::ZERO);
        let cancel = CancelToken::new();

        let h1 = ws.acquire(&csproj, &cancel).unwrap();

        // Push the mtime past the load stamp without sleeping.
        let src = tmp.path().join("A.cs");
        let mut f = std::fs::OpenOptions::new().append(true).open(&src).unwrap();
        writeln!(f, "// touched").unwrap();
        let later = SystemTime::now() + Duration::from_secs(2);
        f.set_modified(later).unwrap();

        let h2 = ws.acquire(&csproj, &cancel).unwrap();
        assert!(h2.generation > h1.generation, "newer mtime must reload");
    }

    #[test]
    fn invalidate_evicts_but_old_handle_stays_usable() {
        let tmp = TempDir::new().unwrap();
        let csproj = seed_project(tmp.path());
        let ws = WorkspaceManager::new();
        let cancel = CancelToken::new();

        let h1 = ws.acquire(&csproj, &cancel).unwrap();
        ws.invalidate(&csproj);
        // The borrowed snapshot still answers queries.
        assert_eq!(h1.compilations.len(), 1);
        let h2 = ws.acquire(&csproj, &cancel).unwrap();
        assert!(h2.generation > h1.generation);
    }

    #[test]
    fn apply_writes_all_files_and_evicts() {
        let tmp = TempDir::new().unwrap();
        let csproj = seed_project(tmp.path());
        let ws = WorkspaceManager::new();
        let cancel = CancelToken::new();

        let h1 = ws.acquire(&csproj, &cancel).unwrap();
        let target = tmp.path().join("A.cs");
        ws.apply(
            &csproj,
            &[FileChange {
                path: target.clone(),
                new_text: "public class B { }".to_string(),
            }],
            None,
            &cancel,
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "public class B { }");
        let h2 = ws.acquire(&csproj, &cancel).unwrap();
        assert!(h2.generation > h1.generation, "apply must evict the handle");
        assert!(h2.compilations[0].types.iter().any(|t| t.name == "B"));
    }

    #[test]
    fn cancelled_acquire_fails_before_compiling() {
        let tmp = TempDir::new().unwrap();
        let csproj = seed_project(tmp.path());
        let ws = WorkspaceManager::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(ws.acquire(&csproj, &cancel).is_err());
    }
}
