// crates/clipdrop-core/src/context.rs
//
// What every handler is constructed with. One HandlerContext per session,
// cloned (Arc bump) into each handler; nothing in it is mutable except the
// cancel flag, which is the one thing the UI needs to reach into a running
// execute.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use crate::config::{handler_config_path, ConfigStore, RootSettings};
use crate::media::CodecTable;
use crate::snapshot::ContentSnapshot;

/// Folder used when the host project has no usable name yet.
pub const UNSAVED_PROJECT_DIR: &str = "_unsaved";

// ── CancelToken ───────────────────────────────────────────────────────────────

/// Shared cancel flag, same shape as the encode cancel in the editor:
/// the UI sets it, long-running work polls it.
#[derive(Clone, Debug, Default)]
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
}

// ── PackageEnv ────────────────────────────────────────────────────────────────

/// Shared, tool-managed package environment (a Python virtualenv layout).
/// Handlers that run scripts find their interpreter here and run with its
/// bin folder first on PATH.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageEnv {
    root: PathBuf,
}

impl PackageEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        let dir = self.root.join("Scripts");
        #[cfg(not(target_os = "windows"))]
        let dir = self.root.join("bin");
        dir
    }

    pub fn lib_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        let dir = self.root.join("Lib");
        #[cfg(not(target_os = "windows"))]
        let dir = self.root.join("lib");
        dir
    }

    pub fn executable(&self, name: &str) -> PathBuf {
        self.bin_dir().join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
    }

    pub fn python(&self) -> PathBuf {
        self.executable("python")
    }

    pub fn is_present(&self) -> bool {
        self.lib_dir().is_dir() && self.python().is_file()
    }

    /// Environment additions for a child running inside the package env.
    pub fn env_vars(&self) -> Vec<(String, OsString)> {
        vec![
            ("VIRTUAL_ENV".into(), self.root.clone().into_os_string()),
            ("PATH".into(), prepend_path(&self.bin_dir())),
        ]
    }
}

/// `dir` followed by the current PATH entries.
pub fn prepend_path(dir: &Path) -> OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(current) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&current));
    }
    std::env::join_paths(entries).unwrap_or_else(|e| {
        warn!("PATH could not be joined ({e}); using {} alone", dir.display());
        dir.as_os_str().to_os_string()
    })
}

/// `{base}/{project}` with path-hostile characters replaced. Untitled or
/// empty project names share the `_unsaved` folder.
pub fn asset_folder_for(base: &Path, project_name: &str) -> PathBuf {
    let trimmed = project_name.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("Untitled Project") {
        warn!("project has not been saved; pasting into '{UNSAVED_PROJECT_DIR}'");
        return base.join(UNSAVED_PROJECT_DIR);
    }
    let safe: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    base.join(safe)
}

// ── HandlerContext ────────────────────────────────────────────────────────────

struct ContextInner {
    settings:   RootSettings,
    env:        PackageEnv,
    snapshot:   ContentSnapshot,
    config_dir: PathBuf,
    asset_dir:  PathBuf,
    cache_dir:  PathBuf,
    codecs:     Arc<CodecTable>,
    cancel:     CancelToken,
}

#[derive(Clone)]
pub struct HandlerContext {
    inner: Arc<ContextInner>,
}

impl HandlerContext {
    pub fn new(
        settings:     RootSettings,
        config_dir:   impl Into<PathBuf>,
        project_name: &str,
        snapshot:     ContentSnapshot,
        codecs:       Arc<CodecTable>,
    ) -> Self {
        let asset_dir = asset_folder_for(&settings.assets, project_name);
        let cache_dir = asset_folder_for(&settings.cache, project_name);
        Self {
            inner: Arc::new(ContextInner {
                env: PackageEnv::new(settings.env.clone()),
                settings,
                snapshot,
                config_dir: config_dir.into(),
                asset_dir,
                cache_dir,
                codecs,
                cancel: CancelToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &RootSettings {
        &self.inner.settings
    }

    pub fn env(&self) -> &PackageEnv {
        &self.inner.env
    }

    pub fn snapshot(&self) -> &ContentSnapshot {
        &self.inner.snapshot
    }

    pub fn config_dir(&self) -> &Path {
        &self.inner.config_dir
    }

    /// Project asset folder; saved media ends up here.
    pub fn asset_dir(&self) -> &Path {
        &self.inner.asset_dir
    }

    /// Project scratch folder for tool inputs and outputs.
    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    pub fn codecs(&self) -> &CodecTable {
        &self.inner.codecs
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.inner.cancel
    }

    pub fn tool_timeout(&self) -> Duration {
        self.inner.settings.tool_timeout()
    }

    pub fn tools_dir(&self) -> &Path {
        &self.inner.settings.tools
    }

    /// Private config store for handler `id`.
    pub fn handler_config(&self, id: &str) -> ConfigStore {
        ConfigStore::new(handler_config_path(&self.inner.config_dir, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemoryClipboard;

    #[test]
    fn untitled_projects_share_unsaved_folder() {
        let base = Path::new("/assets");
        assert_eq!(asset_folder_for(base, ""), base.join(UNSAVED_PROJECT_DIR));
        assert_eq!(asset_folder_for(base, "Untitled Project"), base.join(UNSAVED_PROJECT_DIR));
        assert_eq!(asset_folder_for(base, "  "), base.join(UNSAVED_PROJECT_DIR));
    }

    #[test]
    fn project_names_are_made_path_safe() {
        let base = Path::new("/assets");
        assert_eq!(asset_folder_for(base, "Trip: Day 1/2"), base.join("Trip_ Day 1_2"));
        assert_eq!(asset_folder_for(base, "Reel"), base.join("Reel"));
    }

    #[test]
    fn package_env_layout() {
        let env = PackageEnv::new("/envs/shared");
        assert!(env.python().starts_with(env.bin_dir()));
        assert!(!env.is_present());
        let vars = env.env_vars();
        assert_eq!(vars[0].0, "VIRTUAL_ENV");
        let path = &vars[1].1;
        let first = std::env::split_paths(path).next().unwrap();
        assert_eq!(first, env.bin_dir());
    }

    #[test]
    fn context_clones_share_cancel_flag() {
        let dir      = tempfile::tempdir().unwrap();
        let settings = RootSettings::defaults(dir.path(), dir.path());
        let ctx = HandlerContext::new(
            settings,
            dir.path(),
            "Reel",
            MemoryClipboard::new().into_snapshot(),
            Arc::new(CodecTable::new()),
        );
        let other = ctx.clone();
        ctx.cancel().cancel();
        assert!(other.cancel().is_cancelled());
        assert!(ctx.asset_dir().ends_with("Reel"));
        assert_eq!(
            ctx.handler_config("paste").path(),
            dir.path().join("handlers").join("paste").join("config.json")
        );
    }
}
