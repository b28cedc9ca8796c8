//! Hot-reload of the theme file given with `--theme`.
//!
//! The watcher runs on notify's thread and only raises a flag; the render loop
//! calls [`ThemeWatcher::poll`] once per frame and re-reads the file itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::theme::Theme;

/// Read and parse a theme file.
pub fn load_theme(path: &Path) -> Result<Theme> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading theme file {}", path.display()))?;
    Theme::from_toml(&content).with_context(|| format!("parsing theme file {}", path.display()))
}

pub struct ThemeWatcher {
    path: PathBuf,
    dirty: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

impl ThemeWatcher {
    /// Watch the parent directory of `path`, filtered to its filename.
    ///
    /// Editors that save via rename never modify the original inode, so the
    /// file itself cannot be watched directly.
    pub fn start(path: PathBuf) -> Result<Self> {
        let target = path
            .file_name()
            .context("theme path has no filename")?
            .to_os_string();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let dirty = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dirty);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                if event.paths.iter().any(|p| p.file_name() == Some(target.as_os_str())) {
                    flag.store(true, Ordering::Release);
                }
            }
            Err(e) => warn!(target: "theme", "Watch error: {}", e),
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        info!(target: "theme", path = %path.display(), "Watching theme file");
        Ok(Self {
            path,
            dirty,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the reloaded theme if the file changed since the last poll.
    ///
    /// A file that fails to parse is logged and ignored; the caller keeps its
    /// current theme.
    pub fn poll(&self) -> Option<Theme> {
        if !self.dirty.swap(false, Ordering::Acquire) {
            return None;
        }
        match load_theme(&self.path) {
            Ok(theme) => {
                info!(target: "theme", "Theme reloaded");
                Some(theme)
            }
            Err(e) => {
                warn!(target: "theme", "Keeping previous theme: {:#}", e);
                None
            }
        }
    }
}
