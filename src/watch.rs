//! Watcher handoff: filesystem watches for resolved loader paths.
//!
//! The watcher is an external collaborator. It is handed resolved physical
//! paths and reports logical names back through the callback; it takes no
//! part in cache logic.

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::resolver::LoaderResolver;

/// Active watches for one page's referenced files.
pub struct FileWatchers {
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
}

impl FileWatchers {
    /// Watch the backing files of `path` and every name in `watch_paths`.
    ///
    /// Each logical name is resolved through
    /// [`LoaderResolver::watch_path`]; names that resolve to the same
    /// physical file are reported once, under the first name seen.
    pub fn of<I, F>(
        resolver: &LoaderResolver,
        path: &str,
        watch_paths: I,
        callback: F,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) + Send + 'static,
    {
        let mut names: FxHashMap<PathBuf, String> = FxHashMap::default();
        for name in std::iter::once(path.to_string()).chain(watch_paths) {
            if let Some(watch_path) = resolver.watch_path(&name) {
                let canonical = watch_path.canonicalize().unwrap_or(watch_path);
                names.entry(canonical).or_insert(name);
            }
        }

        let targets: Vec<PathBuf> = names.keys().cloned().collect();
        let names = Arc::new(names);

        let handler_names = Arc::clone(&names);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        for changed in &event.paths {
                            let changed =
                                changed.canonicalize().unwrap_or_else(|_| changed.clone());
                            if let Some(name) = handler_names.get(&changed) {
                                callback(name);
                            }
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {e}"),
                }
            })
            .context("failed to create file watcher")?;

        for target in targets {
            watcher
                .watch(&target, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", target.display()))?;
        }

        Ok(Self { _watcher: watcher })
    }
}
