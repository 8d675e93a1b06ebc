//! Path resolution: locate the producer for a logical target path.
//!
//! The search tries, in order: an exact static file, a loader script named
//! `target + interpreter extension`, a parameterized "dynamic route" match
//! over bracket segments like `[id]`, and finally an ancestor archive that
//! could contain the target as a member. The first hit wins. Resolution is a
//! pure function of the source root, the interpreter table, and filesystem
//! state; it performs existence checks only.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;

use crate::extract::ARCHIVE_EXTENSIONS;
use crate::freshness::{ContentHash, compute_file_hash};
use crate::interpreter::InterpreterTable;
use crate::loader::{
    Asset, CACHE_DIR, InflightRegistry, Loader, LoaderSource, Preload, Resolution,
};
use crate::utils::fs::{maybe_stat, mtime_millis};
use crate::utils::path::{extension, parent_dir};
use crate::watch::FileWatchers;

#[cfg(test)]
mod tests;

/// Options for [`LoaderResolver::find`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Serve a stale cache instead of rebuilding (set during full builds).
    pub use_stale: bool,
}

/// Resolves logical target paths to their producers within one source root.
///
/// The in-flight execution registry lives here, so deduplication is scoped
/// to the resolver's lifetime rather than ambient process state.
pub struct LoaderResolver {
    root: PathBuf,
    interpreters: InterpreterTable,
    inflight: Arc<InflightRegistry>,
}

/// A successful dynamic-route match.
struct DynamicMatch {
    /// Matched physical path relative to the source root.
    path: PathBuf,
    /// `--name value` pairs, outermost bracket first.
    params: Vec<String>,
    /// Interpreter extension when the match is a loader script.
    ext: Option<String>,
}

impl LoaderResolver {
    /// A resolver over `root` with the built-in interpreter table.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_interpreters(root, InterpreterTable::new())
    }

    /// A resolver over `root` with a caller-configured interpreter table.
    pub fn with_interpreters(root: impl Into<PathBuf>, interpreters: InterpreterTable) -> Self {
        Self {
            root: root.into(),
            interpreters,
            inflight: Arc::new(InflightRegistry::new()),
        }
    }

    /// The source root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The interpreter table in use.
    pub fn interpreters(&self) -> &InterpreterTable {
        &self.interpreters
    }

    /// Finds the producer for `target_path` relative to the source root, if
    /// one exists.
    ///
    /// For files within archives, the first missing parent folder is probed
    /// with each supported archive extension, but a real folder on the way
    /// always wins: if `data` exists, we never look for `data.zip`.
    pub fn find(&self, target_path: &str, options: FindOptions) -> Option<Resolution> {
        if let Some(found) = self
            .find_exact(target_path, options)
            .or_else(|| self.find_dynamic(target_path, options))
        {
            return Some(found);
        }

        let mut dir = parent_dir(target_path);
        loop {
            let parent = parent_dir(dir);
            if parent == dir {
                return None; // reached source root
            }
            if self.root.join(dir).exists() {
                return None; // found a real folder; archives never shadow it
            }
            if self.root.join(parent).exists() {
                break; // nearest existing ancestor
            }
            dir = parent;
        }

        for (ext, format) in ARCHIVE_EXTENSIONS {
            let archive = format!("{dir}{ext}");
            let Some(found) = self
                .find_exact(&archive, options)
                .or_else(|| self.find_dynamic(&archive, options))
            else {
                continue;
            };
            let inflate_path = target_path[dir.len() + 1..].to_string();
            let (path, preload) = match found {
                // archive.zip.js: the archive itself is loader-generated
                Resolution::Loader(inner) => {
                    (inner.path.clone(), Preload::Loader(Box::new(inner)))
                }
                // archive.zip: a static archive file
                Resolution::Asset(asset) => {
                    let relative = asset
                        .path
                        .strip_prefix(&self.root)
                        .unwrap_or(&asset.path)
                        .to_path_buf();
                    (asset.path, Preload::Static(relative))
                }
            };
            return Some(Resolution::Loader(Loader {
                root: self.root.clone(),
                path,
                target_path: target_path.to_string(),
                use_stale: options.use_stale,
                source: LoaderSource::Archive {
                    format,
                    preload,
                    inflate_path,
                },
                inflight: Arc::clone(&self.inflight),
            }));
        }
        None
    }

    fn find_exact(&self, target_path: &str, options: FindOptions) -> Option<Resolution> {
        let exact = self.root.join(target_path);
        if exact.exists() {
            return Some(Resolution::Asset(Asset { path: exact }));
        }
        for (ext, template) in self.interpreters.iter() {
            let path = self.root.join(format!("{target_path}{ext}"));
            if !path.exists() {
                continue;
            }
            if extension(target_path).is_empty() {
                // a path with no extension cannot name a generated file
                crate::log!("loader"; "invalid data loader path: {target_path}{ext}");
                return None;
            }
            let (command, args) = command_for(&path, template, &[]);
            return Some(Resolution::Loader(self.command_loader(
                path,
                command,
                args,
                target_path,
                options,
            )));
        }
        None
    }

    fn find_dynamic(&self, target_path: &str, options: FindOptions) -> Option<Resolution> {
        let parts: Vec<&str> = target_path.split('/').collect();
        let found = self.find_dynamic_params(Path::new(""), &parts)?;
        let path = self.root.join(&found.path);
        let Some(ext) = found.ext else {
            return Some(Resolution::Asset(Asset { path }));
        };
        let template = self.interpreters.lookup(&ext)?;
        let (command, args) = command_for(&path, template, &found.params);
        Some(Resolution::Loader(self.command_loader(
            path,
            command,
            args,
            target_path,
            options,
        )))
    }

    /// Finds a parameterized route recursively, preferring the most specific
    /// match: a concrete entry always wins over a bracket entry at the same
    /// depth.
    fn find_dynamic_params(&self, cwd: &Path, parts: &[&str]) -> Option<DynamicMatch> {
        match parts {
            [] => None,
            [first] => {
                if self.root.join(cwd).join(first).exists() {
                    return Some(DynamicMatch {
                        path: cwd.join(first),
                        params: Vec::new(),
                        ext: None,
                    });
                }
                let ext1 = extension(first);
                for (ext, _) in self.interpreters.iter() {
                    let literal = format!("{first}{ext}");
                    if self.root.join(cwd).join(&literal).exists() {
                        return Some(DynamicMatch {
                            path: cwd.join(literal),
                            params: Vec::new(),
                            ext: Some(ext.to_string()),
                        });
                    }
                    let suffix = format!("{ext1}{ext}");
                    if let Some((file, param)) = self.bracket_entries(cwd, &suffix).into_iter().next()
                    {
                        let value = first.strip_suffix(ext1).unwrap_or(first);
                        return Some(DynamicMatch {
                            path: cwd.join(file),
                            params: vec![format!("--{param}"), value.to_string()],
                            ext: Some(ext.to_string()),
                        });
                    }
                }
                None
            }
            [first, rest @ ..] => {
                if self.root.join(cwd).join(first).exists() {
                    if let Some(found) = self.find_dynamic_params(&cwd.join(first), rest) {
                        return Some(found);
                    }
                }
                for (dir, param) in self.bracket_entries(cwd, "") {
                    if let Some(found) = self.find_dynamic_params(&cwd.join(&dir), rest) {
                        let mut params = vec![format!("--{param}"), (*first).to_string()];
                        params.extend(found.params);
                        return Some(DynamicMatch {
                            path: found.path,
                            params,
                            ext: found.ext,
                        });
                    }
                }
                None
            }
        }
    }

    /// Directory entries in `cwd` named `[param]` followed by `suffix`, in
    /// sorted order for deterministic matching.
    fn bracket_entries(&self, cwd: &Path, suffix: &str) -> Vec<(String, String)> {
        let Ok(entries) = fs::read_dir(self.root.join(cwd)) else {
            return Vec::new();
        };
        let mut found: Vec<(String, String)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                let stem = name.strip_suffix(suffix)?;
                let param = stem.strip_prefix('[')?.strip_suffix(']')?;
                if param.is_empty() {
                    return None;
                }
                let param = param.to_string();
                Some((name, param))
            })
            .collect();
        found.sort();
        found
    }

    fn command_loader(
        &self,
        path: PathBuf,
        command: OsString,
        args: Vec<OsString>,
        target_path: &str,
        options: FindOptions,
    ) -> Loader {
        Loader {
            root: self.root.clone(),
            path,
            target_path: target_path.to_string(),
            use_stale: options.use_stale,
            source: LoaderSource::Command { command, args },
            inflight: Arc::clone(&self.inflight),
        }
    }

    /// Returns the physical path to watch for changes to `path`: the exact
    /// file when present (preferring a `.jsx` sibling for `.js` requests),
    /// otherwise the resolved producer's own source path.
    pub fn watch_path(&self, path: &str) -> Option<PathBuf> {
        let exact = self.root.join(path);
        if exact.exists() {
            return Some(exact);
        }
        if path.ends_with(".js") {
            let jsx = self.root.join(format!("{path}x"));
            if jsx.exists() {
                return Some(jsx);
            }
        }
        self.find(path, FindOptions::default())
            .map(|found| found.path().to_path_buf())
    }

    /// Watches the files backing `path` and every name in `watch_paths`,
    /// invoking `callback` with the logical name whenever one changes.
    pub fn watch_files<I, F>(&self, path: &str, watch_paths: I, callback: F) -> Result<FileWatchers>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) + Send + 'static,
    {
        FileWatchers::of(self, path, watch_paths, callback)
    }

    /// The root-relative path of the file backing `name` during preview: the
    /// file itself, or the loader source that generates it.
    fn source_file_path(&self, name: &str) -> PathBuf {
        if !self.root.join(name).exists() {
            if let Some(found) = self.find(name, FindOptions::default()) {
                let path = found.path();
                return path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
            }
        }
        PathBuf::from(name)
    }

    /// The root-relative path of the file backing `name` during build: the
    /// file itself, or the cached loader output.
    fn output_file_path(&self, name: &str) -> PathBuf {
        if !self.root.join(name).exists() && self.find(name, FindOptions::default()).is_some() {
            return Path::new(CACHE_DIR).join(name);
        }
        PathBuf::from(name)
    }

    /// Hash of the file backing `name` within the source root.
    ///
    /// For loader-generated files this combines the loader script's content
    /// hash with its modification time, so touching the script without
    /// changing its bytes still forces a rebuild. The hash of empty input is
    /// returned when nothing backs the name.
    pub fn source_file_hash(&self, name: &str) -> String {
        let path = self.source_file_path(name);
        let full = self.root.join(&path);
        let Some(hash) = compute_file_hash(&full) else {
            return ContentHash::of_empty().to_hex();
        };
        if path == Path::new(name) {
            return hash.to_hex();
        }
        let Ok(Some(stat)) = maybe_stat(&full) else {
            return ContentHash::of_empty().to_hex();
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(hash.as_bytes());
        hasher.update(mtime_millis(&stat).to_string().as_bytes());
        ContentHash::new(*hasher.finalize().as_bytes()).to_hex()
    }

    /// Modification time of the source file backing `name`, if any.
    pub fn source_last_modified(&self, name: &str) -> Option<SystemTime> {
        let meta = maybe_stat(&self.root.join(self.source_file_path(name)))
            .ok()
            .flatten()?;
        meta.modified().ok()
    }

    /// Modification time of the output file backing `name`, if any; for
    /// generated files this is the cached output.
    pub fn output_last_modified(&self, name: &str) -> Option<SystemTime> {
        let meta = maybe_stat(&self.root.join(self.output_file_path(name)))
            .ok()
            .flatten()?;
        meta.modified().ok()
    }

    /// Content-fingerprinted reference URL for a physical asset.
    pub fn resolve_file_path(&self, path: &str) -> String {
        format!("/_file/{path}?sha={}", self.source_file_hash(path))
    }
}

/// Build the command line for a loader script: the interpreter template's
/// command and fixed arguments, the script path (unless the template is
/// empty, in which case the script is the command), then any dynamic-route
/// parameters.
fn command_for(script: &Path, template: &[String], params: &[String]) -> (OsString, Vec<OsString>) {
    match template.split_first() {
        Some((command, fixed)) => {
            let mut args: Vec<OsString> = fixed.iter().map(Into::into).collect();
            args.push(script.into());
            args.extend(params.iter().map(Into::into));
            (command.into(), args)
        }
        None => (script.into(), params.iter().map(Into::into).collect()),
    }
}
