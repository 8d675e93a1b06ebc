//! Loader descriptors and the execution cache.
//!
//! A [`Loader`] describes how to produce one logical target path: run an
//! external command and capture its stdout, or pull a member out of an
//! archive. [`Loader::load`] is the execution cache around that producer:
//! staleness check against the loader script's mtime, deduplication of
//! concurrent requests, a short cooldown after failures, and an atomic
//! temp-file-then-rename write of the cached output.

use owo_colors::OwoColorize;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

use crate::effects::LoadEffects;
use crate::exec::Cmd;
use crate::extract::{ArchiveFormat, extract_member};
use crate::utils::format::{format_byte_size, format_elapsed};
use crate::utils::fs::{maybe_stat, mtime, prepare_output};

mod inflight;
pub(crate) use inflight::InflightRegistry;
use inflight::Entry;


/// Cache directory inside the source root where loader outputs live.
pub const CACHE_DIR: &str = ".fount/cache";

/// How long a failed loader is throttled before re-execution is allowed.
const ERROR_COOLDOWN: Duration = Duration::from_millis(1000);

/// Errors surfaced by [`Loader::load`].
///
/// Cloneable so that every concurrent caller of the same key observes the
/// single execution's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("loader exited with code {0}")]
    ExitCode(i32),
    #[error("failed to launch `{command}`: {message}")]
    Spawn { command: String, message: String },
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("loader skipped due to recent error")]
    Throttled,
    #[error("loader script missing: {0}")]
    MissingScript(String),
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// A target that already exists verbatim on disk; no execution needed.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Physical path relative to the current working directory.
    pub path: PathBuf,
}

/// Result of a successful resolution.
#[derive(Debug)]
pub enum Resolution {
    Asset(Asset),
    Loader(Loader),
}

impl Resolution {
    /// The physical source backing this resolution: the static file, the
    /// loader script, or the archive.
    pub fn path(&self) -> &Path {
        match self {
            Self::Asset(asset) => &asset.path,
            Self::Loader(loader) => &loader.path,
        }
    }

    /// The loader, when this resolution requires execution.
    pub fn loader(&self) -> Option<&Loader> {
        match self {
            Self::Asset(_) => None,
            Self::Loader(loader) => Some(loader),
        }
    }
}

/// How an archive loader obtains its archive bytes.
#[derive(Debug)]
pub enum Preload {
    /// The archive is a static file at this root-relative path.
    Static(PathBuf),
    /// The archive is itself produced by another loader (`data.zip.js`).
    Loader(Box<Loader>),
}

impl Preload {
    fn resolve(&self, effects: &dyn LoadEffects) -> Result<PathBuf, LoadError> {
        match self {
            Self::Static(path) => Ok(path.clone()),
            Self::Loader(loader) => loader.load(effects),
        }
    }
}

/// The producer behind a loader. A closed set: the variants are fixed, so
/// dispatch is an explicit match rather than virtual calls.
#[derive(Debug)]
pub enum LoaderSource {
    /// An external command whose stdout becomes the cached output.
    Command {
        command: OsString,
        args: Vec<OsString>,
    },
    /// A member extracted from an archive container.
    Archive {
        format: ArchiveFormat,
        preload: Preload,
        inflate_path: String,
    },
}

impl LoaderSource {
    fn exec(&self, loader: &Loader, output: File, effects: &dyn LoadEffects) -> Result<(), LoadError> {
        match self {
            Self::Command { command, args } => Cmd::new(command).args(args).run_to(output),
            Self::Archive {
                format,
                preload,
                inflate_path,
            } => {
                let archive_path = loader.root.join(preload.resolve(effects)?);
                let mut out = BufWriter::with_capacity(1 << 20, output);
                extract_member(*format, &archive_path, inflate_path, &mut out)?;
                out.flush()?;
                Ok(())
            }
        }
    }
}

/// A resolved producer for one logical target path.
#[derive(Debug)]
pub struct Loader {
    /// Source root relative to the current working directory.
    pub(crate) root: PathBuf,
    /// The loader script, executable, or archive backing this target.
    /// Clients watch this file to know when the loader must re-run.
    pub path: PathBuf,
    /// The output path relative to the destination root. The generated file
    /// is cached at `<root>/.fount/cache/<target_path>`.
    pub target_path: String,
    /// Serve a stale cache instead of rebuilding; set during full builds,
    /// where speed matters more than absolute freshness.
    pub use_stale: bool,
    pub(crate) source: LoaderSource,
    pub(crate) inflight: Arc<InflightRegistry>,
}

impl Loader {
    /// Runs this loader, returning the path to the generated output file
    /// relative to the source root (inside [`CACHE_DIR`]).
    ///
    /// Concurrent calls for the same target share one execution. Repeated
    /// calls are served from cache until the loader script is newer than the
    /// cached output. Callers read the file themselves; only the path is
    /// returned.
    pub fn load(&self, effects: &dyn LoadEffects) -> Result<PathBuf, LoadError> {
        effects.status(&format!(
            "{} {} {} ",
            "load".cyan(),
            self.path.display(),
            "→".dimmed()
        ));
        let start = Instant::now();
        let key = self.root.join(&self.target_path);
        let result = match self.inflight.begin(&key) {
            Entry::Owner(slot) => {
                let outcome = self.produce(effects);
                self.inflight.settle(&key, &slot, &outcome);
                outcome
            }
            Entry::Waiter(slot) => slot.wait(),
        };
        match &result {
            Ok(output_path) => {
                let size = fs::metadata(self.root.join(output_path))
                    .map(|m| m.len())
                    .unwrap_or(0);
                let size_text = if size > 0 {
                    format_byte_size(size).cyan().to_string()
                } else {
                    "empty output".yellow().to_string()
                };
                effects.log(&format!(
                    "{} {} {}",
                    "success".green(),
                    size_text,
                    format!("in {}", format_elapsed(start)).dimmed()
                ));
            }
            Err(error) => {
                effects.log(&format!(
                    "{} {} {}",
                    "error".red(),
                    format!("in {}:", format_elapsed(start)).dimmed(),
                    error.to_string().red()
                ));
            }
        }
        result
    }

    /// One full production: staleness check, error cooldown, execution into
    /// a temp file, and atomic promotion to the cache path.
    fn produce(&self, effects: &dyn LoadEffects) -> Result<PathBuf, LoadError> {
        let output_path = Path::new(CACHE_DIR).join(&self.target_path);
        let cache_path = self.root.join(&output_path);
        let loader_stat = maybe_stat(&self.path)?
            .ok_or_else(|| LoadError::MissingScript(self.path.display().to_string()))?;

        match maybe_stat(&cache_path)? {
            None => effects.status(&"[missing] ".dimmed().to_string()),
            Some(cache_stat) if mtime(&cache_stat) < mtime(&loader_stat) => {
                if self.use_stale {
                    effects.status(&"[using stale] ".dimmed().to_string());
                    return Ok(output_path);
                }
                effects.status(&"[stale] ".dimmed().to_string());
            }
            Some(_) => {
                effects.status(&"[fresh] ".dimmed().to_string());
                return Ok(output_path);
            }
        }

        // Process-unique temp path so two builder processes never collide on
        // the same partial file; the error marker sits beside it.
        let temp_path = self
            .root
            .join(CACHE_DIR)
            .join(format!("{}.{}", self.target_path, process::id()));
        let error_path = {
            let mut path = temp_path.clone().into_os_string();
            path.push(".err");
            PathBuf::from(path)
        };

        if let Some(error_stat) = maybe_stat(&error_path)? {
            let error_mtime = mtime(&error_stat);
            let recent = SystemTime::now()
                .duration_since(error_mtime)
                .map_or(true, |age| age < ERROR_COOLDOWN);
            if error_mtime > mtime(&loader_stat) && recent {
                return Err(LoadError::Throttled);
            }
            let _ = fs::remove_file(&error_path);
        }

        prepare_output(&temp_path)?;
        prepare_output(&cache_path)?;
        let temp_file = File::create(&temp_path)?;
        match self.source.exec(self, temp_file, effects) {
            Ok(()) => {
                fs::rename(&temp_path, &cache_path)?;
                Ok(output_path)
            }
            Err(error) => {
                // keep partial output under the marker for post-mortem
                let _ = fs::rename(&temp_path, &error_path);
                Err(error)
            }
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.path.display(), self.target_path)
    }
}
