//! Fount - data loader resolution and execution cache.
//!
//! Given a logical output path such as `data/cities.csv`, fount locates the
//! generator responsible for producing it - a static file, an
//! interpreter-backed script, or a member of an archive - runs it at most
//! once per staleness window, and caches the output under `.fount/cache`
//! inside the source root.

mod exec;
mod freshness;
mod utils;

pub mod effects;
pub mod extract;
pub mod interpreter;
pub mod loader;
pub mod logger;
pub mod resolver;
pub mod watch;

pub use effects::{LoadEffects, SilentEffects, TermEffects};
pub use interpreter::InterpreterTable;
pub use loader::{Asset, LoadError, Loader, Resolution};
pub use resolver::{FindOptions, LoaderResolver};
pub use watch::FileWatchers;
