//! Agent definition loading, merging, and hot-reload watching.

pub mod loader;
pub mod registry;
pub mod resolver;
pub mod watcher;

pub use loader::{load_all, parse_definition, LoadWarning, LoaderConfig};
pub use registry::DefinitionRegistry;
pub use watcher::HotReloadWatcher;
