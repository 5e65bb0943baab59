pub mod types;
pub mod watcher;
