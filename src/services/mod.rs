//! Background services

pub mod watcher;

pub use watcher::{MarketWatcher, WatcherOptions, WatcherState};
