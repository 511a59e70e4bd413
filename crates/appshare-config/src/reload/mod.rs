//! Live config reload manager.
//!
//! Combines the file watcher with config loading so running components
//! see edits to the config file without a restart.

mod manager;


pub use manager::ReloadManager;
