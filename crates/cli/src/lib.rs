//! Autosync library surface: configuration, locking, logging and the watch loop

pub mod config;
pub mod locks;
pub mod logging;
pub mod runner;
