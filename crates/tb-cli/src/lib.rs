//! Time bank CLI library.
//!
//! This crate provides the `tb` command-line interface.

mod app;
mod cli;
pub mod commands;
mod config;
mod notifier;

pub use app::{App, provider_registry, selected_provider};
pub use cli::{Cli, Commands, EventsAction, MetersAction, SyncAction};
pub use config::{Config, SyncConfig};
pub use notifier::ConsoleNotifier;
