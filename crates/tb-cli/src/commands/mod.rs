//! CLI subcommand implementations.

pub mod events;
pub mod export;
pub mod import;
pub mod meters;
pub mod period;
pub mod reset;
pub mod settings;
pub mod status;
pub mod sync;
pub mod timeline;
pub mod tracking;
pub mod util;
pub mod watch;
