//! Process-level plumbing for the module host: layered config, logging,
//! home directory resolution and shutdown signals.

pub mod config;
pub mod config_provider;
pub mod logging;
pub mod paths;
pub mod signals;

pub use config::*;
pub use config_provider::*;
pub use logging::*;
pub use signals::*;
