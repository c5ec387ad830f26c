mod host_runtime;
mod loader;
mod runner;
mod shutdown;

pub use host_runtime::{HostRuntime, LoadOptions, DEFAULT_BOOTSTRAP_MODULE};
pub use loader::{Phase1Loader, Phase1Report};
pub use runner::{run, RunOptions, ShutdownOptions};
pub use shutdown::{ShutdownFn, ShutdownHandlers, ShutdownReport};
