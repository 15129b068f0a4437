pub mod config;
pub mod harness;
pub mod process;
pub mod snapshot;

pub use config::{CommandTemplate, HarnessConfig, CONFIG_ENV_VAR};
pub use harness::ScriptHarness;
pub use process::{run_process, ProcessConfig, ProcessOutput};
