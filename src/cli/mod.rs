pub mod commands;
pub mod context;
pub mod run;
pub mod runs;
pub mod stages;

pub use commands::{Cli, Commands};
pub use context::CliContext;
