use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod registry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the in-process messaging demo.
    Demo(DemoArgs),
    /// Print the demo queue registry.
    Registry(RegistryArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Registry(args) => registry::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of jobs to publish.
    #[arg(long, default_value_t = 3)]
    pub jobs: u32,
    /// Acknowledge deliveries manually instead of consuming with auto-ack.
    #[arg(long)]
    pub manual_ack: bool,
}

#[derive(Args, Debug, Default)]
pub struct RegistryArgs {}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
