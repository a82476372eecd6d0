use crate::cmd::demo::demo_registry;
use crate::cmd::RegistryArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_registry, OutputFormat};

pub fn run(_args: RegistryArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = demo_registry()?;
    print_registry(&registry, format);
    Ok(SUCCESS)
}
