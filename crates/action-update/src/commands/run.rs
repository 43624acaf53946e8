use libupdate_core::{Context, UpdateError};

use crate::cli::Cli;
use crate::context::UpdateContext;
use crate::handlers::handle;
use crate::output::output_success;

pub fn run(cli: &Cli, app: &UpdateContext) -> Result<(), UpdateError> {
    let handled = handle(&Context::background(), app)?;
    output_success(cli, handled);
    Ok(())
}
