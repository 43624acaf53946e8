use comfy_table::{presets::UTF8_FULL, Table};
use libupdate_core::{Context, Dependency, UpdateError};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::UpdateContext;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct DependenciesOutput {
    updater: &'static str,
    dependencies: Vec<Dependency>,
}

pub fn run(cli: &Cli, app: &UpdateContext) -> Result<(), UpdateError> {
    let updater = app.updater()?;
    let dependencies = updater.dependencies(&Context::background())?;

    if cli.json {
        output_success(
            cli,
            DependenciesOutput {
                updater: updater.name(),
                dependencies,
            },
        );
        return Ok(());
    }

    if dependencies.is_empty() {
        print_human(cli, "No dependencies found");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Path", "Version", "Indirect"]);
    for dep in &dependencies {
        table.add_row(vec![
            dep.path.clone(),
            dep.version.clone(),
            if dep.indirect { "yes".to_string() } else { String::new() },
        ]);
    }
    print_human(cli, &table.to_string());
    Ok(())
}
