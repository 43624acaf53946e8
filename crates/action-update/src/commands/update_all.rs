use libupdate_core::{Context, UpdateError};

use crate::cli::Cli;
use crate::context::UpdateContext;
use crate::output::{output_success, print_human};

pub fn run(cli: &Cli, app: &UpdateContext, branches: &[String]) -> Result<(), UpdateError> {
    let report = app.update_all(&Context::background(), branches)?;
    if cli.json {
        output_success(cli, report);
        return Ok(());
    }

    print_human(
        cli,
        &format!(
            "Checked {} dependencies: {} pushed, {} in cooldown, {} failed",
            report.dependencies,
            report.pushed.len(),
            report.cooled_down.len(),
            report.failed.len()
        ),
    );
    for branch in &report.pushed {
        print_human(cli, &format!("  pushed {}", branch));
    }
    for name in &report.failed {
        print_human(cli, &format!("  failed {}", name));
    }
    Ok(())
}
