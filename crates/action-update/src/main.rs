mod cli;
mod commands;
mod context;
mod handlers;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use context::UpdateContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();

    let result = UpdateContext::resolve(&cli).and_then(|app| {
        init_logging(&app.config.log_level);
        match &cli.command {
            Command::Run => commands::run::run(&cli, &app),
            Command::UpdateAll { branch } => commands::update_all::run(&cli, &app, branch),
            Command::Dependencies => commands::dependencies::run(&cli, &app),
        }
    });

    if let Err(e) = result {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}
