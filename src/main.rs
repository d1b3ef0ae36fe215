use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use vm_placement_manager::cli::{self, Cli};
use vm_placement_manager::errors::handlers::report_failure;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli::load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            cli::init_logging(cli.debug);
            return report_failure(&e);
        }
    };

    // Initialize logging
    cli::init_logging(settings.logging.debug);
    info!("Starting VM Placement Manager");
    info!(
        endpoint = %settings.session.endpoint,
        simulate_only = settings.migration.simulate_only,
        "Configuration loaded"
    );

    match cli::run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}
