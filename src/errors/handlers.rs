use super::ManagerError;
use colored::Colorize;
use std::process::ExitCode;
use tracing::error;

/// Report a run-stopping error to the operator and pick the exit code for it.
pub fn report_failure(err: &ManagerError) -> ExitCode {
    let code = err.exit_code();

    error!(error = %err, exit_code = code, "Run aborted");

    eprintln!("\n{} {}\n", "✗".red(), err);
    ExitCode::from(code)
}
