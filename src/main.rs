//! CLI entry point for repofetch.

use std::process::ExitCode;

use anyhow::Result;

mod app;
mod cli;

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every discovered file was written.
    Success,
    /// Some files were written, some failed or were skipped.
    Partial,
    /// Nothing useful happened, or the run was aborted or interrupted.
    Failure,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let outcome = app::runtime::run_repofetch().await?;
    Ok(ExitCode::from(outcome.code()))
}
