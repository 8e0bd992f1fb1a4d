//! `akashic` - scripted terminal breach theatre

use clap::Parser;
use tokio_util::sync::CancellationToken;

use akashic::cli::args::Cli;
use akashic::cli::commands;
use akashic::error::ExitCode;
use akashic::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(LogFormat::Human, cli.verbose, cli.color);
    }

    // First signal cancels the running command; a second one exits at once.
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        token.cancel();
        eprintln!("\nShutting down... (press Ctrl+C again to force)");
        std::process::exit(wait_for_signal().await);
    });

    match commands::dispatch(cli, shutdown).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// Waits for SIGINT or SIGTERM and returns the matching exit code.
#[cfg(unix)]
async fn wait_for_signal() -> i32 {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return ExitCode::INTERRUPTED;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
        _ = sigterm.recv() => ExitCode::TERMINATED,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    ExitCode::INTERRUPTED
}
