use std::sync::Arc;

use anyhow::{Context, Result};
use avatar_console::config::Config;
use avatar_console::heygen_adapter::HeyGenVendor;
use avatar_console::ui::{self, UiCoordinator};
use avatar_core::Command;
use avatar_core::gateway::{Gateway, GatewayClient};
use avatar_core::session::AvatarSessionController;
use avatar_core::status::{Severity, Status, StatusReporter};
use clap::Parser;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Talk to an interactive avatar from the terminal")]
struct Cli {
    /// Backend gateway base URL, overriding GATEWAY_BASE_URL
    #[arg(long)]
    base_url: Option<String>,
    /// Avatar id (or list number) to select once the list is loaded
    #[arg(long)]
    avatar: Option<String>,
}

fn print_status(status: &Status) {
    let line = format!("[{}] {}", status.severity, status.message);
    let styled = match status.severity {
        Severity::Info => line.cyan(),
        Severity::Success => line.green(),
        Severity::Warning => line.yellow(),
        Severity::Error => line.red(),
    };
    println!("{styled}");
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load console configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they do not interleave with the console view.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    let base_url = args.base_url.unwrap_or(config.gateway_base_url);
    tracing::info!("Starting avatar console against {}", base_url);

    // --- 4. Wire Components ---
    let gateway: Arc<dyn Gateway> = Arc::new(GatewayClient::new(&base_url));
    let vendor = Arc::new(HeyGenVendor::new(&config.heygen_api_base));
    let status = StatusReporter::new();
    // Timer and vendor events come back to this loop as commands.
    let (command_tx, mut command_rx) = tokio::sync::mpsc::channel::<Command>(32);
    let controller =
        AvatarSessionController::new(gateway.clone(), vendor, status.clone(), command_tx);
    let mut ui = UiCoordinator::new(gateway, controller, status.clone());

    // Status and session state are printed as they change, also while a
    // command is still running.
    let mut status_rx = status.subscribe();
    let mut state_rx = ui.subscribe_state();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_status(&status_rx.borrow_and_update());
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    println!("{}", format!("session: {state}").bold());
                }
            }
        }
    });

    println!("{}", ui::HELP);
    ui.load_avatars().await;
    if let Some(avatar) = args.avatar {
        ui.select(&avatar);
    }
    println!("{}", ui.render());

    // --- 5. Run the Input Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read input: {}", e);
                        break;
                    }
                };
                let action = match ui::parse_action(&line) {
                    Ok(action) => action,
                    Err(usage) => {
                        status.warning(usage);
                        continue;
                    }
                };
                let show_help = action == ui::Action::Help;
                // A start can wait for the media stream for a while; Ctrl-C
                // must still get through.
                let running = tokio::select! {
                    running = ui.dispatch(action) => running,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received Ctrl-C during a command, shutting down...");
                        false
                    }
                };
                if !running {
                    break;
                }
                if show_help {
                    println!("{}", ui::HELP);
                } else {
                    println!("{}", ui.render());
                }
            }
            Some(command) = command_rx.recv() => {
                ui.handle_command(command).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    ui.shutdown().await;
    printer.abort();
    tracing::info!("Shutting down...");
    Ok(())
}
