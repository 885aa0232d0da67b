// main.rs

mod api;
mod api_result;
mod app;
mod config;
mod datetime;
mod decode;
mod models;
mod parser;
mod state;
mod ui;
mod view_model;

use api::HttpTaskApi;
use app::App;
use clap::Parser;
use config::{CliArgs, Config};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use ui::run_app;
use view_model::TaskViewModel;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// Logs go to a file, the terminal belongs to ratatui. Keep the guard alive
// until exit so buffered lines get flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskio.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file before clap reads them
    dotenv().ok();

    let cli = CliArgs::parse();
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    let config = Config::load(&cli)?;
    tracing::info!(base_url = %config.base_url, "taskio starting");

    let api = HttpTaskApi::new(&config.base_url, config.timeout)?;
    let mut vm = TaskViewModel::new(Arc::new(api), chrono::Local::now().date_naive());
    vm.check_health();
    let app = App::new(vm.subscribe());

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = run_app(&mut terminal, app, &mut vm, config.poll_timeout).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        eprintln!("Error: {:?}", err);
    }

    // Give writes issued just before quitting a chance to land.
    if vm.in_flight() > 0 {
        tracing::info!(pending = vm.in_flight(), "waiting for outstanding requests");
        if tokio::time::timeout(SHUTDOWN_GRACE, vm.settle()).await.is_err() {
            tracing::warn!(pending = vm.in_flight(), "gave up on outstanding requests");
        }
    }

    tracing::info!("taskio exiting");
    Ok(())
}
