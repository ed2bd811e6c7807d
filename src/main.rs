use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod dataview;
mod domain;
mod inputter;
mod model;
mod table;
mod ui;
mod workspace;

use controller::Controller;
use domain::{DbvConfig, DbvError};
use model::{Model, Status};

#[derive(Parser, Debug)]
#[command(name = "dbv", version, about = "A tui based database workspace and data viewer.")]
struct Cli {
    /// Data file to open (csv, parquet or arrow/ipc)
    file: Option<String>,

    /// Initial page size (50, 100, 200 or 500)
    #[arg(long, default_value_t = 100)]
    page_size: usize,

    /// Write tracing output to this file (filtered via DBV_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = DbvConfig::default()
        .with_page_size(cli.page_size)
        .with_log_file(cli.log_file.clone());

    if let Some(log_file) = &config.log_file
        && let Err(e) = init_tracing(log_file)
    {
        eprintln!("Error: could not open log file: {e:?}");
        return ExitCode::FAILURE;
    }

    match run(&cli, &config) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// Log to a file so the terminal stays free for the TUI.
fn init_tracing(log_file: &PathBuf) -> Result<(), DbvError> {
    let file = std::fs::File::create(log_file)?;
    let filter = EnvFilter::try_from_env("DBV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: &Cli, config: &DbvConfig) -> Result<(), DbvError> {
    let mut model = Model::init(config);

    if let Some(file) = &cli.file {
        let path = shellexpand::full(file)
            .map_err(|e| DbvError::LoadingFailed(e.to_string()))?
            .to_string();
        model.load_data_file(path.into())?;
    }

    let controller = Controller::new(config);
    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        let uidata = model.ui_data();
        terminal.draw(|f| ui::draw(&uidata, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}
