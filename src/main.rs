use std::fs::File;
use std::io::{self, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{
    DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
};
use ratatui::crossterm::execute;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod decoder;
mod domain;
mod inputter;
mod model;
mod reader;
mod records;
mod table;
mod ui;

use controller::Controller;
use domain::{MAX_FILE_SIZE, Message, SVConfig, SVError};
use model::{Model, Status};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based spreadsheet viewer.")]
struct Args {
    /// Spreadsheet to select on start (xlsx, xls, ods, csv, tsv, parquet, arrow)
    path: Option<PathBuf>,

    /// Read and list the selected file right away
    #[arg(short, long, requires = "path")]
    parse: bool,

    /// Write logs to this file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "sv=trace"
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Largest file that will be read, in MiB
    #[arg(long, default_value_t = MAX_FILE_SIZE / (1024 * 1024))]
    max_size_mb: u64,

    /// Widest a column is drawn, in characters
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(args: &Args) -> Result<(), SVError> {
    // The terminal belongs to the UI, logs only go to a file.
    let Some(path) = &args.log else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), SVError> {
    init_logging(&args)?;
    info!("Starting sv {}", env!("CARGO_PKG_VERSION"));

    let cfg = SVConfig::default()
        .with_max_file_size(args.max_size_mb * 1024 * 1024)
        .with_max_column_width(args.max_column_width);
    let mut model = Model::init(&cfg);
    if let Some(path) = args.path {
        // Failures are shown in the status line once the UI is up.
        model.update(Message::SelectFile(Some(path)))?;
        if args.parse && model.selected_file().is_some() {
            model.update(Message::Parse)?;
        }
    }

    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableBracketedPaste, EnableFocusChange)
        .map_err(SVError::from)
        .and_then(|_| event_loop(&mut terminal, &mut model, &mut ui, &controller));
    let reset = execute!(stdout(), DisableBracketedPaste, DisableFocusChange);
    ratatui::restore();

    info!("Bye");
    finish(result, reset)
}

// The loop's own error wins over a failure to switch off paste and focus reporting.
fn finish(result: Result<(), SVError>, reset: io::Result<()>) -> Result<(), SVError> {
    result?;
    reset?;
    Ok(())
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
) -> Result<(), SVError> {
    let size = terminal.size()?;
    model.update(Message::Resize(size.width as usize, size.height as usize))?;

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model, f))?;

        if let Some(message) = controller.handle_event(model)? {
            model.update(message)?;
        }
        model.poll_reads();
    }
    Ok(())
}
