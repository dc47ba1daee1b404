use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, instrument, trace, warn};
use tracing_error::SpanTrace;

use crate::decoder::{Decoder, SheetDecoder};
use crate::domain::{Message, SVConfig, SVError};
use crate::inputter::{InputResult, Inputter};
use crate::reader::{FileReader, ReadOutcome};
use crate::records::RowCollection;
use crate::table::{self, TableOutput};
use crate::ui::CHROME_HEIGHT;

pub const INITIAL_MESSAGE: &str = "To get started, pick a spreadsheet file with <o> (or drop one onto this window), then press <p> to read and list it.";
pub const NO_FILE_INFO: &str = "No file selected yet.";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    READING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    PICKER,
    POPUP,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// The one status message on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct UiStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl UiStatus {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }

    fn for_error(err: &SVError) -> Self {
        match err {
            SVError::NoFileSelected => UiStatus::error("Please select a spreadsheet file first."),
            SVError::FileTooLarge { limit, .. } => UiStatus::error(format!(
                "The file looks too large (over {}MB). Please try a smaller file.",
                limit / (1024 * 1024)
            )),
            SVError::ReadInProgress => {
                UiStatus::info("Still reading the selected file, please wait.")
            }
            SVError::ReadFailure(_) => {
                UiStatus::error("An error occurred while reading the file. Please try again.")
            }
            SVError::DecodeFailure(_) | SVError::PolarsError(_) | SVError::CalamineError(_) => {
                UiStatus::error(
                    "An error occurred while reading the spreadsheet. Check the file format.",
                )
            }
            SVError::FileNotFound(p) => UiStatus::error(format!("File not found: {}", p.display())),
            SVError::PermissionDenied(p) => {
                UiStatus::error(format!("Permission denied: {}", p.display()))
            }
            SVError::NotAFile(p) => UiStatus::error(format!("Not a file: {}", p.display())),
            SVError::IoError(e) => UiStatus::error(format!("Could not open the file: {e}")),
        }
    }
}

/// A file the user picked. Its bytes are only read when parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl SelectedFile {
    pub fn open(path: PathBuf) -> Result<Self, SVError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SVError::FileNotFound(path.clone()),
            ErrorKind::PermissionDenied => SVError::PermissionDenied(path.clone()),
            _ => SVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(SVError::NotAFile(path));
        }

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(SelectedFile {
            name,
            path,
            size: metadata.len(),
        })
    }
}

/// The viewer session: selection, decoded rows, rendered table and status.
pub struct Model {
    config: SVConfig,
    pub status: Status,
    modus: Modus,
    selected_file: Option<SelectedFile>,
    filename_info: String,
    rows: RowCollection,
    table: TableOutput,
    ui_status: UiStatus,
    drop_zone_active: bool,
    reader: FileReader,
    decoder: Box<dyn Decoder>,
    next_request_id: u64,
    pending_read: Option<(u64, SelectedFile, Instant)>,
    input: Inputter,
    last_input: InputResult,
    offset_row: usize,
    offset_column: usize,
    page_size: usize,
}

impl Model {
    pub fn init(config: &SVConfig) -> Self {
        Model::with_decoder(config, Box::new(SheetDecoder))
    }

    pub fn with_decoder(config: &SVConfig, decoder: Box<dyn Decoder>) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            selected_file: None,
            filename_info: NO_FILE_INFO.to_string(),
            rows: Vec::new(),
            table: TableOutput::empty(),
            ui_status: UiStatus::info(INITIAL_MESSAGE),
            drop_zone_active: false,
            reader: FileReader::new(),
            decoder,
            next_request_id: 0,
            pending_read: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            offset_row: 0,
            offset_column: 0,
            page_size: 20,
        };
        model.render(Vec::new());
        model
    }

    // ----------------------------- Accessors ------------------------------ //

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_ref()
    }

    pub fn filename_info(&self) -> &str {
        &self.filename_info
    }

    pub fn table(&self) -> &TableOutput {
        &self.table
    }

    pub fn ui_status(&self) -> &UiStatus {
        &self.ui_status
    }

    pub fn drop_zone_active(&self) -> bool {
        self.drop_zone_active
    }

    pub fn is_reading(&self) -> bool {
        self.pending_read.is_some()
    }

    pub fn offsets(&self) -> (usize, usize) {
        (self.offset_row, self.offset_column)
    }

    pub fn max_column_width(&self) -> usize {
        self.config.max_column_width
    }

    pub fn show_help(&self) -> bool {
        self.modus == Modus::POPUP
    }

    pub fn picker_input(&self) -> Option<&InputResult> {
        (self.modus == Modus::PICKER).then_some(&self.last_input)
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::PICKER
    }

    // ------------------------- Viewer operations -------------------------- //

    /// Replaces the selection. `None` clears it and empties the table.
    pub fn select_file(&mut self, file: Option<SelectedFile>) {
        match file {
            None => {
                debug!("Selection cleared");
                self.selected_file = None;
                self.filename_info = NO_FILE_INFO.to_string();
                self.set_status(UiStatus::info("No file selected."));
                self.render(Vec::new());
            }
            Some(file) => {
                info!("Selected {:?} ({} bytes)", file.path, file.size);
                self.filename_info = format!("Selected file: {}", file.name);
                self.selected_file = Some(file);
                self.set_status(UiStatus::info(
                    "File selected. Press <p> to read and list it.",
                ));
            }
        }
    }

    /// Resolves a typed or dropped path and selects it.
    pub fn select_path(&mut self, path: Option<PathBuf>) -> Result<(), SVError> {
        let Some(path) = path else {
            self.select_file(None);
            return Ok(());
        };
        match SelectedFile::open(expand_path(&path)) {
            Ok(file) => {
                self.select_file(Some(file));
                Ok(())
            }
            Err(e) => {
                warn!("Cannot select {path:?}: {e}");
                self.set_status(UiStatus::for_error(&e));
                Err(e)
            }
        }
    }

    /// Starts reading the selected file in the background.
    pub fn parse_selected(&mut self) -> Result<(), SVError> {
        self.start_read().inspect_err(|e| {
            debug!("Parse request rejected: {e}");
            self.set_status(UiStatus::for_error(e));
        })
    }

    fn start_read(&mut self) -> Result<(), SVError> {
        let file = self.selected_file.clone().ok_or(SVError::NoFileSelected)?;
        if file.size > self.config.max_file_size {
            return Err(SVError::FileTooLarge {
                size: file.size,
                limit: self.config.max_file_size,
            });
        }
        if self.pending_read.is_some() {
            return Err(SVError::ReadInProgress);
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.reader.read(request_id, file.path.clone());
        self.set_status(UiStatus::info(format!("Reading {} ...", file.name)));
        self.pending_read = Some((request_id, file, Instant::now()));
        self.status = Status::READING;
        Ok(())
    }

    /// Applies a finished read. Returns the number of rows now in the table.
    #[instrument(skip_all, fields(request_id = outcome.request_id))]
    pub fn on_read_complete(&mut self, outcome: ReadOutcome) -> Result<usize, SVError> {
        let (file, started) = match self.pending_read.take() {
            Some((id, file, started)) if id == outcome.request_id => (file, started),
            other => {
                trace!("Ignoring outcome of stale request {}", outcome.request_id);
                self.pending_read = other;
                return Ok(self.rows.len());
            }
        };
        self.status = Status::READY;

        let bytes = match outcome.result {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Reading {:?} failed: {e}", file.path);
                let err = SVError::ReadFailure(e);
                self.set_status(UiStatus::for_error(&err));
                return Err(err);
            }
        };
        info!(
            "Read {} bytes of {} in {}ms",
            bytes.len(),
            file.name,
            started.elapsed().as_millis()
        );

        let records = self
            .decoder
            .decode(&file.name, &bytes)
            .and_then(|workbook| workbook.first_sheet_records());
        match records {
            Err(e) => {
                error!("Decoding {} failed: {e}\n{}", file.name, SpanTrace::capture());
                let err = match e {
                    SVError::DecodeFailure(_) => e,
                    other => SVError::DecodeFailure(other.to_string()),
                };
                self.set_status(UiStatus::for_error(&err));
                self.render(Vec::new());
                Err(err)
            }
            Ok(records) if records.is_empty() => {
                info!("{} contains no rows", file.name);
                self.set_status(UiStatus::error(
                    "No data found in the spreadsheet. Please check its contents.",
                ));
                self.render(Vec::new());
                Ok(0)
            }
            Ok(records) => {
                let count = records.len();
                self.render(records);
                self.set_status(UiStatus::success(format!(
                    "Spreadsheet read successfully. Loaded {count} rows in total."
                )));
                Ok(count)
            }
        }
    }

    /// Applies every read that has finished, without blocking.
    pub fn poll_reads(&mut self) {
        while let Some(outcome) = self.reader.try_next() {
            let _ = self.on_read_complete(outcome);
        }
    }

    /// Blocks until one read finishes or `timeout` passes.
    #[cfg(test)]
    pub fn await_read(&mut self, timeout: std::time::Duration) -> Option<Result<usize, SVError>> {
        self.reader
            .wait_next(timeout)
            .map(|outcome| self.on_read_complete(outcome))
    }

    pub fn render(&mut self, rows: RowCollection) {
        self.table = table::render(&rows);
        self.rows = rows;
        self.offset_row = 0;
        self.offset_column = 0;
    }

    pub fn drag_enter(&mut self) {
        self.drop_zone_active = true;
    }

    pub fn drag_leave(&mut self) {
        self.drop_zone_active = false;
    }

    /// The first dropped path is selected like a picked file, the rest are ignored.
    pub fn drop_files(&mut self, paths: Vec<PathBuf>) -> Result<(), SVError> {
        self.drop_zone_active = false;
        match paths.into_iter().next() {
            Some(path) => {
                if self.modus == Modus::PICKER {
                    self.modus = Modus::TABLE;
                }
                self.select_path(Some(path))
            }
            None => Ok(()),
        }
    }

    fn set_status(&mut self, status: UiStatus) {
        trace!("Status: {status:?}");
        self.ui_status = status;
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // ----------------------------- Messages ------------------------------- //

    pub fn update(&mut self, message: Message) -> Result<(), SVError> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        // Rejected requests are already reported through the status line.
        let result = match (self.modus, message) {
            (_, Message::Quit) => {
                self.quit();
                Ok(())
            }
            (_, Message::Resize(width, height)) => {
                self.ui_resize(width, height);
                Ok(())
            }
            (_, Message::DragEnter) => {
                self.drag_enter();
                Ok(())
            }
            (_, Message::DragLeave) => {
                self.drag_leave();
                Ok(())
            }
            (_, Message::Drop(paths)) => self.drop_files(paths),
            (Modus::PICKER, Message::RawKey(key)) => self.picker_input_key(key),
            (Modus::POPUP, Message::Exit) | (Modus::POPUP, Message::Help) => {
                self.modus = Modus::TABLE;
                Ok(())
            }
            (Modus::TABLE, msg) => self.update_table(msg),
            _ => Ok(()),
        };
        if let Err(e) = result {
            debug!("Handled error: {e}");
        }
        Ok(())
    }

    fn update_table(&mut self, msg: Message) -> Result<(), SVError> {
        match msg {
            Message::Help => self.modus = Modus::POPUP,
            Message::OpenPicker => self.open_picker(),
            Message::Parse | Message::Enter => return self.parse_selected(),
            Message::ClearSelection => self.select_file(None),
            Message::SelectFile(path) => return self.select_path(path),
            Message::MoveUp => self.scroll_rows(-1),
            Message::MoveDown => self.scroll_rows(1),
            Message::MovePageUp => self.scroll_rows(-(self.page_size as isize)),
            Message::MovePageDown => self.scroll_rows(self.page_size as isize),
            Message::MoveBeginning => self.offset_row = 0,
            Message::MoveEnd => self.offset_row = self.table.row_count.saturating_sub(1),
            Message::MoveLeft => self.offset_column = self.offset_column.saturating_sub(1),
            Message::MoveRight => {
                let last = self.table.headers.len().saturating_sub(1);
                self.offset_column = (self.offset_column + 1).min(last);
            }
            _ => (),
        }
        Ok(())
    }

    fn open_picker(&mut self) {
        self.modus = Modus::PICKER;
        self.input.clear();
        if let Some(file) = &self.selected_file {
            self.input.set(&file.path.to_string_lossy());
        }
        self.last_input = self.input.get();
    }

    fn picker_input_key(&mut self, key: KeyEvent) -> Result<(), SVError> {
        self.last_input = self.input.read(key);
        if !self.last_input.finished {
            return Ok(());
        }
        self.modus = Modus::TABLE;
        let result = self.last_input.clone();
        self.input.clear();
        if result.canceled {
            return Ok(());
        }
        let typed = result.input.trim();
        if typed.is_empty() {
            self.select_path(None)
        } else {
            self.select_path(Some(PathBuf::from(typed)))
        }
    }

    fn scroll_rows(&mut self, delta: isize) {
        let last = self.table.row_count.saturating_sub(1);
        self.offset_row = self.offset_row.saturating_add_signed(delta).min(last);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{width}, h:{height}");
        self.page_size = height.saturating_sub(CHROME_HEIGHT).max(1);
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            debug!("Could not expand {raw}: {e}");
            PathBuf::from(shellexpand::tilde(&raw).as_ref())
        }
    }
}
