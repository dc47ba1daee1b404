use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

/// Files above this size are rejected before any read is attempted.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const HELP_TEXT: &str = "\
o            Pick a file (type its path)
p / Enter    Read and list the selected file
c            Clear the selection
Drop a file  Select it (paste its path)
↑↓←→ / hjkl  Scroll
PgUp / PgDn  Scroll one page
g / G        First / last row
?            This help
Esc          Close / cancel
q            Quit";

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct SVConfig {
    pub event_poll_time: u64,
    pub max_file_size: u64,
    pub max_column_width: usize,
}

impl Default for SVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_file_size: MAX_FILE_SIZE,
            max_column_width: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Enter,
    OpenPicker,
    Parse,
    ClearSelection,
    SelectFile(Option<PathBuf>),
    DragEnter,
    DragLeave,
    Drop(Vec<PathBuf>),
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug)]
pub enum SVError {
    IoError(Error),
    PolarsError(PolarsError),
    CalamineError(calamine::Error),
    NoFileSelected,
    FileTooLarge { size: u64, limit: u64 },
    ReadInProgress,
    ReadFailure(Error),
    DecodeFailure(String),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    NotAFile(PathBuf),
}

impl fmt::Display for SVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SVError::IoError(e) => write!(f, "io error: {e}"),
            SVError::PolarsError(e) => write!(f, "polars error: {e}"),
            SVError::CalamineError(e) => write!(f, "workbook error: {e}"),
            SVError::NoFileSelected => write!(f, "no file selected"),
            SVError::FileTooLarge { size, limit } => {
                write!(f, "file is {size} bytes, limit is {limit} bytes")
            }
            SVError::ReadInProgress => write!(f, "a read is already in progress"),
            SVError::ReadFailure(e) => write!(f, "reading file failed: {e}"),
            SVError::DecodeFailure(msg) => write!(f, "decoding failed: {msg}"),
            SVError::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            SVError::PermissionDenied(p) => write!(f, "permission denied: {}", p.display()),
            SVError::NotAFile(p) => write!(f, "not a file: {}", p.display()),
        }
    }
}

impl std::error::Error for SVError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SVError::IoError(e) | SVError::ReadFailure(e) => Some(e),
            SVError::PolarsError(e) => Some(e),
            SVError::CalamineError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for SVError {
    fn from(err: Error) -> Self {
        SVError::IoError(err)
    }
}

impl From<PolarsError> for SVError {
    fn from(err: PolarsError) -> Self {
        SVError::PolarsError(err)
    }
}

impl From<calamine::Error> for SVError {
    fn from(err: calamine::Error) -> Self {
        SVError::CalamineError(err)
    }
}
