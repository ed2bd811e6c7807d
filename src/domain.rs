use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum DbvError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for DbvError {
    fn from(err: Error) -> Self {
        DbvError::IoError(err)
    }
}

impl From<PolarsError> for DbvError {
    fn from(err: PolarsError) -> Self {
        DbvError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DbvConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub log_file: Option<PathBuf>,
}

impl Default for DbvConfig {
    fn default() -> Self {
        DbvConfig {
            event_poll_time: 100,
            page_size: 100,
            log_file: None,
        }
    }
}

// What the command line at the bottom of the screen is currently capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdMode {
    SearchTable,
    RenameTab,
}

#[derive(Debug, Clone, Copy)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Resize(usize, usize),
    // Workspace
    NextTab,
    PreviousTab,
    CloseTab,
    OpenExplorer,
    OpenConsole,
    RenameTab,
    // Data view
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    CyclePageSize,
    SortColumn,
    Search,
    ToggleSelect,
    ToggleSelectAll,
    CopyCell,
    CopyRow,
    // Raw terminal input, forwarded while the cmdline is active
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "dbv - database workspace viewer

Workspace
  Tab / Shift-Tab   next / previous tab
  e                 open explorer tab for the loaded source
  n                 open a query console tab
  x                 close current tab (dashboard can not be closed)
  r                 rename current tab

Explorer
  arrows            move cell cursor
  s                 sort by current column (asc <-> desc)
  /                 search in table data
  PgDn / PgUp       next / previous page
  z                 cycle page size (50, 100, 200, 500)
  Space             select / deselect current row
  a                 select all / none on this page
  y / Y             copy cell / row to clipboard

Other
  ?                 this help
  Esc               close popup, clear input
  q                 quit
";
