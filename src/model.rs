use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, trace, warn};

use crate::dataview::{format_cell, DataView, SortDirection, Window};
use crate::domain::{CmdMode, DbvConfig, DbvError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::table::TableData;
use crate::workspace::{DASHBOARD_TAB_ID, Tab, TabKind, TabPayload, Workspace};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// One loaded data source together with its view state and cell cursor.
struct TableSource {
    data: TableData,
    view: DataView,
    window: Window,
    cursor_row: usize,
    cursor_column: usize,
}

impl TableSource {
    fn new(data: TableData, page_size: usize) -> Self {
        let mut view = DataView::new(page_size);
        let window = view.recompute(&data.columns, &data.rows);
        TableSource {
            data,
            view,
            window,
            cursor_row: 0,
            cursor_column: 0,
        }
    }

    fn recompute(&mut self) {
        self.window = self.view.recompute(&self.data.columns, &self.data.rows);
        // The window may have shrunk under the cursor
        self.cursor_row = self
            .cursor_row
            .min(self.window.rows.len().saturating_sub(1));
        self.cursor_column = self
            .cursor_column
            .min(self.data.columns.len().saturating_sub(1));
    }
}

pub struct Model {
    config: DbvConfig,
    pub status: Status,
    workspace: Workspace,
    sources: HashMap<String, TableSource>,
    last_source: Option<String>,
    console_count: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CmdMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    show_popup: bool,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &DbvConfig) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard unavailable: {e:?}");
                None
            }
        };
        Self {
            config: config.clone(),
            status: Status::READY,
            workspace: Workspace::new(),
            sources: HashMap::new(),
            last_source: None,
            console_count: 0,
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            show_popup: false,
            popup_message: String::new(),
            status_message: "Started dbv!".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    /// Loads a data file and opens an explorer tab for it.
    pub fn load_data_file(&mut self, path: PathBuf) -> Result<(), DbvError> {
        let data = TableData::load(path)?;
        let key = data.name.clone();
        let nrows = data.total_row_count;
        info!("Source \"{key}\" ready with {nrows} rows");

        let source = TableSource::new(data, self.config.page_size);
        self.sources.insert(key.clone(), source);
        self.last_source = Some(key.clone());

        self.open_explorer_for(&key);
        self.workspace
            .update_tab_title(&Self::explorer_tab_id(&key), format!("{key} ({nrows} rows)"));
        self.set_status_message(format!("Loaded {key} ({nrows} rows)"));
        Ok(())
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) -> Result<(), DbvError> {
        match message {
            Message::Quit => self.quit(),
            Message::Help => self.show_help(),
            Message::Exit => self.exit(),
            Message::Resize(_, _) => {}
            Message::RawKey(key) => self.raw_input(key),
            // Workspace
            Message::NextTab => self.workspace.cycle_active_tab(1),
            Message::PreviousTab => self.workspace.cycle_active_tab(-1),
            Message::CloseTab => self.close_current_tab(),
            Message::OpenExplorer => self.open_explorer(),
            Message::OpenConsole => self.open_console(),
            Message::RenameTab => self.enter_cmd_mode(CmdMode::RenameTab),
            // Data view, only meaningful on an explorer tab
            Message::MoveUp => self.with_current_source(|s| {
                s.cursor_row = s.cursor_row.saturating_sub(1);
            }),
            Message::MoveDown => self.with_current_source(|s| {
                if s.cursor_row + 1 < s.window.rows.len() {
                    s.cursor_row += 1;
                }
            }),
            Message::MoveLeft => self.with_current_source(|s| {
                s.cursor_column = s.cursor_column.saturating_sub(1);
            }),
            Message::MoveRight => self.with_current_source(|s| {
                if s.cursor_column + 1 < s.data.columns.len() {
                    s.cursor_column += 1;
                }
            }),
            Message::NextPage => self.with_current_source(|s| {
                s.view.next_page();
                s.recompute();
            }),
            Message::PreviousPage => self.with_current_source(|s| {
                s.view.previous_page();
                s.recompute();
            }),
            Message::CyclePageSize => {
                self.with_current_source(|s| {
                    s.view.cycle_page_size();
                    s.recompute();
                });
                if let Some(size) = self.current_source().map(|s| s.view.page_size()) {
                    self.set_status_message(format!("Page size {size}"));
                }
            }
            Message::SortColumn => self.sort_current_column(),
            Message::Search => self.enter_cmd_mode(CmdMode::SearchTable),
            Message::ToggleSelect => self.with_current_source(|s| {
                let pos = s.cursor_row;
                s.view.toggle_select(pos);
            }),
            Message::ToggleSelectAll => self.with_current_source(|s| {
                s.view.toggle_select_all();
            }),
            Message::CopyCell => self.copy_cell(),
            Message::CopyRow => self.copy_row(),
        }
        Ok(())
    }

    // -------------------- Workspace handling ---------------------- //

    fn explorer_tab_id(source: &str) -> String {
        format!("explorer:{source}")
    }

    fn open_explorer(&mut self) {
        match self.last_source.clone() {
            Some(key) => self.open_explorer_for(&key),
            None => self.set_status_message("No data source loaded".to_string()),
        }
    }

    fn open_explorer_for(&mut self, source: &str) {
        self.workspace.open_tab(Tab::new(
            Self::explorer_tab_id(source),
            TabKind::DatabaseExplorer,
            source.to_string(),
            TabPayload::Table(source.to_string()),
        ));
    }

    fn open_console(&mut self) {
        self.console_count += 1;
        let n = self.console_count;
        self.workspace.open_tab(Tab::new(
            format!("console-{n}"),
            TabKind::QueryConsole,
            format!("Console {n}"),
            TabPayload::Sql(String::new()),
        ));
    }

    fn close_current_tab(&mut self) {
        let id = self.workspace.active_tab_id().to_string();
        if id == DASHBOARD_TAB_ID {
            self.set_status_message("The dashboard can not be closed".to_string());
            return;
        }
        self.workspace.close_tab(&id);
    }

    // The source key shown by the active tab, if it is an explorer tab.
    fn current_source_key(&self) -> Option<String> {
        match &self.workspace.active_tab().payload {
            TabPayload::Table(key) => Some(key.clone()),
            _ => None,
        }
    }

    fn current_source(&self) -> Option<&TableSource> {
        self.current_source_key()
            .and_then(|key| self.sources.get(&key))
    }

    fn with_current_source(&mut self, f: impl FnOnce(&mut TableSource)) {
        if let Some(source) = self
            .current_source_key()
            .and_then(|key| self.sources.get_mut(&key))
        {
            f(source);
        }
    }

    // -------------------- Data view handling ---------------------- //

    fn sort_current_column(&mut self) {
        let mut sorted: Option<(String, SortDirection)> = None;
        self.with_current_source(|s| {
            if let Some(column) = s.data.columns.get(s.cursor_column) {
                let field = column.name.clone();
                s.view.toggle_sort(&field);
                s.recompute();
                sorted = s.view.sort().map(|sc| (field, sc.direction));
            }
        });
        if let Some((field, direction)) = sorted {
            let arrow = match direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            self.set_status_message(format!("Sorted by {field} ({arrow})"));
        }
    }

    fn copy_cell(&mut self) {
        let Some(source) = self.current_source() else {
            return;
        };
        let Some(&ridx) = source.window.rows.get(source.cursor_row) else {
            return;
        };
        let Some(column) = source.data.columns.get(source.cursor_column) else {
            return;
        };
        let cell = format_cell(source.data.rows[ridx].get(source.cursor_column), column);
        self.copy_to_clipboard(cell, "cell");
    }

    fn copy_row(&mut self) {
        let Some(source) = self.current_source() else {
            return;
        };
        let Some(&ridx) = source.window.rows.get(source.cursor_row) else {
            return;
        };
        let content = source
            .data
            .rows[ridx]
            .values
            .iter()
            .map(|v| Self::wrap_cell_content(&v.raw_string()))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content, "row");
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(content) {
                Ok(_) => self.set_status_message(format!("Copied {what} to clipboard")),
                Err(e) => trace!("Error copying to clipboard: {e:?}"),
            },
            None => self.set_status_message("Clipboard unavailable".to_string()),
        }
    }

    // -------------------- Cmdline handling ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CmdMode) {
        // Searching only makes sense on an explorer tab
        if mode == CmdMode::SearchTable && self.current_source().is_none() {
            return;
        }
        trace!("Entering command mode {mode:?}");
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn handle_cmd_input(&mut self) {
        self.active_cmdinput = false;
        let canceled = self.last_input.canceled;
        let cmd_input = self.last_input.input.clone();

        match self.cmd_mode.take() {
            Some(CmdMode::SearchTable) if !canceled => {
                self.with_current_source(|s| {
                    s.view.set_search_term(cmd_input.clone());
                    s.recompute();
                });
                if let Some(matched) = self.current_source().map(|s| s.window.matched) {
                    self.set_status_message(format!("Found {matched} matching rows"));
                }
            }
            Some(CmdMode::RenameTab) if !canceled && !cmd_input.is_empty() => {
                let id = self.workspace.active_tab_id().to_string();
                self.workspace.update_tab_title(&id, cmd_input);
            }
            _ => {}
        }
    }

    fn show_help(&mut self) {
        self.show_popup = true;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn exit(&mut self) {
        if self.show_popup {
            self.show_popup = false;
            return;
        }
        // Esc on a filtered explorer tab clears the filter
        let mut cleared = false;
        self.with_current_source(|s| {
            if !s.view.search_term().is_empty() {
                s.view.set_search_term("");
                s.recompute();
                cleared = true;
            }
        });
        if cleared {
            self.set_status_message("Cleared search".to_string());
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- UI snapshot ---------------------- //

    pub fn ui_data(&self) -> UiData {
        let tabs = self
            .workspace
            .tabs()
            .iter()
            .map(|t| (t.title.clone(), t.is_active))
            .collect();

        let active = self.workspace.active_tab();
        let content = match (&active.kind, &active.payload) {
            (TabKind::DatabaseExplorer, TabPayload::Table(key)) => match self.sources.get(key) {
                Some(source) => UiContent::Table(Self::table_ui(source)),
                None => UiContent::Dashboard(self.dashboard_ui()),
            },
            (TabKind::QueryConsole, TabPayload::Sql(sql)) => UiContent::Console {
                title: active.title.clone(),
                sql: sql.clone(),
            },
            _ => UiContent::Dashboard(self.dashboard_ui()),
        };

        UiData {
            tabs,
            content,
            show_popup: self.show_popup,
            popup_message: self.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        }
    }

    fn dashboard_ui(&self) -> DashboardUi {
        let mut sources: Vec<String> = self
            .sources
            .values()
            .map(|s| format!("{} ({} rows)", s.data.name, s.data.total_row_count))
            .collect();
        sources.sort();
        DashboardUi {
            sources,
            open_tabs: self.workspace.tabs().len(),
        }
    }

    fn table_ui(source: &TableSource) -> TableUi {
        let sort = source.view.sort();
        let headers = source
            .data
            .columns
            .iter()
            .map(|c| {
                let mut name = c.name.clone();
                if let Some(sort) = sort
                    && sort.field == c.name
                {
                    name.push_str(match sort.direction {
                        SortDirection::Ascending => " ▲",
                        SortDirection::Descending => " ▼",
                    });
                }
                let mut tag = c.type_tag.clone();
                if c.primary_key {
                    tag.push_str(" PK");
                }
                if c.foreign_key {
                    tag.push_str(" FK");
                }
                if !c.nullable {
                    tag.push_str(" • NOT NULL");
                }
                (name, tag)
            })
            .collect();

        let rows = source
            .window
            .rows
            .iter()
            .map(|&ridx| {
                source
                    .data
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(ci, col)| format_cell(source.data.rows[ridx].get(ci), col))
                    .collect()
            })
            .collect();

        let selected = (0..source.window.rows.len())
            .map(|pos| source.view.selected().contains(&pos))
            .collect();

        TableUi {
            name: source.data.name.clone(),
            headers,
            rows,
            selected,
            cursor_row: source.cursor_row,
            cursor_column: source.cursor_column,
            page: source.window.page,
            total_pages: source.window.total_pages,
            matched: source.window.matched,
            total_rows: source.data.total_row_count,
            page_size: source.view.page_size(),
            search_term: source.view.search_term().to_string(),
        }
    }
}

pub struct UiData {
    pub tabs: Vec<(String, bool)>,
    pub content: UiContent,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CmdMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

pub enum UiContent {
    Dashboard(DashboardUi),
    Table(TableUi),
    Console { title: String, sql: String },
}

pub struct DashboardUi {
    pub sources: Vec<String>,
    pub open_tabs: usize,
}

pub struct TableUi {
    pub name: String,
    /// Column header plus its type line ("int4 PK • NOT NULL").
    pub headers: Vec<(String, String)>,
    pub rows: Vec<Vec<String>>,
    pub selected: Vec<bool>,
    pub cursor_row: usize,
    pub cursor_column: usize,
    pub page: usize,
    pub total_pages: usize,
    pub matched: usize,
    pub total_rows: usize,
    pub page_size: usize,
    pub search_term: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Row, TableColumn, Value};

    fn model_with_source(nrows: usize) -> Model {
        let mut model = Model::init(&DbvConfig::default());
        let columns = vec![
            TableColumn::new("id", "i64"),
            TableColumn::new("name", "str"),
        ];
        let rows = (0..nrows)
            .map(|i| {
                Row::new(vec![
                    Value::Number(i as f64 + 1.0),
                    Value::Text(format!("row-{}", i + 1)),
                ])
            })
            .collect();
        let data = TableData::new("test", columns, rows);
        model.sources.insert(
            "test".to_string(),
            TableSource::new(data, model.config.page_size),
        );
        model.last_source = Some("test".to_string());
        model.open_explorer_for("test");
        model
    }

    #[test]
    fn explorer_tab_opens_and_activates() {
        let model = model_with_source(10);
        assert_eq!(model.workspace.active_tab_id(), "explorer:test");
        let ui = model.ui_data();
        assert!(matches!(ui.content, UiContent::Table(_)));
    }

    #[test]
    fn sorting_via_message_flips_direction_on_repeat() {
        let mut model = model_with_source(10);
        model.update(Message::SortColumn).unwrap();
        model.update(Message::SortColumn).unwrap();
        let UiContent::Table(table) = model.ui_data().content else {
            panic!("expected a table view");
        };
        assert!(table.headers[0].0.contains('▼'));
        // Descending by id: highest id first
        assert_eq!(table.rows[0][0], "10");
    }

    #[test]
    fn search_flow_filters_and_updates_status() {
        let mut model = model_with_source(120);
        model.update(Message::Search).unwrap();
        assert!(model.raw_keyevents());
        for c in "row-12".chars() {
            model
                .update(Message::RawKey(KeyEvent::from(
                    ratatui::crossterm::event::KeyCode::Char(c),
                )))
                .unwrap();
        }
        model
            .update(Message::RawKey(KeyEvent::from(
                ratatui::crossterm::event::KeyCode::Enter,
            )))
            .unwrap();
        assert!(!model.raw_keyevents());
        let UiContent::Table(table) = model.ui_data().content else {
            panic!("expected a table view");
        };
        // row-12 and row-120
        assert_eq!(table.matched, 2);
        assert_eq!(model.status_message, "Found 2 matching rows");
    }

    #[test]
    fn closing_explorer_returns_to_dashboard() {
        let mut model = model_with_source(10);
        model.update(Message::CloseTab).unwrap();
        assert_eq!(model.workspace.active_tab_id(), DASHBOARD_TAB_ID);
        model.update(Message::CloseTab).unwrap();
        assert_eq!(model.workspace.tabs().len(), 1);
    }

    #[test]
    fn console_tabs_get_unique_ids() {
        let mut model = Model::init(&DbvConfig::default());
        model.update(Message::OpenConsole).unwrap();
        model.update(Message::OpenConsole).unwrap();
        assert_eq!(model.workspace.tabs().len(), 3);
        assert_eq!(model.workspace.active_tab_id(), "console-2");
    }

    #[test]
    fn rename_flow_updates_the_active_tab_title() {
        let mut model = model_with_source(5);
        model.update(Message::RenameTab).unwrap();
        for c in "My data".chars() {
            model
                .update(Message::RawKey(KeyEvent::from(
                    ratatui::crossterm::event::KeyCode::Char(c),
                )))
                .unwrap();
        }
        model
            .update(Message::RawKey(KeyEvent::from(
                ratatui::crossterm::event::KeyCode::Enter,
            )))
            .unwrap();
        assert_eq!(model.workspace.active_tab().title, "My data");
    }

    #[test]
    fn cursor_stays_inside_the_window() {
        let mut model = model_with_source(3);
        for _ in 0..10 {
            model.update(Message::MoveDown).unwrap();
        }
        let UiContent::Table(table) = model.ui_data().content else {
            panic!("expected a table view");
        };
        assert_eq!(table.cursor_row, 2);
    }

    #[test]
    fn escape_clears_an_active_search() {
        let mut model = model_with_source(50);
        model.with_current_source(|s| {
            s.view.set_search_term("row-1");
            s.recompute();
        });
        model.update(Message::Exit).unwrap();
        let UiContent::Table(table) = model.ui_data().content else {
            panic!("expected a table view");
        };
        assert_eq!(table.matched, 50);
        assert!(table.search_term.is_empty());
    }
}
