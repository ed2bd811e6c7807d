use tracing::{trace, warn};

/// Reserved id of the tab that is created at startup and can never be
/// closed.
pub const DASHBOARD_TAB_ID: &str = "dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    Dashboard,
    DatabaseExplorer,
    QueryConsole,
}

/// Kind specific tab content. Carried along unchanged when a tab is
/// re-activated through `open_tab`.
#[derive(Debug, Clone, PartialEq)]
pub enum TabPayload {
    Empty,
    /// Key of the data source shown by an explorer tab.
    Table(String),
    /// Scratch SQL text of a console tab.
    Sql(String),
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: String,
    pub kind: TabKind,
    pub title: String,
    pub payload: TabPayload,
    pub is_active: bool,
}

impl Tab {
    pub fn new(
        id: impl Into<String>,
        kind: TabKind,
        title: impl Into<String>,
        payload: TabPayload,
    ) -> Self {
        Tab {
            id: id.into(),
            kind,
            title: title.into(),
            payload,
            is_active: false,
        }
    }
}

/// Owns the ordered tab collection and the active tab pointer. All
/// operations are pure in-memory transitions; unknown ids are tolerated as
/// no-ops since the only caller hands back ids it got from tab creation.
///
/// Exactly one tab is active at all times.
pub struct Workspace {
    tabs: Vec<Tab>,
    active_tab_id: String,
}

impl Workspace {
    pub fn new() -> Self {
        let mut dashboard = Tab::new(
            DASHBOARD_TAB_ID,
            TabKind::Dashboard,
            "Dashboard",
            TabPayload::Empty,
        );
        dashboard.is_active = true;
        Workspace {
            tabs: vec![dashboard],
            active_tab_id: DASHBOARD_TAB_ID.to_string(),
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> &str {
        &self.active_tab_id
    }

    pub fn active_tab(&self) -> &Tab {
        // The single-active invariant makes this lookup total.
        self.tabs
            .iter()
            .find(|t| t.id == self.active_tab_id)
            .unwrap_or(&self.tabs[0])
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Opens a tab. If one with the same id already exists it is activated
    /// without touching its title or payload, otherwise the tab is appended
    /// and activated.
    pub fn open_tab(&mut self, tab: Tab) {
        if self.tabs.iter().any(|t| t.id == tab.id) {
            trace!("Tab \"{}\" already open, activating", tab.id);
            let id = tab.id;
            self.activate(&id);
            return;
        }
        trace!("Opening tab \"{}\" ({:?})", tab.id, tab.kind);
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.activate(&id);
    }

    /// Closes a tab. Closing the dashboard is a no-op; closing the active
    /// tab hands activation back to the dashboard.
    pub fn close_tab(&mut self, id: &str) {
        if id == DASHBOARD_TAB_ID {
            return;
        }
        let Some(pos) = self.tabs.iter().position(|t| t.id == id) else {
            return;
        };
        trace!("Closing tab \"{id}\"");
        self.tabs.remove(pos);
        if self.active_tab_id == id {
            self.activate(DASHBOARD_TAB_ID);
        }
    }

    /// Activates the tab with the given id. Logs and changes nothing for an
    /// unknown id.
    pub fn set_active_tab(&mut self, id: &str) {
        if !self.tabs.iter().any(|t| t.id == id) {
            warn!("Ignoring activation of unknown tab \"{id}\"");
            return;
        }
        self.activate(id);
    }

    /// Moves activation forward or backward through the tab order.
    pub fn cycle_active_tab(&mut self, step: i32) {
        let pos = self
            .tabs
            .iter()
            .position(|t| t.id == self.active_tab_id)
            .unwrap_or(0);
        let len = self.tabs.len() as i32;
        let next = (pos as i32 + step).rem_euclid(len) as usize;
        let id = self.tabs[next].id.clone();
        self.activate(&id);
    }

    /// Replaces only the title of the matching tab. Activation and payload
    /// are untouched.
    pub fn update_tab_title(&mut self, id: &str, title: impl Into<String>) {
        if let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) {
            tab.title = title.into();
        }
    }

    fn activate(&mut self, id: &str) {
        for tab in self.tabs.iter_mut() {
            tab.is_active = tab.id == id;
        }
        self.active_tab_id = id.to_string();
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Workspace::new()
    }
}
