use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::trace;

use crate::table::{Row, TableColumn, Value};

/// Page sizes the view can cycle through.
pub const PAGE_SIZES: [usize; 4] = [50, 100, 200, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortConfig {
    pub field: String,
    pub direction: SortDirection,
}

/// The visible slice after one pipeline run. Row entries are indices into
/// the row set the caller supplied to `recompute`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    pub rows: Vec<usize>,
    /// Rows remaining after the filter stage.
    pub matched: usize,
    pub total_pages: usize,
    pub page: usize,
}

/// Client side filter -> sort -> paginate pipeline over an in-memory row
/// set. The engine owns only view state (search term, sort, page, selection)
/// and derives the visible window deterministically from it; it never
/// performs I/O and no operation can fail.
///
/// Row selection is positional within the current window. Whenever the
/// window changes for any reason the selection is cleared, so it can never
/// refer to a row the user did not point at.
pub struct DataView {
    search_term: String,
    sort: Option<SortConfig>,
    current_page: usize,
    page_size: usize,
    selected: BTreeSet<usize>,
    last_window: Window,
}

impl DataView {
    pub fn new(page_size: usize) -> Self {
        let page_size = if PAGE_SIZES.contains(&page_size) {
            page_size
        } else {
            PAGE_SIZES[1]
        };
        DataView {
            search_term: String::new(),
            sort: None,
            current_page: 1,
            page_size,
            selected: BTreeSet::new(),
            last_window: Window::default(),
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort(&self) -> Option<&SortConfig> {
        self.sort.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn window(&self) -> &Window {
        &self.last_window
    }

    /// Replaces the search term and resets to the first page, so a narrower
    /// match set can not leave the view on a page that no longer exists.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.current_page = 1;
        self.selected.clear();
    }

    /// Cycles the sort state for a column: first sort on any field is
    /// ascending, sorting the same field again flips to descending, and any
    /// other combination starts over ascending. There is no unsorted state
    /// once a field has been picked.
    pub fn toggle_sort(&mut self, field: &str) {
        let direction = match &self.sort {
            Some(SortConfig {
                field: current,
                direction: SortDirection::Ascending,
            }) if current == field => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        trace!("Sorting by \"{field}\" {direction:?}");
        self.sort = Some(SortConfig {
            field: field.to_string(),
            direction,
        });
        self.selected.clear();
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
        self.selected.clear();
    }

    pub fn next_page(&mut self) {
        self.current_page += 1;
        self.selected.clear();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1).max(1);
        self.selected.clear();
    }

    /// Changing the page size always snaps back to the first page.
    pub fn set_page_size(&mut self, size: usize) {
        if PAGE_SIZES.contains(&size) {
            self.page_size = size;
            self.current_page = 1;
            self.selected.clear();
        }
    }

    pub fn cycle_page_size(&mut self) {
        let pos = PAGE_SIZES
            .iter()
            .position(|&s| s == self.page_size)
            .unwrap_or(0);
        let size = PAGE_SIZES[(pos + 1) % PAGE_SIZES.len()];
        self.set_page_size(size);
    }

    /// Toggles selection of one position in the current window.
    pub fn toggle_select(&mut self, pos: usize) {
        if pos >= self.last_window.rows.len() {
            return;
        }
        if !self.selected.remove(&pos) {
            self.selected.insert(pos);
        }
    }

    /// Select-all flips between every position in the current window and an
    /// empty selection.
    pub fn toggle_select_all(&mut self) {
        let len = self.last_window.rows.len();
        if self.selected.len() == len && len > 0 {
            self.selected.clear();
        } else {
            self.selected = (0..len).collect();
        }
    }

    /// Runs the full pipeline against the supplied row set and returns the
    /// visible window. The current page is clamped into range, and the
    /// selection is dropped whenever the resulting window differs from the
    /// previous one. Rows may be a completely new set on every call.
    pub fn recompute(&mut self, columns: &[TableColumn], rows: &[Row]) -> Window {
        let mut indices = filter_rows(rows, &self.search_term);
        let matched = indices.len();
        if let Some(sort) = &self.sort {
            sort_rows(columns, rows, &mut indices, sort);
        }

        let total_pages = matched.div_ceil(self.page_size);
        self.current_page = self.current_page.clamp(1, total_pages.max(1));

        let begin = (self.current_page - 1) * self.page_size;
        let end = std::cmp::min(begin + self.page_size, matched);
        let page_rows = if begin < end {
            indices[begin..end].to_vec()
        } else {
            Vec::new()
        };

        let window = Window {
            rows: page_rows,
            matched,
            total_pages,
            page: self.current_page,
        };
        if window != self.last_window {
            self.selected.clear();
            self.last_window = window.clone();
        }
        window
    }
}

/// Display form of one cell. Nulls show a literal NULL marker, booleans a
/// fixed two-state label, and values in date/time tagged columns are
/// rendered as timestamps. Only presentation changes here; filtering and
/// sorting always see the raw value.
pub fn format_cell(value: &Value, column: &TableColumn) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Timestamp(ms) => format_timestamp(*ms),
        Value::Number(n) if column.is_temporal() => format_timestamp(*n as i64),
        Value::Text(s) if column.is_temporal() => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| s.clone()),
        other => other.raw_string(),
    }
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Keeps every row with at least one non-null field whose raw string form
/// contains the term case insensitively. The empty term short-circuits so
/// "no active filter" never scans the data.
fn filter_rows(rows: &[Row], term: &str) -> Vec<usize> {
    if term.is_empty() {
        return (0..rows.len()).collect();
    }
    let needle = term.to_lowercase();
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            row.values
                .iter()
                .any(|v| !v.is_null() && v.raw_string().to_lowercase().contains(&needle))
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Stable sort of row indices by one field. Nulls always sort last, in both
/// directions; descending only reverses the comparison of non-null values.
/// An unknown field yields null for every row and leaves the order as the
/// filter produced it.
fn sort_rows(columns: &[TableColumn], rows: &[Row], indices: &mut [usize], sort: &SortConfig) {
    let field_idx = columns.iter().position(|c| c.name == sort.field);
    let descending = sort.direction == SortDirection::Descending;

    indices.sort_by(|&a, &b| {
        let av = field_idx.map(|ci| rows[a].get(ci)).unwrap_or(&Value::Null);
        let bv = field_idx.map(|ci| rows[b].get(ci)).unwrap_or(&Value::Null);
        match (av.is_null(), bv.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = av.compare(bv);
                if descending { ord.reverse() } else { ord }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<TableColumn> {
        names
            .iter()
            .map(|n| TableColumn::new(*n, "str"))
            .collect()
    }

    fn row(values: Vec<Value>) -> Row {
        Row::new(values)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn values_of<'a>(rows: &'a [Row], window: &Window, col: usize) -> Vec<&'a Value> {
        window.rows.iter().map(|&i| rows[i].get(col)).collect()
    }

    #[test]
    fn empty_term_passes_all_rows_in_order() {
        let rows = vec![
            row(vec![text("foo")]),
            row(vec![text("bar")]),
            row(vec![Value::Null]),
        ];
        assert_eq!(filter_rows(&rows, ""), vec![0, 1, 2]);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let rows = vec![
            row(vec![text("foo")]),
            row(vec![text("bar")]),
            row(vec![Value::Null]),
        ];
        assert_eq!(filter_rows(&rows, "fo"), vec![0]);
        assert_eq!(filter_rows(&rows, "FO"), vec![0]);
    }

    #[test]
    fn null_fields_never_match() {
        let rows = vec![row(vec![Value::Null, text("x")])];
        // The display marker for nulls must not be searchable
        assert_eq!(filter_rows(&rows, "null"), Vec::<usize>::new());
    }

    #[test]
    fn filter_matches_any_field() {
        let rows = vec![
            row(vec![text("alice"), num(30.0)]),
            row(vec![text("bob"), num(42.0)]),
        ];
        assert_eq!(filter_rows(&rows, "42"), vec![1]);
    }

    #[test]
    fn sort_puts_nulls_last_ascending() {
        let rows = vec![
            row(vec![num(2.0)]),
            row(vec![Value::Null]),
            row(vec![num(1.0)]),
        ];
        let cols = columns(&["a"]);
        let mut idx = vec![0, 1, 2];
        sort_rows(
            &cols,
            &rows,
            &mut idx,
            &SortConfig {
                field: "a".into(),
                direction: SortDirection::Ascending,
            },
        );
        assert_eq!(idx, vec![2, 0, 1]);
    }

    #[test]
    fn sort_puts_nulls_last_descending_too() {
        let rows = vec![
            row(vec![num(2.0)]),
            row(vec![Value::Null]),
            row(vec![num(1.0)]),
        ];
        let cols = columns(&["a"]);
        let mut idx = vec![0, 1, 2];
        sort_rows(
            &cols,
            &rows,
            &mut idx,
            &SortConfig {
                field: "a".into(),
                direction: SortDirection::Descending,
            },
        );
        assert_eq!(idx, vec![0, 2, 1]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let rows = vec![
            row(vec![num(1.0), text("first")]),
            row(vec![num(1.0), text("second")]),
            row(vec![num(0.0), text("third")]),
        ];
        let cols = columns(&["a", "b"]);
        let mut idx = vec![0, 1, 2];
        sort_rows(
            &cols,
            &rows,
            &mut idx,
            &SortConfig {
                field: "a".into(),
                direction: SortDirection::Ascending,
            },
        );
        assert_eq!(idx, vec![2, 0, 1]);
    }

    #[test]
    fn unknown_sort_field_keeps_filter_order() {
        let rows = vec![row(vec![num(2.0)]), row(vec![num(1.0)])];
        let cols = columns(&["a"]);
        let mut idx = vec![0, 1];
        sort_rows(
            &cols,
            &rows,
            &mut idx,
            &SortConfig {
                field: "nope".into(),
                direction: SortDirection::Ascending,
            },
        );
        assert_eq!(idx, vec![0, 1]);
    }

    #[test]
    fn sort_cycle_is_asc_desc_asc() {
        let mut view = DataView::new(50);
        view.toggle_sort("a");
        assert_eq!(
            view.sort().unwrap(),
            &SortConfig {
                field: "a".into(),
                direction: SortDirection::Ascending
            }
        );
        view.toggle_sort("a");
        assert_eq!(view.sort().unwrap().direction, SortDirection::Descending);
        view.toggle_sort("a");
        assert_eq!(view.sort().unwrap().direction, SortDirection::Ascending);
        // Switching fields starts over ascending
        view.toggle_sort("a");
        view.toggle_sort("b");
        let sort = view.sort().unwrap();
        assert_eq!(sort.field, "b");
        assert_eq!(sort.direction, SortDirection::Ascending);
    }

    fn numbered_rows(n: usize) -> (Vec<TableColumn>, Vec<Row>) {
        let cols = vec![TableColumn::new("id", "i64"), TableColumn::new("name", "str")];
        let rows = (0..n)
            .map(|i| row(vec![num(i as f64 + 1.0), text(&format!("row-{}", i + 1))]))
            .collect();
        (cols, rows)
    }

    #[test]
    fn pagination_window_and_total_pages() {
        let (cols, rows) = numbered_rows(25);
        let mut view = DataView::new(50);
        view.set_page_size(50);
        // 25 rows with page size 50 fit on one page
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.rows.len(), 25);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        // Mirror of a 25 row / 10 per page layout: page 3 shows rows 21-25
        let (cols, rows) = numbered_rows(250);
        let mut view = DataView::new(100);
        view.set_page(3);
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.total_pages, 3);
        assert_eq!(window.page, 3);
        assert_eq!(window.rows.len(), 50);
        assert_eq!(window.rows[0], 200);
    }

    #[test]
    fn out_of_range_page_clamps_instead_of_throwing() {
        let (cols, rows) = numbered_rows(120);
        let mut view = DataView::new(50);
        view.set_page(9);
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.total_pages, 3);
        assert_eq!(window.page, 3);
    }

    #[test]
    fn empty_row_set_yields_zero_pages_and_empty_window() {
        let cols = columns(&["a"]);
        let mut view = DataView::new(50);
        view.set_page(5);
        let window = view.recompute(&cols, &[]);
        assert_eq!(window.total_pages, 0);
        assert_eq!(window.page, 1);
        assert!(window.rows.is_empty());
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let (cols, rows) = numbered_rows(300);
        let mut view = DataView::new(50);
        view.set_page(4);
        view.recompute(&cols, &rows);
        view.set_page_size(100);
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.page, 1);
        assert_eq!(window.rows[0], 0);
    }

    #[test]
    fn search_term_change_resets_to_first_page() {
        let (cols, rows) = numbered_rows(300);
        let mut view = DataView::new(50);
        view.set_page(6);
        view.recompute(&cols, &rows);
        view.set_search_term("row-1");
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.page, 1);
    }

    #[test]
    fn selection_is_window_local_and_cleared_on_change() {
        let (cols, rows) = numbered_rows(120);
        let mut view = DataView::new(50);
        view.recompute(&cols, &rows);
        view.toggle_select(0);
        view.toggle_select(3);
        assert_eq!(view.selected().len(), 2);

        view.next_page();
        view.recompute(&cols, &rows);
        assert!(view.selected().is_empty());

        view.toggle_select(1);
        view.toggle_sort("id");
        view.recompute(&cols, &rows);
        assert!(view.selected().is_empty());
    }

    #[test]
    fn select_all_toggles_between_full_window_and_none() {
        let (cols, rows) = numbered_rows(25);
        let mut view = DataView::new(50);
        view.recompute(&cols, &rows);
        view.toggle_select_all();
        assert_eq!(view.selected().len(), 25);
        view.toggle_select_all();
        assert!(view.selected().is_empty());
        // Partial selection upgrades to all
        view.toggle_select(2);
        view.toggle_select_all();
        assert_eq!(view.selected().len(), 25);
    }

    #[test]
    fn select_out_of_window_is_a_noop() {
        let (cols, rows) = numbered_rows(5);
        let mut view = DataView::new(50);
        view.recompute(&cols, &rows);
        view.toggle_select(10);
        assert!(view.selected().is_empty());
    }

    #[test]
    fn replacement_row_set_recomputes_from_scratch() {
        let (cols, rows) = numbered_rows(120);
        let mut view = DataView::new(50);
        view.recompute(&cols, &rows);
        view.toggle_select(0);

        let (_, fewer) = numbered_rows(10);
        let window = view.recompute(&cols, &fewer);
        assert_eq!(window.matched, 10);
        assert_eq!(window.total_pages, 1);
        assert!(view.selected().is_empty());
    }

    #[test]
    fn cell_formatting_follows_the_display_contract() {
        let plain = TableColumn::new("x", "str");
        assert_eq!(format_cell(&Value::Null, &plain), "NULL");
        assert_eq!(format_cell(&Value::Bool(true), &plain), "true");
        assert_eq!(format_cell(&Value::Bool(false), &plain), "false");
        assert_eq!(format_cell(&text("hi"), &plain), "hi");

        let created = TableColumn::new("created", "timestamp");
        assert_eq!(
            format_cell(&Value::Timestamp(0), &created),
            "1970-01-01 00:00:00"
        );
        // ISO strings in a date tagged column are parsed for display only
        assert_eq!(
            format_cell(&text("1970-01-01T00:00:05+00:00"), &created),
            "1970-01-01 00:00:05"
        );
        // Unparseable raw values fall through unchanged
        assert_eq!(format_cell(&text("yesterday"), &created), "yesterday");
    }

    #[test]
    fn end_to_end_filter_sort_paginate() {
        let (cols, rows) = numbered_rows(120);
        let mut view = DataView::new(50);

        // Page 1 shows rows 1..50 in insertion order, three pages total
        let window = view.recompute(&cols, &rows);
        assert_eq!(window.total_pages, 3);
        assert_eq!(values_of(&rows, &window, 0)[0], &num(1.0));
        assert_eq!(values_of(&rows, &window, 0)[49], &num(50.0));

        // Descending id sort brings the 50 highest ids first
        view.toggle_sort("id");
        view.toggle_sort("id");
        let window = view.recompute(&cols, &rows);
        assert_eq!(values_of(&rows, &window, 0)[0], &num(120.0));
        assert_eq!(values_of(&rows, &window, 0)[49], &num(71.0));

        // A narrow filter collapses to one page and clamps the page number
        view.set_page(3);
        view.recompute(&cols, &rows);
        view.set_search_term("row-11");
        let window = view.recompute(&cols, &rows);
        // row-11 and row-110..row-119
        assert_eq!(window.matched, 11);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.page, 1);
    }
}
