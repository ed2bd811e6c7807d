use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::CmdMode;
use crate::model::{DashboardUi, TableUi, UiContent, UiData};

pub const TAB_BAR_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;
pub const SELECT_COLUMN_WIDTH: u16 = 4;

pub fn draw(uidata: &UiData, frame: &mut Frame) {
    let [tab_area, content_area, cmd_area] = Layout::vertical([
        Constraint::Length(TAB_BAR_HEIGHT),
        Constraint::Min(1),
        Constraint::Length(CMDLINE_HEIGHT),
    ])
    .areas(frame.area());

    draw_tab_bar(uidata, frame, tab_area);

    match &uidata.content {
        UiContent::Dashboard(dashboard) => draw_dashboard(dashboard, frame, content_area),
        UiContent::Table(table) => draw_table(table, frame, content_area),
        UiContent::Console { title, sql } => draw_console(title, sql, frame, content_area),
    }

    draw_cmdline(uidata, frame, cmd_area);

    if uidata.show_popup {
        draw_popup(&uidata.popup_message, frame);
    }
}

fn draw_tab_bar(uidata: &UiData, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    for (title, active) in uidata.tabs.iter() {
        let style = if *active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {title} "), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_dashboard(dashboard: &DashboardUi, frame: &mut Frame, area: Rect) {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  dbv - database workspace",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if dashboard.sources.is_empty() {
        lines.push(Line::from("  No data sources loaded."));
        lines.push(Line::from(Span::styled(
            "  Start dbv with a csv/parquet/arrow file to explore it.",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.push(Line::from("  Loaded sources:"));
        for source in dashboard.sources.iter() {
            lines.push(Line::from(Span::styled(
                format!("    {source}"),
                Style::default().fg(Color::Green),
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  {} open tabs. Press ? for help.", dashboard.open_tabs),
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default().borders(Borders::ALL).title(" Dashboard ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_table(table: &TableUi, frame: &mut Frame, area: Rect) {
    let header_cells = std::iter::once(Cell::from("")).chain(
        table.headers.iter().enumerate().map(|(ci, (name, tag))| {
            let mut name_style = Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD);
            if ci == table.cursor_column {
                name_style = name_style.add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(Text::from(vec![
                Line::from(Span::styled(name.clone(), name_style)),
                Line::from(Span::styled(
                    tag.clone(),
                    Style::default().fg(type_color(tag)),
                )),
            ]))
        }),
    );
    let header = Row::new(header_cells).height(2);

    let rows = table.rows.iter().enumerate().map(|(pos, cells)| {
        let selected = table.selected.get(pos).copied().unwrap_or(false);
        let marker = if selected { "[x]" } else { "[ ]" };
        let mut row_style = Style::default();
        if selected {
            row_style = row_style.fg(Color::Cyan);
        }
        if pos == table.cursor_row {
            row_style = row_style.add_modifier(Modifier::REVERSED);
        }
        let row_cells = std::iter::once(Cell::from(marker)).chain(
            cells.iter().map(|content| {
                let style = if content == "NULL" {
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC)
                } else {
                    Style::default()
                };
                Cell::from(Span::styled(content.clone(), style))
            }),
        );
        Row::new(row_cells).style(row_style)
    });

    let mut widths = vec![Constraint::Length(SELECT_COLUMN_WIDTH)];
    widths.extend(std::iter::repeat_n(Constraint::Fill(1), table.headers.len()));

    let filtered = if table.search_term.is_empty() {
        String::new()
    } else {
        " (filtered)".to_string()
    };
    let title = format!(
        " {} - {} of {} rows{} ",
        table.name, table.matched, table.total_rows, filtered
    );
    let footer = format!(
        " page {}/{} - {} per page ",
        table.page, table.total_pages, table.page_size
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_bottom(Line::from(footer).right_aligned());

    let widget = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(widget, area);
}

fn draw_console(title: &str, sql: &str, frame: &mut Frame, area: Rect) {
    let body = if sql.is_empty() {
        Text::from(Span::styled(
            "  Query execution is not wired to a backend yet.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(sql.to_string())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} "));
    frame.render_widget(Paragraph::new(body).block(block), area);
}

fn draw_cmdline(uidata: &UiData, frame: &mut Frame, area: Rect) {
    let line = if uidata.active_cmdinput {
        let prefix = match uidata.cmd_mode {
            Some(CmdMode::SearchTable) => "/",
            Some(CmdMode::RenameTab) => "rename: ",
            None => "",
        };
        Line::from(vec![
            Span::styled(prefix, Style::default().fg(Color::Yellow)),
            Span::raw(uidata.cmdinput.input.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ])
    } else if uidata.last_status_message_update.elapsed().as_secs() < 8 {
        Line::from(Span::styled(
            uidata.status_message.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            "? help  / search  q quit",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_popup(message: &str, frame: &mut Frame) {
    let area = centered_rect(60, 80, frame.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(message.to_string())
            .wrap(Wrap { trim: false })
            .block(block),
        area,
    );
}

fn type_color(tag: &str) -> Color {
    if tag.contains("int") || tag.contains("float") || tag.contains("i64") || tag.contains("f64") {
        Color::Blue
    } else if tag.contains("str") || tag.contains("char") || tag.contains("text") {
        Color::Green
    } else if tag.contains("date") || tag.contains("time") {
        Color::Magenta
    } else if tag.contains("bool") {
        Color::Yellow
    } else {
        Color::Gray
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, vertical, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, horizontal, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(vertical);
    horizontal
}
