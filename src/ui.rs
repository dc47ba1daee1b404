use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::HELP_TEXT;
use crate::model::{Model, StatusKind};
use crate::table::{RowShade, TableOutput};

pub const HEADER_HEIGHT: usize = 4;
pub const STATUS_HEIGHT: usize = 3;
pub const FOOTER_HEIGHT: usize = 1;
// Borders plus the column header row of the table block.
pub const TABLE_CHROME_HEIGHT: usize = 3;
pub const CHROME_HEIGHT: usize = HEADER_HEIGHT + STATUS_HEIGHT + FOOTER_HEIGHT + TABLE_CHROME_HEIGHT;
pub const COLUMN_SPACING: u16 = 1;

const ROW_EVEN: Color = Color::Rgb(30, 36, 50);
const ROW_ODD: Color = Color::Rgb(20, 24, 34);

#[derive(Debug, Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [header, status, body, footer] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT as u16),
            Constraint::Length(STATUS_HEIGHT as u16),
            Constraint::Min(TABLE_CHROME_HEIGHT as u16),
            Constraint::Length(FOOTER_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_drop_zone(model, frame, header);
        self.draw_status(model, frame, status);
        let table = model.table();
        if table.empty_state_visible {
            self.draw_empty_state(model, frame, body);
        } else {
            self.draw_table(model, frame, body);
        }
        self.draw_footer(model, frame, footer);

        if model.show_help() {
            self.draw_help(frame);
        }
    }

    fn draw_drop_zone(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let border_color = if model.drop_zone_active() {
            Color::LightBlue
        } else {
            Color::DarkGray
        };
        let block = Block::bordered()
            .title(Line::from(" sv · spreadsheet viewer ".bold()).centered())
            .border_set(border::ROUNDED)
            .border_style(Style::new().fg(border_color));

        let hint = if model.drop_zone_active() {
            "Drop the file to select it".light_blue()
        } else {
            "Pick a file with <o> or drop one onto this window".dark_gray()
        };
        let text = Text::from(vec![
            Line::from(model.filename_info().to_string().yellow()),
            Line::from(hint),
        ]);
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn draw_status(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let status = model.ui_status();
        let (fg, border_color) = match status.kind {
            StatusKind::Info => (Color::Gray, Color::DarkGray),
            StatusKind::Success => (Color::LightGreen, Color::Green),
            StatusKind::Error => (Color::LightRed, Color::Red),
        };
        let mut badge = model.table().row_count_label();
        if model.is_reading() {
            badge = format!("reading … | {badge}");
        }
        let block = Block::bordered()
            .border_style(Style::new().fg(border_color))
            .title_top(Line::from(format!(" {badge} ")).right_aligned());
        let paragraph = Paragraph::new(status.message.as_str())
            .style(Style::new().fg(fg))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(paragraph, area);
    }

    fn draw_empty_state(&self, _model: &Model, frame: &mut Frame, area: Rect) {
        let block = Block::bordered().border_style(Style::new().fg(Color::DarkGray));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [center] = Layout::vertical([Constraint::Length(2)])
            .flex(Flex::Center)
            .areas(inner);
        let text = Text::from(vec![
            Line::from("No data to show yet.".bold()),
            Line::from("Select a spreadsheet and press <p> to list its rows.".dark_gray()),
        ])
        .centered();
        frame.render_widget(Paragraph::new(text), center);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let table = model.table();
        let (offset_row, offset_column) = model.offsets();
        let widths = table.column_widths(model.max_column_width());

        let columns = visible_columns(&widths, offset_column, area.width.saturating_sub(2));
        let visible_rows = (area.height as usize).saturating_sub(TABLE_CHROME_HEIGHT);

        let header = Row::new(
            columns
                .iter()
                .map(|&c| Cell::from(sanitize_cell(&table.headers[c]))),
        )
        .style(
            Style::new()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        );

        let rows = table
            .rows
            .iter()
            .enumerate()
            .skip(offset_row)
            .take(visible_rows)
            .map(|(idx, row)| {
                let bg = match TableOutput::shade(idx) {
                    RowShade::Even => ROW_EVEN,
                    RowShade::Odd => ROW_ODD,
                };
                Row::new(
                    columns
                        .iter()
                        .map(|&c| Cell::from(sanitize_cell(&row[c]))),
                )
                .style(Style::new().bg(bg))
            });

        let constraints = columns.iter().map(|&c| column_constraint(widths[c]));
        let title = format!(
            " rows {}-{} of {} ",
            (offset_row + 1).min(table.row_count),
            (offset_row + visible_rows).min(table.row_count),
            table.row_count
        );
        let widget = Table::new(rows, constraints)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .block(
                Block::bordered()
                    .border_style(Style::new().fg(Color::DarkGray))
                    .title_bottom(Line::from(title).right_aligned()),
            );
        frame.render_widget(widget, area);
    }

    fn draw_footer(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if let Some(input) = model.picker_input() {
            let prompt = "File: ";
            let line = Line::from(vec![
                Span::from(prompt).bold().light_blue(),
                Span::from(input.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.len() + input.cursor_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let hints = Line::from(vec![
            " Open ".into(),
            "<o>".blue().bold(),
            " Read ".into(),
            "<p>".blue().bold(),
            " Clear ".into(),
            "<c>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        frame.render_widget(Paragraph::new(hints.centered()), area);
    }

    fn draw_help(&self, frame: &mut Frame) {
        let area = popup_area(frame.area(), 50, 14);
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Paragraph::new(HELP_TEXT).block(block), area);
    }
}

/// Columns starting at `offset` that fit into `available` cells. At least one column is shown.
fn visible_columns(widths: &[usize], offset: usize, available: u16) -> Vec<usize> {
    let mut used = 0usize;
    let mut columns = Vec::new();
    for (idx, width) in widths.iter().enumerate().skip(offset) {
        let needed = width + if columns.is_empty() { 0 } else { COLUMN_SPACING as usize };
        if !columns.is_empty() && used + needed > available as usize {
            break;
        }
        used += needed;
        columns.push(idx);
    }
    columns
}

fn column_constraint(width: usize) -> Constraint {
    Constraint::Length(u16::try_from(width).unwrap_or(u16::MAX))
}

// Cells are drawn on one line; control characters would be interpreted by the terminal.
fn sanitize_cell(value: &str) -> String {
    value
        .replace("\r\n", " ↵ ")
        .replace('\n', " ↵ ")
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    area
}
