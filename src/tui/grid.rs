use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use super::view::{state_color, state_label};
use crate::audio_api::TrackState;
use crate::shared::NUM_OVERDUB_SLOTS;

const COLS: usize = 3;
const ROWS: usize = 2;

// key that records / key that toggles, per slot
const SLOT_KEYS: [(&str, &str); NUM_OVERDUB_SLOTS] =
    [("1", "Q"), ("2", "W"), ("3", "E"), ("4", "R"), ("5", "T"), ("6", "Y")];

pub fn draw_track_pads(
    frame: &mut Frame,
    area: Rect,
    states: &[Option<TrackState>; NUM_OVERDUB_SLOTS],
    layering: &[bool; NUM_OVERDUB_SLOTS],
    blink_on: bool,
) {
    let row_constraints = [Constraint::Ratio(1, ROWS as u32); ROWS];
    let col_constraints = [Constraint::Ratio(1, COLS as u32); COLS];

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints)
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let idx = row_idx * COLS + col_idx;
            let (rec_key, toggle_key) = SLOT_KEYS[idx];
            let title = format!(" {} ({rec_key}/{toggle_key}) ", idx + 1);

            let (label, color) = match states[idx] {
                Some(state) => (state_label(state, layering[idx]), state_color(state, blink_on)),
                None => ("empty", Color::DarkGray),
            };
            let block = Block::bordered()
                .title(title)
                .border_style(Style::default().fg(color));
            let text = Paragraph::new(label)
                .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .block(block);
            frame.render_widget(text, *cell_area);
        }
    }
}
