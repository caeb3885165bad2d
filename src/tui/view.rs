use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph};
use ratatui::Frame;

use super::grid;
use crate::audio_api::TrackState;
use crate::settings::ConfigOption;
use crate::shared::{DisplayState, Screen};

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    match state.screen {
        Screen::Perform => render_perform(frame, area, state, blink_on),
        Screen::Settings => render_settings(frame, area, state),
    }
}

fn render_perform(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tempo line
            Constraint::Length(3), // count-in / beat / status
            Constraint::Length(3), // loop position
            Constraint::Length(3), // master
            Constraint::Min(6),    // overdub pads
            Constraint::Length(1), // message
            Constraint::Length(1), // key help
        ])
        .split(area);

    draw_header(frame, sections[0], state);
    draw_status(frame, sections[1], state);
    draw_loop_gauge(frame, sections[2], state);
    draw_master(frame, sections[3], state, blink_on);
    grid::draw_track_pads(frame, sections[4], &state.overdubs, &state.layering, blink_on);
    frame.render_widget(
        Paragraph::new(state.message.as_str()).style(Style::default().fg(Color::Cyan)),
        sections[5],
    );
    frame.render_widget(
        Paragraph::new("space master  1-6 overdub  m/qwerty stop  c clicks  x reset  s settings  esc quit")
            .style(Style::default().fg(Color::DarkGray)),
        sections[6],
    );
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let t = &state.tempo;
    let clicks = if state.play_clicks { "clicks on" } else { "clicks off" };
    let mic = if state.has_input { "mic ok" } else { "no mic" };
    let line = Line::from(vec![
        Span::styled("LOOPTTY", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            "  {}  {}  {}  {clicks}  {mic}",
            ConfigOption::Bpm.display(t),
            ConfigOption::TimeSignature.display(t),
            ConfigOption::TotalBars.display(t),
        )),
    ]);
    frame.render_widget(Paragraph::new(line).block(Block::bordered()), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let text = match (state.countdown, state.beat) {
        (Some((0, of)), _) => format!("count-in . / {of}"),
        (Some((beat, of)), _) => format!("count-in {beat} / {of}"),
        (None, Some(beat)) => {
            let bpb = state.tempo.beats_per_bar();
            format!("bar {}  beat {}", (beat - 1) / bpb + 1, (beat - 1) % bpb + 1)
        }
        (None, None) => match state.master {
            TrackState::Idle => "press space to start".to_string(),
            TrackState::Playing => "looping".to_string(),
            TrackState::Stopped => "master stopped".to_string(),
            _ => String::new(),
        },
    };
    let paragraph = Paragraph::new(text)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::bordered());
    frame.render_widget(paragraph, area);
}

fn draw_loop_gauge(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (ratio, label) = match state.loop_position {
        Some((pos, len)) if len > 0 => {
            let ratio = (pos as f64 / len as f64).clamp(0.0, 1.0);
            let beat = (ratio * state.tempo.total_beats() as f64) as u32 + 1;
            (ratio, format!("beat {beat} / {}", state.tempo.total_beats()))
        }
        _ => (0.0, String::from("no loop")),
    };
    let gauge = Gauge::default()
        .block(Block::bordered().title(" loop "))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn draw_master(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let label = match state.master {
        TrackState::Idle if state.countdown.is_some() => "count-in",
        TrackState::Idle => "idle",
        other => state_label(other, false),
    };
    let color = if state.master == TrackState::Idle {
        Color::DarkGray
    } else {
        state_color(state.master, blink_on)
    };
    let paragraph = Paragraph::new(label)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .block(
            Block::bordered()
                .title(" master (space/m) ")
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(paragraph, area);
}

fn render_settings(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new("SETTINGS").block(Block::bordered()),
        sections[0],
    );

    let lines: Vec<Line> = ConfigOption::ALL
        .iter()
        .map(|opt| {
            let selected = *opt == state.selected_option;
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            let marker = if selected { ">" } else { " " };
            Line::from(Span::styled(
                format!("{marker} {:<16}{}", opt.label(), opt.display(&state.draft)),
                style,
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(Block::bordered()), sections[1]);

    frame.render_widget(
        Paragraph::new("left/right change  up/down next  enter apply")
            .style(Style::default().fg(Color::DarkGray)),
        sections[2],
    );
}

pub fn state_label(state: TrackState, layering: bool) -> &'static str {
    match state {
        TrackState::Idle => "waiting for loop",
        TrackState::ArmedToRecord => "armed",
        TrackState::Recording if layering => "layering",
        TrackState::Recording => "recording",
        TrackState::Playing if layering => "playing, layer queued",
        TrackState::Playing => "playing",
        TrackState::Stopped => "stopped",
    }
}

pub fn state_color(state: TrackState, blink_on: bool) -> Color {
    match state {
        TrackState::Idle => Color::Yellow,
        TrackState::ArmedToRecord if blink_on => Color::Red,
        TrackState::ArmedToRecord => Color::DarkGray,
        TrackState::Recording => Color::Red,
        TrackState::Playing => Color::Green,
        TrackState::Stopped => Color::Blue,
    }
}
