use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::audio_api::TrackSlot;
use crate::shared::{InputEvent, Screen};

// poll for a key, resolve it into input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match ts.screen {
        Screen::Perform => perform_key(code),
        Screen::Settings => settings_key(code),
    }
}

fn perform_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::RequestMasterInit],

        // overdub slots
        KeyCode::Char(c @ '1'..='6') => vec![InputEvent::RequestOverdubInit(c as u8 - b'0')],

        // stop / resume
        KeyCode::Char('m') => vec![InputEvent::ToggleTrack(TrackSlot::Master)],
        KeyCode::Char(c @ ('q' | 'w' | 'e' | 'r' | 't' | 'y')) => match slot_for_toggle(c) {
            Some(slot) => vec![InputEvent::ToggleTrack(TrackSlot::Overdub(slot))],
            None => vec![],
        },

        KeyCode::Char('c') => vec![InputEvent::ToggleClicks],
        KeyCode::Char('x') => vec![InputEvent::Reset],
        KeyCode::Char('s') => vec![InputEvent::OpenSettings],
        _ => vec![],
    }
}

fn settings_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Left | KeyCode::Char('[') => vec![InputEvent::AdjustOption(-1)],
        KeyCode::Right | KeyCode::Char(']') => vec![InputEvent::AdjustOption(1)],
        KeyCode::Up | KeyCode::Down | KeyCode::Tab => vec![InputEvent::NextOption],
        KeyCode::Enter | KeyCode::Esc => vec![InputEvent::CloseSettings],
        _ => vec![],
    }
}

fn slot_for_toggle(c: char) -> Option<u8> {
    let idx = "qwerty".find(c)?;
    Some(idx as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_keys_pick_overdub_slots() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char('1'), &mut ts), vec![InputEvent::RequestOverdubInit(1)]);
        assert_eq!(handle_key(KeyCode::Char('6'), &mut ts), vec![InputEvent::RequestOverdubInit(6)]);
        assert!(handle_key(KeyCode::Char('7'), &mut ts).is_empty());
    }

    #[test]
    fn top_row_toggles_tracks() {
        let mut ts = TuiState::default();
        assert_eq!(
            handle_key(KeyCode::Char('e'), &mut ts),
            vec![InputEvent::ToggleTrack(TrackSlot::Overdub(3))]
        );
        assert_eq!(
            handle_key(KeyCode::Char('m'), &mut ts),
            vec![InputEvent::ToggleTrack(TrackSlot::Master)]
        );
    }

    #[test]
    fn esc_means_quit_or_close_depending_on_screen() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Esc, &mut ts), vec![InputEvent::Quit]);
        ts.screen = Screen::Settings;
        assert_eq!(handle_key(KeyCode::Esc, &mut ts), vec![InputEvent::CloseSettings]);
        assert_eq!(handle_key(KeyCode::Right, &mut ts), vec![InputEvent::AdjustOption(1)]);
        // perform keys do nothing in settings
        assert!(handle_key(KeyCode::Char(' '), &mut ts).is_empty());
    }
}
