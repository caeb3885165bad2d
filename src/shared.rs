// The input plan:
//
// Performing:
//   Space         //  RequestMasterInit (one bar of count-in, then the master records)
//   1 .. 6        //  RequestOverdubInit(1..6), starts on the next master wrap
//   m             //  ToggleTrack(Master), stop / resume
//   q w e r t y   //  ToggleTrack(Overdub(1..6))
//   c             //  ToggleClicks
//   x             //  Reset (drop every loop, back to idle)
//   s             //  OpenSettings
//   Esc           //  Quit
//
// Settings screen:
//   Left / Right  //  AdjustOption(-1 / +1), also [ and ]
//   Up / Down     //  NextOption, also Tab
//   Enter / Esc   //  CloseSettings, applies the edited tempo
//
// The middle layer owns every bit of session state; the TUI only resolves
// keys into these events and draws whatever DisplayState says.

use crate::audio_api::{TrackSlot, TrackState};
use crate::settings::{ConfigOption, Tempo};

pub const NUM_OVERDUB_SLOTS: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    RequestMasterInit,
    RequestOverdubInit(u8), // slot 1-6
    ToggleTrack(TrackSlot),
    ToggleClicks,
    Reset,

    // settings screen
    OpenSettings,
    NextOption,
    AdjustOption(i32),
    CloseSettings,

    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Perform,
    Settings,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub screen: Screen,
    pub tempo: Tempo,
    pub draft: Tempo, // what the settings screen is editing
    pub selected_option: ConfigOption,
    pub countdown: Option<(u32, u32)>, // (beat, of)
    pub beat: Option<u32>,
    pub master: TrackState,
    pub overdubs: [Option<TrackState>; NUM_OVERDUB_SLOTS],
    pub layering: [bool; NUM_OVERDUB_SLOTS],
    pub play_clicks: bool,
    pub loop_position: Option<(usize, usize)>,
    pub has_input: bool,
    pub message: String,
}

impl DisplayState {
    pub fn new(tempo: Tempo, play_clicks: bool, has_input: bool) -> Self {
        Self {
            screen: Screen::Perform,
            tempo,
            draft: tempo,
            selected_option: ConfigOption::Bpm,
            countdown: None,
            beat: None,
            master: TrackState::Idle,
            overdubs: [None; NUM_OVERDUB_SLOTS],
            layering: [false; NUM_OVERDUB_SLOTS],
            play_clicks,
            loop_position: None,
            has_input,
            message: String::new(),
        }
    }

    pub fn track_state(&self, slot: TrackSlot) -> Option<TrackState> {
        match slot {
            TrackSlot::Master => Some(self.master),
            TrackSlot::Overdub(n) => self.overdubs.get((n as usize).checked_sub(1)?).copied().flatten(),
        }
    }

    pub fn master_ready(&self) -> bool {
        matches!(self.master, TrackState::Playing | TrackState::Stopped)
    }

    // anything recorded or on its way
    pub fn session_active(&self) -> bool {
        self.master != TrackState::Idle || self.countdown.is_some()
    }
}
