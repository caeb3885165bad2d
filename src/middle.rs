use crate::audio_api::{AudioCommand, LoopBuffer, StationEvent, TrackSlot, TrackState};
use crate::settings::{ConfigOption, StationConfig, Tempo};
use crate::shared::{DisplayState, InputEvent, Screen, NUM_OVERDUB_SLOTS};

// Sits between the TUI and the audio thread. Turns input events into
// commands (allocating loop buffers here, never on the audio side) and folds
// station events back into the display.
pub struct Middle {
    config: StationConfig,
    sample_rate: u32,
    display: DisplayState,
}

impl Middle {
    pub fn new(config: StationConfig, sample_rate: u32, has_input: bool) -> Self {
        let display = DisplayState::new(config.tempo, config.play_clicks, has_input);
        Self {
            config,
            sample_rate,
            display,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.display
    }

    pub fn set_loop_position(&mut self, pos: Option<(usize, usize)>) {
        self.display.loop_position = pos;
    }

    fn new_buffer(&self) -> LoopBuffer {
        LoopBuffer::for_tempo(&self.config.tempo, self.sample_rate, self.config.feedback)
    }

    fn say(&mut self, msg: impl Into<String>) {
        self.display.message = msg.into();
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AudioCommand> {
        match event {
            InputEvent::RequestMasterInit => {
                if self.display.session_active() {
                    self.say("already running, x to reset first");
                    return vec![];
                }
                vec![AudioCommand::InitMaster {
                    buffer: self.new_buffer(),
                }]
            }
            InputEvent::RequestOverdubInit(slot) => {
                if slot == 0 || slot as usize > NUM_OVERDUB_SLOTS {
                    return vec![];
                }
                if !self.display.master_ready() {
                    self.say("wait for the master loop first");
                    return vec![];
                }
                vec![AudioCommand::InitOverdub {
                    slot,
                    buffer: self.new_buffer(),
                }]
            }
            InputEvent::ToggleTrack(slot) => match self.display.track_state(slot) {
                Some(TrackState::Playing) => vec![AudioCommand::StopTrack(slot)],
                Some(TrackState::Stopped) => vec![AudioCommand::ResumeTrack(slot)],
                _ => vec![],
            },
            InputEvent::ToggleClicks => vec![AudioCommand::SetPlayClicks(!self.display.play_clicks)],
            InputEvent::Reset => vec![AudioCommand::Reset],

            InputEvent::OpenSettings => {
                if self.display.session_active() {
                    self.say("x to reset before changing settings");
                    return vec![];
                }
                self.display.screen = Screen::Settings;
                self.display.draft = self.display.tempo;
                self.display.selected_option = ConfigOption::Bpm;
                vec![]
            }
            InputEvent::NextOption => {
                self.display.selected_option = self.display.selected_option.next();
                vec![]
            }
            InputEvent::AdjustOption(delta) => {
                let option = self.display.selected_option;
                self.display.draft = option.step(&self.display.draft, delta);
                vec![]
            }
            InputEvent::CloseSettings => {
                self.display.screen = Screen::Perform;
                self.request_config(self.display.draft)
            }

            InputEvent::Quit => vec![],
        }
    }

    fn request_config(&mut self, tempo: Tempo) -> Vec<AudioCommand> {
        if let Err(e) = tempo.validate() {
            self.say(e.to_string());
            return vec![];
        }
        if tempo == self.config.tempo {
            return vec![];
        }
        vec![AudioCommand::Configure(tempo)]
    }

    pub fn on_event(&mut self, event: StationEvent) {
        match event {
            StationEvent::Configured(tempo) => {
                tracing::info!(bpm = tempo.bpm, meter = ?tempo.meter, bars = tempo.bars, "tempo changed");
                self.config.tempo = tempo;
                self.display.tempo = tempo;
                self.display.draft = tempo;
                self.say("settings applied");
            }
            StationEvent::CountdownStarted => {
                self.display.countdown = Some((0, self.config.tempo.beats_per_bar()));
                self.display.beat = None;
                self.say("counting in");
            }
            StationEvent::Countdown { beat, of } => {
                self.display.countdown = Some((beat, of));
            }
            StationEvent::Beat { beat, .. } => {
                self.display.countdown = None;
                self.display.beat = Some(beat);
            }
            StationEvent::Track { slot, state } => self.on_track_state(slot, state),
            StationEvent::LayerQueued(slot) => {
                if let Some(flag) = (slot as usize).checked_sub(1).and_then(|i| self.display.layering.get_mut(i)) {
                    *flag = true;
                }
                self.say(format!("layering onto track {slot} at the next loop"));
            }
            StationEvent::MasterWrapped => {}
            StationEvent::ClicksChanged(on) => {
                self.config.play_clicks = on;
                self.display.play_clicks = on;
            }
            StationEvent::Rejected(e) => {
                tracing::warn!("station refused a command: {e}");
                self.say(e.to_string());
            }
            StationEvent::SessionReset => {
                self.clear_session();
                self.say("ready");
            }
            StationEvent::Aborted => {
                tracing::error!("session aborted by the audio thread");
                self.clear_session();
                self.say("audio device lost, session stopped");
            }
        }
    }

    fn on_track_state(&mut self, slot: TrackSlot, state: TrackState) {
        tracing::debug!(?slot, ?state, "track state");
        match slot {
            TrackSlot::Master => {
                self.display.master = state;
                match state {
                    TrackState::Recording => self.say("recording the master loop"),
                    TrackState::Playing => {
                        self.display.beat = None;
                        self.say("looping, 1-6 to overdub");
                    }
                    _ => {}
                }
            }
            TrackSlot::Overdub(n) => {
                let Some(i) = (n as usize).checked_sub(1).filter(|i| *i < NUM_OVERDUB_SLOTS) else {
                    return;
                };
                self.display.overdubs[i] = Some(state);
                match state {
                    TrackState::Idle => self.say(format!("track {n} waits for the loop to come round")),
                    TrackState::Recording => self.say(format!("recording track {n}")),
                    TrackState::Playing => self.display.layering[i] = false,
                    _ => {}
                }
            }
        }
    }

    fn clear_session(&mut self) {
        self.display.countdown = None;
        self.display.beat = None;
        self.display.master = TrackState::Idle;
        self.display.overdubs = [None; NUM_OVERDUB_SLOTS];
        self.display.layering = [false; NUM_OVERDUB_SLOTS];
        self.display.loop_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StationError;

    fn middle() -> Middle {
        Middle::new(StationConfig::default(), 1_000, true)
    }

    fn master_looping(m: &mut Middle) {
        m.on_event(StationEvent::Track {
            slot: TrackSlot::Master,
            state: TrackState::Playing,
        });
    }

    #[test]
    fn master_request_carries_a_loop_sized_buffer() {
        let mut m = middle();
        let cmds = m.handle_input(InputEvent::RequestMasterInit);
        match cmds.as_slice() {
            // 120bpm, 4/4, 2 bars at 1kHz
            [AudioCommand::InitMaster { buffer }] => {
                assert_eq!(buffer.capacity(), 4_000);
                assert_eq!(buffer.feedback(), 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overdub_needs_a_looping_master() {
        let mut m = middle();
        assert!(m.handle_input(InputEvent::RequestOverdubInit(1)).is_empty());
        assert!(!m.display_state().message.is_empty());

        master_looping(&mut m);
        let cmds = m.handle_input(InputEvent::RequestOverdubInit(2));
        assert!(matches!(cmds.as_slice(), [AudioCommand::InitOverdub { slot: 2, .. }]));
        assert!(m.handle_input(InputEvent::RequestOverdubInit(7)).is_empty());
    }

    #[test]
    fn no_second_master_while_a_session_runs() {
        let mut m = middle();
        m.on_event(StationEvent::CountdownStarted);
        assert!(m.handle_input(InputEvent::RequestMasterInit).is_empty());
    }

    #[test]
    fn toggle_follows_the_track_state() {
        let mut m = middle();
        master_looping(&mut m);
        let cmds = m.handle_input(InputEvent::ToggleTrack(TrackSlot::Master));
        assert!(matches!(cmds.as_slice(), [AudioCommand::StopTrack(TrackSlot::Master)]));

        m.on_event(StationEvent::Track {
            slot: TrackSlot::Master,
            state: TrackState::Stopped,
        });
        let cmds = m.handle_input(InputEvent::ToggleTrack(TrackSlot::Master));
        assert!(matches!(cmds.as_slice(), [AudioCommand::ResumeTrack(TrackSlot::Master)]));

        // nothing recorded there yet
        assert!(m.handle_input(InputEvent::ToggleTrack(TrackSlot::Overdub(3))).is_empty());
    }

    #[test]
    fn settings_edit_a_draft_and_apply_on_close() {
        let mut m = middle();
        m.handle_input(InputEvent::OpenSettings);
        assert_eq!(m.display_state().screen, Screen::Settings);

        m.handle_input(InputEvent::AdjustOption(1));
        m.handle_input(InputEvent::NextOption);
        assert_eq!(m.display_state().selected_option, ConfigOption::TimeSignature);
        m.handle_input(InputEvent::AdjustOption(1));

        let cmds = m.handle_input(InputEvent::CloseSettings);
        let expected = Tempo::new(121.0, (6, 8), 2).unwrap();
        assert!(matches!(cmds.as_slice(), [AudioCommand::Configure(t)] if *t == expected));
        // only committed once the station confirms
        assert_eq!(m.config().tempo, Tempo::default());

        m.on_event(StationEvent::Configured(expected));
        assert_eq!(m.config().tempo, expected);
        assert_eq!(m.display_state().tempo, expected);
    }

    #[test]
    fn unchanged_settings_send_nothing() {
        let mut m = middle();
        m.handle_input(InputEvent::OpenSettings);
        assert!(m.handle_input(InputEvent::CloseSettings).is_empty());
    }

    #[test]
    fn settings_stay_closed_during_a_session() {
        let mut m = middle();
        master_looping(&mut m);
        m.handle_input(InputEvent::OpenSettings);
        assert_eq!(m.display_state().screen, Screen::Perform);
    }

    #[test]
    fn events_drive_the_display() {
        let mut m = middle();
        m.on_event(StationEvent::CountdownStarted);
        m.on_event(StationEvent::Countdown { beat: 3, of: 4 });
        assert_eq!(m.display_state().countdown, Some((3, 4)));
        m.on_event(StationEvent::Beat { beat: 1, accent: true });
        assert_eq!(m.display_state().countdown, None);
        assert_eq!(m.display_state().beat, Some(1));

        m.on_event(StationEvent::Track {
            slot: TrackSlot::Overdub(4),
            state: TrackState::Recording,
        });
        assert_eq!(m.display_state().overdubs[3], Some(TrackState::Recording));

        m.on_event(StationEvent::Rejected(StationError::MasterNotReady));
        assert_eq!(m.display_state().message, StationError::MasterNotReady.to_string());

        m.on_event(StationEvent::Aborted);
        assert_eq!(m.display_state().overdubs, [None; NUM_OVERDUB_SLOTS]);
        assert_eq!(m.display_state().master, TrackState::Idle);
    }

    #[test]
    fn click_preference_is_remembered() {
        let mut m = middle();
        let cmds = m.handle_input(InputEvent::ToggleClicks);
        assert!(matches!(cmds.as_slice(), [AudioCommand::SetPlayClicks(false)]));
        m.on_event(StationEvent::ClicksChanged(false));
        assert!(!m.config().play_clicks);
    }

    #[test]
    fn layering_flag_clears_when_the_pass_ends() {
        let mut m = middle();
        m.on_event(StationEvent::LayerQueued(2));
        assert!(m.display_state().layering[1]);
        m.on_event(StationEvent::Track {
            slot: TrackSlot::Overdub(2),
            state: TrackState::Playing,
        });
        assert!(!m.display_state().layering[1]);
    }
}
