use crate::audio::click::ClickBank;
use crate::audio::StereoFrame;
use crate::error::{StationError, StationResult};
use crate::settings::Tempo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Countdown,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickKind {
    Countdown,
    Running,
}

// `beat` counts within the countdown bar or the whole loop, `total` counts
// every tick since the countdown began, from 1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatTick {
    pub kind: TickKind,
    pub beat: u32,
    pub total: u64,
    pub accent: bool,
}

/// Musical time, clocked by audio frames.
///
/// Tick `n` (0-based) lands on `origin + round(n * frames_per_beat)`, so the
/// grid never drifts however long the session runs.
pub struct Metronome {
    tempo: Tempo,
    sample_rate: u32,
    phase: Phase,
    countdown_beat: u32,
    running_beat: u32,
    total_beats: u64,
    origin: u64,
    play_clicks: bool,
    clicks_off_at: Option<u64>,
    clicks: ClickBank,
}

impl Metronome {
    pub fn new(tempo: Tempo, sample_rate: u32, clicks: ClickBank) -> StationResult<Self> {
        tempo.validate()?;
        Ok(Self {
            tempo,
            sample_rate,
            phase: Phase::Idle,
            countdown_beat: 0,
            running_beat: 0,
            total_beats: 0,
            origin: 0,
            play_clicks: true,
            clicks_off_at: None,
            clicks,
        })
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    // buffers already handed out are sized for the current tempo
    pub fn configure(&mut self, tempo: Tempo) -> StationResult<()> {
        tempo.validate()?;
        if self.phase != Phase::Idle {
            return Err(StationError::SessionActive);
        }
        self.tempo = tempo;
        Ok(())
    }

    // first countdown click lands on `now`
    pub fn begin_countdown(&mut self, now: u64) -> StationResult<()> {
        if self.phase != Phase::Idle {
            return Err(StationError::AlreadyRecording);
        }
        self.phase = Phase::Countdown;
        self.origin = now;
        self.countdown_beat = 0;
        self.running_beat = 0;
        self.total_beats = 0;
        Ok(())
    }

    pub fn set_play_clicks(&mut self, on: bool) {
        self.play_clicks = on;
    }

    // silence the running clicks from this tick count onwards
    pub fn disable_clicks_from(&mut self, total: u64) {
        self.clicks_off_at = Some(total);
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.countdown_beat = 0;
        self.running_beat = 0;
        self.total_beats = 0;
        self.clicks_off_at = None;
    }

    pub fn next_tick_frame(&self) -> Option<u64> {
        match self.phase {
            Phase::Countdown | Phase::Running => {
                let fpb = self.tempo.frames_per_beat(self.sample_rate);
                Some(self.origin + (self.total_beats as f64 * fpb).round() as u64)
            }
            Phase::Idle | Phase::Stopped => None,
        }
    }

    pub fn tick(&mut self) -> Option<BeatTick> {
        match self.phase {
            Phase::Countdown => {
                self.total_beats += 1;
                Some(self.on_countdown_tick())
            }
            Phase::Running => {
                self.total_beats += 1;
                Some(self.on_running_tick())
            }
            Phase::Idle | Phase::Stopped => None,
        }
    }

    fn on_countdown_tick(&mut self) -> BeatTick {
        self.countdown_beat += 1;
        let beat = self.countdown_beat;
        let accent = beat == 1;
        self.clicks.countdown.trigger(accent);

        if beat >= self.tempo.beats_per_bar() {
            self.phase = Phase::Running;
            self.running_beat = 1;
        }
        BeatTick {
            kind: TickKind::Countdown,
            beat,
            total: self.total_beats,
            accent,
        }
    }

    pub fn on_running_tick(&mut self) -> BeatTick {
        if self.clicks_off_at.is_some_and(|at| self.total_beats >= at) {
            self.play_clicks = false;
        }

        let beat = self.running_beat;
        // downbeat of every bar
        let accent = (beat - 1) % self.tempo.beats_per_bar() == 0;
        if self.play_clicks {
            self.clicks.beat.trigger(accent);
        }
        self.running_beat = beat % self.tempo.total_beats() + 1;

        BeatTick {
            kind: TickKind::Running,
            beat,
            total: self.total_beats,
            accent,
        }
    }

    pub fn render_clicks(&mut self, out: &mut [StereoFrame]) {
        self.clicks.render_into(out);
    }
}

#[cfg(test)]
impl Metronome {
    pub fn running_beat(&self) -> u32 {
        self.running_beat
    }

    pub fn play_clicks(&self) -> bool {
        self.play_clicks
    }

    pub fn loop_duration(&self) -> f64 {
        self.tempo.loop_duration()
    }
}
