// Typed settings for a session: tempo, meter, loop length, and the handful of
// knobs the audio side needs. Everything is validated on write.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StationError, StationResult};

pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 200.0;
pub const MIN_BARS: u32 = 1;
pub const MAX_BARS: u32 = 16;

// the meters the encoder cycles through
pub const TIME_SIGNATURES: [(u32, u32); 4] = [(2, 4), (3, 4), (4, 4), (6, 8)];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
    pub meter: (u32, u32),
    pub bars: u32,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            meter: (4, 4),
            bars: 2,
        }
    }
}

impl Tempo {
    pub fn new(bpm: f64, meter: (u32, u32), bars: u32) -> StationResult<Self> {
        let tempo = Self { bpm, meter, bars };
        tempo.validate()?;
        Ok(tempo)
    }

    pub fn validate(&self) -> StationResult<()> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(StationError::InvalidConfig("bpm must be positive"));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(StationError::InvalidConfig("bpm must be within 40..=200"));
        }
        if !TIME_SIGNATURES.contains(&self.meter) {
            return Err(StationError::InvalidConfig("meter must be 2/4, 3/4, 4/4 or 6/8"));
        }
        if !(MIN_BARS..=MAX_BARS).contains(&self.bars) {
            return Err(StationError::InvalidConfig("bar count must be within 1..=16"));
        }
        Ok(())
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.meter.0
    }

    // seconds
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn total_beats(&self) -> u32 {
        self.meter.0 * self.bars
    }

    // seconds
    pub fn loop_duration(&self) -> f64 {
        self.beat_interval() * self.total_beats() as f64
    }

    pub fn frames_per_beat(&self, sample_rate: u32) -> f64 {
        self.beat_interval() * sample_rate as f64
    }

    pub fn loop_frames(&self, sample_rate: u32) -> usize {
        (self.loop_duration() * sample_rate as f64).round() as usize
    }
}

// what the settings screen can edit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigOption {
    Bpm,
    TimeSignature,
    TotalBars,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 3] = [
        ConfigOption::Bpm,
        ConfigOption::TimeSignature,
        ConfigOption::TotalBars,
    ];

    pub fn next(self) -> Self {
        match self {
            ConfigOption::Bpm => ConfigOption::TimeSignature,
            ConfigOption::TimeSignature => ConfigOption::TotalBars,
            ConfigOption::TotalBars => ConfigOption::Bpm,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfigOption::Bpm => "BPM",
            ConfigOption::TimeSignature => "TIME SIGNATURE",
            ConfigOption::TotalBars => "TOTAL BARS",
        }
    }

    // meters cycle, the numbers stop at their limits
    pub fn step(self, tempo: &Tempo, delta: i32) -> Tempo {
        let mut t = *tempo;
        match self {
            ConfigOption::Bpm => {
                t.bpm = (t.bpm.round() + delta as f64).clamp(MIN_BPM, MAX_BPM);
            }
            ConfigOption::TimeSignature => {
                let len = TIME_SIGNATURES.len() as i32;
                let idx = TIME_SIGNATURES
                    .iter()
                    .position(|m| *m == t.meter)
                    .unwrap_or(2) as i32;
                t.meter = TIME_SIGNATURES[(idx + delta).rem_euclid(len) as usize];
            }
            ConfigOption::TotalBars => {
                let bars = t.bars as i64 + delta as i64;
                t.bars = bars.clamp(MIN_BARS as i64, MAX_BARS as i64) as u32;
            }
        }
        t
    }

    pub fn display(self, tempo: &Tempo) -> String {
        match self {
            ConfigOption::Bpm => format!("{} BPM", tempo.bpm.round()),
            ConfigOption::TimeSignature => format!("{}/{}", tempo.meter.0, tempo.meter.1),
            ConfigOption::TotalBars => format!("{} BARS", tempo.bars),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub volume: f32,
    // optional WAVs; the synthesized clicks are used when these are unset
    pub countdown_sample: Option<PathBuf>,
    pub beat_sample: Option<PathBuf>,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            volume: 0.2,
            countdown_sample: None,
            beat_sample: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub tempo: Tempo,
    pub latency_secs: f64,
    pub feedback: f32,
    pub play_clicks: bool,
    pub click: ClickConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            latency_secs: 0.115,
            feedback: 0.5,
            play_clicks: true,
            click: ClickConfig::default(),
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> StationResult<()> {
        self.tempo.validate()?;
        if !self.latency_secs.is_finite() || self.latency_secs < 0.0 {
            return Err(StationError::InvalidConfig("latency must be zero or positive"));
        }
        if !(0.0..=1.0).contains(&self.feedback) {
            return Err(StationError::InvalidConfig("feedback must be within 0..=1"));
        }
        Ok(())
    }

    pub fn latency_frames(&self, sample_rate: u32) -> u64 {
        (self.latency_secs * sample_rate as f64).round() as u64
    }
}
