use std::path::Path;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;
use crate::settings::ClickConfig;

// accented sample clicks play back a fifth-ish higher
const SAMPLE_ACCENT_PITCH: f32 = 1.5;

/// Something the metronome can fire on a beat. Triggering must not block or
/// allocate; the voice mixes its own tail into each output block.
pub trait ClickVoice: Send {
    fn trigger(&mut self, accent: bool);
    fn render_into(&mut self, out: &mut [StereoFrame]);
}

// one of two preloaded sounds per trigger, restarting on every hit
pub struct BufferClick {
    normal: SampleBuffer,
    accent: Option<SampleBuffer>,
    accent_pitch: f32,
    gain: f32,
    voice: Option<(bool, Voice)>,
}

impl BufferClick {
    // separate accent sound, both at normal speed
    pub fn with_accent(normal: SampleBuffer, accent: SampleBuffer, gain: f32) -> Self {
        Self {
            normal,
            accent: Some(accent),
            accent_pitch: 1.0,
            gain,
            voice: None,
        }
    }

    // one sound; the accent is the same sample sped up
    pub fn pitched(sample: SampleBuffer, gain: f32) -> Self {
        Self {
            normal: sample,
            accent: None,
            accent_pitch: SAMPLE_ACCENT_PITCH,
            gain,
            voice: None,
        }
    }

    // 800 Hz on the downbeat, 600 Hz otherwise
    pub fn countdown(sample_rate: u32, gain: f32) -> Self {
        Self::with_accent(
            SampleBuffer::sine_burst(sample_rate, 600.0, 0.03, 1.0),
            SampleBuffer::sine_burst(sample_rate, 800.0, 0.03, 1.0),
            gain,
        )
    }

    // shorter and brighter than the countdown
    pub fn beat(sample_rate: u32, gain: f32) -> Self {
        Self::with_accent(
            SampleBuffer::sine_burst(sample_rate, 1200.0, 0.008, 1.0),
            SampleBuffer::sine_burst(sample_rate, 1600.0, 0.008, 1.0),
            gain,
        )
    }
}

impl ClickVoice for BufferClick {
    fn trigger(&mut self, accent: bool) {
        let pitch = if accent && self.accent.is_none() {
            self.accent_pitch
        } else {
            1.0
        };
        self.voice = Some((accent, Voice::new(pitch, self.gain)));
    }

    fn render_into(&mut self, out: &mut [StereoFrame]) {
        let Some((accent, voice)) = self.voice.as_mut() else {
            return;
        };
        let buffer = match (&self.accent, *accent) {
            (Some(accent_buf), true) => accent_buf,
            _ => &self.normal,
        };
        voice.render_into(buffer, out);
        if !voice.active {
            self.voice = None;
        }
    }
}

// The pair of voices the metronome drives
pub struct ClickBank {
    pub countdown: Box<dyn ClickVoice>,
    pub beat: Box<dyn ClickVoice>,
}

impl ClickBank {
    pub fn new(countdown: Box<dyn ClickVoice>, beat: Box<dyn ClickVoice>) -> Self {
        Self { countdown, beat }
    }

    // configured WAVs where they load, synthesized clicks everywhere else
    pub fn from_config(config: &ClickConfig, sample_rate: u32) -> Self {
        let countdown: Box<dyn ClickVoice> = match load_sample(config.countdown_sample.as_deref(), sample_rate) {
            Some(sample) => Box::new(BufferClick::pitched(sample, config.volume)),
            None => Box::new(BufferClick::countdown(sample_rate, config.volume)),
        };
        let beat: Box<dyn ClickVoice> = match load_sample(config.beat_sample.as_deref(), sample_rate) {
            Some(sample) => Box::new(BufferClick::pitched(sample, config.volume)),
            None => Box::new(BufferClick::beat(sample_rate, config.volume)),
        };
        Self::new(countdown, beat)
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        self.countdown.render_into(out);
        self.beat.render_into(out);
    }
}

fn load_sample(path: Option<&Path>, sample_rate: u32) -> Option<SampleBuffer> {
    let path = path?;
    match SampleBuffer::load_wav(path, sample_rate) {
        Ok(sample) => Some(sample),
        Err(e) => {
            tracing::warn!("click sample {} unusable, using the built-in click: {e:#}", path.display());
            None
        }
    }
}
