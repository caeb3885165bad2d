use super::metronome::{BeatTick, Metronome, Phase, TickKind};
use super::track::{StartTrigger, Track, TrackSlot, TrackState};
use crate::audio::click::ClickBank;
use crate::audio::{LoopBuffer, StereoFrame};
use crate::audio_api::StationEvent;
use crate::error::{StationError, StationResult};
use crate::settings::{StationConfig, Tempo};

pub const MAX_OVERDUBS: usize = 6;

// both drained by the engine after every block
const EVENT_CAPACITY: usize = 256;
const RETIRE_CAPACITY: usize = 16;

/// The whole looper, owned by the audio thread. `process` splits each block
/// wherever a beat, a start deadline, a loop wrap or a pass end falls so
/// every transition lands on its exact frame.
pub struct LoopStation {
    sample_rate: u32,
    latency_frames: u64,
    click_preference: bool,
    metronome: Metronome,
    master: Track,
    overdubs: Vec<Track>,
    clock: u64,
    events: Vec<StationEvent>,
    retired: Vec<LoopBuffer>,
}

impl LoopStation {
    pub fn new(sample_rate: u32, config: &StationConfig, clicks: ClickBank) -> StationResult<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(StationError::InvalidConfig("sample rate must be positive"));
        }
        let mut metronome = Metronome::new(config.tempo, sample_rate, clicks)?;
        metronome.set_play_clicks(config.play_clicks);

        Ok(Self {
            sample_rate,
            latency_frames: config.latency_frames(sample_rate),
            click_preference: config.play_clicks,
            metronome,
            master: Track::master(),
            overdubs: Vec::with_capacity(MAX_OVERDUBS),
            clock: 0,
            events: Vec::with_capacity(EVENT_CAPACITY),
            retired: Vec::with_capacity(RETIRE_CAPACITY),
        })
    }

    pub fn tempo(&self) -> &Tempo {
        self.metronome.tempo()
    }

    pub fn loop_frames(&self) -> usize {
        self.tempo().loop_frames(self.sample_rate)
    }

    // master read position and loop length once the master is looping
    pub fn loop_position(&self) -> Option<(usize, usize)> {
        self.master.position()
    }

    fn is_idle(&self) -> bool {
        self.metronome.phase() == Phase::Idle
            && self.master.state() == TrackState::Idle
            && self.master.trigger().is_none()
            && self.overdubs.is_empty()
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, StationEvent> {
        self.events.drain(..)
    }

    // freed by the control thread, not here
    pub fn drain_retired(&mut self) -> std::vec::Drain<'_, LoopBuffer> {
        self.retired.drain(..)
    }

    fn emit(&mut self, event: StationEvent) {
        if self.events.len() < self.events.capacity() {
            self.events.push(event);
        }
    }

    fn retire(&mut self, buffer: LoopBuffer) {
        if self.retired.len() < self.retired.capacity() {
            self.retired.push(buffer);
        }
    }

    fn reject(&mut self, buffer: LoopBuffer, err: StationError) -> StationResult<()> {
        self.retire(buffer);
        Err(err)
    }

    fn check_buffer(&self, buffer: &LoopBuffer) -> StationResult<()> {
        if buffer.capacity() != self.loop_frames() {
            return Err(StationError::InvalidConfig("loop buffer does not match the loop length"));
        }
        Ok(())
    }

    fn emit_state(&mut self, slot: TrackSlot, state: TrackState) {
        self.emit(StationEvent::Track { slot, state });
    }

    fn track_mut(&mut self, slot: TrackSlot) -> StationResult<&mut Track> {
        match slot {
            TrackSlot::Master => Ok(&mut self.master),
            TrackSlot::Overdub(n) => self
                .overdubs
                .iter_mut()
                .find(|t| t.slot() == slot)
                .ok_or(StationError::InvalidSlot(n)),
        }
    }

    // ── Commands ──────────────────────────────────────────────────

    pub fn configure(&mut self, tempo: Tempo) -> StationResult<()> {
        tempo.validate()?;
        if !self.is_idle() {
            return Err(StationError::SessionActive);
        }
        self.metronome.configure(tempo)?;
        self.emit(StationEvent::Configured(tempo));
        Ok(())
    }

    // one bar of countdown, then one loop from the next downbeat + latency
    pub fn init_master(&mut self, buffer: LoopBuffer) -> StationResult<()> {
        if !self.is_idle() {
            return self.reject(buffer, StationError::AlreadyRecording);
        }
        if let Err(e) = self.check_buffer(&buffer) {
            return self.reject(buffer, e);
        }

        let bpb = self.tempo().beats_per_bar() as u64;
        let bars = self.tempo().bars as u64;
        self.metronome.set_play_clicks(self.click_preference);
        self.metronome.begin_countdown(self.clock)?;
        self.metronome.disable_clicks_from(bpb * (1 + bars) + 1);
        self.master.load(buffer, StartTrigger::Beat(bpb + 1));

        self.emit(StationEvent::CountdownStarted);
        Ok(())
    }

    // a slot that already holds a loop gets a layered pass and `buffer`
    // goes back unused
    pub fn init_overdub(&mut self, slot: u8, buffer: LoopBuffer) -> StationResult<()> {
        if slot == 0 || slot as usize > MAX_OVERDUBS {
            return self.reject(buffer, StationError::InvalidSlot(slot));
        }
        if !matches!(self.master.state(), TrackState::Playing | TrackState::Stopped) {
            return self.reject(buffer, StationError::MasterNotReady);
        }

        let existing = self
            .overdubs
            .iter()
            .position(|t| t.slot() == TrackSlot::Overdub(slot));
        if let Some(i) = existing {
            let queued = self.overdubs[i].queue_layer();
            self.retire(buffer);
            if !queued {
                return Err(StationError::AlreadyRecording);
            }
            self.emit(StationEvent::LayerQueued(slot));
            return Ok(());
        }

        if let Err(e) = self.check_buffer(&buffer) {
            return self.reject(buffer, e);
        }
        self.overdubs.push(Track::overdub(slot, buffer));
        self.emit_state(TrackSlot::Overdub(slot), TrackState::Idle);
        Ok(())
    }

    pub fn stop_track(&mut self, slot: TrackSlot) -> StationResult<()> {
        if self.track_mut(slot)?.stop() {
            self.emit_state(slot, TrackState::Stopped);
        }
        Ok(())
    }

    pub fn resume_track(&mut self, slot: TrackSlot) -> StationResult<()> {
        if self.track_mut(slot)?.resume() {
            self.emit_state(slot, TrackState::Playing);
        }
        Ok(())
    }

    pub fn set_play_clicks(&mut self, on: bool) {
        self.click_preference = on;
        self.metronome.set_play_clicks(on);
        self.emit(StationEvent::ClicksChanged(on));
    }

    pub fn reset(&mut self) {
        self.clear();
        self.emit(StationEvent::SessionReset);
    }

    // the device went away under us
    pub fn abort(&mut self) {
        self.clear();
        self.emit(StationEvent::Aborted);
    }

    fn clear(&mut self) {
        if let Some(buffer) = self.master.take_buffer() {
            self.retire(buffer);
        }
        self.master = Track::master();
        while let Some(mut track) = self.overdubs.pop() {
            if let Some(buffer) = track.take_buffer() {
                self.retire(buffer);
            }
        }
        self.metronome.reset();
        self.metronome.set_play_clicks(self.click_preference);
    }

    // ── Rendering ─────────────────────────────────────────────────

    // output past the end of `input` is silence
    pub fn process(&mut self, input: &[StereoFrame], output: &mut [StereoFrame]) {
        output.fill(StereoFrame::ZERO);
        let n = output.len().min(input.len());

        let mut offset = 0;
        while offset < n {
            let now = self.clock + offset as u64;
            self.fire_due(now);

            let step = self
                .frames_until_next_event(now)
                .map_or(n - offset, |f| (f.min(usize::MAX as u64) as usize).clamp(1, n - offset));
            let end = offset + step;
            self.render_segment(&input[offset..end], &mut output[offset..end], self.clock + end as u64);
            offset = end;
        }
        self.clock += n as u64;
    }

    fn fire_due(&mut self, now: u64) {
        while self.metronome.next_tick_frame().is_some_and(|f| f <= now) {
            match self.metronome.tick() {
                Some(tick) => self.on_beat(tick, now),
                None => break,
            }
        }

        if self.master.poll_deadline(now) {
            self.emit_state(TrackSlot::Master, TrackState::Recording);
        }
        for i in 0..self.overdubs.len() {
            if self.overdubs[i].poll_deadline(now) {
                let slot = self.overdubs[i].slot();
                self.emit_state(slot, TrackState::Recording);
            }
        }
    }

    fn on_beat(&mut self, tick: BeatTick, now: u64) {
        let event = match tick.kind {
            TickKind::Countdown => StationEvent::Countdown {
                beat: tick.beat,
                of: self.tempo().beats_per_bar(),
            },
            TickKind::Running => StationEvent::Beat {
                beat: tick.beat,
                accent: tick.accent,
            },
        };
        self.emit(event);

        if self.master.waiting_for(StartTrigger::Beat(tick.total)) {
            self.master.arm(now, self.latency_frames);
            self.emit_state(TrackSlot::Master, TrackState::ArmedToRecord);
        }
    }

    fn on_master_wrap(&mut self, frame: u64) {
        self.emit(StationEvent::MasterWrapped);
        for i in 0..self.overdubs.len() {
            if self.overdubs[i].waiting_for(StartTrigger::MasterWrap) {
                self.overdubs[i].arm(frame, self.latency_frames);
                let slot = self.overdubs[i].slot();
                self.emit_state(slot, TrackState::ArmedToRecord);
            }
        }
    }

    fn frames_until_next_event(&self, now: u64) -> Option<u64> {
        let tick = self.metronome.next_tick_frame().map(|f| f.saturating_sub(now));
        [tick, self.master.frames_until_event(now), self.master.frames_until_wrap()]
            .into_iter()
            .flatten()
            .chain(self.overdubs.iter().filter_map(|t| t.frames_until_event(now)))
            .min()
    }

    fn render_segment(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], end: u64) {
        if let Err(e) = self.master.record(input) {
            self.emit(StationEvent::Rejected(e));
        }
        for i in 0..self.overdubs.len() {
            if let Err(e) = self.overdubs[i].record(input) {
                self.emit(StationEvent::Rejected(e));
            }
        }

        let wrapped = self.master.render_into(out);
        for track in self.overdubs.iter_mut() {
            track.render_into(out);
        }
        self.metronome.render_clicks(out);

        if self.master.pass_complete() {
            self.master.play(0);
            self.metronome.set_play_clicks(false);
            self.metronome.stop();
            self.emit_state(TrackSlot::Master, TrackState::Playing);
        }

        let master_pos = self.master.position().map_or(0, |(pos, _)| pos);
        for i in 0..self.overdubs.len() {
            if self.overdubs[i].pass_complete() {
                self.overdubs[i].play(master_pos);
                let slot = self.overdubs[i].slot();
                self.emit_state(slot, TrackState::Playing);
            }
        }

        if wrapped {
            self.on_master_wrap(end);
        }
    }
}

#[cfg(test)]
impl LoopStation {
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn latency_frames(&self) -> u64 {
        self.latency_frames
    }

    pub fn metronome(&self) -> &Metronome {
        &self.metronome
    }

    pub fn master(&self) -> &Track {
        &self.master
    }

    pub fn overdubs(&self) -> &[Track] {
        &self.overdubs
    }

    pub fn overdub(&self, slot: u8) -> Option<&Track> {
        self.overdubs.iter().find(|t| t.slot() == TrackSlot::Overdub(slot))
    }

    pub fn play_clicks(&self) -> bool {
        self.metronome.play_clicks()
    }
}
