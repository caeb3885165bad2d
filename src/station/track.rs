use super::deadline::Deadline;
use crate::audio::{LoopBuffer, StereoFrame};
use crate::error::StationResult;

// overdub slots run 1..=6
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackSlot {
    Master,
    Overdub(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Master,
    // started_at_wrap flips once the overdub has been armed on a master wrap
    Overdub { slot: u8, started_at_wrap: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    Idle,
    ArmedToRecord,
    Recording,
    Playing,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTrigger {
    // global metronome tick count
    Beat(u64),
    MasterWrap,
}

pub struct Track {
    role: Role,
    state: TrackState,
    buffer: Option<LoopBuffer>,
    trigger: Option<StartTrigger>,
    deadline: Option<Deadline>,
    // recording on top of existing content while it keeps playing
    layering: bool,
}

impl Track {
    pub fn master() -> Self {
        Self::with_role(Role::Master)
    }

    pub fn overdub(slot: u8, buffer: LoopBuffer) -> Self {
        let mut track = Self::with_role(Role::Overdub {
            slot,
            started_at_wrap: false,
        });
        track.buffer = Some(buffer);
        track.trigger = Some(StartTrigger::MasterWrap);
        track
    }

    fn with_role(role: Role) -> Self {
        Self {
            role,
            state: TrackState::Idle,
            buffer: None,
            trigger: None,
            deadline: None,
            layering: false,
        }
    }

    pub fn slot(&self) -> TrackSlot {
        match self.role {
            Role::Master => TrackSlot::Master,
            Role::Overdub { slot, .. } => TrackSlot::Overdub(slot),
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn trigger(&self) -> Option<StartTrigger> {
        self.trigger
    }

    pub fn take_buffer(&mut self) -> Option<LoopBuffer> {
        self.buffer.take()
    }

    pub fn load(&mut self, buffer: LoopBuffer, trigger: StartTrigger) {
        self.buffer = Some(buffer);
        self.trigger = Some(trigger);
    }

    // false if there's nothing to layer onto or the track is busy
    pub fn queue_layer(&mut self) -> bool {
        if !matches!(self.state, TrackState::Playing | TrackState::Stopped) || self.trigger.is_some() {
            return false;
        }
        self.trigger = Some(StartTrigger::MasterWrap);
        self.layering = true;
        true
    }

    pub fn waiting_for(&self, trigger: StartTrigger) -> bool {
        self.trigger == Some(trigger)
    }

    pub fn arm(&mut self, now: u64, latency: u64) {
        if self.buffer.is_none() {
            return;
        }
        self.trigger = None;
        self.deadline = Some(Deadline::after(now, latency));
        self.state = TrackState::ArmedToRecord;
        if let Role::Overdub { slot, .. } = self.role {
            self.role = Role::Overdub {
                slot,
                started_at_wrap: true,
            };
        }
    }

    pub fn poll_deadline(&mut self, now: u64) -> bool {
        if self.state != TrackState::ArmedToRecord {
            return false;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        if !deadline.is_due(now) {
            return false;
        }
        self.deadline = None;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.rewind_pass();
        }
        self.state = TrackState::Recording;
        true
    }

    pub fn frames_until_event(&self, now: u64) -> Option<u64> {
        match self.state {
            TrackState::ArmedToRecord => self.deadline.map(|d| d.frames_from(now)),
            TrackState::Recording => self.buffer.as_ref().map(|b| b.remaining_in_pass() as u64),
            _ => None,
        }
    }

    pub fn frames_until_wrap(&self) -> Option<u64> {
        if !self.has_loop() {
            return None;
        }
        self.buffer.as_ref().map(|b| b.frames_until_wrap() as u64)
    }

    // (read cursor, loop length) while there is a loop to play
    pub fn position(&self) -> Option<(usize, usize)> {
        if !self.has_loop() {
            return None;
        }
        self.buffer.as_ref().map(|b| (b.read_cursor(), b.capacity()))
    }

    // true once the pass is full
    pub fn record(&mut self, input: &[StereoFrame]) -> StationResult<bool> {
        if self.state != TrackState::Recording {
            return Ok(false);
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(false);
        };
        if self.layering {
            buffer.mix_write(input)?;
        } else {
            buffer.write(input)?;
        }
        Ok(buffer.is_filled())
    }

    pub fn pass_complete(&self) -> bool {
        self.state == TrackState::Recording && self.buffer.as_ref().is_some_and(|b| b.is_filled())
    }

    pub fn play(&mut self, read_pos: usize) {
        if let Some(buffer) = self.buffer.as_mut() {
            if !self.layering {
                buffer.seek(read_pos);
            }
            self.layering = false;
            self.state = TrackState::Playing;
        }
    }

    pub fn stop(&mut self) -> bool {
        if self.state == TrackState::Playing {
            self.state = TrackState::Stopped;
            return true;
        }
        false
    }

    pub fn resume(&mut self) -> bool {
        if self.state == TrackState::Stopped {
            self.state = TrackState::Playing;
            return true;
        }
        false
    }

    // content the read cursor should keep moving over
    fn has_loop(&self) -> bool {
        match self.state {
            TrackState::Playing | TrackState::Stopped => true,
            TrackState::ArmedToRecord | TrackState::Recording => self.layering,
            TrackState::Idle => false,
        }
    }

    fn audible(&self) -> bool {
        self.state == TrackState::Playing
            || (self.layering && matches!(self.state, TrackState::ArmedToRecord | TrackState::Recording))
    }

    // stopped tracks move their cursor silently to stay in phase
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        if !self.has_loop() {
            return false;
        }
        let audible = self.audible();
        let Some(buffer) = self.buffer.as_mut() else {
            return false;
        };
        if audible {
            buffer.read_into(out, 1.0)
        } else {
            buffer.advance(out.len())
        }
    }
}

#[cfg(test)]
impl Track {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn buffer(&self) -> Option<&LoopBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_layering(&self) -> bool {
        self.layering
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<StereoFrame> {
        (0..len).map(|i| StereoFrame::mono(i as f32)).collect()
    }

    #[test]
    fn master_waits_for_deadline_then_records() {
        let mut track = Track::master();
        track.load(LoopBuffer::new(8, 0.5), StartTrigger::Beat(5));
        assert!(track.waiting_for(StartTrigger::Beat(5)));

        track.arm(100, 10);
        assert_eq!(track.state(), TrackState::ArmedToRecord);
        assert_eq!(track.frames_until_event(104), Some(6));
        assert!(!track.poll_deadline(109));
        assert!(track.poll_deadline(110));
        assert_eq!(track.state(), TrackState::Recording);
    }

    #[test]
    fn arming_an_overdub_marks_it_started_at_wrap() {
        let mut track = Track::overdub(3, LoopBuffer::new(4, 0.5));
        assert_eq!(track.slot(), TrackSlot::Overdub(3));
        assert!(track.waiting_for(StartTrigger::MasterWrap));
        track.arm(0, 0);
        assert_eq!(
            track.role(),
            Role::Overdub {
                slot: 3,
                started_at_wrap: true
            }
        );
    }

    #[test]
    fn recording_fills_then_plays_from_the_given_position() {
        let mut track = Track::overdub(1, LoopBuffer::new(4, 0.5));
        track.arm(0, 0);
        track.poll_deadline(0);
        assert!(!track.record(&ramp(2)).unwrap());
        assert_eq!(track.frames_until_event(0), Some(2));
        assert!(track.record(&ramp(2)).unwrap());
        assert!(track.pass_complete());

        track.play(2);
        let mut out = [StereoFrame::ZERO; 2];
        track.render_into(&mut out);
        assert_eq!(out, [StereoFrame::mono(0.0), StereoFrame::mono(1.0)]);
    }

    #[test]
    fn stopped_track_is_silent_but_keeps_its_place() {
        let mut track = Track::overdub(1, LoopBuffer::new(4, 0.5));
        track.arm(0, 0);
        track.poll_deadline(0);
        track.record(&ramp(4)).unwrap();
        track.play(0);

        assert!(track.stop());
        let mut out = [StereoFrame::ZERO; 3];
        track.render_into(&mut out);
        assert_eq!(out, [StereoFrame::ZERO; 3]);

        assert!(track.resume());
        let mut out = [StereoFrame::ZERO; 1];
        track.render_into(&mut out);
        assert_eq!(out[0], StereoFrame::mono(3.0));
        assert!(!track.resume());
    }

    #[test]
    fn layer_pass_mixes_and_keeps_playing() {
        let mut track = Track::overdub(2, LoopBuffer::new(4, 0.5));
        track.arm(0, 0);
        track.poll_deadline(0);
        track.record(&[StereoFrame::mono(2.0); 4]).unwrap();
        track.play(0);

        assert!(track.queue_layer());
        assert!(!track.queue_layer());
        track.arm(0, 0);
        track.poll_deadline(0);
        assert!(track.is_layering());

        let mut out = [StereoFrame::ZERO; 4];
        track.record(&[StereoFrame::mono(1.0); 4]).unwrap();
        track.render_into(&mut out);
        // 2.0 * 0.5 + 1.0
        assert_eq!(out, [StereoFrame::mono(2.0); 4]);

        track.play(0);
        assert_eq!(track.state(), TrackState::Playing);
        assert!(!track.is_layering());
    }

    #[test]
    fn master_without_a_buffer_cannot_arm() {
        let mut track = Track::master();
        track.arm(0, 0);
        assert_eq!(track.state(), TrackState::Idle);
    }
}
