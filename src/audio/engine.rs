use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use super::frame::{interleave, StereoFrame};
use super::loop_buffer::LoopBuffer;
use crate::audio_api::{AudioCommand, StationEvent};
use crate::station::LoopStation;

// scratch is sized once up front; bigger callbacks get split
pub const MAX_BLOCK: usize = 4096;

// mic frames older than this are dropped so recording latency can't creep
const MAX_INPUT_BACKLOG: usize = MAX_BLOCK * 2;

// loop position published by the audio thread for the display
#[derive(Debug, Default)]
pub struct LoopMeter {
    position: AtomicUsize,
    length: AtomicUsize,
}

impl LoopMeter {
    fn store(&self, pos: Option<(usize, usize)>) {
        let (position, length) = pos.unwrap_or((0, 0));
        self.position.store(position, Ordering::Relaxed);
        self.length.store(length, Ordering::Relaxed);
    }

    pub fn load(&self) -> Option<(usize, usize)> {
        let length = self.length.load(Ordering::Relaxed);
        if length == 0 {
            return None;
        }
        Some((self.position.load(Ordering::Relaxed), length))
    }
}

pub struct Engine {
    station: LoopStation,
    input: Option<rtrb::Consumer<StereoFrame>>,
    events_tx: Sender<StationEvent>,
    retired_tx: Sender<LoopBuffer>,
    fault: Arc<AtomicBool>,
    faulted: bool,
    meter: Arc<LoopMeter>,
    in_scratch: Vec<StereoFrame>,
    out_scratch: Vec<StereoFrame>,
}

impl Engine {
    pub fn new(
        station: LoopStation,
        events_tx: Sender<StationEvent>,
        retired_tx: Sender<LoopBuffer>,
        fault: Arc<AtomicBool>,
        meter: Arc<LoopMeter>,
    ) -> Self {
        Self {
            station,
            input: None,
            events_tx,
            retired_tx,
            fault,
            faulted: false,
            meter,
            in_scratch: vec![StereoFrame::ZERO; MAX_BLOCK],
            out_scratch: vec![StereoFrame::ZERO; MAX_BLOCK],
        }
    }

    pub fn set_input(&mut self, input: rtrb::Consumer<StereoFrame>) {
        self.input = Some(input);
    }

    #[cfg(test)]
    pub fn station(&self) -> &LoopStation {
        &self.station
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        let result = match cmd {
            AudioCommand::InitMaster { buffer } => self.station.init_master(buffer),
            AudioCommand::InitOverdub { slot, buffer } => self.station.init_overdub(slot, buffer),
            AudioCommand::Configure(tempo) => self.station.configure(tempo),
            AudioCommand::StopTrack(slot) => self.station.stop_track(slot),
            AudioCommand::ResumeTrack(slot) => self.station.resume_track(slot),
            AudioCommand::SetPlayClicks(on) => {
                self.station.set_play_clicks(on);
                Ok(())
            }
            AudioCommand::Reset => {
                self.station.reset();
                Ok(())
            }
        };
        if let Err(e) = result {
            let _ = self.events_tx.try_send(StationEvent::Rejected(e));
        }
        self.flush();
    }

    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if !self.faulted && self.fault.load(Ordering::Acquire) {
            self.faulted = true;
            self.station.abort();
        }

        self.trim_input_backlog();
        for chunk in data.chunks_mut(MAX_BLOCK * channels) {
            let frames = chunk.len() / channels;
            self.pull_input(frames);
            self.station
                .process(&self.in_scratch[..frames], &mut self.out_scratch[..frames]);
            interleave(&self.out_scratch[..frames], channels, chunk);
        }

        self.meter.store(self.station.loop_position());
        self.flush();
    }

    fn pull_input(&mut self, frames: usize) {
        let scratch = &mut self.in_scratch[..frames];
        let mut filled = 0;
        if let Some(input) = self.input.as_mut() {
            while filled < frames {
                match input.pop() {
                    Ok(frame) => {
                        scratch[filled] = frame;
                        filled += 1;
                    }
                    Err(_) => break,
                }
            }
        }
        // underrun (or no mic): record silence for the rest
        scratch[filled..].fill(StereoFrame::ZERO);
    }

    fn trim_input_backlog(&mut self) {
        let Some(input) = self.input.as_mut() else {
            return;
        };
        let backlog = input.slots();
        if backlog > MAX_INPUT_BACKLOG {
            if let Ok(chunk) = input.read_chunk(backlog - MAX_INPUT_BACKLOG) {
                chunk.commit_all();
            }
        }
    }

    // ship events and spent buffers off the audio thread
    fn flush(&mut self) {
        for event in self.station.drain_events() {
            let _ = self.events_tx.try_send(event);
        }
        for buffer in self.station.drain_retired() {
            // if the channel is full the buffer is dropped here; rare enough
            let _ = self.retired_tx.try_send(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::click::testing::logging_bank;
    use crate::settings::{StationConfig, Tempo};
    use crate::station::{TrackSlot, TrackState};
    use crossbeam_channel::Receiver;

    struct Rig {
        engine: Engine,
        events: Receiver<StationEvent>,
        retired: Receiver<LoopBuffer>,
        fault: Arc<AtomicBool>,
        meter: Arc<LoopMeter>,
        mic: rtrb::Producer<StereoFrame>,
    }

    fn rig() -> Rig {
        let config = StationConfig {
            tempo: Tempo::new(120.0, (2, 4), 1).unwrap(),
            latency_secs: 0.0,
            ..StationConfig::default()
        };
        let (bank, _, _) = logging_bank();
        let station = LoopStation::new(8, &config, bank).unwrap();
        let (events_tx, events) = crossbeam_channel::bounded(256);
        let (retired_tx, retired) = crossbeam_channel::bounded(16);
        let fault = Arc::new(AtomicBool::new(false));
        let meter = Arc::new(LoopMeter::default());
        let (mic, consumer) = rtrb::RingBuffer::new(MAX_BLOCK * 4);
        let mut engine = Engine::new(station, events_tx, retired_tx, fault.clone(), meter.clone());
        engine.set_input(consumer);
        Rig {
            engine,
            events,
            retired,
            fault,
            meter,
            mic,
        }
    }

    #[test]
    fn mic_frames_end_up_in_the_master_loop() {
        let mut rig = rig();
        rig.engine.handle_cmd(AudioCommand::InitMaster {
            buffer: LoopBuffer::new(8, 0.5),
        });
        for i in 0..16 {
            rig.mic.push(StereoFrame::mono(i as f32)).unwrap();
        }
        let mut data = vec![0.0f32; 16 * 2];
        rig.engine.render_interleaved(&mut data, 2);

        let master = rig.engine.station().master();
        assert_eq!(master.state(), TrackState::Playing);
        assert_eq!(master.buffer().unwrap().frames()[0], StereoFrame::mono(8.0));
        assert_eq!(rig.meter.load(), Some((0, 8)));

        let states: Vec<StationEvent> = rig.events.try_iter().collect();
        assert!(states.contains(&StationEvent::Track {
            slot: TrackSlot::Master,
            state: TrackState::Playing
        }));
    }

    #[test]
    fn rejected_commands_are_reported_and_buffers_returned() {
        let mut rig = rig();
        rig.engine.handle_cmd(AudioCommand::InitOverdub {
            slot: 1,
            buffer: LoopBuffer::new(8, 0.5),
        });
        assert_eq!(
            rig.events.try_recv().unwrap(),
            StationEvent::Rejected(crate::error::StationError::MasterNotReady)
        );
        assert_eq!(rig.retired.try_iter().count(), 1);
    }

    #[test]
    fn device_fault_aborts_the_session_once() {
        let mut rig = rig();
        rig.engine.handle_cmd(AudioCommand::InitMaster {
            buffer: LoopBuffer::new(8, 0.5),
        });
        rig.events.try_iter().count();

        rig.fault.store(true, Ordering::Release);
        let mut data = vec![0.0f32; 4];
        rig.engine.render_interleaved(&mut data, 1);
        rig.engine.render_interleaved(&mut data, 1);

        let aborts = rig
            .events
            .try_iter()
            .filter(|e| *e == StationEvent::Aborted)
            .count();
        assert_eq!(aborts, 1);
        assert_eq!(rig.engine.station().master().state(), TrackState::Idle);
        assert_eq!(rig.meter.load(), None);
    }

    #[test]
    fn missing_mic_input_records_silence() {
        let mut rig = rig();
        rig.engine.handle_cmd(AudioCommand::InitMaster {
            buffer: LoopBuffer::new(8, 0.5),
        });
        let mut data = vec![1.0f32; 16];
        rig.engine.render_interleaved(&mut data, 1);
        let master = rig.engine.station().master();
        assert!(master.buffer().unwrap().frames().iter().all(|f| *f == StereoFrame::ZERO));
    }
}
