use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, StationEvent};
use crate::settings::StationConfig;
use crate::station::LoopStation;

pub mod click;
mod engine;
mod frame;
mod loop_buffer;
mod sample_buffer;
mod voice;

pub use engine::LoopMeter;
pub use frame::StereoFrame;
pub use loop_buffer::LoopBuffer;

use click::ClickBank;
use engine::{Engine, MAX_BLOCK};

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    events_rx: Receiver<StationEvent>,
    retired_rx: Receiver<LoopBuffer>,
    meter: Arc<LoopMeter>,
    fault: Arc<AtomicBool>,
    sample_rate: u32,
    has_input: bool,
    _output_stream: cpal::Stream,
    _input_stream: Option<cpal::Stream>, // None when no mic available
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        if let Err(e) = self.tx.try_send(cmd) {
            tracing::warn!("dropped audio command: {e}");
        }
    }

    pub fn poll_event(&self) -> Option<StationEvent> {
        // buffers the engine let go of get freed here, on the ui thread
        while self.retired_rx.try_recv().is_ok() {}
        self.events_rx.try_recv().ok()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn has_input(&self) -> bool {
        self.has_input
    }

    pub fn loop_position(&self) -> Option<(usize, usize)> {
        self.meter.load()
    }

    pub fn faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }
}

pub fn start_audio(config: &StationConfig) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
    let (events_tx, events_rx) = crossbeam_channel::bounded::<StationEvent>(1024);
    let (retired_tx, retired_rx) = crossbeam_channel::bounded::<LoopBuffer>(64);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    let sample_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    tracing::info!(sample_rate, channels, "output device ready");

    let clicks = ClickBank::from_config(&config.click, sample_rate);
    let station = LoopStation::new(sample_rate, config, clicks)?;

    let fault = Arc::new(AtomicBool::new(false));
    let meter = Arc::new(LoopMeter::default());
    let mut engine = Engine::new(station, events_tx, retired_tx, fault.clone(), meter.clone());

    let (input_tx, input_rx) = rtrb::RingBuffer::<StereoFrame>::new(MAX_BLOCK * 4);
    let input_stream = try_build_input_stream(&host, sample_rate, input_tx);
    let has_input = input_stream.is_some();
    if has_input {
        engine.set_input(input_rx);
    }

    match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream =
                build_output_stream_f32(&device, &supported.into(), rx, engine, fault.clone(), channels)?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                events_rx,
                retired_rx,
                meter,
                fault,
                sample_rate,
                has_input,
                _output_stream: output_stream,
                _input_stream: input_stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    fault: Arc<AtomicBool>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("audio output stream error: {err}");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            fault.store(true, Ordering::Release);
        }
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            // commands take effect at the top of the block
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            engine.render_interleaved(data, channels);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// ── Input stream ──────────────────────────────────────────────────

fn try_build_input_stream(
    host: &cpal::Host,
    target_sample_rate: cpal::SampleRate,
    mut tx: rtrb::Producer<StereoFrame>,
) -> Option<cpal::Stream> {
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            tracing::warn!("no default input device, loops will record silence");
            return None;
        }
    };

    let supported = device.default_input_config().ok()?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        tracing::warn!("input device is not f32, loops will record silence");
        return None;
    }
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = target_sample_rate;

    let in_channels = (stream_config.channels as usize).max(1);
    let mut scratch = vec![StereoFrame::ZERO; MAX_BLOCK];

    let err_fn = |err| tracing::error!("audio input stream error: {err}");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                for chunk in data.chunks(MAX_BLOCK * in_channels) {
                    let n = frame::deinterleave(chunk, in_channels, &mut scratch);
                    for f in &scratch[..n] {
                        // full ring means the output side stalled; drop
                        if tx.push(*f).is_err() {
                            break;
                        }
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| tracing::warn!("could not open input stream: {e}"))
        .ok()?;

    if let Err(e) = stream.play() {
        tracing::warn!("could not start input stream: {e}");
        return None;
    }

    Some(stream)
}
