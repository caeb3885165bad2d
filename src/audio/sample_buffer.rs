use std::f32::consts::TAU;
use std::path::Path;

use anyhow::Context;

use super::frame::StereoFrame;

// A short preloaded sound (click samples), always at the device rate.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    // Load a WAV file from disk, resampled to the device rate
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => { // int, scale into -1..1
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let frames: Vec<StereoFrame> = samples
            .chunks_exact(channels)
            .map(|c| {
                if channels == 1 {
                    StereoFrame::mono(c[0])
                } else {
                    StereoFrame::new(c[0], c[1])
                }
            })
            .collect();

        if frames.is_empty() {
            anyhow::bail!("{} has no audio in it", path.display());
        }

        Ok(Self {
            data: resample_linear(&frames, spec.sample_rate, target_rate),
        })
    }

    // Decaying sine burst, the default click when no sample is configured
    pub fn sine_burst(sample_rate: u32, freq: f32, decay_secs: f32, gain: f32) -> Self {
        let rate = sample_rate as f32;
        // run until the envelope is ~-60dB
        let len = ((decay_secs * 7.0) * rate).ceil().max(1.0) as usize;
        let data = (0..len)
            .map(|i| {
                let t = i as f32 / rate;
                let env = (-t / decay_secs).exp();
                StereoFrame::mono((t * freq * TAU).sin() * env * gain)
            })
            .collect();
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    // clicks are short, plain linear interpolation is plenty
    if source_rate == target_rate || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let last = frames.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio; // ex. 3.7
            let idx = (src_pos.floor() as usize).min(last); // ex. 3
            let frac = (src_pos - idx as f64).clamp(0.0, 1.0) as f32; // ex. 0.7
            let a = frames[idx];
            let b = frames[(idx + 1).min(last)];
            StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            }
        })
        .collect()
}
