use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

// One-shot playback of a preloaded buffer, pitched by reading faster/slower.
// Never allocates; the click voices keep one of these per trigger.
#[derive(Clone, Debug)]
pub struct Voice {
    pub pos: f32,
    pub pitch: f32,
    pub gain: f32,
    pub active: bool,
}

impl Voice {
    pub fn new(pitch: f32, gain: f32) -> Self {
        Self {
            pos: 0.0,
            pitch,
            gain,
            active: true,
        }
    }

    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame]) {
        // we're at a certain playback position, it's our job to mix this voice into the output block
        let data = &buffer.data;
        let len = data.len();
        if len == 0 {
            self.active = false;
        }

        for frame in out.iter_mut() {
            if !self.active {
                break;
            }
            if self.pos >= len as f32 {
                self.active = false;
                break;
            }

            // read sample at current position
            let i = self.pos as usize;
            let frac = self.pos - i as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);

            frame.left += lerp(s0.left, s1.left, frac) * self.gain;
            frame.right += lerp(s0.right, s1.right, frac) * self.gain;

            self.pos += self.pitch;
        }
    }
}
