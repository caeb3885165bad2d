use std::ops::{Add, AddAssign, Mul};

// The smallest unit of audio; one stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const ZERO: StereoFrame = StereoFrame { left: 0.0, right: 0.0 };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    // mic input is mostly mono, duplicate it onto both sides
    pub fn mono(sample: f32) -> Self {
        Self { left: sample, right: sample }
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

impl AddAssign for StereoFrame {
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    fn mul(self, gain: f32) -> StereoFrame {
        StereoFrame {
            left: self.left * gain,
            right: self.right * gain,
        }
    }
}

// Split an interleaved cpal buffer into stereo frames
pub fn deinterleave(data: &[f32], channels: usize, out: &mut [StereoFrame]) -> usize {
    if channels == 0 {
        return 0;
    }
    let mut n = 0;
    for (chunk, frame) in data.chunks_exact(channels).zip(out.iter_mut()) {
        *frame = if channels == 1 {
            StereoFrame::mono(chunk[0])
        } else {
            StereoFrame::new(chunk[0], chunk[1])
        };
        n += 1;
    }
    n
}

// Write stereo frames back into an interleaved buffer; mono devices get the
// average, anything past the second channel is silent.
pub fn interleave(frames: &[StereoFrame], channels: usize, data: &mut [f32]) {
    if channels == 0 {
        return;
    }
    for (chunk, frame) in data.chunks_exact_mut(channels).zip(frames.iter()) {
        if channels == 1 {
            chunk[0] = 0.5 * (frame.left + frame.right);
            continue;
        }
        chunk[0] = frame.left;
        chunk[1] = frame.right;
        for extra in &mut chunk[2..] {
            *extra = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_is_duplicated() {
        let mut out = [StereoFrame::ZERO; 3];
        let n = deinterleave(&[0.1, 0.2, 0.3], 1, &mut out);
        assert_eq!(n, 3);
        assert_eq!(out[1], StereoFrame::mono(0.2));
    }

    #[test]
    fn interleave_zeroes_extra_channels() {
        let frames = [StereoFrame::new(1.0, -1.0)];
        let mut data = [9.0; 4];
        interleave(&frames, 4, &mut data);
        assert_eq!(data, [1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn interleave_downmixes_to_mono() {
        let frames = [StereoFrame::new(1.0, 0.0)];
        let mut data = [0.0; 1];
        interleave(&frames, 1, &mut data);
        assert_eq!(data[0], 0.5);
    }
}
