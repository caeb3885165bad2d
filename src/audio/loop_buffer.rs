use super::frame::StereoFrame;
use crate::error::{StationError, StationResult};
use crate::settings::config::Tempo;

// One loop of stereo audio. Recording is single-pass: at most `capacity`
// frames go in between calls to `rewind_pass`, the rest is clamped.
// The read cursor wraps forever.
#[derive(Clone, Debug)]
pub struct LoopBuffer {
    data: Vec<StereoFrame>,
    write_cursor: usize,
    read_cursor: usize,
    pass_written: usize,
    feedback: f32,
}

impl LoopBuffer {
    pub fn new(capacity: usize, feedback: f32) -> Self {
        Self {
            data: vec![StereoFrame::ZERO; capacity.max(1)],
            write_cursor: 0,
            read_cursor: 0,
            pass_written: 0,
            feedback: feedback.clamp(0.0, 1.0),
        }
    }

    // sized for exactly one loop of the given tempo
    pub fn for_tempo(tempo: &Tempo, sample_rate: u32, feedback: f32) -> Self {
        Self::new(tempo.loop_frames(sample_rate), feedback)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn is_filled(&self) -> bool {
        self.pass_written == self.data.len()
    }

    pub fn remaining_in_pass(&self) -> usize {
        self.data.len() - self.pass_written
    }

    pub fn frames_until_wrap(&self) -> usize {
        self.data.len() - self.read_cursor
    }

    // start another pass from the top of the loop
    pub fn rewind_pass(&mut self) {
        self.write_cursor = 0;
        self.pass_written = 0;
    }

    pub fn seek(&mut self, pos: usize) {
        self.read_cursor = pos % self.data.len();
    }

    // returns how many frames were taken, the overflow is reported
    pub fn write(&mut self, src: &[StereoFrame]) -> StationResult<usize> {
        self.write_with(src, |_, incoming| incoming)
    }

    // old * feedback + new
    pub fn mix_write(&mut self, src: &[StereoFrame]) -> StationResult<usize> {
        let feedback = self.feedback;
        self.write_with(src, move |existing, incoming| existing * feedback + incoming)
    }

    fn write_with<F>(&mut self, src: &[StereoFrame], combine: F) -> StationResult<usize>
    where
        F: Fn(StereoFrame, StereoFrame) -> StereoFrame,
    {
        let cap = self.data.len();
        let accepted = src.len().min(self.remaining_in_pass());

        // tail of the buffer, then whatever wraps around to offset 0
        let first = accepted.min(cap - self.write_cursor);
        let (head, wrapped) = src[..accepted].split_at(first);
        let start = self.write_cursor;
        for (dst, s) in self.data[start..start + first].iter_mut().zip(head) {
            *dst = combine(*dst, *s);
        }
        for (dst, s) in self.data[..wrapped.len()].iter_mut().zip(wrapped) {
            *dst = combine(*dst, *s);
        }

        self.write_cursor = (self.write_cursor + accepted) % cap;
        self.pass_written += accepted;

        if accepted < src.len() {
            return Err(StationError::BufferOverrun {
                requested: src.len(),
                accepted,
            });
        }
        Ok(accepted)
    }

    // true if the cursor crossed or landed on the loop boundary
    pub fn read(&mut self, out: &mut [StereoFrame]) -> bool {
        self.read_with(out, |dst, s| *dst = s)
    }

    // additive variant for the mixer
    pub fn read_into(&mut self, out: &mut [StereoFrame], gain: f32) -> bool {
        self.read_with(out, |dst, s| *dst += s * gain)
    }

    // move the read cursor without producing audio
    pub fn advance(&mut self, len: usize) -> bool {
        let cap = self.data.len();
        let wrapped = self.read_cursor + len >= cap;
        self.read_cursor = (self.read_cursor + len) % cap;
        wrapped
    }

    fn read_with<F>(&mut self, out: &mut [StereoFrame], mut put: F) -> bool
    where
        F: FnMut(&mut StereoFrame, StereoFrame),
    {
        let cap = self.data.len();
        let mut pos = self.read_cursor;
        for dst in out.iter_mut() {
            put(dst, self.data[pos]);
            pos += 1;
            if pos == cap {
                pos = 0;
            }
        }
        self.advance(out.len())
    }
}

#[cfg(test)]
impl LoopBuffer {
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(n: usize) -> Vec<StereoFrame> {
        (0..n).map(|i| StereoFrame::new(i as f32, -(i as f32))).collect()
    }

    #[test]
    fn one_pass_then_read_back_is_identical() {
        let input = ramp(1000);
        let mut buf = LoopBuffer::new(1000, 0.5);
        for chunk in input.chunks(128) {
            buf.write(chunk).unwrap();
        }
        assert!(buf.is_filled());

        let mut out = vec![StereoFrame::ZERO; 1000];
        let wrapped = buf.read(&mut out);
        assert!(wrapped);
        assert_eq!(out, input);
        assert_eq!(buf.read_cursor(), 0);
    }

    #[test]
    fn write_past_the_pass_is_clamped() {
        let mut buf = LoopBuffer::new(10, 0.5);
        buf.write(&ramp(8)).unwrap();
        let err = buf.write(&ramp(5)).unwrap_err();
        assert_eq!(err, StationError::BufferOverrun { requested: 5, accepted: 2 });
        assert!(buf.is_filled());
        // the first frames of the loop were not touched by the overflow
        assert_eq!(buf.frames()[0], StereoFrame::new(0.0, 0.0));
        assert_eq!(buf.frames()[9], StereoFrame::new(1.0, -1.0));
        assert_eq!(buf.write(&ramp(1)), Err(StationError::BufferOverrun { requested: 1, accepted: 0 }));
    }

    #[test]
    fn write_splits_at_the_end_of_the_buffer() {
        let mut buf = LoopBuffer::new(6, 0.5);
        buf.write(&ramp(4)).unwrap();
        buf.rewind_pass();
        buf.write_cursor = 4;
        buf.write(&[StereoFrame::mono(7.0); 4]).unwrap();
        assert_eq!(buf.write_cursor(), 2);
        let lefts: Vec<f32> = buf.frames().iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![7.0, 7.0, 2.0, 3.0, 7.0, 7.0]);
    }

    #[test]
    fn mix_write_attenuates_existing_content() {
        let mut buf = LoopBuffer::new(4, 0.5);
        buf.write(&[StereoFrame::mono(1.0); 4]).unwrap();
        buf.rewind_pass();
        buf.mix_write(&[StereoFrame::mono(0.25); 4]).unwrap();
        assert!(buf.frames().iter().all(|f| *f == StereoFrame::mono(0.75)));
    }

    #[test]
    fn repeated_layers_stay_bounded() {
        let mut buf = LoopBuffer::new(4, 0.5);
        for _ in 0..64 {
            buf.rewind_pass();
            buf.mix_write(&[StereoFrame::mono(1.0); 4]).unwrap();
        }
        // geometric series converges to 1 / (1 - feedback)
        assert!(buf.frames()[0].left <= 2.0);
    }

    #[test]
    fn read_wraps_without_a_gap() {
        let mut buf = LoopBuffer::new(5, 0.5);
        buf.write(&ramp(5)).unwrap();
        buf.seek(3);
        let mut out = [StereoFrame::ZERO; 4];
        assert!(buf.read(&mut out));
        let lefts: Vec<f32> = out.iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![3.0, 4.0, 0.0, 1.0]);
        assert_eq!(buf.read_cursor(), 2);
    }

    #[test]
    fn read_into_sums_with_gain() {
        let mut buf = LoopBuffer::new(2, 0.5);
        buf.write(&[StereoFrame::mono(1.0); 2]).unwrap();
        let mut out = [StereoFrame::mono(0.5); 2];
        buf.read_into(&mut out, 0.5);
        assert_eq!(out[0], StereoFrame::mono(1.0));
    }

    #[test]
    fn advance_reports_the_wrap() {
        let mut buf = LoopBuffer::new(10, 0.5);
        assert!(!buf.advance(9));
        assert_eq!(buf.frames_until_wrap(), 1);
        assert!(buf.advance(1));
        assert_eq!(buf.read_cursor(), 0);
    }

    proptest! {
        #[test]
        fn chunked_write_and_read_are_lossless(
            cap in 1usize..400,
            write_chunk in 1usize..64,
            read_chunk in 1usize..64,
            start in 0usize..400,
        ) {
            let input = ramp(cap);
            let mut buf = LoopBuffer::new(cap, 0.5);
            for chunk in input.chunks(write_chunk) {
                prop_assert!(buf.write(chunk).is_ok());
            }
            prop_assert!(buf.is_filled());

            // two laps from an arbitrary start, in arbitrary chunk sizes
            buf.seek(start);
            let mut out = vec![StereoFrame::ZERO; cap * 2];
            for chunk in out.chunks_mut(read_chunk) {
                buf.read(chunk);
            }
            for (i, frame) in out.iter().enumerate() {
                prop_assert_eq!(*frame, input[(start + i) % cap]);
            }
        }
    }
}
