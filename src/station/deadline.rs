// A point on the sample clock. Latency-compensated starts are scheduled as
// "arm now, begin `latency` frames later" and checked at every segment edge.

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(u64);

impl Deadline {
    pub fn after(now: u64, frames: u64) -> Self {
        Self(now + frames)
    }

    pub fn is_due(self, now: u64) -> bool {
        now >= self.0
    }

    pub fn frames_from(self, now: u64) -> u64 {
        self.0.saturating_sub(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_exactly_on_the_frame_never_before() {
        let d = Deadline::after(1000, 5520);
        assert!(!d.is_due(6519));
        assert!(d.is_due(6520));
        assert_eq!(d.frames_from(6000), 520);
        assert_eq!(d.frames_from(7000), 0);
    }
}
