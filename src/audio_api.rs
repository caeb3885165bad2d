pub use crate::audio::LoopBuffer;
use crate::error::StationError;
use crate::settings::Tempo;
pub use crate::station::{TrackSlot, TrackState};

#[derive(Debug)]
pub enum AudioCommand {
    // The engine can't allocate a loop's worth of memory mid-callback, so
    // the control side builds the buffer (sized with LoopBuffer::for_tempo)
    // and ships it along with the request
    InitMaster { buffer: LoopBuffer },
    InitOverdub { slot: u8, buffer: LoopBuffer },

    Configure(Tempo),
    StopTrack(TrackSlot),
    ResumeTrack(TrackSlot),
    SetPlayClicks(bool),
    Reset,
}

// What the audio thread reports back. Plain data only, no allocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StationEvent {
    Configured(Tempo),
    CountdownStarted,
    Countdown { beat: u32, of: u32 },
    Beat { beat: u32, accent: bool },
    Track { slot: TrackSlot, state: TrackState },
    LayerQueued(u8),
    MasterWrapped,
    ClicksChanged(bool),
    Rejected(StationError),
    SessionReset,
    // the output device failed and the session was torn down
    Aborted,
}
