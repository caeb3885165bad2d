// Errors the loop station can report back to the control surface.
//
// Everything here is Copy and carries no heap data, the audio thread builds
// these inside the callback and ships them out over a bounded channel.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("a recording session is active; reset before changing tempo or meter")]
    SessionActive,

    #[error("the master track is already recording")]
    AlreadyRecording,

    #[error("the master loop has not finished its first pass")]
    MasterNotReady,

    #[error("write of {requested} frames clamped to {accepted} (pass already complete)")]
    BufferOverrun { requested: usize, accepted: usize },

    #[error("no such track slot: {0}")]
    InvalidSlot(u8),
}

pub type StationResult<T> = std::result::Result<T, StationError>;
