mod deadline;
mod loop_station;
pub mod metronome;
pub mod track;

pub use loop_station::{LoopStation, MAX_OVERDUBS};
pub use metronome::{Metronome, Phase};
pub use track::{Track, TrackSlot, TrackState};
