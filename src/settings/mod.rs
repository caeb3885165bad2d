pub mod config;
pub mod persistence;

pub use config::{ClickConfig, ConfigOption, StationConfig, Tempo};
