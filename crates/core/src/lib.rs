#![forbid(unsafe_code)]

pub mod duration;
pub mod model;
pub mod sequence;
pub mod settings;
pub mod shuffle;
pub mod time;

pub use time::Clock;
