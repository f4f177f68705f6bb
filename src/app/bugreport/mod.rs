pub mod archive;
pub mod durations;
