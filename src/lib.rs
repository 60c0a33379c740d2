//! mediaconv - batch media conversion front-end for ffmpeg
//!
//! Classifies files by extension, turns a target format and quality into an
//! ffmpeg command line, and runs batches of conversions sequentially with
//! progress reporting and cooperative cancellation.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod formats;
pub mod media;
pub mod setup;
pub mod worklist;
