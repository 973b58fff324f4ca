//! Episode Builder core - audio-timed video episode pipeline.
//!
//! This crate contains all business logic with zero CLI dependencies.
//! A script document goes in; a narrated audio track, a timing manifest
//! and a video whose frames change exactly when each line is spoken
//! come out.

pub mod audio;
pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod render;
pub mod synthesis;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
