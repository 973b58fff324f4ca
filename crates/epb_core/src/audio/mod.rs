//! Narrated audio track and timing manifest assembly.

mod assembler;

pub use assembler::{
    AssembledAudio, AssemblyConfig, AudioAssembler, AudioError, TRACK_TOLERANCE_SECS,
};
