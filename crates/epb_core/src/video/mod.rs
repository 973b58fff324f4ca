//! Frame-accurate video assembly.

mod assembler;
mod segment;

pub use assembler::{resolve_blocks, AlignmentError, AssembledVideo, VideoAssembler, VideoError};
pub use segment::{frame_counts, Block, SegmentRenderer};
