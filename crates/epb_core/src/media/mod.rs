//! External media tooling: process runner, duration probe, encoder,
//! concat lists and artifact publishing.

mod concat;
mod encoder;
mod probe;
mod publish;
mod runner;

pub use concat::{escape_concat_path, render_concat_list, write_concat_list, ConcatError};
pub use encoder::{
    check_tool, AudioFormat, ClipFormat, Encoder, EncoderError, FfmpegEncoder,
};
pub use probe::{parse_duration, probe_or_zero, DurationProbe, FfprobeProbe, ProbeError};
pub use publish::publish_file;
pub use runner::{ToolCommand, ToolError, ToolOutput, ToolRunner};

