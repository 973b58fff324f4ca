//! Pipeline step implementations.

mod audio;
mod publish;
mod video;

pub use audio::AudioStep;
pub use publish::PublishStep;
pub use video::VideoStep;
