//! Episode pipeline orchestrator.
//!
//! Each episode runs as a fixed sequence of steps that validate, execute
//! and record their results in a shared [`JobState`].
//!
//! # Architecture
//!
//! ```text
//! BatchRunner
//!     └── Pipeline (one per episode)
//!             ├── Step: Audio    synthesize, pad, concat -> track + manifest
//!             ├── Step: Video    frames, clips, concat, mux
//!             └── Step: Publish  move artifacts into the output folder
//! ```
//!
//! # Example
//!
//! ```ignore
//! use epb_core::orchestrator::{create_standard_pipeline, Context, JobState};
//!
//! let pipeline = create_standard_pipeline();
//! let ctx = Context::new(script, settings, "ep_001", work_dir, output_dir, logger, services);
//! let mut state = JobState::new("ep_001");
//!
//! let result = pipeline.run(&ctx, &mut state).await?;
//! println!("Completed: {:?}", result.steps_completed);
//! ```

mod batch;
mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use batch::{BatchRunner, EpisodeJob, EpisodeResult};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{AudioStep, PublishStep, VideoStep};
pub use types::{
    AudioOutput, Context, JobState, ProgressCallback, PublishOutput, Services, StepOutcome,
    VideoOutput,
};

/// Create the standard episode pipeline.
///
/// 1. Audio - build the narrated track and its timing manifest
/// 2. Video - render one clip per manifest block and mux with the audio
/// 3. Publish - move the artifacts into the output folder
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(AudioStep::new())
        .with_step(VideoStep::new())
        .with_step(PublishStep::new())
}
