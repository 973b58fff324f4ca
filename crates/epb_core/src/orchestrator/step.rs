//! Pipeline step trait.

use async_trait::async_trait;

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One stage of an episode build.
///
/// The pipeline calls, in order: `validate_input`, `execute`, then
/// `validate_output` when `execute` reports success.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Step name, used in logs and error context.
    fn name(&self) -> &str;

    /// Check preconditions (earlier steps ran, inputs exist).
    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Do the work and record results in `state`.
    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Check that `execute` left valid output behind.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    fn is_optional(&self) -> bool {
        false
    }

    fn description(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStep;

    #[async_trait]
    impl PipelineStep for MockStep {
        fn name(&self) -> &str {
            "Mock"
        }

        fn validate_input(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }

        async fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            Ok(StepOutcome::Success)
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn step_trait_object_works() {
        let step: Box<dyn PipelineStep> = Box::new(MockStep);
        assert_eq!(step.name(), "Mock");
        assert_eq!(step.description(), "Mock");
        assert!(!step.is_optional());
    }
}
