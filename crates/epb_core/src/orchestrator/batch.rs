//! Batch runner: builds a list of episodes one after another.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::logging::{EpisodeLogger, LineCallback, LogConfig};
use crate::models::Script;

use super::errors::PipelineError;
use super::pipeline::CancelHandle;
use super::types::{Context, JobState, PublishOutput, Services};
use super::{create_standard_pipeline, PipelineRunResult};

/// One episode to build.
#[derive(Debug, Clone)]
pub struct EpisodeJob {
    /// Episode identifier; names the published artifacts.
    pub id: String,
    pub script_path: PathBuf,
}

impl EpisodeJob {
    pub fn new(id: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            script_path: script_path.into(),
        }
    }

    /// Job whose id is `prefix` followed by the script's file stem.
    pub fn from_path(script_path: impl Into<PathBuf>, prefix: Option<&str>) -> Self {
        let script_path = script_path.into();
        let stem = script_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "episode".to_string());
        let id = match prefix {
            Some(prefix) => format!("{}{}", prefix, stem),
            None => stem,
        };
        Self { id, script_path }
    }
}

/// Result of building a single episode.
#[derive(Debug, Clone)]
pub struct EpisodeResult {
    pub episode: String,
    pub success: bool,
    /// Published artifacts (if successful).
    pub outputs: Option<PublishOutput>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Step (or setup phase) that failed.
    pub failed_step: Option<String>,
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
    pub elapsed_secs: f64,
}

impl EpisodeResult {
    pub fn success(
        episode: String,
        outputs: Option<PublishOutput>,
        run_result: PipelineRunResult,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            episode,
            success: true,
            outputs,
            error: None,
            failed_step: None,
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
            elapsed_secs,
        }
    }

    pub fn failure(episode: String, error: &PipelineError, elapsed_secs: f64) -> Self {
        Self {
            episode,
            success: false,
            outputs: None,
            error: Some(error_chain(error)),
            failed_step: Some(error.step().to_string()),
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
            elapsed_secs,
        }
    }
}

/// Display an error with all of its sources, `: `-joined.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Runs episodes through the standard pipeline, one working directory each.
///
/// A failed episode is logged and recorded; the batch moves on.
pub struct BatchRunner {
    settings: Settings,
    log_dir: PathBuf,
    /// Parent of the per-run working directories.
    temp_root: PathBuf,
    output_dir: PathBuf,
    services: Services,
    line_callback: Option<Arc<dyn Fn(&str, &str) + Send + Sync>>,
}

impl BatchRunner {
    pub fn new(
        settings: Settings,
        log_dir: PathBuf,
        temp_root: PathBuf,
        output_dir: PathBuf,
        services: Services,
    ) -> Self {
        Self {
            settings,
            log_dir,
            temp_root,
            output_dir,
            services,
            line_callback: None,
        }
    }

    /// Forward every episode log line as `(episode, line)`.
    pub fn with_line_callback(
        mut self,
        callback: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.line_callback = Some(Arc::new(callback));
        self
    }

    fn episode_callback(&self, episode: &str) -> Option<LineCallback> {
        let callback = Arc::clone(self.line_callback.as_ref()?);
        let episode = episode.to_string();
        Some(Box::new(move |line: &str| callback(&episode, line)))
    }

    /// Build one episode. Never panics on episode errors; they end up in
    /// the returned result.
    pub async fn run_episode(&self, job: &EpisodeJob, cancel: &CancelHandle) -> EpisodeResult {
        let started = Instant::now();
        match self.build(job, cancel).await {
            Ok((run_result, outputs)) => {
                tracing::info!(episode = %job.id, "Episode built");
                EpisodeResult::success(
                    job.id.clone(),
                    outputs,
                    run_result,
                    started.elapsed().as_secs_f64(),
                )
            }
            Err(e) => {
                let result =
                    EpisodeResult::failure(job.id.clone(), &e, started.elapsed().as_secs_f64());
                tracing::error!(
                    episode = %job.id,
                    step = %e.step(),
                    error = result.error.as_deref().unwrap_or_default(),
                    "Episode failed"
                );
                result
            }
        }
    }

    async fn build(
        &self,
        job: &EpisodeJob,
        cancel: &CancelHandle,
    ) -> Result<(PipelineRunResult, Option<PublishOutput>), PipelineError> {
        let script = Script::from_file(&job.script_path)
            .map_err(|e| PipelineError::validation_failed(&job.id, e.to_string()))?;

        tokio::fs::create_dir_all(&self.temp_root)
            .await
            .map_err(|e| {
                PipelineError::setup_failed(&job.id, format!("creating temp root: {}", e))
            })?;
        // Removed when dropped, success or not
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("{}_", sanitize(&job.id)))
            .tempdir_in(&self.temp_root)
            .map_err(|e| {
                PipelineError::setup_failed(&job.id, format!("creating working directory: {}", e))
            })?;

        let logger = EpisodeLogger::new(
            &job.id,
            &self.log_dir,
            LogConfig::from_settings(&self.settings.logging),
            self.episode_callback(&job.id),
        )
        .map_err(|e| PipelineError::setup_failed(&job.id, format!("creating logger: {}", e)))?;
        let logger = Arc::new(logger);

        logger.section(&format!("Episode {}", job.id));
        logger.info(&format!("Script: {}", job.script_path.display()));
        logger.info(&format!(
            "Dialogue lines: {} ({} spoken)",
            script.dialogue.len(),
            script.spoken_lines().count()
        ));

        let ctx = Context::new(
            script,
            self.settings.clone(),
            &job.id,
            work_dir.path().to_path_buf(),
            self.output_dir.clone(),
            Arc::clone(&logger),
            self.services.clone(),
        );
        let mut state = JobState::new(&job.id);
        let pipeline = create_standard_pipeline().with_cancel_handle(cancel);

        let outcome = pipeline.run(&ctx, &mut state).await;
        if let Err(ref e) = outcome {
            logger.error(&format!("Pipeline failed: {}", e));
            logger.show_tail("failure");
        }
        logger.flush();
        outcome.map(|run_result| (run_result, state.publish))
    }

    /// Build every job in order, stopping early only on cancellation.
    pub async fn run_all(&self, jobs: &[EpisodeJob], cancel: &CancelHandle) -> Vec<EpisodeResult> {
        let mut results = Vec::with_capacity(jobs.len());

        for (i, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Batch cancelled at episode {}/{}", i + 1, jobs.len());
                break;
            }
            tracing::info!("Building episode {}/{}: {}", i + 1, jobs.len(), job.id);
            results.push(self.run_episode(job, cancel).await);
        }

        results
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_services;
    use tempfile::tempdir;

    const SCRIPT: &str = r#"{
        "episode_title": "会議の準備",
        "intro_narration": "今日は会議の準備です。",
        "dialogue": [
            {"speaker": "田中", "text_jp": "資料はできましたか。"},
            {"speaker": "佐藤", "text_jp": "はい、できました。"}
        ]
    }"#;

    fn runner(root: &Path) -> BatchRunner {
        BatchRunner::new(
            Settings::default(),
            root.join("logs"),
            root.join("tmp"),
            root.join("out"),
            fake_services(),
        )
    }

    #[test]
    fn job_id_from_file_stem() {
        let job = EpisodeJob::from_path("/scripts/ep_07.json", None);
        assert_eq!(job.id, "ep_07");
        let job = EpisodeJob::from_path("/scripts/ep_07.json", Some("s2_"));
        assert_eq!(job.id, "s2_ep_07");
    }

    #[tokio::test]
    async fn failed_episode_does_not_stop_batch() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, SCRIPT).unwrap();
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();

        let jobs = vec![
            EpisodeJob::from_path(&broken, None),
            EpisodeJob::from_path(&good, None),
        ];
        let results = runner(dir.path()).run_all(&jobs, &CancelHandle::new()).await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].failed_step.as_deref(), Some("validate"));

        assert!(results[1].success, "{:?}", results[1].error);
        assert_eq!(results[1].steps_completed, vec!["Audio", "Video", "Publish"]);
        let outputs = results[1].outputs.as_ref().unwrap();
        assert_eq!(outputs.video, dir.path().join("out/good.mp4"));
        for path in outputs.paths() {
            assert!(path.exists(), "{} missing", path.display());
        }
    }

    #[tokio::test]
    async fn working_directories_are_removed() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("ep.json");
        std::fs::write(&script, SCRIPT).unwrap();

        let result = runner(dir.path())
            .run_episode(&EpisodeJob::from_path(&script, None), &CancelHandle::new())
            .await;
        assert!(result.success);
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
        assert!(dir.path().join("logs/ep.log").exists());
    }

    #[tokio::test]
    async fn cancelled_batch_builds_nothing() {
        let dir = tempdir().unwrap();
        let cancel = CancelHandle::new();
        cancel.cancel();
        let jobs = vec![EpisodeJob::new("ep", dir.path().join("ep.json"))];
        assert!(runner(dir.path()).run_all(&jobs, &cancel).await.is_empty());
    }

    #[test]
    fn failure_message_keeps_source_chain() {
        let err = PipelineError::validation_failed("ep", "bad json");
        let result = EpisodeResult::failure("ep".to_string(), &err, 0.1);
        assert!(result.error.unwrap().contains("bad json"));
    }
}
