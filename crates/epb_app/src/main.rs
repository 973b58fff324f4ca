//! Episode Builder - command line front end.
//!
//! Turns episode script documents into narrated, frame-timed videos.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use console::style;
use directories::ProjectDirs;

use epb_core::config::{ConfigManager, Settings};
use epb_core::logging::{init_tracing, LogLevel};
use epb_core::media::{
    check_tool, AudioFormat, ClipFormat, FfmpegEncoder, FfprobeProbe, ToolRunner,
};
use epb_core::orchestrator::{BatchRunner, CancelHandle, EpisodeJob, EpisodeResult, Services};
use epb_core::render::{FontSet, FrameRenderer, RenderStyle};
use epb_core::synthesis::{check_synthesizer, GoogleSynthesizer, VoiceTable};

#[derive(Parser)]
#[command(name = "episode-builder")]
#[command(version, about = "Build narrated, audio-timed video episodes from script files")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build one episode per script file
    Build {
        /// Episode script documents (JSON)
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Prefix prepended to every episode id
        #[arg(long)]
        id_prefix: Option<String>,
    },
    /// Check that the encoder tools and the synthesizer are reachable
    Check,
    /// Write a settings file with all defaults
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("", "", "episode-builder")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("settings.toml"))
}

fn load_config(path: &Path) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading settings from {}", path.display()))?;
    manager
        .ensure_dirs_exist()
        .context("creating configured folders")?;
    Ok(manager)
}

fn tool_runner(settings: &Settings) -> ToolRunner {
    ToolRunner::new(Duration::from_secs(settings.encoder.tool_timeout_secs.max(1)))
}

fn build_encoder(settings: &Settings) -> FfmpegEncoder {
    FfmpegEncoder::new(
        &settings.encoder.ffmpeg_path,
        tool_runner(settings),
        ClipFormat::from_settings(&settings.video, &settings.encoder),
        AudioFormat::from_settings(&settings.audio, &settings.encoder),
    )
}

fn build_probe(settings: &Settings) -> FfprobeProbe {
    FfprobeProbe::new(
        &settings.encoder.ffprobe_path,
        ToolRunner::new(Duration::from_secs(settings.encoder.probe_timeout_secs.max(1))),
    )
}

async fn build_services(settings: &Settings) -> Result<Services> {
    let synthesizer =
        GoogleSynthesizer::from_settings(&settings.synthesis, settings.audio.sample_rate)
            .context("setting up the speech synthesizer")?;

    let fonts = FontSet::load(&settings.video, Path::new(&settings.paths.fonts_folder))
        .await
        .context("loading fonts")?;
    let painter = FrameRenderer::new(RenderStyle::from_settings(&settings.video), fonts);

    Ok(Services {
        synthesizer: Arc::new(synthesizer),
        encoder: Arc::new(build_encoder(settings)),
        probe: Arc::new(build_probe(settings)),
        painter: Arc::new(painter),
    })
}

fn print_result(result: &EpisodeResult) {
    if result.success {
        println!(
            "{} {} {}",
            style("✓").green().bold(),
            style(&result.episode).bold(),
            style(format!("({:.1}s)", result.elapsed_secs)).dim()
        );
        if let Some(ref outputs) = result.outputs {
            for path in outputs.paths() {
                println!("    {}", style(path.display()).dim());
            }
        }
    } else {
        println!(
            "{} {} failed at {}: {}",
            style("✗").red().bold(),
            style(&result.episode).bold(),
            style(result.failed_step.as_deref().unwrap_or("unknown")).yellow(),
            result.error.as_deref().unwrap_or_default()
        );
    }
}

async fn run_build(
    manager: &ConfigManager,
    scripts: Vec<PathBuf>,
    prefix: Option<String>,
) -> Result<()> {
    let settings = manager.settings().clone();
    let services = build_services(&settings).await?;

    let jobs: Vec<EpisodeJob> = scripts
        .into_iter()
        .map(|path| EpisodeJob::from_path(path, prefix.as_deref()))
        .collect();

    let runner = BatchRunner::new(
        settings.clone(),
        manager.logs_folder(),
        PathBuf::from(&settings.paths.temp_root),
        PathBuf::from(&settings.paths.output_folder),
        services,
    );

    let cancel = CancelHandle::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{} finishing current step, then stopping",
                style("Interrupted:").yellow()
            );
            on_ctrl_c.cancel();
        }
    });

    println!(
        "\n{}  {}\n",
        style("episode-builder").cyan().bold(),
        style(format!("{} episode(s)", jobs.len())).dim()
    );

    let results = runner.run_all(&jobs, &cancel).await;
    for result in &results {
        print_result(result);
    }

    let failed = results.iter().filter(|r| !r.success).count();
    let skipped = jobs.len() - results.len();
    println!(
        "\n{} built, {} failed{}",
        style(results.len() - failed).green(),
        style(failed).red(),
        if skipped > 0 {
            format!(", {} not started", skipped)
        } else {
            String::new()
        }
    );

    if failed > 0 || skipped > 0 {
        bail!("{} of {} episode(s) did not build", failed + skipped, jobs.len());
    }
    Ok(())
}

async fn run_check(manager: &ConfigManager) -> Result<()> {
    let settings = manager.settings();
    let timeout = Duration::from_secs(settings.encoder.probe_timeout_secs.max(1));
    let mut ok = true;

    for program in [&settings.encoder.ffmpeg_path, &settings.encoder.ffprobe_path] {
        match check_tool(program, timeout).await {
            Ok(version) => println!("{} {}", style("✓").green().bold(), version),
            Err(e) => {
                ok = false;
                println!("{} {}: {}", style("✗").red().bold(), program, e);
            }
        }
    }

    match manager.api_key() {
        Ok(_) => {
            let synth =
                GoogleSynthesizer::from_settings(&settings.synthesis, settings.audio.sample_rate)?;
            let voices = VoiceTable::from_settings(&settings.synthesis);
            let dir = tempfile::tempdir().context("creating check directory")?;
            match check_synthesizer(&synth, voices.narrator(), dir.path()).await {
                Ok(_) => println!("{} speech synthesizer", style("✓").green().bold()),
                Err(e) => {
                    ok = false;
                    println!("{} speech synthesizer: {}", style("✗").red().bold(), e);
                }
            }
        }
        Err(e) => {
            ok = false;
            println!("{} speech synthesizer: {}", style("✗").red().bold(), e);
        }
    }

    if !ok {
        bail!("environment check failed");
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    ConfigManager::new(path)
        .save()
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} wrote {}", style("✓").green().bold(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);

    if let Command::InitConfig { force } = cli.command {
        init_tracing(LogLevel::Info, None);
        return run_init_config(&config_path, force);
    }

    let manager = load_config(&config_path)?;
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        manager.settings().logging.level
    };
    let _guard = init_tracing(level, Some(&manager.logs_folder()));
    tracing::debug!(config = %config_path.display(), "Settings loaded");

    match cli.command {
        Command::Build { scripts, id_prefix } => run_build(&manager, scripts, id_prefix).await,
        Command::Check => run_check(&manager).await,
        Command::InitConfig { .. } => Ok(()),
    }
}
