//! Per-episode logger with file and callback output.
//!
//! Each episode gets its own logger that:
//! - Writes to a dedicated log file
//! - Echoes lines to an optional callback (console)
//! - Keeps a tail buffer of external tool output for failure diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

/// Per-episode logger with dual output (file + callback).
///
/// Shared between concurrent synthesis and render tasks behind an `Arc`;
/// all mutable state sits behind `parking_lot` mutexes.
pub struct EpisodeLogger {
    episode: String,
    log_path: PathBuf,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LineCallback>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<u32>,
    started: Instant,
}

impl EpisodeLogger {
    /// Create a logger writing to `<log_dir>/<episode>.log`.
    pub fn new(
        episode: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LineCallback>,
    ) -> std::io::Result<Self> {
        let episode = episode.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&episode)));
        let file = File::create(&log_path)?;

        Ok(Self {
            episode,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            callback,
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(0),
            started: Instant::now(),
        })
    }

    pub fn episode(&self) -> &str {
        &self.episode
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.output(&self.format_message(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(episode = %self.episode, "{}", message);
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an external command about to run.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log `done` of `total` as a percentage, filtered to step boundaries.
    ///
    /// Returns true if the line was written.
    pub fn progress(&self, label: &str, done: usize, total: usize) -> bool {
        let percent = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(100) as u32
        };

        {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);
            if percent < 100 && (percent / step) <= (*last / step) {
                return false;
            }
            *last = if percent >= 100 { 0 } else { percent };
        }

        self.info(&format!("{}: {}% ({}/{})", label, percent, done, total));
        true
    }

    /// Record one line of external tool output.
    ///
    /// Always kept in the tail buffer; written to the log only outside
    /// compact mode.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 {
                while buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(line.to_string());
            }
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.output(&self.format_message(&format!("{}{}", prefix, line)));
    }

    /// Write the tail buffer to the log (typically after a tool failure).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Seconds since the logger was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and release the log file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = self.callback {
            callback(formatted);
        }
    }
}

impl Drop for EpisodeLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect()
}

/// Builder for creating an [`EpisodeLogger`].
pub struct EpisodeLoggerBuilder {
    episode: String,
    log_dir: PathBuf,
    config: LogConfig,
    callback: Option<LineCallback>,
}

impl EpisodeLoggerBuilder {
    pub fn new(episode: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            episode: episode.into(),
            log_dir: log_dir.into(),
            config: LogConfig::default(),
            callback: None,
        }
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    pub fn callback(mut self, callback: LineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn build(self) -> std::io::Result<EpisodeLogger> {
        EpisodeLogger::new(self.episode, self.log_dir, self.config, self.callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = EpisodeLogger::new("ep_001", dir.path(), LogConfig::default(), None).unwrap();

        assert!(logger.log_path().exists());
        assert!(logger.log_path().to_string_lossy().ends_with("ep_001.log"));
    }

    #[test]
    fn writes_prefixed_lines_to_file() {
        let dir = tempdir().unwrap();
        let logger = EpisodeLogger::new("ep_001", dir.path(), LogConfig::default(), None).unwrap();

        logger.phase("Audio");
        logger.command("ffprobe -v error seg.mp3");
        logger.warn("probe failed");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("=== Audio ==="));
        assert!(content.contains("$ ffprobe -v error seg.mp3"));
        assert!(content.contains("[WARNING] probe failed"));
    }

    #[test]
    fn level_filters_debug() {
        let dir = tempdir().unwrap();
        let logger = EpisodeLogger::new("ep", dir.path(), LogConfig::default(), None).unwrap();
        logger.debug("hidden detail");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(!content.contains("hidden detail"));
    }

    #[test]
    fn calls_line_callback() {
        let dir = tempdir().unwrap();
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();

        let logger = EpisodeLoggerBuilder::new("ep", dir.path())
            .callback(Box::new(move |_line| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        logger.info("one");
        logger.success("two");

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn progress_filters_to_steps() {
        let dir = tempdir().unwrap();
        let logger = EpisodeLogger::new("ep", dir.path(), LogConfig::default(), None).unwrap();

        assert!(!logger.progress("Synthesis", 1, 10));
        assert!(logger.progress("Synthesis", 2, 10));
        assert!(!logger.progress("Synthesis", 3, 10));
        assert!(logger.progress("Synthesis", 4, 10));
        assert!(logger.progress("Synthesis", 10, 10));
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let dir = tempdir().unwrap();
        let mut config = LogConfig::default();
        config.error_tail = 5;

        let logger = EpisodeLogger::new("ep", dir.path(), config, None).unwrap();

        for i in 0..10 {
            logger.output_line(&format!("Line {}", i), true);
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");

        logger.clear_tail();
        assert!(logger.get_tail().is_empty());
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
        assert_eq!(sanitize_filename("予約変更"), "予約変更");
    }
}
