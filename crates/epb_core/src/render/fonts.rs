//! Font loading and on-demand download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fontdue::{Font, FontSettings};

use super::wrap::TextMeasure;
use super::RenderError;
use crate::config::VideoSettings;

impl TextMeasure for Font {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.metrics(ch, size).advance_width)
            .sum()
    }
}

/// Where a font lives and where to fetch it from if it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSource {
    pub path: PathBuf,
    /// Empty disables downloading.
    pub url: String,
}

impl FontSource {
    /// Resolve `configured` against `fonts_dir` unless it is absolute.
    pub fn new(configured: &str, url: &str, fonts_dir: &Path) -> Self {
        let configured = Path::new(configured);
        let path = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            fonts_dir.join(configured)
        };
        Self {
            path,
            url: url.trim().to_string(),
        }
    }
}

/// The two faces every frame is drawn with.
#[derive(Clone)]
pub struct FontSet {
    /// Source-language text.
    pub primary: Font,
    /// Translated text and branding.
    pub secondary: Font,
}

impl FontSet {
    /// Load both fonts, downloading any that are missing.
    pub async fn load(settings: &VideoSettings, fonts_dir: &Path) -> Result<Self, RenderError> {
        let timeout = Duration::from_secs(settings.font_download_timeout_secs.max(1));
        let primary = FontSource::new(&settings.primary_font, &settings.primary_font_url, fonts_dir);
        let secondary = FontSource::new(
            &settings.secondary_font,
            &settings.secondary_font_url,
            fonts_dir,
        );

        Ok(Self {
            primary: load_font(&primary, timeout).await?,
            secondary: load_font(&secondary, timeout).await?,
        })
    }
}

async fn load_font(source: &FontSource, timeout: Duration) -> Result<Font, RenderError> {
    if tokio::fs::metadata(&source.path).await.is_err() {
        if source.url.is_empty() {
            return Err(RenderError::FontMissing(source.path.clone()));
        }
        download_font(source, timeout).await?;
    }

    let bytes = tokio::fs::read(&source.path)
        .await
        .map_err(|e| RenderError::io(&source.path, e))?;
    parse_font(bytes, &source.path)
}

fn parse_font(bytes: Vec<u8>, path: &Path) -> Result<Font, RenderError> {
    Font::from_bytes(bytes, FontSettings::default()).map_err(|message| RenderError::FontParse {
        path: path.to_path_buf(),
        message: message.to_string(),
    })
}

/// Fetch a font into place. The file only appears once fully written.
async fn download_font(source: &FontSource, timeout: Duration) -> Result<(), RenderError> {
    tracing::info!(url = %source.url, path = %source.path.display(), "Downloading font");

    let failed = |message: String| RenderError::FontDownload {
        url: source.url.clone(),
        message,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;
    let bytes = client
        .get(&source.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| failed(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if let Some(parent) = source.path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RenderError::io(parent, e))?;
    }
    let partial = source.path.with_extension("download");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| RenderError::io(&partial, e))?;
    tokio::fs::rename(&partial, &source.path)
        .await
        .map_err(|e| RenderError::io(&source.path, e))?;

    tracing::info!(bytes = bytes.len(), "Font downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn relative_fonts_resolve_against_dir() {
        let source = FontSource::new("Noto.otf", " https://x/y.otf ", Path::new("/data/fonts"));
        assert_eq!(source.path, PathBuf::from("/data/fonts/Noto.otf"));
        assert_eq!(source.url, "https://x/y.otf");

        let absolute = FontSource::new("/usr/share/fonts/a.ttf", "", Path::new("/data/fonts"));
        assert_eq!(absolute.path, PathBuf::from("/usr/share/fonts/a.ttf"));
    }

    #[tokio::test]
    async fn missing_font_without_url_fails() {
        let dir = tempdir().unwrap();
        let source = FontSource::new("absent.otf", "", dir.path());
        let err = load_font(&source, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RenderError::FontMissing(_)));
    }

    #[tokio::test]
    async fn corrupt_font_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.otf"), b"not a font").unwrap();
        let source = FontSource::new("bad.otf", "", dir.path());
        let err = load_font(&source, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RenderError::FontParse { .. }));
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let dir = tempdir().unwrap();
        let source = FontSource::new("net.otf", "http://127.0.0.1:9/net.otf", dir.path());
        let err = load_font(&source, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, RenderError::FontDownload { .. }));
        assert!(!source.path.exists());
    }
}
