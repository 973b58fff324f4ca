//! Moving finished artifacts to their final location.
//!
//! Outputs are always produced inside the run's working directory and only
//! published once the whole episode succeeded, so a final path never holds
//! a partially written file.

use std::io;
use std::path::{Path, PathBuf};

/// Path used while copying across filesystems.
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.partial", name))
}

/// Move `src` to `dest`.
///
/// Tries a rename first. When that fails (typically a cross-device move)
/// the file is copied to a hidden partial path beside `dest`, renamed into
/// place, and the source removed. Once `dest` is in place the move counts
/// as done; a source that cannot be removed is only logged.
pub async fn publish_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }

    let partial = partial_path(dest);
    if let Err(e) = tokio::fs::copy(src, &partial).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&partial, dest).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }
    discard_source(src).await;
    Ok(())
}

async fn discard_source(src: &Path) {
    if let Err(e) = tokio::fs::remove_file(src).await {
        tracing::warn!(path = %src.display(), error = %e, "Published copy, source left behind");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn moves_into_new_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("work").join("ep.mp4");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, "video").unwrap();
        let dest = dir.path().join("out").join("ep.mp4");

        publish_file(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "video");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn missing_source_fails() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("ep.mp4");
        assert!(publish_file(&dir.path().join("nope.mp4"), &dest).await.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn leftover_source_is_not_an_error() {
        let dir = tempdir().unwrap();
        // Already gone: nothing to remove, nothing to report
        discard_source(&dir.path().join("gone.mp4")).await;

        let src = dir.path().join("ep.mp3");
        std::fs::write(&src, "audio").unwrap();
        discard_source(&src).await;
        assert!(!src.exists());
    }

    #[test]
    fn partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("/out/ep.mp3")),
            PathBuf::from("/out/.ep.mp3.partial")
        );
    }
}
