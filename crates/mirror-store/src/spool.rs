//! Scratch files for uploads.

use mirror_core::{Error, Result};
use std::path::PathBuf;
use tempfile::TempPath;

/// Name prefix of scratch files.
pub(crate) const STAGING_PREFIX: &str = ".httpmirror-";

/// Create an empty scratch file, in `dir` when given, otherwise in the
/// system temp directory. The file is removed when the path is dropped.
///
/// File creation is blocking, so it runs on the blocking pool.
pub(crate) async fn staging_path(dir: Option<PathBuf>) -> Result<TempPath> {
    let created = tokio::task::spawn_blocking(move || {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("staging task failed: {}", e)))??;
    Ok(created.into_temp_path())
}
