//! Persistence of `/detect/` uploads

use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use vigil_eye::frame::guess_extension;

/// Write upload bytes to `dir/<uuid>.<ext>`, creating `dir` if needed
pub async fn persist_upload(dir: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(format!("{}.{}", Uuid::new_v4(), guess_extension(bytes)));
    tokio::fs::write(&path, bytes).await?;

    debug!(path = %path.display(), size = bytes.len(), "Stored upload");
    Ok(path)
}
