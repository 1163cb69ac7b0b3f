use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// Remove a file that is no longer needed.
///
/// Cleanup never fails the caller: a missing file is fine, any other error is
/// logged and dropped. Inbox rotation, expiry and draining all delete through
/// here so a stuck file can't block message delivery.
pub async fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} already gone", path.display());
        }
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove a directory tree under the same policy as
/// [`remove_file_best_effort`]. Used to undo a half-finished registration.
pub async fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} already gone", path.display());
        }
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
