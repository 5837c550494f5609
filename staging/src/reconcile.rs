use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use tracing::info;
use tracing::warn;

/// Scans `staging_dir` and deletes any file not in `active_paths` whose
/// modification time is older than `grace_period`. Returns the paths that were deleted.
pub async fn reconcile_orphans(
    staging_dir: &Path,
    active_paths: &HashSet<PathBuf>,
    grace_period: Duration,
) -> std::io::Result<Vec<PathBuf>> {
    let mut deleted = Vec::new();
    let mut entries = tokio::fs::read_dir(staging_dir).await?;
    let now = SystemTime::now();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if active_paths.contains(&path) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not stat staged file during reconciliation");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or(Duration::MAX);
        if age < grace_period {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "deleted orphaned staged file");
                deleted.push(path);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete orphaned staged file");
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn deletes_orphans_older_than_the_grace_period_and_spares_active_or_young_files() {
        let dir = tempdir().unwrap();
        let orphan = dir.path().join("orphan.wav");
        let active = dir.path().join("active.wav");
        let young = dir.path().join("young.wav");
        fs::write(&orphan, b"a").unwrap();
        fs::write(&active, b"a").unwrap();
        fs::write(&young, b"a").unwrap();

        let old_time = SystemTime::now() - Duration::from_secs(3600);
        filetime::set_file_mtime(&orphan, filetime::FileTime::from_system_time(old_time)).unwrap();
        filetime::set_file_mtime(&active, filetime::FileTime::from_system_time(old_time)).unwrap();

        let mut active_paths = HashSet::new();
        active_paths.insert(active.clone());

        let deleted = reconcile_orphans(dir.path(), &active_paths, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(deleted, vec![orphan.clone()]);
        assert!(!orphan.exists());
        assert!(active.exists());
        assert!(young.exists());
    }
}
