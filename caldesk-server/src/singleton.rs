//! Keeps a second server from writing the same event file.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Holds the lock until dropped
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Lock the event file at `data_path`, failing if another instance holds it.
pub fn acquire_lock(data_path: &Path) -> Result<LockGuard> {
    let path = lock_path(data_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another caldesk-server instance is already using {}.\n\
            If you believe this is an error, remove: {}",
            data_path.display(),
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_on_same_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("events.json");

        let guard = acquire_lock(&data_path).unwrap();
        assert_eq!(guard.path(), dir.path().join("events.json.lock"));
        assert!(acquire_lock(&data_path).is_err());

        drop(guard);
        assert!(acquire_lock(&data_path).is_ok());
    }
}
