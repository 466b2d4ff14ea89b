//! On-disk OCI bundles
use crate::config::RuntimeConfig;
use crate::types::{HarnessError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directories created inside every rootfs
const ROOTFS_DIRS: [&str; 9] = [
    "usr/bin", "etc", "var", "lib", "lib64", "proc", "sys", "dev", "tmp",
];

/// A bundle directory: `config.json` plus a skeleton `rootfs/`.
///
/// Removed on drop unless [`Bundle::keep`] was called.
#[derive(Debug)]
pub struct Bundle {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Bundle {
    /// Create a fresh bundle for `config` under `root` (system temp if `None`).
    pub fn create(
        root: Option<&Path>,
        config: &RuntimeConfig,
        init_path: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("rescheck-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();

        let rootfs = path.join(&config.root.path);
        for sub in ROOTFS_DIRS {
            fs::create_dir_all(rootfs.join(sub))?;
        }

        if let Some(init) = init_path {
            if !init.is_file() {
                return Err(HarnessError::Config(format!(
                    "init helper {} is not a file",
                    init.display()
                )));
            }
            fs::copy(init, rootfs.join("init"))?;
        }

        fs::write(path.join("config.json"), config.to_json()?)?;
        log::debug!("created bundle at {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.json")
    }

    /// Leave the directory on disk when the bundle is dropped.
    pub fn keep(&mut self) {
        if let Some(dir) = self.dir.take() {
            // Forgetting the TempDir skips its removal
            std::mem::forget(dir);
            log::info!("keeping bundle {}", self.path.display());
        }
    }
}
