//! Host capability probing
//!
//! Decides whether the current host can run a given test: effective
//! privilege and the mode the cgroup hierarchy is mounted in. Everything
//! here is read-only.
use nix::sys::statfs::{statfs, CGROUP2_SUPER_MAGIC, TMPFS_MAGIC};
use nix::unistd::geteuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// How the host cgroup filesystem is mounted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CgroupMode {
    /// cgroup v2 mounted directly on the root
    Unified,
    /// v1 controller hierarchies under a tmpfs root
    Legacy,
    /// Probe failed or the filesystem type is not recognized
    Unknown,
}

impl fmt::Display for CgroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CgroupMode::Unified => "unified (cgroup v2)",
            CgroupMode::Legacy => "legacy (cgroup v1)",
            CgroupMode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// True iff the effective user is root
pub fn is_privileged() -> bool {
    geteuid().is_root()
}

pub fn cgroup_mode() -> CgroupMode {
    cgroup_mode_at(Path::new(CGROUP_ROOT))
}

/// Classify the filesystem mounted at `path` by its superblock magic.
pub fn cgroup_mode_at(path: &Path) -> CgroupMode {
    match statfs(path) {
        Ok(fs) if fs.filesystem_type() == CGROUP2_SUPER_MAGIC => CgroupMode::Unified,
        Ok(fs) if fs.filesystem_type() == TMPFS_MAGIC => CgroupMode::Legacy,
        Ok(fs) => {
            log::debug!(
                "unrecognized filesystem type {:?} at {}",
                fs.filesystem_type(),
                path.display()
            );
            CgroupMode::Unknown
        }
        Err(e) => {
            log::warn!("statfs({}) failed: {}", path.display(), e);
            CgroupMode::Unknown
        }
    }
}

/// Snapshot of the host taken once at startup
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostEnvironment {
    pub privileged: bool,
    pub cgroup_mode: CgroupMode,
    /// Set when a v1 `pids` hierarchy is mounted at `<root>/pids`
    pub legacy_pids_hierarchy: bool,
}

impl HostEnvironment {
    pub fn probe() -> Self {
        Self::probe_at(Path::new(CGROUP_ROOT))
    }

    pub fn probe_at(cgroup_root: &Path) -> Self {
        let env = Self {
            privileged: is_privileged(),
            cgroup_mode: cgroup_mode_at(cgroup_root),
            legacy_pids_hierarchy: cgroup_root.join("pids").is_dir(),
        };
        log::debug!(
            "host: privileged={} cgroup={} legacy_pids={}",
            env.privileged,
            env.cgroup_mode,
            env.legacy_pids_hierarchy
        );
        env
    }

    /// Privileged and on cgroup v2. An `Unknown` mode never qualifies.
    pub fn is_privileged_unified(&self) -> bool {
        self.privileged && self.cgroup_mode == CgroupMode::Unified
    }

    /// Path of `pids.max` as seen from inside a container.
    ///
    /// Mirrors the host layout: a v1 host exposes the pids controller in
    /// its own hierarchy, a v2 host exposes it at the cgroup root.
    pub fn container_pids_max_path(&self) -> PathBuf {
        let root = Path::new(CGROUP_ROOT);
        if self.legacy_pids_hierarchy {
            root.join("pids").join("pids.max")
        } else {
            root.join("pids.max")
        }
    }
}
