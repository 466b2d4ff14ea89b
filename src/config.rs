//! OCI runtime-spec configuration builder
//!
//! Only the fields the harness sets are modelled. Every test starts from
//! [`RuntimeConfig::base`] so no state leaks between tests. The builder
//! never validates resource keys: rejecting bad keys is the runtime's job
//! and exactly what the negative tests probe.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const OCI_VERSION: &str = "1.0.0";

/// Top-level runtime-spec document (`config.json`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub oci_version: String,
    pub process: Process,
    pub root: Root,
    pub hostname: String,
    pub mounts: Vec<Mount>,
    pub linux: Linux,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub terminal: bool,
    pub user: User,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub no_new_privileges: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub path: String,
    pub readonly: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    pub destination: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Mount {
    fn new(destination: &str, kind: &str, source: &str, options: &[&str]) -> Self {
        Self {
            destination: destination.to_string(),
            kind: kind.to_string(),
            source: source.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    pub namespaces: Vec<Namespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masked_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readonly_paths: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    Pid,
    Ipc,
    Uts,
    Mount,
    Network,
    User,
    Cgroup,
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamespaceKind::Pid => "pid",
            NamespaceKind::Ipc => "ipc",
            NamespaceKind::Uts => "uts",
            NamespaceKind::Mount => "mount",
            NamespaceKind::Network => "network",
            NamespaceKind::User => "user",
            NamespaceKind::Cgroup => "cgroup",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(rename = "type")]
    pub kind: NamespaceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<Pids>,
    /// cgroup v2 `controller.key` → value, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pids {
    pub limit: i64,
}

/// Namespaces every isolated test container gets
const ISOLATION_NAMESPACES: [NamespaceKind; 5] = [
    NamespaceKind::Pid,
    NamespaceKind::Ipc,
    NamespaceKind::Uts,
    NamespaceKind::Mount,
    NamespaceKind::Network,
];

impl RuntimeConfig {
    /// Minimal valid template: no namespaces, no resources, no args.
    pub fn base() -> Self {
        Self {
            oci_version: OCI_VERSION.to_string(),
            process: Process {
                terminal: false,
                user: User { uid: 0, gid: 0 },
                args: Vec::new(),
                env: vec![
                    "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
                    "TERM=xterm".to_string(),
                ],
                cwd: "/".to_string(),
                no_new_privileges: true,
            },
            root: Root {
                path: "rootfs".to_string(),
                readonly: true,
            },
            hostname: "rescheck".to_string(),
            mounts: vec![
                Mount::new("/proc", "proc", "proc", &[]),
                Mount::new(
                    "/dev",
                    "tmpfs",
                    "tmpfs",
                    &["nosuid", "strictatime", "mode=755", "size=65536k"],
                ),
                Mount::new(
                    "/dev/pts",
                    "devpts",
                    "devpts",
                    &["nosuid", "noexec", "newinstance", "ptmxmode=0666", "mode=0620"],
                ),
                Mount::new(
                    "/dev/shm",
                    "tmpfs",
                    "shm",
                    &["nosuid", "noexec", "nodev", "mode=1777", "size=65536k"],
                ),
                Mount::new("/dev/mqueue", "mqueue", "mqueue", &["nosuid", "noexec", "nodev"]),
                Mount::new("/sys", "sysfs", "sysfs", &["nosuid", "noexec", "nodev", "ro"]),
                Mount::new(
                    "/sys/fs/cgroup",
                    "cgroup",
                    "cgroup",
                    &["nosuid", "noexec", "nodev", "relatime", "ro"],
                ),
            ],
            linux: Linux {
                namespaces: Vec::new(),
                resources: None,
                masked_paths: vec![
                    "/proc/kcore".to_string(),
                    "/proc/latency_stats".to_string(),
                    "/proc/timer_list".to_string(),
                    "/proc/sched_debug".to_string(),
                    "/sys/firmware".to_string(),
                ],
                readonly_paths: vec![
                    "/proc/bus".to_string(),
                    "/proc/fs".to_string(),
                    "/proc/irq".to_string(),
                    "/proc/sys".to_string(),
                    "/proc/sysrq-trigger".to_string(),
                ],
            },
        }
    }

    /// Append `kind` unless a namespace of that type is already declared.
    pub fn add_namespace(&mut self, kind: NamespaceKind) -> &mut Self {
        if !self.has_namespace(kind) {
            self.linux.namespaces.push(Namespace { kind, path: None });
        }
        self
    }

    /// Add the standard isolation namespaces, plus a cgroup namespace when
    /// `cgroup_ns` is set. Existing declarations are kept in place.
    pub fn add_all_namespaces(&mut self, cgroup_ns: bool) -> &mut Self {
        for kind in ISOLATION_NAMESPACES {
            self.add_namespace(kind);
        }
        if cgroup_ns {
            self.add_namespace(NamespaceKind::Cgroup);
        }
        self
    }

    pub fn has_namespace(&self, kind: NamespaceKind) -> bool {
        self.linux.namespaces.iter().any(|ns| ns.kind == kind)
    }

    pub fn set_process_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_pids_limit(&mut self, limit: i64) -> &mut Self {
        self.resources_mut().pids = Some(Pids { limit });
        self
    }

    /// Insert `key = value` into `linux.resources.unified` verbatim.
    pub fn set_unified_resource(&mut self, key: &str, value: &str) -> &mut Self {
        self.resources_mut()
            .unified
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    fn resources_mut(&mut self) -> &mut Resources {
        self.linux.resources.get_or_insert_with(Resources::default)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
