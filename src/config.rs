//! Paths, delays and service names used when talking to the host.
//!
//! The defaults match a stock Linux host. Everything can be overridden with
//! the `with_*` setters, and the filesystem paths and settle delay can also
//! come from the environment through [`Config::from_env`], which is how the
//! tests and unusual hosts point the crate elsewhere.
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`Config::route_table`].
pub const ENV_ROUTE_TABLE: &str = "CREAK_ROUTE_TABLE";
/// Environment variable overriding [`Config::arp_table`].
pub const ENV_ARP_TABLE: &str = "CREAK_ARP_TABLE";
/// Environment variable overriding [`Config::ip_forward`].
pub const ENV_IP_FORWARD: &str = "CREAK_IP_FORWARD";
/// Environment variable overriding [`Config::settle_delay`], in milliseconds.
pub const ENV_SETTLE_MS: &str = "CREAK_SETTLE_MS";

/// How the host manages its services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    SysV,
}

impl InitSystem {
    /// systemd creates `/run/systemd/system` early in boot; its presence is
    /// the documented way to tell whether systemd is PID 1.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_in(Path::new("/"))
    }

    /// Same as [`InitSystem::detect`] against an alternative root.
    #[must_use]
    pub fn detect_in(root: &Path) -> Self {
        if root.join("run/systemd/system").is_dir() {
            InitSystem::Systemd
        } else {
            InitSystem::SysV
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Kernel routing table, `/proc/net/route` format.
    pub route_table: PathBuf,
    /// Kernel neighbor cache, `/proc/net/arp` format.
    pub arp_table: PathBuf,
    /// IPv4 forwarding toggle.
    pub ip_forward: PathBuf,
    /// Files tried, in order, for a host-wide identifier when an interface's
    /// hardware address cannot be read.
    pub machine_id: Vec<PathBuf>,
    /// Time given to the kernel to record a neighbor after a probe.
    pub settle_delay: Duration,
    /// Bound on a single probe when the caller does not give one.
    pub probe_timeout: Duration,
    pub init_system: InitSystem,
    /// Service restarted after a MAC change with systemd.
    pub network_service: String,
    /// Script restarted after a MAC change without systemd.
    pub network_script: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route_table: PathBuf::from("/proc/net/route"),
            arp_table: PathBuf::from("/proc/net/arp"),
            ip_forward: PathBuf::from("/proc/sys/net/ipv4/ip_forward"),
            machine_id: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
            settle_delay: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
            init_system: InitSystem::detect(),
            network_service: "NetworkManager".to_string(),
            network_script: PathBuf::from("/etc/init.d/networking"),
        }
    }
}

impl Config {
    /// Defaults with any `CREAK_*` overrides from the environment applied.
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        if let Some(path) = var(ENV_ROUTE_TABLE) {
            self.route_table = path.into();
        }
        if let Some(path) = var(ENV_ARP_TABLE) {
            self.arp_table = path.into();
        }
        if let Some(path) = var(ENV_IP_FORWARD) {
            self.ip_forward = path.into();
        }
        if let Some(ms) = var(ENV_SETTLE_MS) {
            match ms.trim().parse() {
                Ok(ms) => self.settle_delay = Duration::from_millis(ms),
                Err(err) => log::warn!("ignoring {ENV_SETTLE_MS}={ms:?}: {err}"),
            }
        }
        self
    }

    #[must_use]
    pub fn with_route_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.route_table = path.into();
        self
    }

    #[must_use]
    pub fn with_arp_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.arp_table = path.into();
        self
    }

    #[must_use]
    pub fn with_ip_forward(mut self, path: impl Into<PathBuf>) -> Self {
        self.ip_forward = path.into();
        self
    }

    #[must_use]
    pub fn with_machine_id(mut self, paths: Vec<PathBuf>) -> Self {
        self.machine_id = paths;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_init_system(mut self, init: InitSystem) -> Self {
        self.init_system = init;
        self
    }

    #[must_use]
    pub fn with_network_service(mut self, service: impl Into<String>) -> Self {
        self.network_service = service.into();
        self
    }
}
