//! Change host network state: IPv4 forwarding and interface MAC addresses.
//!
//! Mutations are logged at `info`. A multi-command operation stops at the
//! first failing command and reports which step it was; nothing is rolled
//! back, so the whole operation can simply be retried.
use std::fs;
use std::time::Duration;

use crate::addr::MacAddr;
use crate::config::{Config, InitSystem};
use crate::exec::{run_step, CommandRunner, Step, SystemRunner};
use crate::{Error, Result};

// Bound on each interface command. Bringing a wireless link up can be slow.
const LINK_TIMEOUT: Duration = Duration::from_secs(10);
const RESTART_TIMEOUT: Duration = Duration::from_secs(60);

/// Applies network configuration changes to the host.
pub struct NetworkController<R: CommandRunner> {
    config: Config,
    runner: R,
}

impl NetworkController<SystemRunner> {
    /// A controller for this host with configuration from the environment.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Config::from_env(), SystemRunner::new())
    }
}

impl<R: CommandRunner> NetworkController<R> {
    #[must_use]
    pub fn new(config: Config, runner: R) -> Self {
        Self { config, runner }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Turn IPv4 forwarding on or off. Setting the current value again is a
    /// no-op as far as the file contents go.
    ///
    /// # Errors
    ///
    /// [`Error::WriteFailure`] when the control file cannot be written.
    pub fn set_ip_forwarding(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1\n" } else { "0\n" };
        fs::write(&self.config.ip_forward, value).map_err(|source| Error::WriteFailure {
            path: self.config.ip_forward.clone(),
            source,
        })?;
        log::info!(
            "ip forwarding {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Like [`NetworkController::set_ip_forwarding`] for callers holding the
    /// raw flag.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidValue`] for anything but 0 or 1, otherwise as
    /// [`NetworkController::set_ip_forwarding`].
    pub fn set_ip_forwarding_value(&self, value: u8) -> Result<()> {
        match value {
            0 => self.set_ip_forwarding(false),
            1 => self.set_ip_forwarding(true),
            _ => Err(Error::InvalidValue {
                target: "ip forwarding",
                value: value.to_string(),
            }),
        }
    }

    /// Whether IPv4 forwarding is currently on.
    ///
    /// # Errors
    ///
    /// Fails when the control file cannot be read or holds something other
    /// than `0` or `1`.
    pub fn ip_forwarding(&self) -> Result<bool> {
        let text = fs::read_to_string(&self.config.ip_forward)?;
        match text.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(Error::ParseFailure {
                kind: "ip forwarding flag",
                input: other.to_string(),
            }),
        }
    }

    /// Give `device` a new hardware address.
    ///
    /// Uses `ip link` when available. Otherwise falls back to `ifconfig`,
    /// after which the networking service is restarted so that it picks up
    /// the new address.
    ///
    /// # Errors
    ///
    /// [`Error::ExternalToolFailure`] naming the step that failed. Earlier
    /// steps are left in place, so the interface may be down.
    pub fn change_mac_address(&self, device: &str, mac: MacAddr) -> Result<()> {
        let mac_text = mac.to_string();
        log::info!("changing hardware address of {device} to {mac_text}");

        if self.runner.has_program("ip") {
            self.link_step(Step::InterfaceDown, "ip", &["link", "set", "dev", device, "down"])?;
            self.link_step(
                Step::SetAddress,
                "ip",
                &["link", "set", "dev", device, "address", &mac_text],
            )?;
            self.link_step(Step::InterfaceUp, "ip", &["link", "set", "dev", device, "up"])?;
        } else {
            log::debug!("ip not found, using ifconfig");
            self.link_step(Step::InterfaceDown, "ifconfig", &[device, "down"])?;
            self.link_step(Step::SetAddress, "ifconfig", &[device, "hw", "ether", &mac_text])?;
            self.link_step(Step::InterfaceUp, "ifconfig", &[device, "up"])?;
            self.restart_networking()?;
        }

        log::info!("{device} is now {mac_text}");
        Ok(())
    }

    /// Restart the host's networking service through its init system.
    ///
    /// # Errors
    ///
    /// [`Error::ExternalToolFailure`] for [`Step::NetworkRestart`].
    pub fn restart_networking(&self) -> Result<()> {
        match self.config.init_system {
            InitSystem::Systemd => {
                let service = self.config.network_service.as_str();
                log::info!("restarting {service}");
                run_step(
                    &self.runner,
                    Step::NetworkRestart,
                    "systemctl",
                    &["restart", service],
                    Some(RESTART_TIMEOUT),
                )?;
            }
            InitSystem::SysV => {
                let script = self.config.network_script.to_string_lossy();
                log::info!("restarting networking with {script}");
                run_step(
                    &self.runner,
                    Step::NetworkRestart,
                    &script,
                    &["restart"],
                    Some(RESTART_TIMEOUT),
                )?;
            }
        }
        Ok(())
    }

    fn link_step(&self, step: Step, program: &str, args: &[&str]) -> Result<()> {
        run_step(&self.runner, step, program, args, Some(LINK_TIMEOUT))?;
        Ok(())
    }
}

/// Name the manufacturer of the host's wireless network controller, as
/// reported by `lspci`.
///
/// # Errors
///
/// [`Error::ExternalToolFailure`] when `lspci` fails, [`Error::NotFound`] when
/// it lists no wireless controller.
pub fn wireless_device_brand<R: CommandRunner + ?Sized>(runner: &R) -> Result<String> {
    let output = run_step(runner, Step::DeviceQuery, "lspci", &[], Some(Duration::from_secs(5)))?;
    output
        .stdout
        .lines()
        .find_map(brand_from_lspci_line)
        .ok_or(Error::NotFound("wireless network controller"))
}

fn brand_from_lspci_line(line: &str) -> Option<String> {
    const CONTROLLER: &str = "Network controller:";
    let start = line.find(CONTROLLER)? + CONTROLLER.len();
    let rest = &line[start..];
    let end = rest.find("Wireless")?;
    let brand = rest[..end].trim();
    (!brand.is_empty()).then(|| brand.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandOutput, DryRunner};
    use std::path::Path;

    fn controller(dir: &Path, runner: DryRunner, init: InitSystem) -> NetworkController<DryRunner> {
        let config = Config::default()
            .with_ip_forward(dir.join("ip_forward"))
            .with_init_system(init);
        NetworkController::new(config, runner)
    }

    #[test]
    fn enabling_forwarding_twice_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let net = controller(dir.path(), DryRunner::new(), InitSystem::Systemd);
        let path = dir.path().join("ip_forward");

        net.set_ip_forwarding(true)?;
        let once = fs::read(&path)?;
        net.set_ip_forwarding(true)?;
        assert_eq!(fs::read(&path)?, once);
        assert_eq!(once, b"1\n");
        assert!(net.ip_forwarding()?);

        net.set_ip_forwarding(false)?;
        assert_eq!(fs::read(&path)?, b"0\n");
        assert!(!net.ip_forwarding()?);
        Ok(())
    }

    #[test]
    fn forwarding_value_must_be_a_flag() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let net = controller(dir.path(), DryRunner::new(), InitSystem::Systemd);
        net.set_ip_forwarding_value(1)?;
        assert!(net.ip_forwarding()?);
        assert!(matches!(
            net.set_ip_forwarding_value(2),
            Err(Error::InvalidValue { value, .. }) if value == "2"
        ));
        assert!(net.ip_forwarding()?);
        Ok(())
    }

    #[test]
    fn unwritable_forwarding_path_is_write_failure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::default().with_ip_forward(dir.path().join("missing/ip_forward"));
        let net = NetworkController::new(config, DryRunner::new());
        assert!(matches!(net.set_ip_forwarding(true), Err(Error::WriteFailure { .. })));
        Ok(())
    }

    #[test]
    fn garbage_forwarding_flag_is_parse_failure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("ip_forward"), "yes\n")?;
        let net = controller(dir.path(), DryRunner::new(), InitSystem::Systemd);
        assert!(matches!(net.ip_forwarding(), Err(Error::ParseFailure { .. })));
        Ok(())
    }

    #[test]
    fn mac_change_uses_ip_link() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let net = controller(dir.path(), DryRunner::new(), InitSystem::Systemd);
        net.change_mac_address("wlan0", MacAddr::new(0x02, 0x16, 0x3e, 0x01, 0x02, 0x03))?;
        assert_eq!(
            net.runner().calls(),
            vec![
                vec!["ip", "link", "set", "dev", "wlan0", "down"],
                vec!["ip", "link", "set", "dev", "wlan0", "address", "02:16:3e:01:02:03"],
                vec!["ip", "link", "set", "dev", "wlan0", "up"],
            ]
        );
        Ok(())
    }

    #[test]
    fn mac_change_falls_back_to_ifconfig_and_restarts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let net = controller(dir.path(), DryRunner::new().missing("ip"), InitSystem::Systemd);
        net.change_mac_address("eth0", MacAddr::new(0x00, 0x16, 0x3e, 0xaa, 0xbb, 0xcc))?;
        assert_eq!(
            net.runner().calls(),
            vec![
                vec!["ifconfig", "eth0", "down"],
                vec!["ifconfig", "eth0", "hw", "ether", "00:16:3e:aa:bb:cc"],
                vec!["ifconfig", "eth0", "up"],
                vec!["systemctl", "restart", "NetworkManager"],
            ]
        );
        Ok(())
    }

    #[test]
    fn sysv_restart_runs_init_script() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let net = controller(dir.path(), DryRunner::new(), InitSystem::SysV);
        net.restart_networking()?;
        assert_eq!(net.runner().calls(), vec![vec!["/etc/init.d/networking", "restart"]]);
        Ok(())
    }

    #[test]
    fn mac_change_stops_at_failing_step() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let runner = DryRunner::new()
            .respond("ip", CommandOutput::ok(""))
            .respond("ip", CommandOutput::failed(2, "RTNETLINK answers: Operation not permitted"));
        let net = controller(dir.path(), runner, InitSystem::Systemd);

        let err = net
            .change_mac_address("wlan0", MacAddr::new(0x02, 0, 0, 0, 0, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ExternalToolFailure { step: Step::SetAddress, status: Some(2), .. }
        ));
        // Down and set-address ran, up did not.
        assert_eq!(net.runner().calls().len(), 2);
        Ok(())
    }

    #[test]
    fn finds_wireless_brand() -> Result<()> {
        let runner = DryRunner::new().respond(
            "lspci",
            CommandOutput::ok(
                "00:02.0 VGA compatible controller: Intel Corporation HD Graphics 620 (rev 02)\n\
                 02:00.0 Network controller: Intel Corporation Wireless 8265 / 8275 (rev 78)\n",
            ),
        );
        assert_eq!(wireless_device_brand(&runner)?, "Intel Corporation");
        Ok(())
    }

    #[test]
    fn no_wireless_controller_is_not_found() {
        let runner = DryRunner::new().respond(
            "lspci",
            CommandOutput::ok("00:1f.6 Ethernet controller: Intel Corporation Ethernet Connection I219-LM\n"),
        );
        assert!(matches!(wireless_device_brand(&runner), Err(Error::NotFound(_))));
    }
}
