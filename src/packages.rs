//! Optional applications that install on first press and uninstall on the next.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::Identity;
use crate::runner::{Cmd, CommandRunner, run_checked};
use crate::toggle::{FeatureState, Toggle, install_file};

/// What an optional application needs besides its apt packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSpec {
    pub label: &'static str,
    /// First entry is the one probed for install state.
    pub packages: &'static [&'static str],
    pub ppa: Option<&'static str>,
    /// systemd unit enabled after install.
    pub service: Option<&'static str>,
    /// rsyslog drop-in (path, content) that silences the app's log spam.
    pub syslog_filter: Option<(&'static str, &'static str)>,
    /// `~/.config/autostart` entry (file name, content).
    pub autostart: Option<(&'static str, &'static str)>,
}

pub const OPENSNITCH: PackageSpec = PackageSpec {
    label: "OpenSnitch application firewall",
    packages: &["opensnitch", "python3-opensnitch-ui"],
    ppa: None,
    service: Some("opensnitch"),
    syslog_filter: None,
    autostart: Some((
        "opensnitch-ui.desktop",
        "[Desktop Entry]\nType=Application\nName=OpenSnitch\nExec=opensnitch-ui\n",
    )),
};

pub const NOTEPADQQ: PackageSpec = PackageSpec {
    label: "Notepadqq text editor",
    packages: &["notepadqq"],
    ppa: Some("ppa:notepadqq-team/notepadqq"),
    service: None,
    syslog_filter: Some((
        "/etc/rsyslog.d/10-notepadqq.conf",
        ":programname, contains, \"notepadqq\" stop\n",
    )),
    autostart: None,
};

pub const CATALOG: &[PackageSpec] = &[OPENSNITCH, NOTEPADQQ];

pub struct FeaturePackage<'a> {
    runner: &'a dyn CommandRunner,
    identity: &'a Identity,
    spec: PackageSpec,
}

impl<'a> FeaturePackage<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity, spec: PackageSpec) -> Self {
        Self {
            runner,
            identity,
            spec,
        }
    }

    fn run(&self, cmd: Cmd) -> Result<()> {
        run_checked(self.runner, &cmd)?;
        Ok(())
    }

    fn autostart_path(&self, name: &str) -> PathBuf {
        self.identity.home().join(".config/autostart").join(name)
    }
}

impl Toggle for FeaturePackage<'_> {
    fn label(&self) -> &str {
        self.spec.label
    }

    fn describe(&self, state: FeatureState) -> &'static str {
        match state {
            FeatureState::On => "Installed",
            FeatureState::Off => "Not installed",
        }
    }

    fn probe(&self) -> Result<FeatureState> {
        let package = self.spec.packages[0];
        let output = self
            .runner
            .run(&Cmd::new("dpkg-query").args(["-W", "-f=${Status}", package]))?;
        // unknown packages exit non-zero
        Ok((output.success() && output.stdout_trimmed().ends_with("install ok installed")).into())
    }

    fn enable(&self) -> Result<()> {
        if let Some(ppa) = self.spec.ppa {
            self.run(Cmd::sudo(["add-apt-repository", "-y", ppa]).interactive())?;
            self.run(Cmd::sudo(["apt-get", "update"]).interactive())?;
        }
        self.run(
            Cmd::sudo(["apt-get", "install", "-y"])
                .args(self.spec.packages)
                .interactive(),
        )?;
        if let Some(service) = self.spec.service {
            self.run(Cmd::sudo(["systemctl", "enable", "--now", service]))?;
        }
        if let Some((path, content)) = self.spec.syslog_filter {
            install_file(self.runner, content, Path::new(path), "0644")?;
            self.run(Cmd::sudo(["systemctl", "restart", "rsyslog"]))?;
        }
        if let Some((name, content)) = self.spec.autostart {
            let path = self.autostart_path(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        tracing::info!(feature = self.spec.label, "installed");
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        self.run(
            Cmd::sudo(["apt-get", "remove", "-y"])
                .args(self.spec.packages)
                .interactive(),
        )?;
        if let Some(ppa) = self.spec.ppa {
            self.run(Cmd::sudo(["add-apt-repository", "--remove", "-y", ppa]).interactive())?;
            self.run(Cmd::sudo(["apt-get", "update"]).interactive())?;
        }
        if let Some((path, _)) = self.spec.syslog_filter {
            self.run(Cmd::sudo(["rm", "-f", path]))?;
            self.run(Cmd::sudo(["systemctl", "restart", "rsyslog"]))?;
        }
        if let Some((name, _)) = self.spec.autostart {
            let path = self.autostart_path(name);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        tracing::info!(feature = self.spec.label, "uninstalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use crate::runner::fake::FakeRunner;
    use tempfile::TempDir;

    #[test]
    fn probe_reads_dpkg_status() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(dir.path());
        let runner = FakeRunner::new();
        let editor = FeaturePackage::new(&runner, &id, NOTEPADQQ);

        runner.respond(&["dpkg-query"], 1, "");
        assert_eq!(editor.probe().unwrap(), FeatureState::Off);

        runner.respond(&["dpkg-query"], 0, "deinstall ok config-files");
        assert_eq!(editor.probe().unwrap(), FeatureState::Off);

        runner.respond(&["dpkg-query"], 0, "install ok installed");
        assert_eq!(editor.probe().unwrap(), FeatureState::On);
        assert_eq!(editor.describe(FeatureState::On), "Installed");
    }

    #[test]
    fn install_runs_ppa_then_packages_then_filter() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(dir.path());
        let runner = FakeRunner::new();
        runner.respond(&["dpkg-query"], 1, "");

        let state = FeaturePackage::new(&runner, &id, NOTEPADQQ).apply().unwrap();

        assert_eq!(state, FeatureState::On);
        let calls = runner.call_lines();
        assert_eq!(calls[1], "sudo add-apt-repository -y ppa:notepadqq-team/notepadqq");
        assert_eq!(calls[2], "sudo apt-get update");
        assert_eq!(calls[3], "sudo apt-get install -y notepadqq");
        assert!(calls[4].ends_with("/etc/rsyslog.d/10-notepadqq.conf"));
        assert_eq!(calls[5], "sudo systemctl restart rsyslog");
    }

    #[test]
    fn failed_install_stops_before_side_effects() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(dir.path());
        let runner = FakeRunner::new();
        runner.respond(&["dpkg-query"], 1, "");
        runner.fail(&["sudo", "apt-get", "install"]);

        assert!(FeaturePackage::new(&runner, &id, OPENSNITCH).apply().is_err());

        assert!(!runner.call_lines().iter().any(|c| c.contains("systemctl")));
        assert!(!dir.path().join(".config/autostart/opensnitch-ui.desktop").exists());
    }

    #[test]
    fn firewall_round_trip_manages_autostart_entry() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(dir.path());
        let runner = FakeRunner::new();
        let firewall = FeaturePackage::new(&runner, &id, OPENSNITCH);
        let entry = dir.path().join(".config/autostart/opensnitch-ui.desktop");

        runner.respond(&["dpkg-query"], 1, "");
        firewall.apply().unwrap();
        assert!(entry.exists());
        assert!(runner.call_lines().contains(&"sudo systemctl enable --now opensnitch".to_string()));

        runner.respond(&["dpkg-query"], 0, "install ok installed");
        assert_eq!(firewall.apply().unwrap(), FeatureState::Off);
        assert!(!entry.exists());
        assert!(runner
            .call_lines()
            .contains(&"sudo apt-get remove -y opensnitch python3-opensnitch-ui".to_string()));
    }
}
