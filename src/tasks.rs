//! One-shot installers.
//!
//! Unlike toggles these have no probe: each task is an ordered list of steps
//! run top to bottom. The first failing step aborts the rest (apt and friends
//! don't leave half-installed packages, so stopping is enough).

use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;

use crate::identity::Identity;
use crate::runner::{Cmd, CommandRunner, run_checked};
use crate::toggle::install_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Run(Cmd),
    /// Root-owned file written through `install`.
    WriteFile {
        dest: PathBuf,
        content: String,
        mode: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct InstallTask {
    pub title: &'static str,
    /// Printed after a successful run.
    pub note: Option<&'static str>,
    pub steps: Vec<Step>,
}

impl InstallTask {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            note: None,
            steps: Vec::new(),
        }
    }

    fn note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    fn sudo<const N: usize>(mut self, args: [&str; N]) -> Self {
        self.steps.push(Step::Run(Cmd::sudo(args).interactive()));
        self
    }

    fn apt_install(mut self, packages: &[&str]) -> Self {
        self.steps.push(Step::Run(
            Cmd::sudo(["apt-get", "install", "-y"]).args(packages).interactive(),
        ));
        self
    }

    fn write_file(mut self, dest: &str, content: String) -> Self {
        self.steps.push(Step::WriteFile {
            dest: PathBuf::from(dest),
            content,
            mode: "0644",
        });
        self
    }
}

/// Runs every step in order, stopping at the first failure.
pub fn run_task(runner: &dyn CommandRunner, task: &InstallTask) -> Result<()> {
    let total = task.steps.len();
    for (i, step) in task.steps.iter().enumerate() {
        let result = match step {
            Step::Run(cmd) => run_checked(runner, cmd).map(|_| ()),
            Step::WriteFile { dest, content, mode } => install_file(runner, content, dest, mode),
        };
        result.with_context(|| format!("{}: step {}/{} failed", task.title, i + 1, total))?;
    }
    tracing::info!(task = task.title, steps = total, "task finished");
    Ok(())
}

// --- System installation and updates ---

pub fn system_update() -> InstallTask {
    InstallTask::new("Update package lists and upgrade system packages")
        .sudo(["apt-get", "update", "-y"])
        .sudo(["apt-get", "upgrade", "-y", "--fix-missing"])
}

pub fn essential_tools() -> InstallTask {
    InstallTask::new("Install essential tools").apt_install(&[
        "software-properties-common",
        "vim",
        "nano",
        "curl",
        "wget",
        "git",
        "htop",
        "dkms",
        "build-essential",
    ])
}

pub fn unattended_upgrades() -> InstallTask {
    InstallTask::new("Configure automatic security updates")
        .apt_install(&["unattended-upgrades"])
        .sudo(["dpkg-reconfigure", "-plow", "unattended-upgrades"])
        .note("Critical security updates will be installed automatically.")
}

// --- Software and packages ---

pub fn virtualization(identity: &Identity) -> InstallTask {
    let mut task = InstallTask::new("Install virtualization packages (KVM, Libvirt)")
        .apt_install(&["qemu-kvm", "libvirt-daemon-system", "virtinst", "virt-manager"]);
    task.steps.push(Step::Run(
        Cmd::sudo(["usermod", "-aG", "libvirt,kvm", identity.username.as_str()]).interactive(),
    ));
    task.sudo(["systemctl", "enable", "--now", "libvirtd"])
        .note("Reboot required for KVM permissions to take effect.")
}

pub fn software_managers() -> InstallTask {
    InstallTask::new("Set up software managers (GNOME Software, Synaptic, Snap)")
        .sudo(["apt-get", "update"])
        .apt_install(&["gnome-software", "synaptic", "snapd"])
        .sudo(["systemctl", "enable", "--now", "snapd"])
        .sudo(["ln", "-sfn", "/var/lib/snapd/snap", "/snap"])
}

/// Needs the release codename for the WineHQ repository line.
pub fn wine(codename: &str) -> InstallTask {
    InstallTask::new("Install Wine and Winetricks")
        .sudo(["dpkg", "--add-architecture", "i386"])
        .sudo(["mkdir", "-p", "/etc/apt/keyrings"])
        .sudo([
            "wget",
            "-O",
            "/etc/apt/keyrings/winehq-archive.key",
            "https://dl.winehq.org/wine-builds/winehq.key",
        ])
        .write_file(
            "/etc/apt/sources.list.d/winehq.list",
            format!(
                "deb [arch=amd64,i386 signed-by=/etc/apt/keyrings/winehq-archive.key] https://dl.winehq.org/wine-builds/ubuntu/ {} main\n",
                codename
            ),
        )
        .sudo(["apt-get", "update"])
        .sudo(["apt-get", "install", "-y", "--install-recommends", "winehq-stable"])
        .apt_install(&["winetricks"])
}

pub fn python_toolchain() -> InstallTask {
    InstallTask::new("Install Python and related packages")
        .sudo(["apt-get", "update"])
        .apt_install(&[
            "python3.13",
            "python3-pip",
            "python3.13-venv",
            "build-essential",
            "llvm-20",
            "clang",
        ])
}

// --- Hardware optimization and drivers ---

pub fn amd_cpu() -> InstallTask {
    InstallTask::new("AMD CPU microcode").apt_install(&["amd64-microcode"])
}

pub fn intel_cpu() -> InstallTask {
    InstallTask::new("Intel CPU microcode").apt_install(&["intel-microcode"])
}

pub fn amd_gpu() -> InstallTask {
    InstallTask::new("AMD GPU (Mesa, Vulkan)").apt_install(&[
        "xserver-xorg-video-amdgpu",
        "vulkan-tools",
        "mesa-vulkan-drivers",
    ])
}

/// Downloaded armored key, dearmored into the apt keyring in a second step.
const ROCM_KEY: &str = "/etc/apt/keyrings/rocm.gpg.key";

pub fn amd_gpu_rocm(identity: &Identity) -> InstallTask {
    let mut task = InstallTask::new("AMD GPU with ROCm compute")
        .write_file(
            "/etc/apt/sources.list.d/rocm.list",
            "deb [arch=amd64] https://repo.radeon.com/rocm/apt/6.0 noble main\n".to_string(),
        )
        .sudo(["mkdir", "-p", "/etc/apt/keyrings"])
        .sudo(["wget", "-qO", ROCM_KEY, "https://repo.radeon.com/rocm/rocm.gpg.key"])
        .sudo(["gpg", "--dearmor", "--yes", "-o", "/etc/apt/trusted.gpg.d/rocm.gpg", ROCM_KEY])
        .sudo(["apt-get", "update"])
        .apt_install(&["rocm-dkms"]);
    task.steps.push(Step::Run(
        Cmd::sudo(["usermod", "-a", "-G", "video,render", identity.username.as_str()]).interactive(),
    ));
    task
}

/// Fallback when `ubuntu-drivers` recommends nothing.
pub const NVIDIA_FALLBACK_DRIVER: &str = "nvidia-driver-550";

/// Picks the first driver `ubuntu-drivers devices` lists.
pub fn recommended_nvidia_driver(devices_output: &str) -> Option<String> {
    let re = Regex::new(r"driver\s*:\s*(\S+)").ok()?;
    re.captures(devices_output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Queries `ubuntu-drivers` up front to choose the driver package.
pub fn nvidia_gpu(runner: &dyn CommandRunner) -> InstallTask {
    let detected = runner
        .run(&Cmd::new("ubuntu-drivers").arg("devices"))
        .ok()
        .filter(|out| out.success())
        .and_then(|out| recommended_nvidia_driver(&out.stdout));
    let driver = detected.unwrap_or_else(|| NVIDIA_FALLBACK_DRIVER.to_string());
    tracing::debug!(%driver, "nvidia driver selected");

    let mut task = InstallTask::new("NVIDIA proprietary driver")
        .sudo(["add-apt-repository", "-y", "ppa:graphics-drivers/ppa"]);
    task.steps.push(Step::Run(
        Cmd::sudo(["apt-get", "install", "-y", driver.as_str(), "dkms"]).interactive(),
    ));
    task.note("Secure Boot key enrollment is required after reboot!")
}

pub fn intel_gpu() -> InstallTask {
    InstallTask::new("Intel GPU media driver").apt_install(&["intel-media-va-driver-non-free"])
}

pub fn arm64_firmware() -> InstallTask {
    InstallTask::new("ARM64 (Qualcomm) firmware tools")
        .sudo(["sed", "-i", "s/restricted$/restricted multiverse/", "/etc/apt/sources.list"])
        .sudo(["apt-get", "update"])
        .apt_install(&["qcom-firmware-extract"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use crate::runner::fake::FakeRunner;
    use std::path::Path;

    #[test]
    fn stops_at_first_failing_step() {
        let runner = FakeRunner::new();
        runner.fail(&["sudo", "apt-get", "update"]);

        let err = run_task(&runner, &system_update()).unwrap_err();

        assert_eq!(runner.calls().len(), 1);
        assert!(err.to_string().contains("step 1/2 failed"));
    }

    #[test]
    fn runs_all_steps_in_order() {
        let runner = FakeRunner::new();

        run_task(&runner, &unattended_upgrades()).unwrap();

        assert_eq!(
            runner.call_lines(),
            vec![
                "sudo apt-get install -y unattended-upgrades",
                "sudo dpkg-reconfigure -plow unattended-upgrades",
            ]
        );
    }

    #[test]
    fn virtualization_adds_invoking_user_to_groups() {
        let id = test_identity(Path::new("/home/alice"));
        let task = virtualization(&id);

        assert!(task.steps.contains(&Step::Run(
            Cmd::sudo(["usermod", "-aG", "libvirt,kvm", "alice"]).interactive()
        )));
        assert!(task.note.is_some());
    }

    #[test]
    fn wine_repository_uses_codename() {
        let task = wine("plucky");
        let repo = task.steps.iter().find_map(|s| match s {
            Step::WriteFile { dest, content, .. } if dest.ends_with("winehq.list") => Some(content.clone()),
            _ => None,
        });
        assert!(repo.unwrap().contains("/ubuntu/ plucky main"));
    }

    #[test]
    fn rocm_key_download_failure_stops_before_dearmor() {
        let runner = FakeRunner::new();
        runner.fail(&["sudo", "wget"]);
        let id = test_identity(Path::new("/home/alice"));

        let err = run_task(&runner, &amd_gpu_rocm(&id)).unwrap_err();

        assert!(err.to_string().contains("AMD GPU with ROCm compute"));
        assert!(!runner.call_lines().iter().any(|c| c.contains("gpg --dearmor")));
    }

    #[test]
    fn picks_first_recommended_driver() {
        let output = "== /sys/devices/pci0000:00/0000:00:01.0 ==\nmodalias : pci:v000010DE\nvendor   : NVIDIA Corporation\ndriver   : nvidia-driver-570 - distro non-free recommended\ndriver   : nvidia-driver-550 - distro non-free\n";
        assert_eq!(recommended_nvidia_driver(output).as_deref(), Some("nvidia-driver-570"));
        assert_eq!(recommended_nvidia_driver("no devices"), None);
    }

    #[test]
    fn nvidia_falls_back_when_detection_fails() {
        let runner = FakeRunner::new();
        runner.fail(&["ubuntu-drivers"]);

        let task = nvidia_gpu(&runner);

        assert!(task.steps.contains(&Step::Run(
            Cmd::sudo(["apt-get", "install", "-y", NVIDIA_FALLBACK_DRIVER, "dkms"]).interactive()
        )));
    }
}
