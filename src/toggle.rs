//! Check-then-act toggles.
//!
//! Every tweak in the "System Tweaks" and "Software" menus has a live probe
//! and a pair of actions. [`Toggle::apply`] probes first and then runs the
//! opposite action, so pressing the same menu entry twice returns the system
//! to where it started. Nothing is cached: the probe is re-run for every menu
//! render and every apply.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::desktop::{DesktopShortcut, HangTimeout, WellbeingPanel};
use crate::identity::Identity;
use crate::packages::FeaturePackage;
use crate::runner::{Cmd, CommandRunner, run_checked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    On,
    Off,
}

impl FeatureState {
    pub fn inverted(self) -> Self {
        match self {
            FeatureState::On => FeatureState::Off,
            FeatureState::Off => FeatureState::On,
        }
    }
}

impl From<bool> for FeatureState {
    fn from(on: bool) -> Self {
        if on { FeatureState::On } else { FeatureState::Off }
    }
}

pub trait Toggle {
    fn label(&self) -> &str;

    /// Current state, read from the live system.
    fn probe(&self) -> Result<FeatureState>;

    fn enable(&self) -> Result<()>;

    fn disable(&self) -> Result<()>;

    /// Display text for a state, e.g. "Installed" for packages.
    fn describe(&self, state: FeatureState) -> &'static str {
        match state {
            FeatureState::On => "Enabled",
            FeatureState::Off => "Disabled",
        }
    }

    /// Probes, then drives the feature to the opposite state. Returns the
    /// state the feature should now be in.
    fn apply(&self) -> Result<FeatureState> {
        let current = self.probe()?;
        tracing::info!(feature = self.label(), from = ?current, "toggling");
        match current {
            FeatureState::On => self.disable()?,
            FeatureState::Off => self.enable()?,
        }
        Ok(current.inverted())
    }
}

/// Every tweak the menus offer.
pub enum Feature<'a> {
    SudoPrompt(SudoPrompt<'a>),
    AutoLogin(AutoLogin<'a>),
    CommandAliases(CommandAliases<'a>),
    DesktopShortcut(DesktopShortcut<'a>),
    WellbeingPanel(WellbeingPanel<'a>),
    HangTimeout(HangTimeout<'a>),
    FeaturePackage(FeaturePackage<'a>),
}

impl Feature<'_> {
    /// The binary protocol, or `None` for the numeric hang timeout.
    pub fn as_toggle(&self) -> Option<&dyn Toggle> {
        match self {
            Feature::SudoPrompt(f) => Some(f),
            Feature::AutoLogin(f) => Some(f),
            Feature::CommandAliases(f) => Some(f),
            Feature::DesktopShortcut(f) => Some(f),
            Feature::WellbeingPanel(f) => Some(f),
            Feature::FeaturePackage(f) => Some(f),
            Feature::HangTimeout(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Feature::HangTimeout(t) => t.label(),
            other => other.as_toggle().map_or("", |t| t.label()),
        }
    }

    /// Fresh status line for the menu.
    pub fn status(&self) -> Result<String> {
        match self {
            Feature::HangTimeout(t) => Ok(match t.probe()? {
                0 => "Disabled".to_string(),
                secs => format!("{}s", secs),
            }),
            other => match other.as_toggle() {
                Some(t) => Ok(t.describe(t.probe()?).to_string()),
                None => Ok(String::new()),
            },
        }
    }
}

impl fmt::Debug for Feature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Feature").field(&self.label()).finish()
    }
}

/// Writes `content` to a private temp file and installs it at `dest` with
/// root ownership and `mode`, in one `install` call.
pub fn install_file(runner: &dyn CommandRunner, content: &str, dest: &Path, mode: &str) -> Result<()> {
    let mut tmp = NamedTempFile::new().context("Failed to create temp file")?;
    tmp.write_all(content.as_bytes())
        .context("Failed to write temp file")?;
    tmp.flush()?;

    let src = tmp.path().to_string_lossy().into_owned();
    let dest = dest.to_string_lossy().into_owned();
    run_checked(
        runner,
        &Cmd::sudo(["install", "-m", mode, "-o", "root", "-g", "root", src.as_str(), dest.as_str()]),
    )?;
    Ok(())
}

fn remove_file(runner: &dyn CommandRunner, path: &Path) -> Result<()> {
    run_checked(runner, &Cmd::sudo(["rm", "-f"]).arg(path.to_string_lossy()))?;
    Ok(())
}

/// Reads a file for probing. Missing means "off", not an error.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

// --- Passwordless sudo ---

pub struct SudoPrompt<'a> {
    runner: &'a dyn CommandRunner,
    identity: &'a Identity,
    path: PathBuf,
}

impl<'a> SudoPrompt<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            identity,
            path: path.into(),
        }
    }

    fn rule(&self) -> String {
        format!("{} ALL=(ALL) NOPASSWD: ALL", self.identity.username)
    }
}

impl Toggle for SudoPrompt<'_> {
    fn label(&self) -> &str {
        "Passwordless sudo"
    }

    fn probe(&self) -> Result<FeatureState> {
        let content = read_optional(&self.path)?;
        let rule = self.rule();
        Ok(content
            .is_some_and(|c| c.lines().any(|line| line.trim() == rule))
            .into())
    }

    fn enable(&self) -> Result<()> {
        install_file(self.runner, &format!("{}\n", self.rule()), &self.path, "0440")?;
        tracing::warn!(user = %self.identity.username, "sudo password prompt disabled");
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        remove_file(self.runner, &self.path)
    }
}

// --- GDM automatic login ---

pub struct AutoLogin<'a> {
    runner: &'a dyn CommandRunner,
    identity: &'a Identity,
    path: PathBuf,
}

impl<'a> AutoLogin<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            identity,
            path: path.into(),
        }
    }

    fn sed(&self, scripts: &[String]) -> Result<()> {
        let mut cmd = Cmd::sudo(["sed", "-i"]);
        for script in scripts {
            cmd = cmd.arg("-e").arg(script);
        }
        run_checked(self.runner, &cmd.arg(self.path.to_string_lossy()))?;
        Ok(())
    }
}

/// True if an uncommented `AutomaticLogin = <user>` line is present.
fn autologin_user_set(content: &str, user: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .any(|(key, value)| key.trim() == "AutomaticLogin" && value.trim() == user)
}

impl Toggle for AutoLogin<'_> {
    fn label(&self) -> &str {
        "Automatic login"
    }

    fn probe(&self) -> Result<FeatureState> {
        let content = read_optional(&self.path)?;
        Ok(content
            .is_some_and(|c| autologin_user_set(&c, &self.identity.username))
            .into())
    }

    fn enable(&self) -> Result<()> {
        self.sed(&[
            r"s/^#\?\s*AutomaticLoginEnable\s*=.*/AutomaticLoginEnable=True/".to_string(),
            format!(r"s/^#\?\s*AutomaticLogin\s*=.*/AutomaticLogin={}/", self.identity.username),
        ])
    }

    fn disable(&self) -> Result<()> {
        // back to the stock commented-out lines
        self.sed(&[
            r"s/^AutomaticLoginEnable\s*=.*/#  AutomaticLoginEnable = true/".to_string(),
            r"s/^AutomaticLogin\s*=.*/#  AutomaticLogin = user1/".to_string(),
        ])
    }
}

// --- Windows-style command aliases ---

const ALIASES_SCRIPT: &str = r#"function dir() { ls -l "$@"; }
function copy() { cp -i "$@"; }
function move() { mv -i "$@"; }
function del() { rm -i "$@"; }
function md() { mkdir -p "$@"; }
function rd() { rmdir "$@"; }
function cls() { clear; }
function type() { cat "$@"; }
function where() { which "$@"; }
function echo() { printf "%s\n" "$*"; }
function shutdown() { sudo shutdown -h now; }
function restart() { sudo shutdown -r now; }
"#;

pub struct CommandAliases<'a> {
    runner: &'a dyn CommandRunner,
    path: PathBuf,
}

impl<'a> CommandAliases<'a> {
    pub fn new(runner: &'a dyn CommandRunner, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            path: path.into(),
        }
    }
}

impl Toggle for CommandAliases<'_> {
    fn label(&self) -> &str {
        "Windows-style commands (dir, copy, cls, ...)"
    }

    fn probe(&self) -> Result<FeatureState> {
        Ok(self.path.exists().into())
    }

    fn enable(&self) -> Result<()> {
        install_file(self.runner, ALIASES_SCRIPT, &self.path, "0755")
    }

    fn disable(&self) -> Result<()> {
        remove_file(self.runner, &self.path)
    }
}
