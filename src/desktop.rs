//! GNOME desktop tweaks backed by gsettings.

use anyhow::{Result, bail};

use crate::gsettings::GSettings;
use crate::identity::Identity;
use crate::runner::CommandRunner;
use crate::toggle::{FeatureState, Toggle};

const MEDIA_KEYS: &str = "org.gnome.settings-daemon.plugins.media-keys";
const CUSTOM0_PATH: &str = "/org/gnome/settings-daemon/plugins/media-keys/custom-keybindings/custom0/";
const EXPLORER_BINDING: &str = "'<Super>e'";

const MUTTER: &str = "org.gnome.mutter";
const ALIVE_TIMEOUT: &str = "check-alive-timeout";
/// GNOME ships with a 5 second hang check.
pub const DEFAULT_TIMEOUT_SECS: u32 = 5;

/// Super+E opens a new Nautilus window, like Explorer on Windows.
pub struct DesktopShortcut<'a> {
    settings: GSettings<'a>,
}

impl<'a> DesktopShortcut<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity) -> Self {
        Self {
            settings: GSettings::new(runner, identity),
        }
    }

    fn custom0() -> String {
        format!("{}.custom-keybinding:{}", MEDIA_KEYS, CUSTOM0_PATH)
    }
}

impl Toggle for DesktopShortcut<'_> {
    fn label(&self) -> &str {
        "Super+E opens Files"
    }

    fn probe(&self) -> Result<FeatureState> {
        // unset relocatable schemas make gsettings fail; that just means off
        let binding = self.settings.get(&Self::custom0(), "binding").unwrap_or_default();
        Ok((binding == EXPLORER_BINDING).into())
    }

    fn enable(&self) -> Result<()> {
        let schema = Self::custom0();
        self.settings
            .set(MEDIA_KEYS, "custom-keybindings", &format!("['{}']", CUSTOM0_PATH))?;
        self.settings.set(&schema, "name", "'File Explorer'")?;
        self.settings.set(&schema, "command", "'nautilus --new-window'")?;
        self.settings.set(&schema, "binding", EXPLORER_BINDING)
    }

    fn disable(&self) -> Result<()> {
        let schema = Self::custom0();
        for key in ["binding", "command", "name"] {
            self.settings.reset(&schema, key)?;
        }
        self.settings.reset(MEDIA_KEYS, "custom-keybindings")
    }
}

/// The Digital Wellbeing panel in GNOME Settings.
pub struct WellbeingPanel<'a> {
    settings: GSettings<'a>,
}

impl<'a> WellbeingPanel<'a> {
    const SCHEMA: &'static str = "org.gnome.Shell.Extensions.Wellbeing";

    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity) -> Self {
        Self {
            settings: GSettings::new(runner, identity),
        }
    }
}

impl Toggle for WellbeingPanel<'_> {
    fn label(&self) -> &str {
        "Wellbeing panel"
    }

    fn probe(&self) -> Result<FeatureState> {
        let value = self.settings.get(Self::SCHEMA, "enabled").unwrap_or_default();
        Ok((value == "true").into())
    }

    fn enable(&self) -> Result<()> {
        self.settings.set(Self::SCHEMA, "enabled", "true")
    }

    fn disable(&self) -> Result<()> {
        self.settings.set(Self::SCHEMA, "enabled", "false")
    }
}

/// Seconds before GNOME offers "Force Quit" on an unresponsive window.
/// Numeric, so it is set directly instead of toggled.
pub struct HangTimeout<'a> {
    settings: GSettings<'a>,
}

impl<'a> HangTimeout<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity) -> Self {
        Self {
            settings: GSettings::new(runner, identity),
        }
    }

    pub fn label(&self) -> &str {
        "Application hang timeout"
    }

    /// Current timeout in seconds. Falls back to the GNOME default when the
    /// key can't be read.
    pub fn probe(&self) -> Result<u32> {
        let secs = self
            .settings
            .get(MUTTER, ALIVE_TIMEOUT)
            .ok()
            .and_then(|raw| parse_millis(&raw))
            .map_or(DEFAULT_TIMEOUT_SECS, |ms| ms / 1000);
        Ok(secs)
    }

    /// Sets the timeout; 0 disables the check.
    pub fn set(&self, seconds: u32) -> Result<()> {
        let Some(millis) = seconds.checked_mul(1000) else {
            bail!("Timeout of {}s is too large.", seconds);
        };
        self.settings
            .set(MUTTER, ALIVE_TIMEOUT, &format!("uint32 {}", millis))?;
        tracing::info!(seconds, "hang timeout updated");
        Ok(())
    }
}

/// `uint32 5000` or `5000`.
fn parse_millis(raw: &str) -> Option<u32> {
    raw.trim().trim_start_matches("uint32").trim().parse().ok()
}

/// Validates user input for the hang timeout: a non-negative whole number.
pub fn parse_seconds(input: &str) -> Result<u32> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid input '{}'. Must be a whole number of seconds.", input);
    }
    // stored in milliseconds as a uint32
    match input.parse::<u32>().ok().filter(|secs| secs.checked_mul(1000).is_some()) {
        Some(secs) => Ok(secs),
        None => bail!("Timeout '{}' is too large.", input),
    }
}
