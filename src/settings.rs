//! Settings from the shared `~/.config/rust-dotfiles/config.toml`.
//!
//! Only the `[tweak_install]` section is read. Every field has a default, so
//! a missing file, a missing section or a partial section all work.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::Identity;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Ubuntu major release the tool is written for.
    pub release_major: String,
    /// Oldest point release that is known to work.
    pub release_minimum: String,
    pub user_dirs_file: Option<String>,
    pub sudoers_file: String,
    pub gdm_config: String,
    pub aliases_script: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            release_major: "25".to_string(),
            release_minimum: "25.04".to_string(),
            user_dirs_file: None,
            sudoers_file: "/etc/sudoers.d/nopasswd".to_string(),
            gdm_config: "/etc/gdm3/custom.conf".to_string(),
            aliases_script: "/etc/profile.d/windows_commands.sh".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct GlobalConfig {
    #[serde(default)]
    tweak_install: Settings,
}

/// `<home>/.config/rust-dotfiles/config.toml` for the invoking user.
pub fn default_path(identity: &Identity) -> PathBuf {
    identity.home().join(".config/rust-dotfiles/config.toml")
}

/// Loads the settings, falling back to defaults when the file is absent.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse(content: &str) -> Result<Settings> {
    let config: GlobalConfig = toml::from_str(content)?;
    Ok(config.tweak_install)
}

impl Settings {
    /// Location of the user-dirs file, `~/` expanded for `identity`.
    pub fn user_dirs_path(&self, identity: &Identity) -> Option<PathBuf> {
        self.user_dirs_file.as_deref().map(|p| identity.expand(p))
    }

    pub fn sudoers_path(&self, identity: &Identity) -> PathBuf {
        identity.expand(&self.sudoers_file)
    }

    pub fn gdm_path(&self, identity: &Identity) -> PathBuf {
        identity.expand(&self.gdm_config)
    }

    pub fn aliases_path(&self, identity: &Identity) -> PathBuf {
        identity.expand(&self.aliases_script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn other_sections_are_ignored() {
        let settings = parse("[global]\nterminal = \"ghostty\"\n\n[updater]\nupdate_command = [\"yay\"]\n").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_section_keeps_remaining_defaults() {
        let settings = parse("[tweak_install]\nrelease_minimum = \"25.10\"\nuser_dirs_file = \"~/dirs.test\"\n").unwrap();

        assert_eq!(settings.release_minimum, "25.10");
        assert_eq!(settings.release_major, "25");
        assert_eq!(settings.gdm_config, "/etc/gdm3/custom.conf");

        let id = test_identity(Path::new("/home/alice"));
        assert_eq!(settings.user_dirs_path(&id), Some(PathBuf::from("/home/alice/dirs.test")));
    }

    #[test]
    fn bad_toml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[tweak_install\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(parse("[tweak_install]\nrelease_major = 25\n").is_err());
    }
}
