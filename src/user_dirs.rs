//! Special folder configuration (`~/.config/user-dirs.dirs`).
//!
//! The file is a flat list of `XDG_*_DIR="path"` lines that desktop
//! environments also read and write, so anything we don't understand is
//! carried through untouched on save. Reset is the one destructive path.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::identity::Identity;

/// Lines starting with this prefix and containing `=` are folder entries.
pub const KEY_PREFIX: &str = "XDG_";

/// Key -> path, in insertion order. Save writes updates in this order.
pub type DirMap = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFolder {
    Desktop,
    Download,
    Templates,
    PublicShare,
    Documents,
    Music,
    Pictures,
    Videos,
}

impl SpecialFolder {
    pub const ALL: [SpecialFolder; 8] = [
        SpecialFolder::Desktop,
        SpecialFolder::Download,
        SpecialFolder::Templates,
        SpecialFolder::PublicShare,
        SpecialFolder::Documents,
        SpecialFolder::Music,
        SpecialFolder::Pictures,
        SpecialFolder::Videos,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SpecialFolder::Desktop => "XDG_DESKTOP_DIR",
            SpecialFolder::Download => "XDG_DOWNLOAD_DIR",
            SpecialFolder::Templates => "XDG_TEMPLATES_DIR",
            SpecialFolder::PublicShare => "XDG_PUBLICSHARE_DIR",
            SpecialFolder::Documents => "XDG_DOCUMENTS_DIR",
            SpecialFolder::Music => "XDG_MUSIC_DIR",
            SpecialFolder::Pictures => "XDG_PICTURES_DIR",
            SpecialFolder::Videos => "XDG_VIDEOS_DIR",
        }
    }

    /// Directory name under `$HOME` used when nothing is configured.
    pub fn default_name(self) -> &'static str {
        match self {
            SpecialFolder::Desktop => "Desktop",
            SpecialFolder::Download => "Downloads",
            SpecialFolder::Templates => "Templates",
            SpecialFolder::PublicShare => "Public",
            SpecialFolder::Documents => "Documents",
            SpecialFolder::Music => "Music",
            SpecialFolder::Pictures => "Pictures",
            SpecialFolder::Videos => "Videos",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for SpecialFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file on disk; the mapping is the built-in default set.
    Defaults,
    /// Mapping came from the file.
    Custom,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Defaults => f.write_str("No custom folder configurations found. Using defaults."),
            LoadStatus::Custom => f.write_str("Custom folder configurations loaded."),
        }
    }
}

pub const SAVED: &str = "User folder configurations saved.";
pub const DEFAULTS_APPLIED: &str = "Default folder configurations applied.";

/// Store backed by a single user-dirs file. Holds no state beyond its
/// location; every call goes back to disk.
#[derive(Debug, Clone)]
pub struct UserDirs {
    path: PathBuf,
    home: PathBuf,
}

impl UserDirs {
    /// Store at the conventional `<home>/.config/user-dirs.dirs`.
    pub fn for_identity(identity: &Identity) -> Self {
        Self::at(identity.home().join(".config/user-dirs.dirs"), identity)
    }

    pub fn at(path: impl Into<PathBuf>, identity: &Identity) -> Self {
        Self {
            path: path.into(),
            home: identity.home().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compiled-in defaults: `<home>/<DefaultName>` for every folder.
    pub fn defaults(&self) -> DirMap {
        SpecialFolder::ALL
            .into_iter()
            .map(|f| {
                let path = self.home.join(f.default_name());
                (f.key().to_string(), path.to_string_lossy().into_owned())
            })
            .collect()
    }

    /// Reads the file. Only keys present in the file are returned when it
    /// exists; the full default set is returned when it doesn't.
    pub fn read(&self) -> Result<(LoadStatus, DirMap)> {
        match self.read_raw()? {
            Some(content) => Ok((LoadStatus::Custom, parse(&content))),
            None => Ok((LoadStatus::Defaults, self.defaults())),
        }
    }

    /// Defaults overlaid with whatever the file sets.
    pub fn resolved(&self) -> Result<DirMap> {
        let mut merged = self.defaults();
        let (_, current) = self.read()?;
        merged.extend(current);
        Ok(merged)
    }

    /// Rewrites the keys in `updates` and keeps every other line as is.
    pub fn save(&self, updates: &DirMap) -> Result<&'static str> {
        let existing = self.read_raw()?.unwrap_or_default();

        let mut out = String::new();
        for line in existing.lines() {
            if !updates.contains_key(line_key(line)) {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str(&render(updates));

        self.write(&out)?;
        tracing::info!(path = %self.path.display(), keys = updates.len(), "saved user folders");
        Ok(SAVED)
    }

    /// Overwrites the file with exactly the default set.
    pub fn reset_to_defaults(&self) -> Result<&'static str> {
        self.write(&render(&self.defaults()))?;
        tracing::info!(path = %self.path.display(), "reset user folders to defaults");
        Ok(DEFAULTS_APPLIED)
    }

    /// Raw file content, or `None` when there is no file. Any other I/O
    /// error is reported, not mistaken for a missing file.
    fn read_raw(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Recognized entries of a user-dirs file, in file order.
pub fn parse(content: &str) -> DirMap {
    content
        .lines()
        .filter(|line| line.starts_with(KEY_PREFIX))
        .filter_map(|line| line.trim().split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
        .collect()
}

/// Strips one layer of surrounding double quotes.
fn unquote(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

/// Key part of a raw line: everything before `=`, or the whole line.
fn line_key(line: &str) -> &str {
    line.split_once('=').map_or(line, |(key, _)| key).trim()
}

fn render(map: &DirMap) -> String {
    map.iter()
        .map(|(key, value)| format!("{}=\"{}\"\n", key, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> UserDirs {
        let id = test_identity(Path::new("/home/alice"));
        UserDirs::at(dir.path().join("user-dirs.dirs"), &id)
    }

    fn map(pairs: &[(&str, &str)]) -> DirMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn missing_file_yields_defaults_and_is_not_created() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let (status, dirs) = store.read().unwrap();

        assert_eq!(status, LoadStatus::Defaults);
        assert_eq!(dirs.len(), 8);
        assert_eq!(dirs["XDG_DOWNLOAD_DIR"], "/home/alice/Downloads");
        assert_eq!(dirs["XDG_PUBLICSHARE_DIR"], "/home/alice/Public");
        assert!(!store.path().exists());
    }

    #[test]
    fn save_to_fresh_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let updates = map(&[("XDG_MUSIC_DIR", "/mnt/music"), ("XDG_VIDEOS_DIR", "/mnt/video")]);

        assert_eq!(store.save(&updates).unwrap(), SAVED);

        let (status, dirs) = store.read().unwrap();
        assert_eq!(status, LoadStatus::Custom);
        assert_eq!(dirs, updates);
    }

    #[test]
    fn read_returns_only_keys_in_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), "XDG_MUSIC_DIR=\"/mnt/music\"\n# comment\n").unwrap();

        let (_, dirs) = store.read().unwrap();

        assert_eq!(dirs, map(&[("XDG_MUSIC_DIR", "/mnt/music")]));
    }

    #[test]
    fn save_keeps_foreign_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), "XDG_MUSIC_DIR=\"/mnt/music\"\n# comment\n").unwrap();

        store.save(&map(&[("XDG_DOWNLOAD_DIR", "/mnt/dl")])).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            content,
            "XDG_MUSIC_DIR=\"/mnt/music\"\n# comment\nXDG_DOWNLOAD_DIR=\"/mnt/dl\"\n"
        );
    }

    #[test]
    fn last_write_wins_per_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&map(&[("XDG_PICTURES_DIR", "/p"), ("XDG_MUSIC_DIR", "/v1")])).unwrap();
        store.save(&map(&[("XDG_MUSIC_DIR", "/v2")])).unwrap();

        let (_, dirs) = store.read().unwrap();

        assert_eq!(dirs["XDG_MUSIC_DIR"], "/v2");
        assert_eq!(dirs["XDG_PICTURES_DIR"], "/p");
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("XDG_MUSIC_DIR").count(), 1);
    }

    #[test]
    fn reset_discards_everything_and_is_stable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), "# written by xdg-user-dirs-update\nXDG_MUSIC_DIR=\"/x\"\n").unwrap();

        assert_eq!(store.reset_to_defaults().unwrap(), DEFAULTS_APPLIED);
        let first = fs::read_to_string(store.path()).unwrap();
        store.reset_to_defaults().unwrap();
        let second = fs::read_to_string(store.path()).unwrap();

        assert_eq!(first, second);
        assert!(!first.contains('#'));
        assert_eq!(first.lines().count(), 8);
        let (_, dirs) = store.read().unwrap();
        assert_eq!(dirs, store.defaults());
    }

    #[test]
    fn malformed_and_unprefixed_lines_are_skipped() {
        let dirs = parse("XDG_DESKTOP_DIR\nFOO=\"bar\"\n  XDG_MUSIC_DIR=\"/m\"\nXDG_VIDEOS_DIR=/v\n");
        assert_eq!(dirs, map(&[("XDG_VIDEOS_DIR", "/v")]));
    }

    #[test]
    fn only_one_quote_layer_is_stripped() {
        let dirs = parse("XDG_MUSIC_DIR=\"\"/m\"\"\n");
        assert_eq!(dirs["XDG_MUSIC_DIR"], "\"/m\"");
    }

    #[test]
    fn value_keeps_text_after_first_separator() {
        let dirs = parse("XDG_MUSIC_DIR=\"/mnt/a=b\"\n");
        assert_eq!(dirs["XDG_MUSIC_DIR"], "/mnt/a=b");
    }

    #[test]
    fn resolved_fills_unset_keys_from_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), "XDG_MUSIC_DIR=\"/mnt/music\"\n").unwrap();

        let dirs = store.resolved().unwrap();

        assert_eq!(dirs.len(), 8);
        assert_eq!(dirs["XDG_MUSIC_DIR"], "/mnt/music");
        assert_eq!(dirs["XDG_DESKTOP_DIR"], "/home/alice/Desktop");
    }

    #[test]
    fn write_failure_surfaces_path() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(Path::new("/home/alice"));
        let store = UserDirs::at(dir.path().join("missing/user-dirs.dirs"), &id);

        let err = store.reset_to_defaults().unwrap_err();

        assert!(err.to_string().contains("Failed to write"));
    }

    #[test]
    fn unreadable_location_is_an_error_not_defaults() {
        let dir = TempDir::new().unwrap();
        let id = test_identity(Path::new("/home/alice"));
        // a regular file where the parent directory should be
        let blocker = dir.path().join("config");
        fs::write(&blocker, "").unwrap();
        let store = UserDirs::at(blocker.join("user-dirs.dirs"), &id);

        let err = store.read().unwrap_err();
        assert!(err.to_string().contains("Failed to read"));

        let err = store.save(&map(&[("XDG_MUSIC_DIR", "/m")])).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn folder_keys_round_trip() {
        for folder in SpecialFolder::ALL {
            assert_eq!(SpecialFolder::from_key(folder.key()), Some(folder));
        }
        assert_eq!(SpecialFolder::from_key("XDG_FOO_DIR"), None);
    }
}
