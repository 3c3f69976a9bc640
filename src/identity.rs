//! The user this tool acts on behalf of.
//!
//! Under `sudo` the process runs as root, but folder defaults, autologin and
//! desktop settings all belong to the person who invoked it. The identity is
//! resolved once in `main` and passed down explicitly.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::runner::{Cmd, CommandRunner, run_checked};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub uid: u32,
    pub home_dir: PathBuf,
    /// True when running through sudo on behalf of `username`.
    pub elevated: bool,
}

impl Identity {
    /// Resolves the real invoking user from `SUDO_USER`/`USER` and looks up
    /// their passwd entry with `getent`.
    pub fn resolve(runner: &dyn CommandRunner) -> Result<Self> {
        Self::resolve_with(runner, |name| std::env::var(name).ok())
    }

    /// `resolve` with the environment lookup supplied by the caller.
    fn resolve_with(runner: &dyn CommandRunner, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| env(name).filter(|v| !v.is_empty());
        let sudo_user = var("SUDO_USER");
        let elevated = sudo_user.is_some();
        let username = sudo_user
            .or_else(|| var("USER"))
            .or_else(|| var("LOGNAME"))
            .context("Could not determine the current user (USER is unset)")?;

        let entry = run_checked(runner, &Cmd::new("getent").args(["passwd", username.as_str()]))
            .with_context(|| format!("No passwd entry for user '{}'", username))?;
        let mut identity = Self::from_passwd_line(entry.stdout_trimmed())?;
        identity.elevated = elevated;

        tracing::debug!(user = %identity.username, uid = identity.uid, elevated, "resolved identity");
        Ok(identity)
    }

    /// Parses `name:x:uid:gid:gecos:home:shell`.
    pub fn from_passwd_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            bail!("Malformed passwd entry: '{}'", line);
        }
        let uid = fields[2]
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid uid '{}' in passwd entry", fields[2]))?;
        Ok(Self {
            username: fields[0].to_string(),
            uid,
            home_dir: PathBuf::from(fields[5]),
            elevated: false,
        })
    }

    /// Expands a leading `~/` against this user's home.
    pub fn expand(&self, path: &str) -> PathBuf {
        if let Some(stripped) = path.strip_prefix("~/") {
            return self.home_dir.join(stripped);
        }
        PathBuf::from(path)
    }

    pub fn home(&self) -> &Path {
        &self.home_dir
    }

    /// Session bus address used to reach this user's desktop settings.
    pub fn session_bus(&self) -> String {
        format!("unix:path=/run/user/{}/bus", self.uid)
    }
}

#[cfg(test)]
pub fn test_identity(home: &Path) -> Identity {
    Identity {
        username: "alice".to_string(),
        uid: 1000,
        home_dir: home.to_path_buf(),
        elevated: false,
    }
}
