//! OS release check run before the menus open.

use anyhow::{Context, Result, bail};

use crate::runner::{Cmd, CommandRunner, run_checked};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseCheck {
    Supported,
    /// Right major release but older than the tested point release.
    Degraded,
    Unsupported,
}

/// `lsb_release -rs`, e.g. `25.04`.
pub fn release_version(runner: &dyn CommandRunner) -> Result<String> {
    let output = run_checked(runner, &Cmd::new("lsb_release").arg("-rs"))
        .context("Could not determine the OS release")?;
    Ok(output.stdout_trimmed().to_string())
}

/// `lsb_release -cs`, e.g. `plucky`.
pub fn release_codename(runner: &dyn CommandRunner) -> Result<String> {
    let output = run_checked(runner, &Cmd::new("lsb_release").arg("-cs"))
        .context("Could not determine the OS codename")?;
    let codename = output.stdout_trimmed();
    if codename.is_empty() {
        bail!("lsb_release returned an empty codename");
    }
    Ok(codename.to_string())
}

/// Splits `25.04` into `(25, 4)`. A bare major counts as `.0`.
fn version_pair(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

/// Classifies `version` against the required `major` and the `minimum`
/// point release.
pub fn check_release(version: &str, major: &str, minimum: &str) -> ReleaseCheck {
    let (Some(current), Some((required, _))) = (version_pair(version), version_pair(major)) else {
        return ReleaseCheck::Unsupported;
    };
    if current.0 != required {
        return ReleaseCheck::Unsupported;
    }
    match version_pair(minimum) {
        Some(min) if current < min => ReleaseCheck::Degraded,
        _ => ReleaseCheck::Supported,
    }
}
