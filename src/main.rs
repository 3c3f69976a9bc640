//! Ubuntu Desktop Tweak Installer (tweak-install)
//!
//! An interactive menu for setting up a fresh Ubuntu 25.x desktop.
//! 1. Resolves the real invoking user, even when started through `sudo`.
//! 2. Checks the OS release before touching anything.
//! 3. Runs one-shot install tasks (updates, drivers, toolchains) through apt.
//! 4. Toggles system tweaks (passwordless sudo, auto-login, Windows-style
//!    commands, GNOME shortcuts) by probing the live state and flipping it.
//! 5. Edits the special folder locations in `~/.config/user-dirs.dirs`.

mod desktop;
mod gsettings;
mod identity;
mod menu;
mod packages;
mod preflight;
mod runner;
mod settings;
mod tasks;
mod toggle;
mod user_dirs;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use identity::Identity;
use preflight::ReleaseCheck;
use runner::SystemRunner;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (default: ~/.config/rust-dotfiles/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open the menus even on an untested OS release
    #[arg(long)]
    skip_release_check: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stderr keeps log lines out of the menus; RUST_LOG=debug shows every command
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("{}", "🚀 Ubuntu Desktop Tweak Installer".green().bold());

    let runner = SystemRunner;
    let identity = Identity::resolve(&runner)?;
    let config_path = args
        .config
        .unwrap_or_else(|| settings::default_path(&identity));
    let settings = settings::load(&config_path)?;

    if args.skip_release_check {
        tracing::info!("release check skipped");
    } else {
        let version = preflight::release_version(&runner)
            .context("Use --skip-release-check to run anyway")?;
        match preflight::check_release(&version, &settings.release_major, &settings.release_minimum) {
            ReleaseCheck::Supported => {
                println!("   ✅ Ubuntu {} detected.", version);
            }
            ReleaseCheck::Degraded => {
                println!(
                    "{}",
                    format!(
                        "⚠️  Ubuntu {} is older than {}. Some features may not work.",
                        version, settings.release_minimum
                    )
                    .yellow()
                );
            }
            ReleaseCheck::Unsupported => {
                eprintln!(
                    "{}",
                    format!("❌ This tool requires Ubuntu {}.x (found '{}').", settings.release_major, version).red()
                );
                bail!("Unsupported OS release '{}'", version);
            }
        }
    }

    if identity.elevated {
        println!("   👤 Acting on behalf of {}.", identity.username.bold());
    }

    let session = menu::Session {
        runner: &runner,
        identity: &identity,
        settings: &settings,
    };
    menu::run(&session)
}
