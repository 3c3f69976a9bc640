//! Interactive menus.
//!
//! Every submenu is rebuilt and re-probed on each pass, so the `[status]`
//! shown next to a toggle always reflects the live system. An action that
//! fails is reported and the menu stays open.

use anyhow::{Result, bail};
use colored::*;
use inquire::{Confirm, InquireError, Select, Text};

use crate::desktop::{DesktopShortcut, HangTimeout, WellbeingPanel, parse_seconds};
use crate::identity::Identity;
use crate::packages::{CATALOG, FeaturePackage};
use crate::preflight::release_codename;
use crate::runner::CommandRunner;
use crate::settings::Settings;
use crate::tasks::{self, InstallTask, run_task};
use crate::toggle::{AutoLogin, CommandAliases, Feature, SudoPrompt, Toggle};
use crate::user_dirs::{DirMap, SpecialFolder, UserDirs};

const MAIN_MENU: [&str; 6] = [
    "System Installation and Updates",
    "Software and Package Management",
    "Hardware Optimization and Drivers",
    "System Tweaks and Customizations",
    "User Folder Configurations",
    "Exit",
];

const BACK: &str = "Back";

/// Everything a menu action needs, borrowed from `main`.
pub struct Session<'a> {
    pub runner: &'a dyn CommandRunner,
    pub identity: &'a Identity,
    pub settings: &'a Settings,
}

type TaskBuilder<'a> = Box<dyn Fn() -> Result<InstallTask> + 'a>;

enum Entry<'a> {
    Feature(Feature<'a>),
    /// Built on selection; some tasks query the system to pick packages.
    Task(&'static str, TaskBuilder<'a>),
}

impl<'a> Entry<'a> {
    fn task(title: &'static str, build: impl Fn() -> Result<InstallTask> + 'a) -> Self {
        Entry::Task(title, Box::new(build))
    }

    fn render(&self) -> String {
        match self {
            Entry::Feature(feature) => feature_line(feature),
            Entry::Task(title, _) => title.to_string(),
        }
    }
}

/// `<label> [<status>]`, probed now.
fn feature_line(feature: &Feature) -> String {
    let status = feature.status().unwrap_or_else(|e| {
        tracing::warn!(feature = feature.label(), error = %e, "probe failed");
        "unknown".to_string()
    });
    format!("{} [{}]", feature.label(), status)
}

/// Select that maps Esc and Ctrl-C to `None`.
fn pick(message: &str, options: Vec<String>) -> Result<Option<usize>> {
    match Select::new(message, options).with_page_size(12).raw_prompt() {
        Ok(choice) => Ok(Some(choice.index)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("{}", format!("❌ {:#}", err).red());
}

pub fn run(session: &Session) -> Result<()> {
    loop {
        println!();
        let options = MAIN_MENU.iter().map(|s| s.to_string()).collect();
        let result = match pick("Main Menu", options)? {
            Some(0) => session.entry_menu(MAIN_MENU[0], || session.installation_entries()),
            Some(1) => session.entry_menu(MAIN_MENU[1], || session.software_entries()),
            Some(2) => session.entry_menu(MAIN_MENU[2], || session.hardware_entries()),
            Some(3) => session.entry_menu(MAIN_MENU[3], || session.tweak_entries()),
            Some(4) => session.folder_menu(),
            _ => break,
        };
        if let Err(e) = result {
            report(&e);
        }
    }
    println!("{}", "👋 Exiting.".green());
    Ok(())
}

impl<'a> Session<'a> {
    fn installation_entries(&self) -> Vec<Entry<'a>> {
        vec![
            Entry::task("Update and upgrade system packages", || Ok(tasks::system_update())),
            Entry::task("Install essential tools", || Ok(tasks::essential_tools())),
            Entry::task("Configure automatic security updates", || Ok(tasks::unattended_upgrades())),
        ]
    }

    fn software_entries(&self) -> Vec<Entry<'a>> {
        let runner = self.runner;
        let identity = self.identity;
        let mut entries = vec![
            Entry::task("Virtualization (KVM, Libvirt)", move || Ok(tasks::virtualization(identity))),
            Entry::task("Software managers (GNOME Software, Synaptic, Snap)", || Ok(tasks::software_managers())),
            Entry::task("Wine and Winetricks", move || Ok(tasks::wine(&release_codename(runner)?))),
            Entry::task("Python toolchain", || Ok(tasks::python_toolchain())),
        ];
        entries.extend(
            CATALOG
                .iter()
                .map(|spec| Entry::Feature(Feature::FeaturePackage(FeaturePackage::new(runner, identity, *spec)))),
        );
        entries
    }

    fn hardware_entries(&self) -> Vec<Entry<'a>> {
        let runner = self.runner;
        let identity = self.identity;
        vec![
            Entry::task("AMD CPU microcode", || Ok(tasks::amd_cpu())),
            Entry::task("Intel CPU microcode", || Ok(tasks::intel_cpu())),
            Entry::task("AMD GPU drivers", || Ok(tasks::amd_gpu())),
            Entry::task("AMD GPU drivers with ROCm", move || Ok(tasks::amd_gpu_rocm(identity))),
            Entry::task("NVIDIA drivers", move || Ok(tasks::nvidia_gpu(runner))),
            Entry::task("Intel GPU media driver", || Ok(tasks::intel_gpu())),
            Entry::task("ARM64 (Qualcomm) firmware", || Ok(tasks::arm64_firmware())),
        ]
    }

    fn tweak_entries(&self) -> Vec<Entry<'a>> {
        let (runner, identity, settings) = (self.runner, self.identity, self.settings);
        [
            Feature::SudoPrompt(SudoPrompt::new(runner, identity, settings.sudoers_path(identity))),
            Feature::AutoLogin(AutoLogin::new(runner, identity, settings.gdm_path(identity))),
            Feature::CommandAliases(CommandAliases::new(runner, settings.aliases_path(identity))),
            Feature::DesktopShortcut(DesktopShortcut::new(runner, identity)),
            Feature::WellbeingPanel(WellbeingPanel::new(runner, identity)),
            Feature::HangTimeout(HangTimeout::new(runner, identity)),
        ]
        .into_iter()
        .map(Entry::Feature)
        .collect()
    }

    fn entry_menu(&self, title: &str, build: impl Fn() -> Vec<Entry<'a>>) -> Result<()> {
        loop {
            println!("\n{}", title.blue().bold());
            let entries = build();
            let mut options: Vec<String> = entries.iter().map(Entry::render).collect();
            options.push(BACK.to_string());

            let Some(index) = pick("Select an option:", options)? else {
                return Ok(());
            };
            let Some(entry) = entries.get(index) else {
                return Ok(());
            };
            if let Err(e) = self.activate(entry) {
                report(&e);
            }
        }
    }

    fn activate(&self, entry: &Entry) -> Result<()> {
        match entry {
            Entry::Feature(Feature::HangTimeout(timeout)) => set_timeout(timeout),
            Entry::Feature(feature) => match feature.as_toggle() {
                Some(toggle) => flip(toggle),
                None => Ok(()),
            },
            Entry::Task(_, build) => {
                let task = build()?;
                println!("\n{}", format!("📦 {}...", task.title).blue().bold());
                run_task(self.runner, &task)?;
                println!("{}", format!("✅ {} complete.", task.title).green());
                if let Some(note) = task.note {
                    println!("{}", format!("⚠️  {}", note).yellow());
                }
                Ok(())
            }
        }
    }

    fn user_dirs(&self) -> UserDirs {
        match self.settings.user_dirs_path(self.identity) {
            Some(path) => UserDirs::at(path, self.identity),
            None => UserDirs::for_identity(self.identity),
        }
    }

    fn folder_menu(&self) -> Result<()> {
        let store = self.user_dirs();
        let options = [
            "Show current folders",
            "Change a folder",
            "Reset all folders to defaults",
            BACK,
        ];
        loop {
            println!("\n{}", MAIN_MENU[4].blue().bold());
            let result = match pick("Select an option:", options.iter().map(|s| s.to_string()).collect())? {
                Some(0) => show_folders(&store),
                Some(1) => change_folder(&store, self.identity),
                Some(2) => reset_folders(&store),
                _ => return Ok(()),
            };
            if let Err(e) = result {
                report(&e);
            }
        }
    }
}

/// Applies a toggle, then probes again to confirm it took.
fn flip(toggle: &dyn Toggle) -> Result<()> {
    let expected = toggle.apply()?;
    let actual = toggle.probe()?;
    if actual == expected {
        println!("{}", format!("✅ {}: {}", toggle.label(), toggle.describe(actual)).green());
    } else {
        tracing::warn!(feature = toggle.label(), ?expected, ?actual, "state did not change");
        println!(
            "{}",
            format!(
                "⚠️  {} still reports '{}'. The change may need a re-login.",
                toggle.label(),
                toggle.describe(actual)
            )
            .yellow()
        );
    }
    Ok(())
}

fn set_timeout(timeout: &HangTimeout) -> Result<()> {
    let current = timeout.probe()?;
    println!("   Current timeout: {}s", current);
    let input = Text::new("New timeout in seconds (0 disables):")
        .with_default(&current.to_string())
        .prompt()?;
    let seconds = parse_seconds(&input)?;
    timeout.set(seconds)?;
    if seconds == 0 {
        println!("{}", "✅ Hang timeout disabled.".green());
    } else {
        println!("{}", format!("✅ Hang timeout set to {}s.", seconds).green());
    }
    Ok(())
}

fn show_folders(store: &UserDirs) -> Result<()> {
    let (status, _) = store.read()?;
    println!("   {} ({})", status.to_string().cyan(), store.path().display());
    for (key, path) in store.resolved()? {
        let name = SpecialFolder::from_key(&key).map_or(key.clone(), |f| f.to_string());
        println!("   {:<10} {}", name.bold(), path);
    }
    Ok(())
}

/// Cleans up a folder path typed by the user: `~/` expanded, must end up
/// absolute and fit inside a quoted value.
fn folder_value(input: &str, identity: &Identity) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Folder path cannot be empty.");
    }
    if input.contains('"') || input.contains('\n') {
        bail!("Folder path cannot contain quotes or line breaks.");
    }
    let path = identity.expand(input);
    if !path.is_absolute() {
        bail!("'{}' is not an absolute path.", input);
    }
    Ok(path.to_string_lossy().into_owned())
}

/// Outcome of editing one folder.
#[derive(Debug, PartialEq, Eq)]
enum FolderEdit {
    Unchanged,
    Set(String),
}

const NO_CHANGES: &str = "No changes made.";

/// A typed location. Blank input or the current value changes nothing.
fn typed_edit(input: &str, current: &str, identity: &Identity) -> Result<FolderEdit> {
    if input.trim().is_empty() {
        return Ok(FolderEdit::Unchanged);
    }
    let value = folder_value(input, identity)?;
    if value == current {
        return Ok(FolderEdit::Unchanged);
    }
    Ok(FolderEdit::Set(value))
}

/// Back to `<home>/<DefaultName>` for one folder.
fn default_edit(store: &UserDirs, folder: SpecialFolder, current: &str) -> FolderEdit {
    match store.defaults().get(folder.key()) {
        Some(default) if default != current => FolderEdit::Set(default.clone()),
        _ => FolderEdit::Unchanged,
    }
}

/// Writes a single-key update; nothing touches the file when unchanged.
fn apply_edit(store: &UserDirs, folder: SpecialFolder, edit: FolderEdit) -> Result<&'static str> {
    match edit {
        FolderEdit::Unchanged => Ok(NO_CHANGES),
        FolderEdit::Set(value) => {
            let mut update = DirMap::new();
            update.insert(folder.key().to_string(), value);
            store.save(&update)
        }
    }
}

fn change_folder(store: &UserDirs, identity: &Identity) -> Result<()> {
    let folder = match Select::new("Which folder?", SpecialFolder::ALL.to_vec()).prompt() {
        Ok(folder) => folder,
        Err(InquireError::OperationCanceled) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let current = store.resolved()?.get(folder.key()).cloned().unwrap_or_default();
    println!("   Current location: {}", current);

    let actions = vec![
        "Enter a new location".to_string(),
        format!("Reset {} to its default", folder),
        BACK.to_string(),
    ];
    let edit = match pick("What do you want to do?", actions)? {
        Some(0) => {
            let input = Text::new(&format!("New location for {}:", folder))
                .with_default(&current)
                .prompt()?;
            typed_edit(&input, &current, identity)?
        }
        Some(1) => default_edit(store, folder, &current),
        _ => return Ok(()),
    };

    let message = apply_edit(store, folder, edit)?;
    if message == NO_CHANGES {
        println!("{}", message.yellow());
    } else {
        println!("{}", format!("✅ {}", message).green());
    }
    Ok(())
}

fn reset_folders(store: &UserDirs) -> Result<()> {
    let confirmed = Confirm::new("Replace every folder setting with the defaults?")
        .with_default(false)
        .prompt()?;
    if confirmed {
        println!("{}", format!("✅ {}", store.reset_to_defaults()?).green());
    }
    Ok(())
}
