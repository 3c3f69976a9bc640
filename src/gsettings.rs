//! `gsettings` on the invoking user's session bus.

use anyhow::Result;

use crate::identity::Identity;
use crate::runner::{Cmd, CommandRunner, run_checked};

pub struct GSettings<'a> {
    runner: &'a dyn CommandRunner,
    identity: &'a Identity,
}

impl<'a> GSettings<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a Identity) -> Self {
        Self { runner, identity }
    }

    /// `gsettings <args>`, re-targeted at the real user when we run as root.
    fn command(&self, args: &[&str]) -> Cmd {
        let cmd = if self.identity.elevated {
            Cmd::sudo(["-u", self.identity.username.as_str()])
                .arg(format!("DBUS_SESSION_BUS_ADDRESS={}", self.identity.session_bus()))
                .arg("gsettings")
        } else {
            Cmd::new("gsettings")
        };
        cmd.args(args)
    }

    /// Raw GVariant text of a key, e.g. `'<Super>e'` or `uint32 5000`.
    pub fn get(&self, schema: &str, key: &str) -> Result<String> {
        let output = run_checked(self.runner, &self.command(&["get", schema, key]))?;
        Ok(output.stdout_trimmed().to_string())
    }

    pub fn set(&self, schema: &str, key: &str, value: &str) -> Result<()> {
        run_checked(self.runner, &self.command(&["set", schema, key, value]))?;
        Ok(())
    }

    pub fn reset(&self, schema: &str, key: &str) -> Result<()> {
        run_checked(self.runner, &self.command(&["reset", schema, key]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use crate::runner::fake::FakeRunner;
    use std::path::Path;

    #[test]
    fn plain_gsettings_when_not_elevated() {
        let runner = FakeRunner::new();
        let id = test_identity(Path::new("/home/alice"));

        GSettings::new(&runner, &id).set("org.gnome.mutter", "check-alive-timeout", "uint32 0").unwrap();

        assert_eq!(
            runner.call_lines(),
            vec!["gsettings set org.gnome.mutter check-alive-timeout uint32 0"]
        );
    }

    #[test]
    fn elevated_runs_as_user_on_session_bus() {
        let runner = FakeRunner::new();
        runner.respond(&["sudo"], 0, "true\n");
        let id = Identity { elevated: true, ..test_identity(Path::new("/home/alice")) };

        let value = GSettings::new(&runner, &id).get("org.example", "enabled").unwrap();

        assert_eq!(value, "true");
        assert_eq!(runner.calls()[0], vec![
            "sudo",
            "-u",
            "alice",
            "DBUS_SESSION_BUS_ADDRESS=unix:path=/run/user/1000/bus",
            "gsettings",
            "get",
            "org.example",
            "enabled",
        ]);
    }
}
