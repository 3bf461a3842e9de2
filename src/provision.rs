// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Provisioning run logic.
//!
//! Utilities to run the external provisioning tool against the package's
//! inventory and playbook files. The tool itself is an opaque collaborator:
//! dotpack never interprets either file, it only resolves their paths, points
//! the tool at them, and relays the tool's standard output line-by-line while
//! the run is in flight.
//!
//! # Streaming Model
//!
//! A provisioning run is strictly synchronous. The calling thread blocks on
//! the child's standard output until the child closes it, which is how the
//! end of the run is observed. Standard error is drained only after standard
//! output closes, so the entire run stays on one thread. There is no timeout;
//! a run takes as long as the tool takes.
//!
//! # Strict Mode
//!
//! The exit status policy is governed by [`ProvisionSettings::strict`]. With
//! strict mode off, the exit status goes unchecked and drained diagnostics
//! are discarded, so the streamed transcript is the only record of a failed
//! run. With strict mode on, a non-zero exit fails the run with the exit code
//! and whatever the tool wrote to its error stream.
//!
//! [`ProvisionSettings::strict`]: crate::config::ProvisionSettings

use crate::config::ProvisionSettings;

use std::{
    ffi::OsString,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, instrument, warn};

/// Fully resolved invocation of the provisioning binary.
///
/// Inventory and playbook paths resolve against the package root, never
/// against the install prefix. The invocation is carried as a discrete
/// argument vector, so path contents never pass through a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionCommand {
    binary: String,
    inventory: PathBuf,
    playbook: PathBuf,
}

impl ProvisionCommand {
    /// Resolve invocation from provisioning settings and package root.
    pub fn new(settings: &ProvisionSettings, package_root: impl AsRef<Path>) -> Self {
        let dir = package_root.as_ref().join(&settings.dir);

        Self {
            binary: settings.binary.clone(),
            inventory: dir.join(&settings.inventory),
            playbook: dir.join(&settings.playbook),
        }
    }

    /// Name or path of the binary to invoke.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Argument vector handed to the spawner.
    pub fn argv(&self) -> Vec<OsString> {
        vec![
            "-i".into(),
            self.inventory.clone().into_os_string(),
            self.playbook.clone().into_os_string(),
        ]
    }

    /// Render full invocation on one line for logs.
    pub fn render(&self) -> String {
        format!(
            "{} -i {} {}",
            self.binary,
            self.inventory.display(),
            self.playbook.display()
        )
    }
}

/// Layer of indirection for process creation.
pub trait Spawn {
    /// Spawn the provisioning command with piped output streams.
    fn spawn(&self, command: &ProvisionCommand) -> Result<Box<dyn ChildHandle>>;
}

/// Handle to a spawned provisioning process.
///
/// Owned exclusively by the run for its duration, and waited on before the
/// run returns.
pub trait ChildHandle {
    /// Take ownership of the child's standard output stream.
    fn stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Take ownership of the child's standard error stream.
    fn stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Block until the child exits.
    fn wait(&mut self) -> Result<ExitReport>;
}

/// Exit outcome of a provisioning process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
}

impl ExitReport {
    /// Check if the process exited cleanly.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Process creation through [`std::process::Command`].
#[derive(Debug, Default)]
pub struct SystemSpawn;

impl Spawn for SystemSpawn {
    fn spawn(&self, command: &ProvisionCommand) -> Result<Box<dyn ChildHandle>> {
        let child = Command::new(command.binary())
            .args(command.argv())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ProvisionError::Spawn {
                binary: command.binary().into(),
                source: err,
            })?;

        Ok(Box::new(SystemChild(child)))
    }
}

struct SystemChild(std::process::Child);

impl ChildHandle for SystemChild {
    fn stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.0
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn Read + Send>)
    }

    fn stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.0
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as Box<dyn Read + Send>)
    }

    fn wait(&mut self) -> Result<ExitReport> {
        let status = self.0.wait()?;
        Ok(ExitReport {
            code: status.code(),
        })
    }
}

/// Provisioning run driver.
///
/// Streams the child's standard output to a caller-supplied sink between a
/// start banner and a completion banner.
pub struct Provisioner<S = SystemSpawn>
where
    S: Spawn,
{
    command: ProvisionCommand,
    strict: bool,
    spawner: S,
}

impl Provisioner {
    /// Construct new provisioner backed by the system spawner.
    pub fn new(settings: &ProvisionSettings, package_root: impl AsRef<Path>) -> Self {
        Self::with_spawner(settings, package_root, SystemSpawn)
    }
}

impl<S> Provisioner<S>
where
    S: Spawn,
{
    /// Construct new provisioner with a custom spawner.
    pub fn with_spawner(
        settings: &ProvisionSettings,
        package_root: impl AsRef<Path>,
        spawner: S,
    ) -> Self {
        Self {
            command: ProvisionCommand::new(settings, package_root),
            strict: settings.strict,
            spawner,
        }
    }

    /// Resolved invocation this provisioner will spawn.
    pub fn command(&self) -> &ProvisionCommand {
        &self.command
    }

    /// Run provisioning to completion, relaying its output to `sink`.
    ///
    /// Writes a start banner, spawns the command, relays each line of the
    /// child's standard output as it arrives, and writes a completion banner
    /// once the child closes its output.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::Spawn`] if the binary cannot be launched.
    /// - Return [`ProvisionError::Stream`] if relaying output fails.
    /// - Return [`ProvisionError::ProvisionFailed`] if the child exits
    ///   non-zero while strict mode is on. With strict mode off the run
    ///   reports success regardless of exit status.
    #[instrument(skip(self, sink), level = "debug")]
    pub fn run(&self, sink: &mut impl Write) -> Result<()> {
        writeln!(sink, "Starting provisioning...")?;
        debug!("spawn: {}", self.command.render());

        let mut child = self.spawner.spawn(&self.command)?;
        let stdout = child.stdout().ok_or(ProvisionError::MissingStdout)?;

        // Unbounded blocking read; ends when the child closes its stdout.
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            writeln!(sink, "{line}")?;
        }

        // INVARIANT: Drain stderr only after stdout closes, so the whole run
        // stays on the calling thread.
        let mut diagnostics = String::new();
        if let Some(mut stderr) = child.stderr() {
            stderr.read_to_string(&mut diagnostics)?;
        }

        let report = child.wait()?;
        writeln!(sink, "Provisioning run finished...")?;

        if !report.success() {
            if self.strict {
                return Err(ProvisionError::ProvisionFailed {
                    code: report.code,
                    diagnostics,
                });
            }

            warn!("provisioning exited with status {:?}", report.code);
        }

        Ok(())
    }
}

impl<S> crate::install::PostInstall for Provisioner<S>
where
    S: Spawn,
{
    fn name(&self) -> &str {
        "provision"
    }

    fn run(&self, mut sink: &mut dyn Write) -> crate::install::Result<()> {
        Ok(Provisioner::run(self, &mut sink)?)
    }
}

/// All possible error types for provisioning runs.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Provisioning binary cannot be launched.
    #[error("cannot spawn provisioning binary {binary:?}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Relaying the child's output fails.
    #[error(transparent)]
    Stream(#[from] std::io::Error),

    /// Child spawned without a captured standard output stream.
    #[error("provisioning process has no captured stdout")]
    MissingStdout,

    /// Provisioning run failed while strict mode is on.
    #[error("provisioning exited with status {code:?}:\n{diagnostics}")]
    ProvisionFailed {
        code: Option<i32>,
        diagnostics: String,
    },
}

/// Friendly result alias :3
type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct StubSpawn {
        stdout: String,
        stderr: String,
        code: Option<i32>,
    }

    impl Spawn for StubSpawn {
        fn spawn(&self, _command: &ProvisionCommand) -> Result<Box<dyn ChildHandle>> {
            Ok(Box::new(StubChild {
                stdout: Some(Box::new(Cursor::new(self.stdout.clone().into_bytes()))),
                stderr: Some(Box::new(Cursor::new(self.stderr.clone().into_bytes()))),
                code: self.code,
            }))
        }
    }

    struct StubChild {
        stdout: Option<Box<dyn Read + Send>>,
        stderr: Option<Box<dyn Read + Send>>,
        code: Option<i32>,
    }

    impl ChildHandle for StubChild {
        fn stdout(&mut self) -> Option<Box<dyn Read + Send>> {
            self.stdout.take()
        }

        fn stderr(&mut self) -> Option<Box<dyn Read + Send>> {
            self.stderr.take()
        }

        fn wait(&mut self) -> Result<ExitReport> {
            Ok(ExitReport { code: self.code })
        }
    }

    fn provisioner(stub: StubSpawn, strict: bool) -> Provisioner<StubSpawn> {
        let settings = ProvisionSettings {
            strict,
            ..Default::default()
        };

        Provisioner::with_spawner(&settings, "/pkg", stub)
    }

    #[test]
    fn resolves_command_against_package_root() {
        let command = ProvisionCommand::new(&ProvisionSettings::default(), "/pkg");

        assert_eq!(
            command.render(),
            "ansible-playbook -i /pkg/ansible/hosts.yaml /pkg/ansible/playbook.yaml"
        );
        assert_eq!(
            command.argv(),
            vec![
                OsString::from("-i"),
                OsString::from("/pkg/ansible/hosts.yaml"),
                OsString::from("/pkg/ansible/playbook.yaml"),
            ]
        );
    }

    #[test]
    fn relays_stdout_lines_between_banners() -> anyhow::Result<()> {
        let stub = StubSpawn {
            stdout: "PLAY [all]\nTASK [dotfiles]\nok: [localhost]\n".into(),
            code: Some(0),
            ..Default::default()
        };

        let mut sink = Vec::new();
        provisioner(stub, false).run(&mut sink)?;

        assert_eq!(
            String::from_utf8(sink)?,
            "Starting provisioning...\n\
             PLAY [all]\n\
             TASK [dotfiles]\n\
             ok: [localhost]\n\
             Provisioning run finished...\n"
        );

        Ok(())
    }

    #[test_case(false; "legacy mode shrugs off exit status")]
    #[test_case(true; "strict mode propagates exit status")]
    #[test]
    fn nonzero_exit_honors_strict_mode(strict: bool) {
        let stub = StubSpawn {
            stdout: "fatal: unreachable\n".into(),
            code: Some(2),
            ..Default::default()
        };

        let mut sink = Vec::new();
        let result = provisioner(stub, strict).run(&mut sink);

        if strict {
            assert!(matches!(
                result,
                Err(ProvisionError::ProvisionFailed {
                    code: Some(2),
                    ..
                })
            ));
        } else {
            assert!(result.is_ok());
        }
    }

    #[test]
    fn absorbs_stderr_only_output() -> anyhow::Result<()> {
        let stub = StubSpawn {
            stderr: "ERROR! the playbook could not be found\n".into(),
            code: Some(1),
            ..Default::default()
        };

        let mut sink = Vec::new();
        provisioner(stub, false).run(&mut sink)?;

        // Diagnostics written only to stderr never reach the transcript.
        assert_eq!(
            String::from_utf8(sink)?,
            "Starting provisioning...\nProvisioning run finished...\n"
        );

        Ok(())
    }

    #[test]
    fn strict_failure_carries_diagnostics() {
        let stub = StubSpawn {
            stderr: "ERROR! the playbook could not be found\n".into(),
            code: Some(1),
            ..Default::default()
        };

        let mut sink = Vec::new();
        let error = provisioner(stub, true).run(&mut sink).unwrap_err();

        assert!(error
            .to_string()
            .contains("ERROR! the playbook could not be found"));
    }
}
