// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Install pipeline.
//!
//! Installing a package happens in two phases. The __base install__ stages
//! the package payload into the install prefix. After that, every registered
//! __post-install hook__ runs in registration order. The stock hook is the
//! provisioning run, but hooks are plain values registered on the installer,
//! so nothing about the pipeline is specific to provisioning.
//!
//! The ordering contract is strict: the base install must fully succeed
//! before the first hook runs. A base install failure propagates unchanged
//! and no hook is ever invoked. A hook failure aborts the remaining hooks.
//!
//! # Payload Staging
//!
//! The payload is whatever the package tree holds, discovered by walking the
//! package root depth-first. Version control and build litter (".git",
//! "target") never count as payload. When the manifest carries an
//! `install.include` listing, only files matching at least one of its glob
//! patterns get staged.

use crate::config::PackageManifest;

use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::VecDeque,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Post-install extension point.
///
/// Hooks get registered on an [`Installer`] as plain values; registration
/// order is run order.
pub trait PostInstall {
    /// Short name used for logs.
    fn name(&self) -> &str;

    /// Run the hook, relaying any live output to `sink`.
    fn run(&self, sink: &mut dyn Write) -> Result<()>;
}

/// Package installer.
///
/// Stages the package payload into the install prefix, then runs every
/// registered post-install hook in order.
pub struct Installer {
    manifest: PackageManifest,
    package_root: PathBuf,
    prefix: PathBuf,
    hooks: Vec<Box<dyn PostInstall>>,
}

impl Installer {
    /// Construct new installer with no hooks registered.
    pub fn new(
        manifest: PackageManifest,
        package_root: impl Into<PathBuf>,
        prefix: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest,
            package_root: package_root.into(),
            prefix: prefix.into(),
            hooks: Vec::new(),
        }
    }

    /// Register a post-install hook.
    pub fn register(&mut self, hook: impl PostInstall + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Run base install, then every registered hook.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Io`] if payload staging fails. No hook runs
    ///   in that case.
    /// - Return the failing hook's error otherwise; later hooks do not run.
    #[instrument(skip(self, sink), level = "debug")]
    pub fn run(&self, sink: &mut dyn Write) -> Result<()> {
        self.base_install()?;

        for hook in &self.hooks {
            info!("running post-install hook: {}", hook.name());
            hook.run(sink)?;
        }

        Ok(())
    }

    /// Stage package payload into the install prefix.
    #[instrument(skip(self), level = "debug")]
    fn base_install(&self) -> Result<()> {
        let payload = self.payload_files()?;
        info!(
            "stage {} files into {}",
            payload.len(),
            self.prefix.display()
        );

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(payload.len() as u64).with_style(style);

        for relative in payload {
            bar.set_message(relative.display().to_string());
            let target = self.prefix.join(&relative);
            if let Some(parent) = target.parent() {
                mkdirp::mkdirp(parent)?;
            }
            fs::copy(self.package_root.join(&relative), &target)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(())
    }

    /// List payload files relative to the package root.
    fn payload_files(&self) -> Result<Vec<PathBuf>> {
        let include = match &self.manifest.install.include {
            Some(patterns) => patterns
                .iter()
                .map(|pattern| Pattern::new(pattern))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let mut entries = Vec::new();
        let mut trees = VecDeque::new();
        trees.push_front((self.package_root.clone(), PathBuf::new()));

        // Use DFS to traverse the package tree.
        while let Some((directory, relative)) = trees.pop_front() {
            for entry in fs::read_dir(&directory)? {
                let entry = entry?;
                let name = entry.file_name();
                let file_type = entry.file_type()?;
                let next_relative = relative.join(&name);

                if file_type.is_dir() {
                    // INVARIANT: Version control and build litter are never payload.
                    if name == ".git" || name == "target" {
                        continue;
                    }
                    trees.push_front((entry.path(), next_relative));
                } else if file_type.is_file()
                    && (include.is_empty() || matches_any(&include, &next_relative))
                {
                    entries.push(next_relative);
                }
            }
        }

        Ok(entries)
    }
}

fn matches_any(patterns: &[Pattern], path: &Path) -> bool {
    patterns.iter().any(|pattern| pattern.matches_path(path))
}

/// All possible error types for package installation.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Payload staging fails.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Include listing holds an invalid glob pattern.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Provisioning hook fails.
    #[error(transparent)]
    Provision(#[from] crate::provision::ProvisionError),
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallSettings;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::Cell, rc::Rc};

    struct RecordingHook {
        ran: Rc<Cell<bool>>,
    }

    impl PostInstall for RecordingHook {
        fn name(&self) -> &str {
            "recording"
        }

        fn run(&self, sink: &mut dyn Write) -> Result<()> {
            self.ran.set(true);
            writeln!(sink, "hook ran")?;
            Ok(())
        }
    }

    fn manifest(include: Option<Vec<String>>) -> PackageManifest {
        let mut manifest = PackageManifest::default();
        manifest.install = InstallSettings {
            prefix: None,
            include,
        };

        manifest
    }

    #[sealed_test]
    fn stages_payload_then_runs_hooks() -> anyhow::Result<()> {
        fs::create_dir_all("pkg/ansible")?;
        fs::write("pkg/dotpack.toml", "[package]\nname = \"blah\"\n")?;
        fs::write("pkg/ansible/hosts.yaml", "all:\n")?;

        let ran = Rc::new(Cell::new(false));
        let mut installer = Installer::new(manifest(None), "pkg", "prefix");
        installer.register(RecordingHook {
            ran: Rc::clone(&ran),
        });

        let mut sink = Vec::new();
        installer.run(&mut sink)?;

        assert!(ran.get());
        assert_eq!(String::from_utf8(sink)?, "hook ran\n");
        assert!(Path::new("prefix/dotpack.toml").is_file());
        assert!(Path::new("prefix/ansible/hosts.yaml").is_file());

        Ok(())
    }

    #[sealed_test]
    fn failed_base_install_never_runs_hooks() {
        let ran = Rc::new(Cell::new(false));
        let mut installer = Installer::new(manifest(None), "no-such-package", "prefix");
        installer.register(RecordingHook {
            ran: Rc::clone(&ran),
        });

        let mut sink = Vec::new();
        let result = installer.run(&mut sink);

        assert!(matches!(result, Err(InstallError::Io(_))));
        assert!(!ran.get());
        assert!(sink.is_empty());
    }

    #[sealed_test]
    fn include_listing_filters_payload() -> anyhow::Result<()> {
        fs::create_dir_all("pkg/ansible")?;
        fs::create_dir_all("pkg/notes")?;
        fs::write("pkg/dotpack.toml", "[package]\nname = \"blah\"\n")?;
        fs::write("pkg/ansible/playbook.yaml", "- hosts: all\n")?;
        fs::write("pkg/notes/scratch.txt", "not payload\n")?;

        let include = Some(vec!["ansible/**".into(), "dotpack.toml".into()]);
        let installer = Installer::new(manifest(include), "pkg", "prefix");

        let mut sink = Vec::new();
        installer.run(&mut sink)?;

        assert!(Path::new("prefix/ansible/playbook.yaml").is_file());
        assert!(Path::new("prefix/dotpack.toml").is_file());
        assert!(!Path::new("prefix/notes/scratch.txt").exists());

        Ok(())
    }
}
