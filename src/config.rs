// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Package manifest layout.
//!
//! Specify the layout for the manifest file that dotpack uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A package manifest is composed of three basic parts: package metadata,
//! install settings, and provisioning settings. The metadata section carries
//! the distribution's identity, i.e., everything a package index would want
//! to know about it. The install section controls where the payload gets
//! staged and which files are part of it. The provision section describes the
//! external provisioning run that happens after the payload has been staged.
//!
//! Only the metadata section is mandatory. A manifest that contains nothing
//! but `[package]` still resolves to a fully usable configuration, because
//! the install and provision sections fall back to defaults that match the
//! conventional package layout: an "ansible" directory at the top-level
//! holding "hosts.yaml" and "playbook.yaml".

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Package manifest layout.
///
/// All dotfile packages managed by dotpack come with a __manifest__ file named
/// "dotpack.toml" at the top-level of the package. This file declares what the
/// package is, where its payload should be staged, and how the package gets
/// provisioned after staging.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageManifest {
    /// Identity of the package.
    pub package: PackageMetadata,

    /// Payload staging settings.
    #[serde(default)]
    pub install: InstallSettings,

    /// Provisioning run settings.
    #[serde(default)]
    pub provision: ProvisionSettings,
}

impl FromStr for PackageManifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: PackageManifest =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on install prefix field.
        if let Some(prefix) = manifest.install.prefix {
            manifest.install.prefix = Some(InstallPrefix::new(
                shellexpand::full(prefix.to_string().as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            ));
        }

        Ok(manifest)
    }
}

impl Display for PackageManifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Package identity metadata.
///
/// Standard distribution metadata for any given dotfile package.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageMetadata {
    /// Name of the package.
    pub name: String,

    /// Version of the package.
    pub version: String,

    /// Brief description of what the package contains.
    pub description: String,

    /// Listing of package authors.
    #[serde(default)]
    pub authors: Vec<String>,

    /// License the package is distributed under.
    pub license: Option<String>,

    /// Remote URL the package is published at.
    pub repository: Option<String>,
}

/// Payload staging settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstallSettings {
    /// Install prefix to stage payload into.
    ///
    /// Falls back to `$XDG_DATA_HOME/dotpack` when left unset.
    pub prefix: Option<InstallPrefix>,

    /// Listing of glob patterns selecting payload files to stage.
    ///
    /// All files in the package are staged when left unset.
    pub include: Option<Vec<String>>,
}

/// Provisioning run settings.
///
/// Defaults describe the conventional package layout, so a package that keeps
/// its inventory and playbook at "ansible/hosts.yaml" and
/// "ansible/playbook.yaml" does not need a provision section at all.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProvisionSettings {
    /// Name or path of the provisioning binary to invoke.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Subdirectory of the package holding provisioning data files.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Name of the inventory file inside the provisioning directory.
    #[serde(default = "default_inventory")]
    pub inventory: String,

    /// Name of the playbook file inside the provisioning directory.
    #[serde(default = "default_playbook")]
    pub playbook: String,

    /// Treat a failed provisioning run as a failed install.
    ///
    /// Off by default: the run's exit status goes unchecked and its error
    /// stream is discarded, leaving the streamed transcript as the only
    /// record of what happened.
    #[serde(default)]
    pub strict: bool,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            dir: default_dir(),
            inventory: default_inventory(),
            playbook: default_playbook(),
            strict: false,
        }
    }
}

fn default_binary() -> String {
    "ansible-playbook".into()
}

fn default_dir() -> PathBuf {
    "ansible".into()
}

fn default_inventory() -> String {
    "hosts.yaml".into()
}

fn default_playbook() -> String {
    "playbook.yaml".into()
}

/// Path acting as the install prefix for given package.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstallPrefix(PathBuf);

impl InstallPrefix {
    /// Construct new install prefix.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat install prefix as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Display for InstallPrefix {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}
