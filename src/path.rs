// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine default absolute path to install prefix.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotpack` as the default
/// absolute path for staging package payload. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_install_prefix() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotpack"))
        .ok_or(NoWayHome)
}

/// Determine absolute path to package root from manifest path.
///
/// The package root is the directory holding the manifest file. Provisioning
/// data files always resolve against this root, never against the install
/// prefix. Does not check if the manifest itself exists.
///
/// # Errors
///
/// - Return [`std::io::Error`] if the manifest path cannot be made absolute.
pub fn package_root(manifest_path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(manifest_path.as_ref())?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
