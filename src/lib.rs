// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Dotfiles as an installable package.
//!
//! A __package__ is a directory holding a manifest file ("dotpack.toml"),
//! provisioning data files, and whatever payload the dotfiles distribution
//! wants to ship. Installing a package stages its payload into an install
//! prefix, then runs registered post-install hooks. The stock hook shells
//! out to an external provisioning tool against the package's inventory and
//! playbook files, relaying the tool's output line-by-line as it arrives.
//!
//! The provisioning engine itself stays an opaque collaborator: dotpack
//! never parses inventories or playbooks, it only points the tool at them
//! and relays what the tool prints.

pub mod config;
pub mod install;
pub mod path;
pub mod provision;

pub use config::PackageManifest;
pub use install::{Installer, PostInstall};
pub use provision::{ProvisionCommand, Provisioner, SystemSpawn};
