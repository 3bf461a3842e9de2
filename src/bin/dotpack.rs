// SPDX-FileCopyrightText: 2026 Abhin Chhabra <chhabra.abhin@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use dotpack::{
    config::PackageManifest,
    install::Installer,
    path::{default_install_prefix, package_root},
    provision::Provisioner,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs,
    io::stdout,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotpack [options] <dotpack-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Install(opts) => run_install(opts),
            Command::Provision(opts) => run_provision(opts),
            Command::Init(opts) => run_init(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Stage package payload, then run post-install provisioning.
    #[command(override_usage = "dotpack install [options]")]
    Install(InstallOptions),

    /// Run provisioning alone, without staging payload.
    #[command(override_usage = "dotpack provision [options]")]
    Provision(ProvisionOptions),

    /// Scaffold a new package manifest and provisioning skeleton.
    #[command(override_usage = "dotpack init [options] <package_name>")]
    Init(InitOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Path to package manifest.
    #[arg(short, long, value_name = "path", default_value = "dotpack.toml")]
    pub manifest: PathBuf,

    /// Install prefix to stage payload into.
    #[arg(short, long, value_name = "path")]
    pub prefix: Option<PathBuf>,

    /// Fail the install when the provisioning run fails.
    #[arg(short, long)]
    pub strict: bool,

    /// Stage payload without running provisioning.
    #[arg(short, long)]
    pub no_provision: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ProvisionOptions {
    /// Path to package manifest.
    #[arg(short, long, value_name = "path", default_value = "dotpack.toml")]
    pub manifest: PathBuf,

    /// Fail when the provisioning run fails.
    #[arg(short, long)]
    pub strict: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Name of package to scaffold.
    #[arg(value_name = "package_name")]
    pub package_name: String,

    /// Brief description of the package.
    #[arg(short, long, value_name = "summary")]
    pub description: Option<String>,

    /// Author to credit in package metadata.
    #[arg(short, long, value_name = "name")]
    pub author: Option<String>,
}

fn main() {
    let layer = fmt::layer().compact().with_target(false).without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_manifest(path: &Path) -> Result<PackageManifest> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("cannot read package manifest at {}", path.display()))?;

    Ok(data.parse::<PackageManifest>()?)
}

fn run_install(opts: InstallOptions) -> Result<()> {
    let mut manifest = load_manifest(&opts.manifest)?;
    if opts.strict {
        manifest.provision.strict = true;
    }

    let root = package_root(&opts.manifest)?;
    let prefix = match (opts.prefix, &manifest.install.prefix) {
        (Some(prefix), _) => prefix,
        (None, Some(prefix)) => prefix.as_path().to_path_buf(),
        (None, None) => default_install_prefix()?,
    };

    let provisioner = Provisioner::new(&manifest.provision, &root);
    let mut installer = Installer::new(manifest, root, prefix);
    if !opts.no_provision {
        installer.register(provisioner);
    }

    installer.run(&mut stdout().lock())?;

    Ok(())
}

fn run_provision(opts: ProvisionOptions) -> Result<()> {
    let mut manifest = load_manifest(&opts.manifest)?;
    if opts.strict {
        manifest.provision.strict = true;
    }

    let root = package_root(&opts.manifest)?;
    let provisioner = Provisioner::new(&manifest.provision, &root);
    provisioner.run(&mut stdout().lock())?;

    Ok(())
}

fn run_init(opts: InitOptions) -> Result<()> {
    let manifest_path = Path::new("dotpack.toml");
    if manifest_path.exists() {
        bail!("refusing to clobber existing {}", manifest_path.display());
    }

    let mut manifest = PackageManifest::default();
    manifest.package.name = opts.package_name;
    manifest.package.version = "0.1.0".into();
    manifest.package.description = match opts.description {
        Some(description) => description,
        None => "<put one sentence description here>".into(),
    };
    manifest.package.authors = match opts.author {
        Some(author) => vec![author],
        None => Vec::new(),
    };

    fs::write(manifest_path, manifest.to_string())?;

    let dir = &manifest.provision.dir;
    mkdirp::mkdirp(dir)?;
    write_if_missing(&dir.join(&manifest.provision.inventory), HOSTS_STUB)?;
    write_if_missing(&dir.join(&manifest.provision.playbook), PLAYBOOK_STUB)?;

    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if !path.exists() {
        fs::write(path, contents)?;
    }

    Ok(())
}

const HOSTS_STUB: &str = "all:\n  hosts:\n    localhost:\n      ansible_connection: local\n";

const PLAYBOOK_STUB: &str = "- hosts: all\n  tasks: []\n";
