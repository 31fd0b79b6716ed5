use std::process::Command;

use anyhow::{anyhow, Context, Result};
use vuru_core::{validate_identifier, validate_url};

use crate::installed::{parse_installed_list, parse_pkgver_output, InstalledPackage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    Install,
    Upgrade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub repo_url: String,
    pub package: String,
    pub mode: InstallMode,
    pub assume_yes: bool,
}

/// Operations delegated to the system package manager.
pub trait PackageManager {
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>>;

    /// Version currently installed, or `None` when the package is not reported.
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// True iff `candidate` orders strictly after `installed`.
    fn version_is_newer(&self, candidate: &str, installed: &str) -> Result<bool>;

    fn install(&self, request: &InstallRequest) -> Result<()>;

    fn remove(&self, packages: &[String], assume_yes: bool) -> Result<()>;
}

/// [`PackageManager`] backed by the xbps command-line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xbps;

impl PackageManager for Xbps {
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        let mut command = Command::new("xbps-query");
        command.arg("-l");
        let stdout = capture_command(&mut command, "xbps-query -l")?;
        Ok(parse_installed_list(&stdout))
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        validate_identifier("package name", name)?;
        let output = Command::new("xbps-query")
            .arg(name)
            .output()
            .with_context(|| format!("xbps-query {name}: command failed to start"))?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_pkgver_output(
            &String::from_utf8_lossy(&output.stdout),
            name,
        ))
    }

    fn version_is_newer(&self, candidate: &str, installed: &str) -> Result<bool> {
        let status = Command::new("xbps-uhelper")
            .arg("cmpver")
            .arg(candidate)
            .arg(installed)
            .status()
            .context("xbps-uhelper cmpver: command failed to start")?;
        cmpver_is_greater(status.code())
            .with_context(|| format!("xbps-uhelper cmpver {candidate} {installed}"))
    }

    fn install(&self, request: &InstallRequest) -> Result<()> {
        let mut command = install_command(request)?;
        run_interactive(&mut command, &format!("xbps-install {}", request.package))
    }

    fn remove(&self, packages: &[String], assume_yes: bool) -> Result<()> {
        let mut command = remove_command(packages, assume_yes)?;
        run_interactive(&mut command, "xbps-remove")
    }
}

/// Maps the `xbps-uhelper cmpver` exit code to "strictly greater".
///
/// Exit 1 means greater, 0 equal, 255 (`-1`) smaller; anything else is a failure.
pub fn cmpver_is_greater(code: Option<i32>) -> Result<bool> {
    match code {
        Some(1) => Ok(true),
        Some(0) | Some(255) | Some(-1) => Ok(false),
        Some(code) => Err(anyhow!("unexpected exit code {code}")),
        None => Err(anyhow!("terminated by signal")),
    }
}

pub(crate) fn install_command(request: &InstallRequest) -> Result<Command> {
    validate_url("repository", &request.repo_url)?;
    validate_identifier("package name", &request.package)?;

    let mut command = Command::new("sudo");
    command
        .arg("xbps-install")
        .arg("-R")
        .arg(&request.repo_url)
        .arg(match request.mode {
            InstallMode::Install => "-S",
            InstallMode::Upgrade => "-Su",
        });
    if request.assume_yes {
        command.arg("-y");
    }
    command.arg(&request.package);
    Ok(command)
}

pub(crate) fn remove_command(packages: &[String], assume_yes: bool) -> Result<Command> {
    if packages.is_empty() {
        return Err(anyhow!("no packages given to remove"));
    }
    for package in packages {
        validate_identifier("package name", package)?;
    }

    let mut command = Command::new("sudo");
    command.arg("xbps-remove").arg("-R");
    if assume_yes {
        command.arg("-y");
    }
    command.args(packages);
    Ok(command)
}

fn capture_command(command: &mut Command, context_message: &str) -> Result<String> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{context_message}: status={} stderr='{}'",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// xbps-install and xbps-remove prompt on the terminal, so stdio is inherited.
fn run_interactive(command: &mut Command, context_message: &str) -> Result<()> {
    let status = command
        .status()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if status.success() {
        return Ok(());
    }
    Err(anyhow!("{context_message}: status={status}"))
}
