use std::io::Write;

use anyhow::{Context, Result};
use clap::{CommandFactory, ValueEnum};
use clap_complete::Shell;

use crate::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CliCompletionShell> for Shell {
    fn from(value: CliCompletionShell) -> Self {
        match value {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
            CliCompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

pub(crate) fn write_completions_script<W: Write>(
    shell: CliCompletionShell,
    writer: &mut W,
) -> Result<()> {
    let mut command = Cli::command();
    let generator: Shell = shell.into();
    let mut generated = Vec::new();
    clap_complete::generate(generator, &mut command, "vuru", &mut generated);

    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")?;

    if shell == CliCompletionShell::Fish {
        writer
            .write_all(b"\n")
            .with_context(|| "failed writing completion script delimiter")?;
        writer
            .write_all(fish_package_completion_snippet().as_bytes())
            .with_context(|| "failed writing package completion block")?;
    }

    Ok(())
}

// Package names come from the cached index via the hidden list-packages command.
fn fish_package_completion_snippet() -> &'static str {
    "# vuru package completions\n\
complete -c vuru -n '__fish_seen_subcommand_from install' -f -a '(vuru list-packages 2>/dev/null)'\n\
complete -c vuru -n 'not __fish_seen_subcommand_from search install remove update completions' -f -a '(vuru list-packages 2>/dev/null)'\n"
}
