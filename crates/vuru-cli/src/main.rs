mod completion;
mod config;
mod dispatch;
mod render;
mod review;
mod search;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::completion::CliCompletionShell;
use crate::dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "vuru", version)]
#[command(
    about = "A package manager front end for the VUP repository",
    long_about = None
)]
#[command(after_help = "Examples:\n  vuru search editor\n  vuru install visual-studio-code\n  vuru -Sy install ferdium\n  vuru update")]
pub(crate) struct Cli {
    /// Force a refresh of the package index
    #[arg(short = 'S', long = "sync", global = true)]
    sync: bool,
    /// Upgrade every installed VUP package
    #[arg(short = 'u', long = "update")]
    update: bool,
    /// Assume yes to prompts and skip template review
    #[arg(short = 'y', long = "yes", global = true)]
    yes: bool,
    /// Override the package index URL
    #[arg(long, global = true, value_name = "URL")]
    index_url: Option<String>,
    /// Read settings from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
    /// Packages to install
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Search package names and descriptions
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Install one or more packages
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Remove one or more packages
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Upgrade every installed VUP package
    Update,
    #[command(hide = true)]
    ListPackages,
    /// Print a shell completion script
    Completions { shell: CliCompletionShell },
}

fn main() -> Result<()> {
    run_cli(Cli::parse())
}
