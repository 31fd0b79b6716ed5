use anyhow::{anyhow, bail, Result};
use clap::CommandFactory;
use vuru_core::Index;
use vuru_installer::{InstallFlow, InstallOutcome, PackageManager, UpgradePlanner, Xbps};
use vuru_registry::{
    http_backend_for, CacheLayout, CurlBackend, HttpBackend, IndexOrigin, IndexSync, TemplateFetcher,
};

use crate::completion::write_completions_script;
use crate::config::Settings;
use crate::render::{
    format_index_origin, format_upgrade_summary_line, TerminalRenderer, UpgradeEventRenderer,
};
use crate::review::TerminalReviewGate;
use crate::search::{format_search_results, search_index};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::current();

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut stdout = std::io::stdout();
            return write_completions_script(*shell, &mut stdout);
        }
        Some(Commands::ListPackages) => {
            list_cached_packages();
            return Ok(());
        }
        Some(Commands::Remove { packages }) => {
            Xbps.remove(packages, cli.yes)?;
            renderer.print_status("ok", &format!("removed {}", packages.join(" ")));
            return Ok(());
        }
        None if !cli.sync && !cli.update && cli.packages.is_empty() => {
            Cli::command().print_help()?;
            return Ok(());
        }
        _ => {}
    }

    let settings = Settings::load(cli.config.as_deref(), cli.index_url.as_deref())?;
    let layout = CacheLayout::from_env()?;
    let backend = http_backend_for(settings.download_backend)?;
    let context = RunContext {
        renderer,
        settings: &settings,
        layout: &layout,
        backend: backend.as_ref(),
    };

    match cli.command {
        Some(Commands::Search { query }) => {
            let index = context.load_index(cli.sync)?;
            for (position, term) in query.iter().enumerate() {
                if position > 0 {
                    println!();
                }
                if query.len() > 1 {
                    println!("Searching for '{term}':");
                }
                let results = search_index(&index, term);
                renderer.print_lines(&format_search_results(&results, term));
            }
            Ok(())
        }
        Some(Commands::Install { packages }) => {
            let index = context.load_index(cli.sync)?;
            context.install_packages(&index, &packages, cli.yes)
        }
        Some(Commands::Update) => {
            let index = context.load_index(cli.sync)?;
            context.upgrade_all(&index, cli.yes)
        }
        None if cli.update => {
            let index = context.load_index(cli.sync)?;
            context.upgrade_all(&index, cli.yes)
        }
        None if !cli.packages.is_empty() => {
            let index = context.load_index(cli.sync)?;
            context.install_packages(&index, &cli.packages, cli.yes)
        }
        None => context.sync_only(),
        Some(Commands::Completions { .. } | Commands::ListPackages | Commands::Remove { .. }) => {
            Ok(())
        }
    }
}

struct RunContext<'a> {
    renderer: TerminalRenderer,
    settings: &'a Settings,
    layout: &'a CacheLayout,
    backend: &'a dyn HttpBackend,
}

impl RunContext<'_> {
    fn load_index(&self, force_refresh: bool) -> Result<Index> {
        let sync = IndexSync::new(self.layout, self.backend);
        let loaded = sync.load_or_fetch(&self.settings.index_url, force_refresh)?;
        if let Some((status, message)) = format_index_origin(&loaded.origin) {
            match status {
                "warn" => self.renderer.print_diagnostic(status, &message),
                _ => self.renderer.print_status(status, &message),
            }
        }
        Ok(loaded.index)
    }

    fn sync_only(&self) -> Result<()> {
        let sync = IndexSync::new(self.layout, self.backend);
        let loaded = sync.load_or_fetch(&self.settings.index_url, true)?;
        if let IndexOrigin::StaleFallback { reason } = loaded.origin {
            bail!("{reason}");
        }
        self.renderer
            .print_status("ok", "Package index synchronized");
        Ok(())
    }

    fn install_packages(&self, index: &Index, packages: &[String], assume_yes: bool) -> Result<()> {
        let fetcher = TemplateFetcher::new(self.settings.template_base_url.as_str(), self.backend)?;
        let flow = InstallFlow {
            layout: self.layout,
            templates: &fetcher,
            packages: &Xbps,
            arch: &self.settings.arch,
        };
        let mut gate = TerminalReviewGate::new(self.renderer, self.settings.pager.clone());

        let mut failures = 0_usize;
        for name in packages {
            self.renderer
                .print_status("step", &format!("Installing {name}"));
            match flow.install(index, name, assume_yes, &mut gate) {
                Ok(InstallOutcome::Installed {
                    package,
                    template_cache_warning,
                }) => {
                    self.renderer.print_status(
                        "ok",
                        &format!("installed {} {}", package.name, package.version),
                    );
                    if let Some(warning) = template_cache_warning {
                        self.renderer.print_diagnostic("warn", &warning);
                    }
                }
                Ok(InstallOutcome::Declined { package }) => {
                    self.renderer.print_status(
                        "step",
                        &format!("installation of {} cancelled", package.name),
                    );
                }
                Err(err) => {
                    failures += 1;
                    self.renderer.print_diagnostic("error", &format!("{err:#}"));
                }
            }
        }

        if failures > 0 {
            return Err(anyhow!("{failures} package(s) failed to install"));
        }
        Ok(())
    }

    fn upgrade_all(&self, index: &Index, assume_yes: bool) -> Result<()> {
        let fetcher = TemplateFetcher::new(self.settings.template_base_url.as_str(), self.backend)?;
        let planner = UpgradePlanner::new(index, &self.settings.arch, &Xbps, &fetcher, self.layout)
            .with_max_batch(self.settings.max_upgrades)?;
        let mut gate = TerminalReviewGate::new(self.renderer, self.settings.pager.clone());
        let mut events = UpgradeEventRenderer::new(self.renderer);

        self.renderer
            .print_status("step", "Checking for VUP package updates...");
        let report = planner.run(assume_yes, &mut gate, &mut |event| events.handle(event))?;

        if report.candidates == 0 {
            self.renderer
                .print_status("ok", "All VUP packages are up to date");
            return Ok(());
        }
        if report.cancelled {
            self.renderer.print_status("step", "Upgrade cancelled");
            return Ok(());
        }

        let status = if report.errors > 0 { "error" } else { "ok" };
        self.renderer
            .print_status(status, &format_upgrade_summary_line(&report));
        if report.errors > 0 {
            return Err(anyhow!("{} upgrade(s) failed", report.errors));
        }
        Ok(())
    }
}

/// Prints package names from the cached index, one per line; prints nothing when no usable
/// cache exists so shell completion never breaks.
fn list_cached_packages() {
    let Ok(layout) = CacheLayout::from_env() else {
        return;
    };
    let Some(index) = IndexSync::new(&layout, &CurlBackend).load_cached() else {
        return;
    };
    for name in index.names() {
        println!("{name}");
    }
}
