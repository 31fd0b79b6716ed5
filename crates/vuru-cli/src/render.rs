use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use vuru_installer::{UpgradeEvent, UpgradeReport};
use vuru_registry::IndexOrigin;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    if style == OutputStyle::Plain {
        return message.to_string();
    }

    let badge = match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "error" => "[ERR]",
        _ => "[..]",
    };
    format!("{badge} {message}")
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    /// Warnings and errors go to stderr.
    pub(crate) fn print_diagnostic(self, status: &str, message: &str) {
        eprintln!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Plain {
            return;
        }
        println!();
        println!("{}", colorize(section_style(), &format!("== {title} ==")));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars("<^>v ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    pub(crate) fn advance(&mut self) {
        self.current = (self.current + 1).min(self.total);
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_position(self.current);
        }
    }

    pub(crate) fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    pub(crate) fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

/// Turns planner events into terminal output, owning the template fetch progress bar.
pub(crate) struct UpgradeEventRenderer {
    renderer: TerminalRenderer,
    progress: Option<TerminalProgress>,
}

impl UpgradeEventRenderer {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            progress: None,
        }
    }

    pub(crate) fn handle(&mut self, event: UpgradeEvent<'_>) {
        match event {
            UpgradeEvent::TemplateFetched { .. } => {
                if let Some(progress) = &mut self.progress {
                    progress.advance();
                    if progress.current == progress.total {
                        if let Some(progress) = self.progress.take() {
                            progress.finish_success();
                        }
                    }
                }
                return;
            }
            UpgradeEvent::FetchStarted { total } => {
                self.renderer
                    .print_status("step", "Fetching templates for review...");
                self.progress = Some(self.renderer.start_progress("templates", total as u64));
                return;
            }
            UpgradeEvent::CandidatesFound { candidates } => {
                self.renderer.print_section("upgrades");
                let mut lines = vec![format!("{} package(s) to upgrade:", candidates.len())];
                lines.extend(candidates.iter().map(|candidate| {
                    format!(
                        "  {}: {} -> {}",
                        candidate.name, candidate.installed_version, candidate.new_version
                    )
                }));
                self.renderer.print_lines(&lines);
                return;
            }
            _ => {}
        }

        if let Some(progress) = self.progress.take() {
            progress.finish_abandon();
        }
        if let Some((status, message)) = format_upgrade_event(&event) {
            match status {
                "warn" | "error" => self.renderer.print_diagnostic(status, &message),
                _ => self.renderer.print_status(status, &message),
            }
        }
    }
}

pub(crate) fn format_upgrade_event(event: &UpgradeEvent<'_>) -> Option<(&'static str, String)> {
    let line = match event {
        UpgradeEvent::ScanTruncated { limit } => (
            "warn",
            format!("more than {limit} packages have upgrades; only the first {limit} are handled this run"),
        ),
        UpgradeEvent::CompareFailed { name, error } => (
            "warn",
            format!("skipping {name}: version comparison failed: {error}"),
        ),
        UpgradeEvent::Applying {
            name,
            position,
            total,
        } => ("step", format!("[{position}/{total}] upgrading {name}")),
        UpgradeEvent::Upgraded { name, from, to } => ("ok", format!("upgraded {name} {from} -> {to}")),
        UpgradeEvent::Unchanged { name, version } => (
            "warn",
            format!("{name} is still at {version} after upgrade"),
        ),
        UpgradeEvent::ApplyFailed { name, error } => {
            ("error", format!("failed to upgrade {name}: {error}"))
        }
        UpgradeEvent::VerifyFailed { name, error } => (
            "warn",
            format!("could not verify upgrade of {name}: {error}"),
        ),
        UpgradeEvent::TemplateCacheFailed { name, error } => (
            "warn",
            format!("failed caching template for {name}: {error}"),
        ),
        UpgradeEvent::CandidatesFound { .. }
        | UpgradeEvent::FetchStarted { .. }
        | UpgradeEvent::TemplateFetched { .. } => return None,
    };
    Some(line)
}

pub(crate) fn format_upgrade_summary_line(report: &UpgradeReport) -> String {
    format!(
        "upgrade summary: upgraded={} unchanged={} failed={}",
        report.upgraded, report.unchanged, report.errors
    )
}

pub(crate) fn format_index_origin(origin: &IndexOrigin) -> Option<(&'static str, String)> {
    match origin {
        IndexOrigin::Cache => None,
        IndexOrigin::NotModified => Some(("step", "Package index is up to date".to_string())),
        IndexOrigin::Downloaded => Some(("step", "Downloaded package index".to_string())),
        IndexOrigin::StaleFallback { reason } => Some((
            "warn",
            format!("using cached package index; refresh failed: {reason}"),
        )),
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{}/{}", HumanCount(current), HumanCount(total));
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
