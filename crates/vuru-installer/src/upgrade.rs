use anyhow::{anyhow, Context, Result};
use vuru_core::{Index, PackageAvailability};
use vuru_registry::{CacheLayout, TemplateSource};

use crate::review::{batch_review_document, ReviewGate};
use crate::xbps::{InstallMode, InstallRequest, PackageManager};

pub const DEFAULT_MAX_UPGRADES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    pub name: String,
    pub installed_version: String,
    pub new_version: String,
    pub category: String,
    pub repo_url: String,
    pub new_template: Option<String>,
    pub cached_template: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub candidates: Vec<UpgradeCandidate>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub upgraded: usize,
    pub unchanged: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    pub candidates: usize,
    pub upgraded: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub truncated: bool,
    pub cancelled: bool,
}

/// Progress notifications emitted while planning and applying upgrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeEvent<'a> {
    ScanTruncated { limit: usize },
    CompareFailed { name: &'a str, error: String },
    CandidatesFound { candidates: &'a [UpgradeCandidate] },
    FetchStarted { total: usize },
    TemplateFetched { name: &'a str },
    Applying { name: &'a str, position: usize, total: usize },
    Upgraded { name: &'a str, from: &'a str, to: String },
    Unchanged { name: &'a str, version: String },
    ApplyFailed { name: &'a str, error: String },
    VerifyFailed { name: &'a str, error: String },
    TemplateCacheFailed { name: &'a str, error: String },
}

pub struct UpgradePlanner<'a> {
    index: &'a Index,
    arch: &'a str,
    packages: &'a dyn PackageManager,
    templates: &'a dyn TemplateSource,
    layout: &'a CacheLayout,
    max_batch: usize,
}

impl<'a> UpgradePlanner<'a> {
    pub fn new(
        index: &'a Index,
        arch: &'a str,
        packages: &'a dyn PackageManager,
        templates: &'a dyn TemplateSource,
        layout: &'a CacheLayout,
    ) -> Self {
        Self {
            index,
            arch,
            packages,
            templates,
            layout,
            max_batch: DEFAULT_MAX_UPGRADES,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Result<Self> {
        if max_batch == 0 {
            return Err(anyhow!("upgrade batch limit must be at least 1"));
        }
        self.max_batch = max_batch;
        Ok(self)
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Collects installed packages whose index version is strictly newer.
    pub fn scan(&self, on_event: &mut dyn FnMut(UpgradeEvent<'_>)) -> Result<ScanResult> {
        let installed = self
            .packages
            .installed_packages()
            .context("failed listing installed packages")?;

        let mut result = ScanResult::default();
        for package in &installed {
            let PackageAvailability::Available(resolved) =
                self.index.lookup(&package.name, self.arch)
            else {
                continue;
            };

            let newer = match self
                .packages
                .version_is_newer(&resolved.version, &package.version)
            {
                Ok(newer) => newer,
                Err(err) => {
                    on_event(UpgradeEvent::CompareFailed {
                        name: &package.name,
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };
            if !newer {
                continue;
            }

            if result.candidates.len() == self.max_batch {
                result.truncated = true;
                on_event(UpgradeEvent::ScanTruncated {
                    limit: self.max_batch,
                });
                break;
            }

            result.candidates.push(UpgradeCandidate {
                name: resolved.name,
                installed_version: package.version.clone(),
                new_version: resolved.version,
                category: resolved.category,
                repo_url: resolved.repo_url,
                new_template: None,
                cached_template: None,
            });
        }

        Ok(result)
    }

    /// Fills in the new and cached templates; the first failure aborts.
    pub fn fetch_templates(
        &self,
        candidates: &mut [UpgradeCandidate],
        on_event: &mut dyn FnMut(UpgradeEvent<'_>),
    ) -> Result<()> {
        on_event(UpgradeEvent::FetchStarted {
            total: candidates.len(),
        });
        for candidate in candidates.iter_mut() {
            let new_template = self
                .templates
                .fetch_template(&candidate.category, &candidate.name)
                .with_context(|| format!("failed fetching template for {}", candidate.name))?;
            candidate.cached_template = self.layout.read_template(&candidate.name)?;
            candidate.new_template = Some(new_template);
            on_event(UpgradeEvent::TemplateFetched {
                name: &candidate.name,
            });
        }
        Ok(())
    }

    /// Upgrades each candidate in order and verifies the installed version afterwards.
    pub fn apply(
        &self,
        candidates: &[UpgradeCandidate],
        assume_yes: bool,
        on_event: &mut dyn FnMut(UpgradeEvent<'_>),
    ) -> ApplySummary {
        let mut summary = ApplySummary::default();
        let total = candidates.len();

        for (position, candidate) in candidates.iter().enumerate() {
            on_event(UpgradeEvent::Applying {
                name: &candidate.name,
                position: position + 1,
                total,
            });

            let request = InstallRequest {
                repo_url: candidate.repo_url.clone(),
                package: candidate.name.clone(),
                mode: InstallMode::Upgrade,
                assume_yes,
            };
            if let Err(err) = self.packages.install(&request) {
                summary.errors += 1;
                on_event(UpgradeEvent::ApplyFailed {
                    name: &candidate.name,
                    error: format!("{err:#}"),
                });
                continue;
            }

            let version = match self.packages.installed_version(&candidate.name) {
                Ok(Some(version)) => version,
                Ok(None) => {
                    on_event(UpgradeEvent::VerifyFailed {
                        name: &candidate.name,
                        error: "package is not reported as installed".to_string(),
                    });
                    continue;
                }
                Err(err) => {
                    on_event(UpgradeEvent::VerifyFailed {
                        name: &candidate.name,
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };

            if version == candidate.installed_version {
                summary.unchanged += 1;
                on_event(UpgradeEvent::Unchanged {
                    name: &candidate.name,
                    version,
                });
                continue;
            }

            summary.upgraded += 1;
            if let Some(template) = &candidate.new_template {
                if let Err(err) = self.layout.save_template(&candidate.name, template) {
                    on_event(UpgradeEvent::TemplateCacheFailed {
                        name: &candidate.name,
                        error: format!("{err:#}"),
                    });
                }
            }
            on_event(UpgradeEvent::Upgraded {
                name: &candidate.name,
                from: &candidate.installed_version,
                to: version,
            });
        }

        summary
    }

    /// Scan, fetch and review (unless `assume_yes`), then apply.
    pub fn run(
        &self,
        assume_yes: bool,
        gate: &mut dyn ReviewGate,
        on_event: &mut dyn FnMut(UpgradeEvent<'_>),
    ) -> Result<UpgradeReport> {
        let ScanResult {
            mut candidates,
            truncated,
        } = self.scan(on_event)?;

        let mut report = UpgradeReport {
            candidates: candidates.len(),
            truncated,
            ..UpgradeReport::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }

        on_event(UpgradeEvent::CandidatesFound {
            candidates: &candidates,
        });

        if !assume_yes {
            self.fetch_templates(&mut candidates, on_event)?;
            let document = batch_review_document(&candidates)?;
            if !gate.review(&document)? {
                report.cancelled = true;
                return Ok(report);
            }
        }

        let summary = self.apply(&candidates, assume_yes, on_event);
        report.upgraded = summary.upgraded;
        report.unchanged = summary.unchanged;
        report.errors = summary.errors;
        Ok(report)
    }
}
