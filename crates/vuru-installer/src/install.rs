use anyhow::{anyhow, Context, Result};
use vuru_core::{validate_identifier, Index, PackageAvailability, ResolvedPackage};
use vuru_registry::{CacheLayout, TemplateSource};

use crate::review::{install_review_document, ReviewGate};
use crate::xbps::{InstallMode, InstallRequest, PackageManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        package: ResolvedPackage,
        /// Set when the package installed but its template could not be cached.
        template_cache_warning: Option<String>,
    },
    Declined {
        package: ResolvedPackage,
    },
}

/// Single-package install: resolve, fetch template, review, install, cache template.
pub struct InstallFlow<'a> {
    pub layout: &'a CacheLayout,
    pub templates: &'a dyn TemplateSource,
    pub packages: &'a dyn PackageManager,
    pub arch: &'a str,
}

impl InstallFlow<'_> {
    pub fn install(
        &self,
        index: &Index,
        name: &str,
        assume_yes: bool,
        gate: &mut dyn ReviewGate,
    ) -> Result<InstallOutcome> {
        let package = resolve_for_install(index, name, self.arch)?;

        let new_template = self
            .templates
            .fetch_template(&package.category, &package.name)
            .with_context(|| format!("failed fetching template for {}", package.name))?;

        if !assume_yes {
            let cached = self.layout.read_template(&package.name)?;
            let document = install_review_document(&package.name, cached.as_deref(), &new_template)?;
            if !gate.review(&document)? {
                return Ok(InstallOutcome::Declined { package });
            }
        }

        self.packages.install(&InstallRequest {
            repo_url: package.repo_url.clone(),
            package: package.name.clone(),
            mode: InstallMode::Install,
            assume_yes,
        })?;

        let template_cache_warning = self
            .layout
            .save_template(&package.name, &new_template)
            .err()
            .map(|err| format!("failed caching template for {}: {err:#}", package.name));

        Ok(InstallOutcome::Installed {
            package,
            template_cache_warning,
        })
    }
}

/// Resolves `name` for `arch`, turning every unavailable state into a distinct error.
pub fn resolve_for_install(index: &Index, name: &str, arch: &str) -> Result<ResolvedPackage> {
    validate_identifier("package name", name)?;
    match index.lookup(name, arch) {
        PackageAvailability::Available(package) => Ok(package),
        PackageAvailability::Missing => Err(anyhow!(
            "package-not-found: '{name}' is not in the VUP index"
        )),
        PackageAvailability::Incomplete => Err(anyhow!(
            "package-metadata-incomplete: index entry for '{name}' lacks a version, category or valid repository URL"
        )),
        PackageAvailability::UnsupportedArch { arch } => Err(anyhow!(
            "package-unsupported-arch: '{name}' is not available for {arch}"
        )),
    }
}
