use std::fs;

use anyhow::{Context, Result};
use tempfile::Builder;
use vuru_core::{validate_identifier, validate_url};

use crate::HttpBackend;

pub const DEFAULT_TEMPLATE_BASE_URL: &str =
    "https://raw.githubusercontent.com/VUP-Linux/vup/main/vup/srcpkgs";

/// Source of package build templates.
pub trait TemplateSource {
    fn fetch_template(&self, category: &str, name: &str) -> Result<String>;
}

pub struct TemplateFetcher<'a> {
    base_url: String,
    backend: &'a dyn HttpBackend,
}

impl<'a> TemplateFetcher<'a> {
    pub fn new(base_url: impl Into<String>, backend: &'a dyn HttpBackend) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        validate_url("template base", &base_url)?;
        Ok(Self { base_url, backend })
    }

    pub fn template_url(&self, category: &str, name: &str) -> Result<String> {
        validate_identifier("category", category)?;
        validate_identifier("package name", name)?;
        Ok(format!("{}/{category}/{name}/template", self.base_url))
    }
}

impl TemplateSource for TemplateFetcher<'_> {
    fn fetch_template(&self, category: &str, name: &str) -> Result<String> {
        let url = self.template_url(category, name)?;

        let staged = Builder::new()
            .prefix(&format!("vuru_tmpl_{name}_"))
            .tempfile()
            .context("template-fetch-failed: failed creating temp file")?;

        self.backend
            .download(&url, staged.path())
            .with_context(|| format!("template-fetch-failed: {url}"))?;

        let raw = fs::read(staged.path()).with_context(|| {
            format!(
                "template-fetch-failed: failed reading {}",
                staged.path().display()
            )
        })?;
        String::from_utf8(raw)
            .with_context(|| format!("template-fetch-failed: {url} is not valid UTF-8"))
    }
}
