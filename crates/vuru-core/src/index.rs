use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use serde_json::Value;

use crate::identifier::is_valid_url;

/// Metadata for one package as published in the remote index.
///
/// Fields are optional because the index is produced by an external pipeline;
/// a record missing any required field is kept but never resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRecord {
    pub version: Option<String>,
    pub category: Option<String>,
    pub repo_urls: BTreeMap<String, String>,
    pub short_desc: Option<String>,
}

impl PackageRecord {
    fn from_value(value: &Value) -> Self {
        let string_field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        };

        let repo_urls = value
            .get("repo_urls")
            .and_then(Value::as_object)
            .map(|urls| {
                urls.iter()
                    .filter_map(|(arch, url)| {
                        url.as_str().map(|url| (arch.clone(), url.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            version: string_field("version"),
            category: string_field("category"),
            repo_urls,
            short_desc: string_field("short_desc"),
        }
    }

    pub fn version_label(&self) -> &str {
        non_empty(self.version.as_deref()).unwrap_or("?")
    }

    pub fn category_label(&self) -> &str {
        non_empty(self.category.as_deref()).unwrap_or("?")
    }
}

/// A package whose metadata is complete for the running architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub category: String,
    pub repo_url: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageAvailability {
    Missing,
    Incomplete,
    UnsupportedArch { arch: String },
    Available(ResolvedPackage),
}

impl PackageAvailability {
    pub fn into_resolved(self) -> Option<ResolvedPackage> {
        match self {
            Self::Available(package) => Some(package),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    packages: BTreeMap<String, PackageRecord>,
}

impl Index {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let document: Value =
            serde_json::from_str(input).context("index-parse-failed: malformed index JSON")?;
        let Some(entries) = document.as_object() else {
            return Err(anyhow!(
                "index-parse-failed: index document must be a JSON object keyed by package name"
            ));
        };

        let packages = entries
            .iter()
            .map(|(name, value)| (name.clone(), PackageRecord::from_value(value)))
            .collect();
        Ok(Self { packages })
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageRecord)> {
        self.packages
            .iter()
            .map(|(name, record)| (name.as_str(), record))
    }

    pub fn lookup(&self, name: &str, arch: &str) -> PackageAvailability {
        let Some(record) = self.packages.get(name) else {
            return PackageAvailability::Missing;
        };

        let (Some(version), Some(category)) = (
            non_empty(record.version.as_deref()),
            non_empty(record.category.as_deref()),
        ) else {
            return PackageAvailability::Incomplete;
        };

        let repo_url = match non_empty(record.repo_urls.get(arch).map(String::as_str)) {
            Some(url) if is_valid_url(url) => url,
            Some(_) => return PackageAvailability::Incomplete,
            None => {
                return PackageAvailability::UnsupportedArch {
                    arch: arch.to_string(),
                }
            }
        };

        PackageAvailability::Available(ResolvedPackage {
            name: name.to_string(),
            version: version.to_string(),
            category: category.to_string(),
            repo_url: repo_url.to_string(),
            arch: arch.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
