use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use vuru_core::{is_valid_url, Index};

use crate::{CacheLayout, HttpBackend};

/// Where the index handed back by [`IndexSync::load_or_fetch`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    Cache,
    NotModified,
    Downloaded,
    /// The network attempt failed; the previously cached copy was used.
    StaleFallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct IndexLoad {
    pub index: Index,
    pub origin: IndexOrigin,
}

pub struct IndexSync<'a> {
    layout: &'a CacheLayout,
    backend: &'a dyn HttpBackend,
}

impl<'a> IndexSync<'a> {
    pub fn new(layout: &'a CacheLayout, backend: &'a dyn HttpBackend) -> Self {
        Self { layout, backend }
    }

    /// Reads the mirrored index without touching the network.
    pub fn load_cached(&self) -> Option<Index> {
        load_index_file(&self.layout.index_path()).ok()
    }

    pub fn load_or_fetch(&self, url: &str, force_refresh: bool) -> Result<IndexLoad> {
        if !is_valid_url(url) {
            return Err(anyhow!(
                "index-invalid-url: '{}' must be an http(s) URL without shell metacharacters",
                url.escape_debug()
            ));
        }

        let index_path = self.layout.prepare_index_path()?;
        let cached = if index_path.exists() {
            load_index_file(&index_path).ok()
        } else {
            None
        };

        if !force_refresh {
            if let Some(index) = cached {
                return Ok(IndexLoad {
                    index,
                    origin: IndexOrigin::Cache,
                });
            }
        }

        // A 304 can only be honoured from a cached copy that still parses.
        let etag = cached
            .as_ref()
            .and_then(|_| self.layout.read_index_etag());

        let staged = NamedTempFile::new_in(self.layout.root()).with_context(|| {
            format!(
                "cache-unavailable: failed creating temp index in {}",
                self.layout.root().display()
            )
        })?;

        let response = match self
            .backend
            .conditional_get(url, etag.as_deref(), staged.path())
        {
            Ok(response) => response,
            Err(err) => {
                drop(staged);
                let reason = format!("{err:#}");
                let reason = if reason.starts_with("index-transport-failed") {
                    reason
                } else {
                    format!("index-transport-failed: {reason}")
                };
                return fallback_to_cached(cached, reason);
            }
        };

        match response.status {
            304 => {
                drop(staged);
                match cached {
                    Some(index) => Ok(IndexLoad {
                        index,
                        origin: IndexOrigin::NotModified,
                    }),
                    None => Err(anyhow!(
                        "index-unavailable: server reported not modified but no cached index exists"
                    )),
                }
            }
            200 => {
                let index = match load_index_file(staged.path()) {
                    Ok(index) => index,
                    Err(err) => {
                        drop(staged);
                        return fallback_to_cached(cached, format!("{err:#}"));
                    }
                };

                // The old tag must never outlive the body it describes.
                self.layout.clear_index_etag()?;
                staged
                    .persist(&index_path)
                    .map_err(|err| err.error)
                    .with_context(|| {
                        format!(
                            "cache-unavailable: failed replacing cached index {}",
                            index_path.display()
                        )
                    })?;

                if let Some(etag) = response.etag.as_deref() {
                    self.layout.write_index_etag(etag)?;
                }

                Ok(IndexLoad {
                    index,
                    origin: IndexOrigin::Downloaded,
                })
            }
            status => {
                drop(staged);
                fallback_to_cached(cached, format!("unexpected HTTP status {status}"))
            }
        }
    }
}

fn fallback_to_cached(cached: Option<Index>, reason: String) -> Result<IndexLoad> {
    match cached {
        Some(index) => Ok(IndexLoad {
            index,
            origin: IndexOrigin::StaleFallback { reason },
        }),
        None if reason.starts_with("index-") => Err(anyhow!("{reason} (no cached index available)")),
        None => Err(anyhow!(
            "index-unavailable: {reason} (no cached index available)"
        )),
    }
}

fn load_index_file(path: &Path) -> Result<Index> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading index {}", path.display()))?;
    Index::from_json_str(&content)
}
