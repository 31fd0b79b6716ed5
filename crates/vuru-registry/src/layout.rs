use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use vuru_core::validate_identifier;

const CACHE_DIR_NAME: &str = "vup";
const MAX_ETAG_LEN: usize = 255;

/// On-disk layout of the per-user cache: the mirrored index, its ETag
/// sidecar and one cached template per package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Result<Self> {
        resolve_cache_root().map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn index_etag_path(&self) -> PathBuf {
        self.root.join("index.json.etag")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn template_path(&self, name: &str) -> Result<PathBuf> {
        validate_identifier("package name", name)?;
        Ok(self.templates_dir().join(name))
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!(
                "cache-unavailable: failed to create cache directory {}",
                self.root.display()
            )
        })
    }

    pub fn prepare_index_path(&self) -> Result<PathBuf> {
        self.ensure_root()?;
        Ok(self.index_path())
    }

    pub fn read_template(&self, name: &str) -> Result<Option<String>> {
        let path = self.template_path(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed reading cached template {}", path.display())),
        }
    }

    pub fn save_template(&self, name: &str, content: &str) -> Result<()> {
        let path = self.template_path(name)?;
        let dir = self.templates_dir();
        fs::create_dir_all(&dir).with_context(|| {
            format!(
                "cache-unavailable: failed to create template cache {}",
                dir.display()
            )
        })?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing cached template {}", path.display()))
    }

    /// Returns the stored ETag, treating unreadable, empty or oversized
    /// values as absent.
    pub fn read_index_etag(&self) -> Option<String> {
        let content = fs::read_to_string(self.index_etag_path()).ok()?;
        normalize_etag(&content)
    }

    pub fn write_index_etag(&self, etag: &str) -> Result<()> {
        let Some(etag) = normalize_etag(etag) else {
            return self.clear_index_etag();
        };
        write_atomically(&self.root, &self.index_etag_path(), etag.as_bytes())
    }

    pub fn clear_index_etag(&self) -> Result<()> {
        let path = self.index_etag_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed removing stale etag {}", path.display()))
            }
        }
    }
}

pub fn resolve_cache_root() -> Result<PathBuf> {
    resolve_cache_root_from(
        std::env::var("XDG_CACHE_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
    )
}

pub fn resolve_cache_root_from(xdg_cache_home: Option<&str>, home: Option<&str>) -> Result<PathBuf> {
    if let Some(xdg) = xdg_cache_home.filter(|value| Path::new(value).is_absolute()) {
        return Ok(PathBuf::from(xdg).join(CACHE_DIR_NAME));
    }

    if let Some(home) = home.filter(|value| Path::new(value).is_absolute()) {
        return Ok(PathBuf::from(home).join(".cache").join(CACHE_DIR_NAME));
    }

    Err(anyhow!(
        "cache-unavailable: neither XDG_CACHE_HOME nor HOME is an absolute path"
    ))
}

pub(crate) fn normalize_etag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_ETAG_LEN {
        return None;
    }
    // Entity tags are visible ASCII only; anything else would be an invalid header value.
    if !trimmed.bytes().all(|byte| (0x21..=0x7e).contains(&byte)) {
        return None;
    }
    Some(trimmed.to_string())
}

pub(crate) fn write_atomically(dir: &Path, destination: &Path, bytes: &[u8]) -> Result<()> {
    let mut staged = NamedTempFile::new_in(dir).with_context(|| {
        format!(
            "cache-unavailable: failed creating temp file in {}",
            dir.display()
        )
    })?;
    staged
        .write_all(bytes)
        .and_then(|_| staged.flush())
        .with_context(|| format!("failed writing temp file for {}", destination.display()))?;
    staged
        .persist(destination)
        .map_err(|err| err.error)
        .with_context(|| format!("failed replacing {}", destination.display()))?;
    Ok(())
}
