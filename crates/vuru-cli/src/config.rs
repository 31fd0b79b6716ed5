use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use vuru_core::host_arch;
use vuru_installer::DEFAULT_MAX_UPGRADES;
use vuru_registry::{
    parse_download_backend_preference, DownloadBackendPreference, DEFAULT_TEMPLATE_BASE_URL,
};

pub(crate) const DEFAULT_INDEX_URL: &str = "https://vup-linux.github.io/vup/index.json";
const CONFIG_FILE_NAME: &str = "vuru.toml";

/// Effective settings after layering defaults, the config file, the environment and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub index_url: String,
    pub template_base_url: String,
    pub max_upgrades: usize,
    pub download_backend: DownloadBackendPreference,
    pub arch: String,
    pub pager: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub index_url: Option<String>,
    pub template_base_url: Option<String>,
    pub max_upgrades: Option<usize>,
    pub download_backend: Option<String>,
    pub arch: Option<String>,
    pub pager: Option<Vec<String>>,
}

impl Settings {
    pub(crate) fn load(config_override: Option<&Path>, index_url_flag: Option<&str>) -> Result<Self> {
        let env = |name: &str| std::env::var(name).ok();
        let file = match config_override {
            Some(path) => read_config_file(path)?.ok_or_else(|| {
                anyhow!("config file {} does not exist", path.display())
            })?,
            None => match default_config_path(
                env("XDG_CONFIG_HOME").as_deref(),
                env("HOME").as_deref(),
            ) {
                Some(path) => read_config_file(&path)?.unwrap_or_default(),
                None => ConfigFile::default(),
            },
        };
        Self::resolve(file, env, index_url_flag)
    }

    pub(crate) fn resolve(
        file: ConfigFile,
        lookup_env: impl Fn(&str) -> Option<String>,
        index_url_flag: Option<&str>,
    ) -> Result<Self> {
        let env = |name: &str| lookup_env(name).filter(|value| !value.trim().is_empty());

        let index_url = index_url_flag
            .map(ToOwned::to_owned)
            .or_else(|| env("VURU_INDEX_URL"))
            .or(file.index_url)
            .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string());

        let template_base_url = env("VURU_TEMPLATE_BASE_URL")
            .or(file.template_base_url)
            .unwrap_or_else(|| DEFAULT_TEMPLATE_BASE_URL.to_string());

        let max_upgrades = match env("VURU_MAX_UPGRADES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                anyhow!("invalid VURU_MAX_UPGRADES value '{raw}': expected a positive integer")
            })?,
            None => file.max_upgrades.unwrap_or(DEFAULT_MAX_UPGRADES),
        };
        if max_upgrades == 0 {
            return Err(anyhow!("max_upgrades must be at least 1"));
        }

        let download_backend = match env("VURU_DOWNLOAD_BACKEND") {
            Some(raw) => parse_download_backend_preference(Some(&raw), "VURU_DOWNLOAD_BACKEND")?,
            None => parse_download_backend_preference(
                file.download_backend.as_deref(),
                "download_backend",
            )?,
        };

        let arch = env("VURU_ARCH")
            .or(file.arch)
            .map(|arch| arch.trim().to_string())
            .unwrap_or_else(|| host_arch().to_string());
        if arch.is_empty() {
            return Err(anyhow!("arch must not be empty"));
        }

        let pager = file
            .pager
            .unwrap_or_else(|| vec!["less".to_string(), "-R".to_string()]);
        if pager.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(anyhow!("pager must name a program"));
        }

        Ok(Self {
            index_url,
            template_base_url,
            max_upgrades,
            download_backend,
            arch,
            pager,
        })
    }
}

pub(crate) fn default_config_path(xdg_config_home: Option<&str>, home: Option<&str>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home.filter(|value| Path::new(value).is_absolute()) {
        return Some(PathBuf::from(xdg).join("vup").join(CONFIG_FILE_NAME));
    }
    home.filter(|value| Path::new(value).is_absolute())
        .map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("vup")
                .join(CONFIG_FILE_NAME)
        })
}

/// Reads and parses a config file; a missing file is `Ok(None)`.
pub(crate) fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed reading config file: {}", path.display()))
        }
    };
    let file = toml::from_str(&content)
        .with_context(|| format!("failed parsing config file: {}", path.display()))?;
    Ok(Some(file))
}
