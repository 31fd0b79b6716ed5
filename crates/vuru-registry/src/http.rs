use std::fs::{self, File};
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use tempfile::NamedTempFile;

use crate::layout::normalize_etag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseMeta {
    pub status: u16,
    pub etag: Option<String>,
}

/// Transport used for the index and template downloads.
///
/// Implementations write the response body to the given path and never
/// interpret URLs or header values through a shell.
pub trait HttpBackend {
    /// Issues a GET, optionally conditional on `etag`, and reports the final
    /// status and ETag. Non-2xx statuses are not errors here.
    fn conditional_get(
        &self,
        url: &str,
        etag: Option<&str>,
        body_path: &Path,
    ) -> Result<HttpResponseMeta>;

    /// Downloads `url` to `out_path`, failing on any non-success status.
    fn download(&self, url: &str, out_path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBackendPreference {
    External,
    InProcess,
}

impl DownloadBackendPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::InProcess => "in-process",
        }
    }
}

pub fn parse_download_backend_preference(
    value: Option<&str>,
    source_name: &str,
) -> Result<DownloadBackendPreference> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DownloadBackendPreference::External);
    };

    match value.to_ascii_lowercase().as_str() {
        "external" => Ok(DownloadBackendPreference::External),
        "in-process" => Ok(DownloadBackendPreference::InProcess),
        _ => Err(anyhow!(
            "invalid {source_name} value '{value}': expected 'external' or 'in-process'"
        )),
    }
}

pub fn http_backend_for(preference: DownloadBackendPreference) -> Result<Box<dyn HttpBackend>> {
    Ok(match preference {
        DownloadBackendPreference::External => Box::new(CurlBackend),
        DownloadBackendPreference::InProcess => Box::new(InProcessBackend::new()?),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurlBackend;

impl HttpBackend for CurlBackend {
    fn conditional_get(
        &self,
        url: &str,
        etag: Option<&str>,
        body_path: &Path,
    ) -> Result<HttpResponseMeta> {
        let headers = match body_path.parent() {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .context("index-transport-failed: failed creating header capture file")?;

        let mut command = Command::new("curl");
        command
            .arg("-s")
            .arg("-L")
            .arg("-D")
            .arg(headers.path())
            .arg("-o")
            .arg(body_path);
        if let Some(etag) = etag {
            command.arg("-H").arg(format!("If-None-Match: {etag}"));
        }
        command.arg(url);
        run_command(&mut command, "index-transport-failed: curl")?;

        let raw = fs::read(headers.path()).with_context(|| {
            format!(
                "index-transport-failed: failed reading captured headers {}",
                headers.path().display()
            )
        })?;
        Ok(parse_response_headers(&String::from_utf8_lossy(&raw)))
    }

    fn download(&self, url: &str, out_path: &Path) -> Result<()> {
        let mut command = Command::new("curl");
        command
            .arg("-s")
            .arg("-f")
            .arg("-L")
            .arg("-o")
            .arg(out_path)
            .arg(url);
        run_command(&mut command, "curl download failed")
    }
}

#[derive(Debug, Clone)]
pub struct InProcessBackend {
    client: reqwest::blocking::Client,
}

impl InProcessBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("vuru/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpBackend for InProcessBackend {
    fn conditional_get(
        &self,
        url: &str,
        etag: Option<&str>,
        body_path: &Path,
    ) -> Result<HttpResponseMeta> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let mut response = request
            .send()
            .with_context(|| format!("index-transport-failed: request to {url} failed"))?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .and_then(normalize_etag);

        let mut body = File::create(body_path).with_context(|| {
            format!(
                "index-transport-failed: failed creating {}",
                body_path.display()
            )
        })?;
        response
            .copy_to(&mut body)
            .with_context(|| format!("index-transport-failed: failed reading body from {url}"))?;

        Ok(HttpResponseMeta { status, etag })
    }

    fn download(&self, url: &str, out_path: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        if !response.status().is_success() {
            return Err(anyhow!("request to {url} returned HTTP {}", response.status()));
        }

        let mut out = File::create(out_path)
            .with_context(|| format!("failed creating {}", out_path.display()))?;
        response
            .copy_to(&mut out)
            .with_context(|| format!("failed reading body from {url}"))?;
        Ok(())
    }
}

/// Extracts the final status code and ETag from a raw header dump.
///
/// Redirect chains produce one header block per hop; each status line starts
/// a new block, so only the last block's values survive.
pub fn parse_response_headers(raw: &str) -> HttpResponseMeta {
    let mut status = 0_u16;
    let mut etag = None;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with("HTTP/") {
            status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse().ok())
                .unwrap_or(0);
            etag = None;
            continue;
        }

        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("etag") {
                etag = normalize_etag(value);
            }
        }
    }

    HttpResponseMeta { status, etag }
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "{context_message}: status={} stderr='{}'",
        output.status,
        stderr.trim()
    ))
}
