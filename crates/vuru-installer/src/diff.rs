use std::io::Write;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

/// Renders a unified diff from the cached template to the new one.
///
/// A missing cached template yields the full new content and identical inputs yield an empty
/// string; neither case spawns `diff`.
pub fn generate_diff(old: Option<&str>, new: &str) -> Result<String> {
    let Some(old) = old else {
        return Ok(new.to_string());
    };
    if old == new {
        return Ok(String::new());
    }

    let old_file = write_temp("vuru_old_", old)?;
    let new_file = write_temp("vuru_new_", new)?;

    let output = Command::new("diff")
        .arg("-u")
        .arg("--label")
        .arg("a/template")
        .arg("--label")
        .arg("b/template")
        .arg(old_file.path())
        .arg(new_file.path())
        .output()
        .context("diff: command failed to start")?;

    // diff exits 1 when the inputs differ
    match output.status.code() {
        Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        _ => Err(anyhow!(
            "diff: status={} stderr='{}'",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )),
    }
}

fn write_temp(prefix: &str, content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .context("failed creating temp file for diff")?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .with_context(|| format!("failed writing {}", file.path().display()))?;
    Ok(file)
}
