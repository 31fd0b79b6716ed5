use anyhow::Result;

use crate::diff::generate_diff;
use crate::upgrade::UpgradeCandidate;

const SECTION_SEPARATOR: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDocument {
    pub heading: String,
    /// Long-form content meant for a pager; `None` when the heading says everything.
    pub body: Option<String>,
    pub prompt: String,
}

/// Presents a [`ReviewDocument`] and collects a single yes/no decision.
pub trait ReviewGate {
    fn review(&mut self, document: &ReviewDocument) -> Result<bool>;
}

pub fn install_review_document(
    name: &str,
    cached: Option<&str>,
    new_template: &str,
) -> Result<ReviewDocument> {
    let (heading, body) = match cached {
        Some(cached) if cached == new_template => (
            format!("Template for {name} unchanged since last install."),
            None,
        ),
        Some(cached) => (
            format!("Template for {name} has changed since last install:"),
            Some(generate_diff(Some(cached), new_template)?),
        ),
        None => (
            format!("New package {name}. Review template:"),
            Some(new_template.to_string()),
        ),
    };

    Ok(ReviewDocument {
        heading,
        body,
        prompt: "Proceed with installation? [Y/n]".to_string(),
    })
}

/// Builds the one document covering every pending upgrade.
///
/// Candidates without a fetched template are listed with their version change only.
pub fn batch_review_document(candidates: &[UpgradeCandidate]) -> Result<ReviewDocument> {
    let count = candidates.len();
    let mut body = String::new();
    body.push_str("VUP Package Upgrade Review\n");
    body.push_str("==========================\n\n");
    body.push_str(&format!("{count} package(s) to upgrade:\n\n"));
    for (position, candidate) in candidates.iter().enumerate() {
        body.push_str(&format!(
            "  [{}] {}: {} -> {}\n",
            position + 1,
            candidate.name,
            candidate.installed_version,
            candidate.new_version
        ));
    }
    body.push('\n');

    for (position, candidate) in candidates.iter().enumerate() {
        body.push_str(&format!(
            "{SECTION_SEPARATOR}\n[{}/{count}] {}: {} -> {}\n{SECTION_SEPARATOR}\n\n",
            position + 1,
            candidate.name,
            candidate.installed_version,
            candidate.new_version
        ));

        match (&candidate.cached_template, &candidate.new_template) {
            (_, None) => body.push_str("(Template not fetched)\n"),
            (None, Some(new_template)) => {
                body.push_str("(New package - showing full template)\n\n");
                body.push_str(new_template);
                body.push('\n');
            }
            (Some(cached), Some(new_template)) if cached == new_template => {
                body.push_str("(Template unchanged since last install)\n");
            }
            (Some(cached), Some(new_template)) => {
                body.push_str(&generate_diff(Some(cached), new_template)?);
                body.push('\n');
            }
        }
        body.push('\n');
    }

    Ok(ReviewDocument {
        heading: format!("Review {count} package upgrade(s)"),
        body: Some(body),
        prompt: format!("Proceed with {count} upgrade(s)? [Y/n]"),
    })
}
