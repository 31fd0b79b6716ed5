use anyhow::anyhow;

const URL_FORBIDDEN_CHARS: &[char] = &[
    ';', '|', '&', '$', '`', '\'', '"', '\\', '<', '>', '(', ')', '{', '}',
];

/// Package names and categories end up as filesystem path components and URL
/// path segments, so the accepted grammar is deliberately narrow.
pub fn is_valid_identifier(value: &str) -> bool {
    if value.is_empty() || value.starts_with('.') || value.contains("..") {
        return false;
    }

    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"._-".contains(&b))
}

pub fn validate_identifier(kind: &str, value: &str) -> anyhow::Result<()> {
    if !is_valid_identifier(value) {
        return Err(anyhow!(
            "invalid-identifier: {kind} '{}' must use [A-Za-z0-9._-], must not start with '.' and must not contain '..'",
            value.escape_debug()
        ));
    }
    Ok(())
}

pub fn is_valid_url(url: &str) -> bool {
    let remainder = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    let Some(remainder) = remainder else {
        return false;
    };
    if remainder.is_empty() {
        return false;
    }

    !url.chars()
        .any(|ch| ch.is_control() || URL_FORBIDDEN_CHARS.contains(&ch))
}

pub fn validate_url(kind: &str, url: &str) -> anyhow::Result<()> {
    if !is_valid_url(url) {
        return Err(anyhow!(
            "invalid-url: {kind} '{}' must be an http(s) URL without shell metacharacters",
            url.escape_debug()
        ));
    }
    Ok(())
}
