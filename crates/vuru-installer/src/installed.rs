/// One entry of the system package manager's installed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// Parses one `xbps-query -l` line of the form `<state> <name>-<version> <description...>`.
///
/// The version is everything after the last hyphen of the second token. Lines without a second
/// token, without a hyphen in it, or with an empty name or version yield `None`.
pub fn parse_installed_line(line: &str) -> Option<InstalledPackage> {
    let mut tokens = line.split_whitespace();
    let _state = tokens.next()?;
    let pkgver = tokens.next()?;
    split_pkgver(pkgver)
}

pub fn parse_installed_list(output: &str) -> Vec<InstalledPackage> {
    output.lines().filter_map(parse_installed_line).collect()
}

/// Extracts the installed version from `xbps-query <name>` output.
///
/// The `pkgver:` line carries `<name>-<version>`; when its name part does not match `name` the
/// package is treated as not reported.
pub fn parse_pkgver_output(output: &str, name: &str) -> Option<String> {
    let value = output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "pkgver").then(|| value.trim())
    })?;
    let package = split_pkgver(value)?;
    (package.name == name).then_some(package.version)
}

fn split_pkgver(pkgver: &str) -> Option<InstalledPackage> {
    let (name, version) = pkgver.rsplit_once('-')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(InstalledPackage {
        name: name.to_string(),
        version: version.to_string(),
    })
}
