/// Architecture name as xbps spells it, which is also the key used in the
/// index's `repo_urls` tables.
pub fn host_arch() -> &'static str {
    let musl = cfg!(target_env = "musl");
    match (std::env::consts::ARCH, musl) {
        ("x86_64", false) => "x86_64",
        ("x86_64", true) => "x86_64-musl",
        ("aarch64", false) => "aarch64",
        ("aarch64", true) => "aarch64-musl",
        ("x86", false) => "i686",
        ("x86", true) => "i686-musl",
        ("arm", false) => "armv7l",
        ("arm", true) => "armv7l-musl",
        (other, _) => other,
    }
}
