mod diff;
mod install;
mod installed;
mod review;
mod upgrade;
mod xbps;

pub use diff::generate_diff;
pub use install::{resolve_for_install, InstallFlow, InstallOutcome};
pub use installed::{
    parse_installed_line, parse_installed_list, parse_pkgver_output, InstalledPackage,
};
pub use review::{batch_review_document, install_review_document, ReviewDocument, ReviewGate};
pub use upgrade::{
    ApplySummary, ScanResult, UpgradeCandidate, UpgradeEvent, UpgradePlanner, UpgradeReport,
    DEFAULT_MAX_UPGRADES,
};
pub use xbps::{cmpver_is_greater, InstallMode, InstallRequest, PackageManager, Xbps};

#[cfg(test)]
mod tests;
