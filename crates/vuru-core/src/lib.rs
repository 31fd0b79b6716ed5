mod arch;
mod identifier;
mod index;

pub use arch::host_arch;
pub use identifier::{is_valid_identifier, is_valid_url, validate_identifier, validate_url};
pub use index::{Index, PackageAvailability, PackageRecord, ResolvedPackage};
