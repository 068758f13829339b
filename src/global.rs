//! Process-wide default registry
//!
//! For programs that want one database and free functions instead of passing
//! a registry around. Everything here forwards to [`registry()`].

use crate::error::{InitError, LookupError, ReloadError};
use crate::record::LocationRecord;
use crate::registry::LocatorRegistry;
use std::path::Path;
use std::sync::LazyLock;

static DEFAULT_REGISTRY: LazyLock<LocatorRegistry> = LazyLock::new(LocatorRegistry::new);

/// The default registry
pub fn registry() -> &'static LocatorRegistry {
    &DEFAULT_REGISTRY
}

/// Load the default database from a file (first call only)
pub fn init(path: impl AsRef<Path>) -> Result<(), InitError> {
    DEFAULT_REGISTRY.initialize(path.as_ref())
}

/// Load the default database from bytes (first call only)
pub fn init_with_data(data: Vec<u8>) -> Result<(), InitError> {
    DEFAULT_REGISTRY.initialize(data)
}

/// Replace the default database from a file
pub fn reload(path: impl AsRef<Path>) -> Result<u64, ReloadError> {
    DEFAULT_REGISTRY.reload(path.as_ref())
}

/// Look up an address in the default database
pub fn find(addr: &str) -> Result<LocationRecord, LookupError> {
    DEFAULT_REGISTRY.lookup(addr)
}

/// Look up a host-order address in the default database
pub fn find_by_u32(addr: u32) -> Result<LocationRecord, LookupError> {
    DEFAULT_REGISTRY.lookup_u32(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::test_support::write_database;

    // The only test touching the default registry; keeps ordering deterministic.
    #[test]
    fn test_default_registry_lifecycle() {
        assert_eq!(find("1.2.3.4"), Err(LookupError::NotInitialized));

        init_with_data(write_database(&[(u32::MAX, "AA\tB\tC\t")])).unwrap();
        init_with_data(write_database(&[(u32::MAX, "XX\tB\tC\t")])).unwrap();
        assert_eq!(find("1.2.3.4").unwrap().country, "AA");
        assert_eq!(find_by_u32(0x0102_0304).unwrap().country, "AA");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("next.dat");
        std::fs::write(&path, write_database(&[(u32::MAX, "BB\tB\tC\t")])).unwrap();
        assert_eq!(reload(&path).unwrap(), 2);
        assert_eq!(find("1.2.3.4").unwrap().country, "BB");

        assert!(reload(dir.path().join("missing.dat")).is_err());
        assert_eq!(registry().generation(), 2);
        assert!(init(&path).is_ok());
    }
}
