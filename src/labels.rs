//! Symbolic labels for test resources
//!
//! A label names the role a resource plays across tests. Three are special:
//!
//! - [`STATELESS`]: discovered in the account, never created or deleted by the run
//! - [`REMOVED`] (optionally suffixed with the test name): provisioned so a test
//!   can delete it; released when the test ends
//! - [`STATEFUL`]: the conventional shared label, provisioned once and reused
//!
//! Any other string works like [`STATEFUL`].

pub const STATELESS: &str = "stateless";
pub const STATEFUL: &str = "stateful";
pub const REMOVED: &str = "removed";

/// Per-test removal label, e.g. `removed:testDeleteVlan`
pub fn removed_for(test: &str) -> String {
    format!("{}:{}", REMOVED, test)
}

pub fn is_stateless(label: &str) -> bool {
    label == STATELESS
}

pub fn is_removed(label: &str) -> bool {
    label.starts_with(REMOVED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_for() {
        let label = removed_for("testDeleteVlan");
        assert_eq!(label, "removed:testDeleteVlan");
        assert!(is_removed(&label));
        assert!(is_removed(REMOVED));
        assert!(!is_removed(STATEFUL));
    }

    #[test]
    fn test_is_stateless() {
        assert!(is_stateless(STATELESS));
        assert!(!is_stateless("stateless2"));
        assert!(!is_stateless(STATEFUL));
    }
}
