use pki_core::{PkiError, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Names of the entries directly inside `dir`
pub fn snapshot(dir: &Path) -> Result<BTreeSet<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PkiError::SnapshotError(format!("Cannot list {}: {}", dir.display(), e))
    })?;

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PkiError::SnapshotError(format!("Cannot read entry in {}: {}", dir.display(), e))
        })?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(names)
}

/// Entries present in `after` but not in `before`
pub fn created_between(before: &BTreeSet<String>, after: &BTreeSet<String>) -> BTreeSet<String> {
    after.difference(before).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_created_between_is_set_difference() {
        let before = set(&["a.txt", "b.txt"]);
        let after = set(&["b.txt", "c.txt", "host-key.pem"]);
        assert_eq!(created_between(&before, &after), set(&["c.txt", "host-key.pem"]));
    }

    #[test]
    fn test_deleted_files_are_not_created() {
        let before = set(&["a.txt"]);
        let after = set(&[]);
        assert!(created_between(&before, &after).is_empty());
    }

    #[test]
    fn test_snapshot_lists_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("host-key.pem"), "key").unwrap();
        std::fs::create_dir(dir.path().join("certs")).unwrap();

        assert_eq!(snapshot(dir.path()).unwrap(), set(&["certs", "host-key.pem"]));
    }

    #[test]
    fn test_snapshot_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = snapshot(&missing).unwrap_err();
        assert!(matches!(err, PkiError::SnapshotError(_)));
    }
}
