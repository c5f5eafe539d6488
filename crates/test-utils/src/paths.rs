//! Path utilities for locating test data files.
//!
//! Real ABI files are large, so tests that need them look in a few
//! well-known places and skip when nothing is found.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// Determined from this crate's manifest directory (`crates/test-utils`).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns `crates/{crate_name}/testdata/`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join(crate_name)
        .join("testdata")
}

/// Directories searched for test data, in order:
/// 1. `TEST_DATA_DIR` (if set)
/// 2. `ABI_DATA_DIR` (if set), where `abi-pipeline fetch` stores scenarios
/// 3. `crates/netcdf-parser/testdata/`
/// 4. `testdata/` at the workspace root
pub fn test_data_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for var in ["TEST_DATA_DIR", "ABI_DATA_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            dirs.push(PathBuf::from(dir));
        }
    }
    let root = workspace_root();
    dirs.push(crate_testdata_dir("netcdf-parser"));
    dirs.push(root.join("testdata"));
    dirs
}

/// Searches for a test file in the test data directories.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    test_data_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}
