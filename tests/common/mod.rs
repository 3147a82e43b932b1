//! Common test utilities and helpers

use casebook::{Casebook, CasebookConfig};
use std::path::Path;
use tempfile::TempDir;

/// Casebook writing JSON files into a fresh temporary directory
///
/// The directory is removed when the returned `TempDir` drops, so keep it
/// alive for the duration of the test.
pub fn create_test_casebook() -> (TempDir, Casebook) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let casebook = casebook_at(dir.path(), 1000);
    (dir, casebook)
}

/// Casebook over an existing directory with a custom retention limit
pub fn casebook_at(base: &Path, max_entries: usize) -> Casebook {
    let mut config = CasebookConfig::with_base_path(base);
    config.max_entries = max_entries;
    Casebook::new(config).expect("Failed to create test casebook")
}

/// Route engine logs to the test harness when RUST_LOG is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
