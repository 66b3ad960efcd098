use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh scratch directory with logging enabled.
pub fn scratch() -> TempDir {
    init_logging();
    tempfile::tempdir().expect("create temporary directory")
}
