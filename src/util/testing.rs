//! Shared test setup: one tracing subscriber per test binary, document fixtures.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    // RUST_LOG wins, otherwise everything of ours at debug
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genotree=debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Path of a fixture under `tests/resources`.
pub fn resource_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
}

/// Write a member document into `dir` and return its path.
pub fn write_document(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("members.json");
    if let Err(e) = std::fs::write(&path, content) {
        panic!("write test document {}: {}", path.display(), e);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup_is_idempotent() {
        init_test_setup();
        init_test_setup();
    }

    #[test]
    fn test_resource_path_points_into_tests() {
        assert!(resource_path("family.json").ends_with("tests/resources/family.json"));
    }
}
