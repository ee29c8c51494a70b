//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with in-memory implementations.

use std::io;
use std::path::Path;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file, replacing it.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

// ============================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================

#[cfg(test)]
pub use memory::MemoryFileSystem;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::FileSystem;

    /// Filesystem kept in a map, for service tests.
    #[derive(Debug, Default)]
    pub struct MemoryFileSystem {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemoryFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
            if let Ok(mut files) = self.files.lock() {
                files.insert(path.into(), content.into());
            }
            self
        }

        fn poisoned() -> io::Error {
            io::Error::new(io::ErrorKind::Other, "memory filesystem lock poisoned")
        }
    }

    impl FileSystem for MemoryFileSystem {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            let files = self.files.lock().map_err(|_| Self::poisoned())?;
            files.get(path).cloned().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such file: {}", path.display()),
                )
            })
        }

        fn write(&self, path: &Path, content: &str) -> io::Result<()> {
            let mut files = self.files.lock().map_err(|_| Self::poisoned())?;
            files.insert(path.to_path_buf(), content.to_string());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.is_file(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files
                .lock()
                .map(|files| files.contains_key(path))
                .unwrap_or(false)
        }
    }
}
