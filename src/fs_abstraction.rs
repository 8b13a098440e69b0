//! Filesystem abstraction layer for testability
//!
//! Reading the export and writing the JSON documents go through the
//! [`FileSystem`] trait, so the loader and writer can be exercised with
//! mockall-generated mocks instead of the real filesystem.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[cfg(test)]
use mockall::automock;

/// Trait abstracting the filesystem operations cdnsieve performs.
///
/// # Example (testing)
/// ```ignore
/// use cdnsieve::fs_abstraction::MockFileSystem;
///
/// let mut mock_fs = MockFileSystem::new();
/// mock_fs.expect_read()
///     .returning(|_| Ok(b"CdnCompany,IsCdn,CNAME,A,IpSizeIsCdn\n".to_vec()));
/// ```
#[cfg_attr(test, automock)]
pub trait FileSystem: Send + Sync {
    /// Read file contents as bytes.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace `path` with `contents` without ever exposing a partial file.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Real filesystem implementation using std::fs and tempfile.
#[derive(Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        // Temp file must live on the same filesystem for rename to be atomic
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(contents)?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

static REAL_FS: RealFileSystem = RealFileSystem;

/// Get a reference to the global real filesystem instance.
pub fn real_fs() -> &'static RealFileSystem {
    &REAL_FS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_real_fs_write_atomic_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("out.json");

        let fs = RealFileSystem;
        fs.write_atomic(&file_path, b"{}").unwrap();

        assert_eq!(fs.read(&file_path).unwrap(), b"{}");
    }

    #[test]
    fn test_real_fs_write_atomic_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("out.json");

        let fs = RealFileSystem;
        fs.write_atomic(&file_path, b"old contents that are longer").unwrap();
        fs.write_atomic(&file_path, b"new").unwrap();

        assert_eq!(fs.read(&file_path).unwrap(), b"new");
        // only the target remains, no stray temp files
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_real_fs_write_atomic_missing_dir() {
        let fs = RealFileSystem;
        let result = fs.write_atomic(Path::new("/nonexistent/dir/out.json"), b"x");
        assert!(result.is_err());
    }

    #[test]
    fn test_real_fs_create_dir_all() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/c");

        let fs = RealFileSystem;
        assert!(!fs.exists(&nested));
        fs.create_dir_all(&nested).unwrap();
        assert!(fs.exists(&nested));
    }

    #[test]
    fn test_real_fs_read_nonexistent() {
        let result = real_fs().read(Path::new("/nonexistent/path/file.csv"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_real_fs_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RealFileSystem>();
    }

    #[test]
    fn test_mock_fs_error_simulation() {
        let mut mock = MockFileSystem::new();
        mock.expect_read()
            .returning(|_| Err(io::Error::new(ErrorKind::PermissionDenied, "access denied")));

        let result = mock.read(Path::new("/any/path"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PermissionDenied);
    }
}
