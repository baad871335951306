#[cfg(test)]
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Permission bits applied to every file that may contain secret material.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Trait for filesystem operations to enable testing with mocks
pub trait FileSystem: Send + Sync {
    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Read file contents as raw bytes
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate a file readable and writable by its owner only,
    /// then write all of `contents` to it
    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Write bytes to the process's standard output
    fn write_stdout(&self, contents: &[u8]) -> io::Result<()>;
}

/// Real filesystem implementation using std::fs
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(PRIVATE_FILE_MODE);
        }

        let mut file = options.open(path)?;
        // The creation mode is filtered by the umask and ignored for files that
        // already exist.
        restrict_permissions(&file)?;
        file.write_all(contents)?;
        file.flush()
    }

    fn write_stdout(&self, contents: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(contents)?;
        stdout.flush()
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &std::fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}

/// File captured by the mock filesystem
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct MockFile {
    pub contents: Vec<u8>,
    pub mode: u32,
}

/// Mock filesystem implementation for testing (in-memory)
#[cfg(test)]
pub struct MockFileSystem {
    files: Arc<RwLock<HashMap<PathBuf, MockFile>>>,
    failing_paths: Arc<RwLock<HashSet<PathBuf>>>,
    stdout: Arc<Mutex<Vec<u8>>>,
}

#[cfg(test)]
#[allow(dead_code)]
impl MockFileSystem {
    /// Create new empty mock filesystem
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            failing_paths: Arc::new(RwLock::new(HashSet::new())),
            stdout: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed a file, as if it existed before the test started
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.add_bytes(path, contents.as_bytes());
    }

    /// Seed a file with arbitrary, possibly non-UTF-8, contents
    pub fn add_bytes(&self, path: impl Into<PathBuf>, contents: &[u8]) {
        self.files.write().unwrap().insert(
            path.into(),
            MockFile {
                contents: contents.to_vec(),
                mode: 0o644,
            },
        );
    }

    /// Make every write to `path` fail with a permission error
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing_paths.write().unwrap().insert(path.into());
    }

    /// Get captured file contents for testing assertions
    pub fn get_file_contents(&self, path: &Path) -> Option<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|file| String::from_utf8_lossy(&file.contents).into_owned())
    }

    /// Get the permission bits a file was written with
    pub fn get_file_mode(&self, path: &Path) -> Option<u32> {
        self.files.read().unwrap().get(path).map(|file| file.mode)
    }

    /// Check if file was written
    pub fn has_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    /// List all files in mock filesystem
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.files.read().unwrap().keys().cloned().collect()
    }

    /// Everything written to standard output so far
    pub fn stdout_contents(&self) -> String {
        let stdout = self.stdout.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&stdout).into_owned()
    }
}

#[cfg(test)]
impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(path).map(|file| file.contents.clone()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "file not found in mock filesystem",
            )
        })
    }

    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let failing = self
            .failing_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path);
        if failing {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "write rejected by mock filesystem",
            ));
        }

        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.to_path_buf(),
                MockFile {
                    contents: contents.to_vec(),
                    mode: PRIVATE_FILE_MODE,
                },
            );
        Ok(())
    }

    fn write_stdout(&self, contents: &[u8]) -> io::Result<()> {
        self.stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_real_write_private_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        RealFileSystem
            .write_private(&path, b"password: hunter2\n")
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "password: hunter2\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_real_write_private_sets_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.conf");

        RealFileSystem.write_private(&path, b"secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_write_private_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.conf");
        std::fs::write(&path, "old content that is longer than the new one").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o666)).unwrap();

        RealFileSystem.write_private(&path, b"new").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_real_write_private_into_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(RealFileSystem.write_private(dir.path(), b"x").is_err());
    }

    #[test]
    fn test_mock_records_mode_and_stdout() {
        let fs = MockFileSystem::new();
        fs.write_private(Path::new("/out/app.conf"), b"a=b").unwrap();
        fs.write_stdout(b"hello").unwrap();

        assert_eq!(
            fs.get_file_contents(Path::new("/out/app.conf")).as_deref(),
            Some("a=b")
        );
        assert_eq!(fs.get_file_mode(Path::new("/out/app.conf")), Some(0o600));
        assert_eq!(fs.stdout_contents(), "hello");
    }

    #[test]
    fn test_mock_failing_path() {
        let fs = MockFileSystem::new();
        fs.fail_writes_to("/readonly/out");

        let err = fs.write_private(Path::new("/readonly/out"), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(!fs.has_file(Path::new("/readonly/out")));
    }

    #[test]
    fn test_mock_read_missing_file() {
        let fs = MockFileSystem::new();
        let err = fs.read_to_string(Path::new("/missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
