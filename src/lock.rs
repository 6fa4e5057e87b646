use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Exclusive lock over a project's extract directory; the lock file is removed on drop.
#[derive(Debug)]
pub struct ExtractLock {
    file: File,
    path: PathBuf,
}

impl ExtractLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExtractLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove lock file");
            }
        }
    }
}

/// `<extract_root>/.<project>.lock`
pub fn lock_path_for(extract_root: &Path, project_name: &str) -> PathBuf {
    extract_root.join(format!(".{project_name}.lock"))
}

/// Acquire a non-blocking exclusive lock for the project's extract directory.
pub fn acquire_extract_lock(extract_root: &Path, project_name: &str) -> io::Result<ExtractLock> {
    fs::create_dir_all(extract_root)?;
    let path = lock_path_for(extract_root, project_name);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(ExtractLock { file, path }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "Another appsody command is already using the extract directory for project {project_name} (lock held: {}). Please try again later.",
                    path.display()
                ),
            ))
        }
        Err(e) => Err(e),
    }
}
