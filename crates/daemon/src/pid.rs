//! PID file handling and process liveness.

use autotrader_core::persistence::PersistenceError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded PID, `None` when the file is missing or unparsable.
    #[must_use]
    pub fn read(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.path).ok()?;
        contents.trim().parse().ok()
    }

    /// Recorded PID if it still names a live process.
    #[must_use]
    pub fn live_pid(&self) -> Option<u32> {
        self.read().filter(|&pid| is_alive(pid))
    }

    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, pid: u32) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, format!("{pid}\n"))?;
        debug!(pid, path = %self.path.display(), "Wrote PID file");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the file exists and cannot be removed.
    pub fn remove(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `pid` names a running process.
#[cfg(unix)]
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    // pid 0 and negative values address process groups
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
#[must_use]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Asks `pid` to shut down with SIGTERM.
///
/// # Errors
///
/// Returns the OS error if the signal cannot be delivered.
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join("run").join("daemon.pid"));
        assert_eq!(pid_file.read(), None);

        pid_file.write(std::process::id()).unwrap();
        assert_eq!(pid_file.read(), Some(std::process::id()));
        assert_eq!(pid_file.live_pid(), Some(std::process::id()));

        pid_file.remove().unwrap();
        pid_file.remove().unwrap();
        assert!(!pid_file.path().exists());
    }

    #[test]
    fn test_garbage_pid_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join("daemon.pid"));
        fs::write(pid_file.path(), "not-a-pid").unwrap();
        assert_eq!(pid_file.read(), None);
        assert_eq!(pid_file.live_pid(), None);
    }
}
