//! PID file management
//!
//! One PID file per process label. The running instance holds an exclusive
//! `flock` on its file for as long as its guard lives, so a file that can be
//! locked is stale no matter what it contains.

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::unistd::Pid;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Attempts before giving up on a file that keeps being replaced under us
const LOCK_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("Unable to create PID file '{}': {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Another instance is already running ({}, PID file '{}')", describe_holder(.pid), .path.display())]
    AlreadyRunning { path: PathBuf, pid: Option<i32> },
}

fn describe_holder(pid: &Option<i32>) -> String {
    match pid {
        Some(pid) => format!("pid {}", pid),
        None => "pid not yet written".to_string(),
    }
}

/// PID file location for a process label
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(dir: &Path, label: &str) -> Self {
        Self {
            path: dir.join(format!("{}.pid", label)),
        }
    }

    /// Lock the file and write `pid` to it, failing if another instance holds it.
    pub fn register(self, pid: Pid) -> Result<InstanceGuard, PidFileError> {
        let mut lock = self.lock()?;

        let previous = read_pid(&mut lock).map_err(|source| self.create_error(source))?;
        if let Some(previous) = previous.filter(|previous| *previous != pid.as_raw()) {
            warn!("Replacing stale PID file '{}' (pid {})", self.path.display(), previous);
        }

        write_pid(&mut lock, pid).map_err(|source| self.create_error(source))?;
        debug!("Created PID file '{}'", self.path.display());

        Ok(InstanceGuard {
            path: self.path,
            pid,
            _lock: lock,
        })
    }

    /// Open and exclusively lock the file at `path`.
    ///
    /// A previous owner removes its file before releasing the lock, so the
    /// locked descriptor must still be the file at `path` or we retry.
    fn lock(&self) -> Result<Flock<File>, PidFileError> {
        for _ in 0..LOCK_ATTEMPTS {
            let file = File::options()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .mode(0o644)
                .open(&self.path)
                .map_err(|source| self.create_error(source))?;

            let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => lock,
                Err((mut file, errno)) if errno == Errno::EWOULDBLOCK => {
                    return Err(PidFileError::AlreadyRunning {
                        path: self.path.clone(),
                        pid: read_pid(&mut file).ok().flatten(),
                    });
                }
                Err((_, errno)) => return Err(self.create_error(io::Error::from(errno))),
            };

            if self.is_current(&lock) {
                return Ok(lock);
            }
            debug!("PID file '{}' was replaced while locking", self.path.display());
        }

        Err(self.create_error(io::Error::new(
            io::ErrorKind::WouldBlock,
            "PID file keeps being replaced",
        )))
    }

    fn is_current(&self, file: &File) -> bool {
        match (file.metadata(), fs::metadata(&self.path)) {
            (Ok(locked), Ok(on_disk)) => {
                locked.dev() == on_disk.dev() && locked.ino() == on_disk.ino()
            }
            _ => false,
        }
    }

    fn create_error(&self, source: io::Error) -> PidFileError {
        PidFileError::Create {
            path: self.path.clone(),
            source,
        }
    }
}

fn read_pid(file: &mut File) -> io::Result<Option<i32>> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut content)?;

    Ok(content.trim().parse::<i32>().ok().filter(|raw| *raw > 0))
}

fn write_pid(file: &mut File, pid: Pid) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", pid)?;
    file.sync_all()
}

/// Registered PID file; removed and unlocked when dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    pid: Pid,
    _lock: Flock<File>,
}

impl InstanceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Removed while the lock is still held; the lock goes with `_lock`
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove PID file '{}': {}", self.path.display(), e);
        }
    }
}
