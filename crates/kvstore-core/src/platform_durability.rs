//! Platform-specific durable sync
//!
//! Maps "make this file survive power loss" onto the strongest primitive each
//! platform offers. Used by the snapshot writer for both the temp file and
//! the directory entry created by the rename.

use std::fs::File;
use std::io;
use std::path::Path;

/// Block until the file's data has reached persistent storage.
///
/// - Linux: `fdatasync()`
/// - macOS/iOS: `fcntl(F_FULLFSYNC)`; plain fsync stops at the drive cache
/// - Everything else: `File::sync_data()`
///
/// The caller must not hold the store's map lock while calling this.
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`.
        let result = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`.
        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        // fcntl(2) only promises -1 on failure; success is "some other value",
        // not necessarily 0.
        if result != -1 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
    {
        file.sync_data()
    }
}

/// Persist a directory entry change (create or rename) inside `dir`.
///
/// Windows cannot open directories as files; there the rename is already
/// durable once `MoveFileEx` returns, so this is a no-op.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let handle = File::open(dir)?;
        durable_sync(&handle)
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

/// Fail unless this process may create files in `dir`.
///
/// Asks the kernel via `access(W_OK)`, which accounts for ownership, group
/// and ACLs rather than just the mode bits. Non-Unix platforms fall back to
/// the read-only attribute.
pub fn check_writable(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(dir.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: `c_path` is NUL-terminated and outlives the call.
        let result = unsafe { libc::access(c_path.as_ptr(), libc::W_OK) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    {
        if std::fs::metadata(dir)?.permissions().readonly() {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "directory is read-only"))
        } else {
            Ok(())
        }
    }
}
