use std::ffi::CString;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{symlink, DirBuilderExt, PermissionsExt};
use std::path::Path;

use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::error::{Error, IoResultExt, Result};
use crate::types::{EntryMeta, FileType};

/// create a directory; an already-existing directory is success
pub fn create_dir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.mode(mode);
    match builder.create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// create a fifo (named pipe), replacing an existing entry at the path
pub fn create_fifo(path: &Path, mode: u32) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).with_path(path)?;
    }

    mkfifo(path, Mode::from_bits_truncate(mode)).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: io::Error::from_raw_os_error(e as i32),
    })
}

/// create a symlink, replacing an existing entry at the path
pub fn create_symlink(path: &Path, target: &str) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).with_path(path)?;
    }

    symlink(target, path).with_path(path)
}

/// create a hardlink to an existing file, replacing an existing entry
pub fn create_hardlink(link_path: &Path, target_path: &Path) -> Result<()> {
    if link_path.symlink_metadata().is_ok() {
        fs::remove_file(link_path).with_path(link_path)?;
    }

    fs::hard_link(target_path, link_path).with_path(link_path)
}

/// remove a single file, symlink or fifo
pub fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path).with_path(path)
}

/// remove a directory tree
pub fn remove_all(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).with_path(path)
}

/// apply archived metadata to a restored entry, best effort
///
/// order is fixed: timestamps, then ownership, mode last. a restrictive
/// mode would block the earlier updates. ownership is only attempted as
/// root; symlinks carry no mode of their own. failures are reported as
/// warnings and do not abort a restore; returns false if anything was
/// left unapplied.
pub fn apply_metadata(path: &Path, meta: &EntryMeta) -> bool {
    let mut ok = true;

    if let Err(e) = set_times_nofollow(path, meta.atime, meta.mtime) {
        eprintln!("warning: cannot set times on {}: {}", path.display(), e);
        ok = false;
    }

    if nix::unistd::geteuid().is_root() {
        if let Err(e) = lchown_raw(path, meta.uid, meta.gid) {
            eprintln!(
                "warning: cannot set ownership on {}: {}",
                path.display(),
                e
            );
            ok = false;
        }
    }

    if meta.file_type != FileType::Symlink {
        if let Err(e) = fs::set_permissions(path, Permissions::from_mode(meta.mode as u32)) {
            eprintln!(
                "warning: cannot set permissions on {}: {}",
                path.display(),
                e
            );
            ok = false;
        }
    }

    ok
}

fn path_cstring(path: &Path) -> io::Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))
}

/// set atime/mtime without following symlinks
fn set_times_nofollow(path: &Path, atime: i64, mtime: i64) -> io::Result<()> {
    let c_path = path_cstring(path)?;
    let times = [
        libc::timespec {
            tv_sec: atime as libc::time_t,
            tv_nsec: 0,
        },
        libc::timespec {
            tv_sec: mtime as libc::time_t,
            tv_nsec: 0,
        },
    ];
    let ret = unsafe {
        libc::utimensat(
            libc::AT_FDCWD,
            c_path.as_ptr(),
            times.as_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// change ownership without following symlinks
fn lchown_raw(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    let c_path = path_cstring(path)?;
    let ret = unsafe { libc::lchown(c_path.as_ptr(), uid, gid) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
