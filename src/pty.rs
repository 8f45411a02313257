//! PTY pair allocation and terminal mode setup.
//!
//! Uses the classic posix_openpt/grantpt/unlockpt sequence, then opens the
//! slave by resolved path. The slave is opened here, in the supervisor, so
//! raw mode can be applied before the pair is handed to a child.
//!
//! Reference: https://www.man7.org/linux/man-pages/man3/posix_openpt.3.html

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::termios::{self, SetArg};

use crate::error::{Error, Result};

/// A linked master/slave pseudoterminal pair, both ends owned by the
/// supervisor until a child is spawned.
///
/// Exactly one slave is opened per pair. The master stays with the
/// supervisor for the lifetime of the child; the slave is handed to the
/// child at fork time and dropped on the supervisor side.
pub struct PtyPair {
    master: PtyMaster,
    slave: OwnedFd,
    slave_path: String,
}

impl PtyPair {
    /// Allocate a new pty pair.
    ///
    /// None of the failure conditions here (resource exhaustion, permission)
    /// are transient, so there are no retries; the caller treats any error
    /// as fatal.
    pub fn open() -> Result<Self> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(Error::OpenMaster)?;
        grantpt(&master).map_err(Error::Grant)?;
        unlockpt(&master).map_err(Error::Unlock)?;

        // SAFETY: ptsname is not thread-safe, but it is called before any
        // other thread exists.
        let slave_path = unsafe { ptsname(&master) }.map_err(Error::SlavePath)?;
        let slave = open_slave(&slave_path)?;

        Ok(Self {
            master,
            slave,
            slave_path,
        })
    }

    /// Path of the slave device, e.g. `/dev/pts/3`.
    pub fn slave_path(&self) -> &str {
        &self.slave_path
    }

    /// Put the slave end into raw discipline: canonical input, echo, and
    /// signal-generating special characters all disabled.
    ///
    /// Must run before the slave becomes a child's stdio so the raw
    /// configuration is transparent to the target.
    pub fn set_raw(&self) -> Result<()> {
        let mut attrs = termios::tcgetattr(&self.slave).map_err(Error::GetAttrs)?;
        termios::cfmakeraw(&mut attrs);
        termios::tcsetattr(&self.slave, SetArg::TCSANOW, &attrs).map_err(Error::SetRaw)?;
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (PtyMaster, OwnedFd) {
        (self.master, self.slave)
    }
}

impl AsRawFd for PtyPair {
    fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }
}

fn open_slave(path: &str) -> Result<OwnedFd> {
    let path_c = CString::new(path)
        .map_err(|e| Error::OpenSlave(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let fd = unsafe { libc::open(path_c.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
    if fd < 0 {
        return Err(Error::OpenSlave(io::Error::last_os_error()));
    }
    // SAFETY: fd was just opened and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
