//! Child process setup and reaping.
//!
//! Builds the child's session in the forked process: the slave becomes the
//! child's stdio and the controlling terminal of a fresh session, then the
//! target image replaces the child. The parent keeps the master and reaps
//! the child without blocking.

use std::ffi::{CString, OsStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd};
use std::os::unix::ffi::OsStrExt;

use nix::fcntl::{fcntl, FcntlArg};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{dup2, execvp, fork, getpid, setsid, tcsetpgrp, ForkResult, Pid};

use crate::error::{Error, Result};
use crate::pty::PtyPair;

/// How a reaped child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Normal exit with the given code.
    Code(i32),
    /// Terminated by the given signal number.
    Signal(i32),
}

/// A target program running behind a pty.
///
/// The supervisor exclusively owns the master; the child exclusively owns
/// the slave-derived descriptors once its session is built.
pub struct Child {
    master: File,
    pid: Pid,
    status: Option<ExitKind>,
}

impl Child {
    /// Fork and exec `program` with `args`, attached to `pair`'s slave.
    ///
    /// The slave is closed on the parent side as soon as the fork returns.
    /// Session-setup failures are fatal to the child only (exit 1, no
    /// reporting channel); an exec failure prints a diagnostic on the
    /// caller's original stderr and exits the child with 127.
    pub fn spawn(pair: PtyPair, program: &OsStr, args: &[OsString]) -> Result<Self> {
        let program_c = CString::new(program.as_bytes())
            .map_err(|e| Error::Spawn(format!("program name contains NUL: {e}")))?;
        let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
        argv.push(program_c.clone());
        for arg in args {
            argv.push(
                CString::new(arg.as_bytes())
                    .map_err(|e| Error::Spawn(format!("argument contains NUL: {e}")))?,
            );
        }

        let (master, slave) = pair.into_parts();

        // SAFETY: the child performs only fd manipulation, session calls and
        // exec; the parent resumes normally.
        match unsafe { fork() }.map_err(Error::Fork)? {
            ForkResult::Parent { child } => {
                // The parent never touches the slave again.
                drop(slave);
                // SAFETY: sole ownership of the master fd is transferred.
                let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };
                Ok(Self {
                    master,
                    pid: child,
                    status: None,
                })
            }
            ForkResult::Child => {
                // The child never touches the master.
                drop(master);

                // Keep a route to the caller's stderr for the exec
                // diagnostic; the descriptor closes itself on a successful
                // exec.
                let diag_fd = fcntl(libc::STDERR_FILENO, FcntlArg::F_DUPFD_CLOEXEC(3)).ok();

                // The slave becomes the child's stdin, stdout and stderr.
                let slave_fd = slave.as_raw_fd();
                if dup2(slave_fd, libc::STDIN_FILENO).is_err()
                    || dup2(slave_fd, libc::STDOUT_FILENO).is_err()
                    || dup2(slave_fd, libc::STDERR_FILENO).is_err()
                {
                    std::process::exit(1);
                }
                if slave_fd > libc::STDERR_FILENO {
                    drop(slave);
                }

                // Detach from any inherited terminal, then take the slave as
                // the controlling terminal of the new session.
                if setsid().is_err() {
                    std::process::exit(1);
                }
                // SAFETY: TIOCSCTTY is a valid ioctl on the new stdio.
                unsafe {
                    if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY as libc::c_ulong, 0) < 0 {
                        std::process::exit(1);
                    }
                }
                // Terminal-generated signals must route to the target.
                if tcsetpgrp(io::stdin(), getpid()).is_err() {
                    std::process::exit(1);
                }

                if let Err(err) = execvp(&program_c, &argv) {
                    if let Some(fd) = diag_fd {
                        // SAFETY: fd came from F_DUPFD_CLOEXEC above and is
                        // otherwise unused.
                        let mut diag = unsafe { File::from_raw_fd(fd) };
                        let _ = writeln!(
                            diag,
                            "pty-run: cannot execute {}: {}",
                            program.to_string_lossy(),
                            err
                        );
                    }
                }
                std::process::exit(127);
            }
        }
    }

    /// Child process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Shared view of the master, for readiness polling.
    pub fn master_fd(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }

    /// The master as a byte stream.
    pub fn master(&mut self) -> &mut File {
        &mut self.master
    }

    /// Non-blocking reap.
    ///
    /// Returns the recorded status once the child has terminated and `None`
    /// while it is still running; never blocks. The child is reaped exactly
    /// once, later calls return the stored status.
    pub fn try_wait(&mut self) -> Result<Option<ExitKind>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)).map_err(Error::Wait)? {
            WaitStatus::StillAlive => Ok(None),
            WaitStatus::Exited(_, code) => {
                self.status = Some(ExitKind::Code(code));
                Ok(self.status)
            }
            WaitStatus::Signaled(_, signal, _) => {
                self.status = Some(ExitKind::Signal(signal as i32));
                Ok(self.status)
            }
            // Stop/continue events leave the child running.
            _ => Ok(None),
        }
    }

    /// Blocking reap.
    pub fn wait(&mut self) -> Result<ExitKind> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        loop {
            match waitpid(self.pid, None).map_err(Error::Wait)? {
                WaitStatus::Exited(_, code) => {
                    self.status = Some(ExitKind::Code(code));
                    return Ok(ExitKind::Code(code));
                }
                WaitStatus::Signaled(_, signal, _) => {
                    self.status = Some(ExitKind::Signal(signal as i32));
                    return Ok(ExitKind::Signal(signal as i32));
                }
                _ => continue,
            }
        }
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        // Abandoned before being reaped: hang the child up and sweep once.
        if self.status.is_none() {
            let _ = kill(self.pid, Signal::SIGHUP);
            let _ = waitpid(self.pid, Some(WaitPidFlag::WNOHANG));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::PtyPair;
    use std::io::Read;

    fn spawn(program: &str, args: &[&str]) -> Child {
        let pair = PtyPair::open().unwrap();
        pair.set_raw().unwrap();
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        Child::spawn(pair, OsStr::new(program), &args).unwrap()
    }

    #[test]
    fn reaps_exit_code_exactly_once() {
        let mut child = spawn("sh", &["-c", "exit 7"]);
        assert_eq!(child.wait().unwrap(), ExitKind::Code(7));
        // A second reap returns the recorded status instead of ECHILD.
        assert_eq!(child.wait().unwrap(), ExitKind::Code(7));
    }

    #[test]
    fn captures_output_through_master() {
        let mut child = spawn("echo", &["hello"]);

        let mut output = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match child.master().read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    output.extend_from_slice(&buf[..n]);
                    if output.windows(5).any(|w| w == b"hello") {
                        break;
                    }
                }
                // EIO once the slave side is fully closed
                Err(_) => break,
            }
        }
        assert!(String::from_utf8_lossy(&output).contains("hello"));
        let _ = child.wait();
    }

    #[test]
    fn exec_failure_exits_127() {
        let mut child = spawn("definitely-not-a-real-program", &[]);
        assert_eq!(child.wait().unwrap(), ExitKind::Code(127));
    }

    #[test]
    fn try_wait_does_not_block_on_running_child() {
        let mut child = spawn("sleep", &["30"]);
        assert_eq!(child.try_wait().unwrap(), None);

        kill(child.pid(), Signal::SIGKILL).unwrap();
        assert_eq!(child.wait().unwrap(), ExitKind::Signal(libc::SIGKILL));
    }
}
