//! The supervisor's relay loop.
//!
//! Multiplexes bytes between the caller's stdio and the pty master until the
//! child terminates. Each pass is a bounded readiness wait followed by at
//! most one buffer's worth of transfer per ready source and a non-blocking
//! reap, so child exit is observed promptly even when both streams are idle.

use std::io::{self, Read, Write};
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::child::{Child, ExitKind};
use crate::error::{Error, Result};

/// Bound on each readiness wait.
const POLL_INTERVAL_MS: u16 = 100;

/// One bounded read from the caller's stdin per readiness event.
const STDIN_BUF: usize = 4096;

/// One bounded read from the pty master per readiness event.
const MASTER_BUF: usize = 65536;

/// Exit code reported when the target was terminated by a signal rather
/// than exiting normally.
pub const SIGNALED_EXIT_CODE: i32 = 0;

/// Relay bytes between the caller's stdio and `child`'s pty master until
/// the child terminates, then return the supervisor's exit code.
///
/// A failed write drops the chunk in flight and the loop continues; a
/// source at EOF (or a master whose slave side is gone) is simply dropped
/// from the readiness set. Once termination is observed, no further read or
/// write touches the pty.
pub fn relay(child: &mut Child) -> Result<i32> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    let mut stdin_buf = [0u8; STDIN_BUF];
    let mut master_buf = [0u8; MASTER_BUF];

    let mut stdin_open = true;
    let mut master_open = true;

    loop {
        let (stdin_ready, master_ready) = {
            let stdin_events = if stdin_open {
                PollFlags::POLLIN
            } else {
                PollFlags::empty()
            };
            let master_events = if master_open {
                PollFlags::POLLIN
            } else {
                PollFlags::empty()
            };
            let mut fds = [
                PollFd::new(stdin.as_fd(), stdin_events),
                PollFd::new(child.master_fd(), master_events),
            ];
            match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(Error::Poll(err)),
            }
            (ready(&fds[0]), ready(&fds[1]))
        };

        if stdin_ready && stdin_open {
            match relay_chunk(&mut stdin.lock(), child.master(), &mut stdin_buf) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    // EOF from the caller; a pty has no way to forward it.
                    log::debug!("stdin closed, relaying output only");
                    stdin_open = false;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    log::warn!("stdin read failed: {err}");
                    stdin_open = false;
                }
            }
        }

        let mut master_produced = false;
        if master_ready && master_open {
            match relay_chunk(child.master(), &mut stdout.lock(), &mut master_buf) {
                Ok(Some(_)) => master_produced = true,
                Ok(None) => {
                    log::debug!("pty master at EOF");
                    master_open = false;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    // EIO here means the slave side is fully closed.
                    log::debug!("pty master closed: {err}");
                    master_open = false;
                }
            }
        }

        // Reap only on passes where the master yielded nothing, so output
        // still buffered at exit time is drained before the loop turns down.
        // Once termination is observed the pty is not touched again.
        if !master_produced {
            if let Some(status) = child.try_wait()? {
                log::debug!("child terminated: {status:?}");
                return Ok(exit_code(status));
            }
        }
    }
}

/// Relay at most one buffer's worth from `src` to `dst`, flushing partial
/// writes until the chunk is sent.
///
/// Returns `Ok(None)` at end of input. A failed write drops the chunk after
/// logging it; only read errors propagate.
fn relay_chunk(
    src: &mut impl Read,
    dst: &mut impl Write,
    buf: &mut [u8],
) -> io::Result<Option<usize>> {
    let n = src.read(buf)?;
    if n == 0 {
        return Ok(None);
    }
    if let Err(err) = dst.write_all(&buf[..n]).and_then(|()| dst.flush()) {
        log::warn!("dropped {n} bytes in transit: {err}");
    }
    Ok(Some(n))
}

/// Map a reaped status to the supervisor's exit code.
fn exit_code(status: ExitKind) -> i32 {
    match status {
        ExitKind::Code(code) => code,
        ExitKind::Signal(_) => SIGNALED_EXIT_CODE,
    }
}

fn ready(fd: &PollFd) -> bool {
    fd.revents().is_some_and(|r| {
        r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn exit_code_passes_through_normal_exit() {
        assert_eq!(exit_code(ExitKind::Code(7)), 7);
        assert_eq!(exit_code(ExitKind::Code(0)), 0);
    }

    #[test]
    fn signal_death_maps_to_fallback() {
        assert_eq!(exit_code(ExitKind::Signal(9)), SIGNALED_EXIT_CODE);
    }

    #[test]
    fn relay_chunk_reports_eof() {
        let mut src = Cursor::new(Vec::new());
        let mut dst = Vec::new();
        let mut buf = [0u8; 16];
        assert!(matches!(relay_chunk(&mut src, &mut dst, &mut buf), Ok(None)));
        assert!(dst.is_empty());
    }

    #[test]
    fn relay_chunk_is_bounded_by_one_buffer() {
        let mut src = Cursor::new(vec![7u8; 64]);
        let mut dst = Vec::new();
        let mut buf = [0u8; 16];
        assert_eq!(relay_chunk(&mut src, &mut dst, &mut buf).unwrap(), Some(16));
        assert_eq!(dst.len(), 16);
    }

    proptest! {
        #[test]
        fn bytes_survive_relay_in_order(data in proptest::collection::vec(any::<u8>(), 0..16384)) {
            let mut src = Cursor::new(data.clone());
            let mut dst = Vec::new();
            let mut buf = [0u8; 4096];
            while relay_chunk(&mut src, &mut dst, &mut buf).unwrap().is_some() {}
            prop_assert_eq!(dst, data);
        }
    }
}
