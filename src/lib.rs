//! pty-run - run a program attached to a pseudoterminal.
//!
//! The target perceives a full terminal (line discipline, job control,
//! terminal ioctls) while the caller may be a script, a pipe, or an
//! automation harness. The supervisor allocates a pty pair, puts the slave
//! into raw mode, forks the target into a fresh session with the slave as
//! its controlling terminal and stdio, and relays bytes between its own
//! stdio and the master until the target terminates.
//!
//! Key pieces:
//! - [`PtyPair`]: master/slave allocation and raw-mode setup
//! - [`Child`]: session building, exec, and non-blocking reaping
//! - [`relay`]: the readiness-driven byte loop and exit-code mapping
//!
//! The supervisor installs no signal handlers and forwards no signals. If
//! it is killed, its master handle closes and the kernel hangs up the
//! target's session (SIGHUP to the foreground process group, EIO on the
//! terminal).

mod child;
mod error;
mod pty;
mod relay;

pub use child::{Child, ExitKind};
pub use error::{Error, Result};
pub use pty::PtyPair;
pub use relay::{relay, SIGNALED_EXIT_CODE};
