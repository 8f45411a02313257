//! Error types for pty supervision.

use std::io;
use thiserror::Error;

/// Error raised during pty setup or supervision.
///
/// Each variant names the operation that failed, so a single printed line
/// identifies both the failing step and the underlying OS error.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to open the pty master
    #[error("failed to open pty master: {0}")]
    OpenMaster(#[source] nix::Error),

    /// Failed to grant access to the pty slave
    #[error("failed to grant pty slave access: {0}")]
    Grant(#[source] nix::Error),

    /// Failed to unlock the pty slave
    #[error("failed to unlock pty slave: {0}")]
    Unlock(#[source] nix::Error),

    /// Failed to resolve the pty slave path
    #[error("failed to resolve pty slave path: {0}")]
    SlavePath(#[source] nix::Error),

    /// Failed to open the pty slave
    #[error("failed to open pty slave: {0}")]
    OpenSlave(#[source] io::Error),

    /// Failed to read terminal attributes from the slave
    #[error("failed to read slave terminal attributes: {0}")]
    GetAttrs(#[source] nix::Error),

    /// Failed to apply raw mode to the slave
    #[error("failed to set raw mode on pty slave: {0}")]
    SetRaw(#[source] nix::Error),

    /// Failed to fork the child
    #[error("failed to fork: {0}")]
    Fork(#[source] nix::Error),

    /// Failed to prepare the child command line
    #[error("failed to spawn child: {0}")]
    Spawn(String),

    /// Failed to poll stdin and the pty master
    #[error("failed to poll stdin and pty master: {0}")]
    Poll(#[source] nix::Error),

    /// Failed to wait for the child
    #[error("failed to wait for child: {0}")]
    Wait(#[source] nix::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for pty supervision.
pub type Result<T> = std::result::Result<T, Error>;
