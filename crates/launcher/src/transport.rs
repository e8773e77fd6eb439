//! Pipe-based debugging transport.
//!
//! When the caller flags include `--remote-debugging-pipe`, the browser
//! expects its command channel on fd 3 and writes responses on fd 4, as
//! NUL-terminated JSON messages. This module owns the plumbing: two OS
//! pipes, the child-side ends duplicated onto fds 3/4 before exec, the
//! launcher-side ends exposed as plain byte streams. Message framing and
//! parsing are the caller's business.

use std::fs::File;

use crate::error::{LaunchError, Result};

/// Launcher-side ends of the debugging pipes.
#[derive(Debug)]
pub struct PipeTransport {
	/// Writes commands to the browser (its fd 3).
	pub writer: File,
	/// Reads responses from the browser (its fd 4).
	pub reader: File,
}

/// Child-side pipe ends, kept alive until after the spawn.
#[cfg(unix)]
#[derive(Debug)]
pub(crate) struct ChildPipeEnds {
	pub read_fd: std::os::fd::OwnedFd,
	pub write_fd: std::os::fd::OwnedFd,
}

/// Creates both pipes and splits the ends between launcher and child.
#[cfg(unix)]
pub(crate) fn create() -> Result<(PipeTransport, ChildPipeEnds)> {
	// Command channel: launcher writes, child reads on fd 3.
	let (child_read, launcher_write) =
		nix::unistd::pipe().map_err(|e| LaunchError::Io(std::io::Error::from(e)))?;
	// Response channel: child writes on fd 4, launcher reads.
	let (launcher_read, child_write) =
		nix::unistd::pipe().map_err(|e| LaunchError::Io(std::io::Error::from(e)))?;

	let transport = PipeTransport {
		writer: File::from(launcher_write),
		reader: File::from(launcher_read),
	};
	let child_ends = ChildPipeEnds {
		read_fd: child_read,
		write_fd: child_write,
	};
	Ok((transport, child_ends))
}

#[cfg(not(unix))]
pub(crate) fn create() -> Result<(PipeTransport, ())> {
	Err(LaunchError::PlatformUnsupported(
		"pipe debugging transport is only available on Unix".into(),
	))
}
