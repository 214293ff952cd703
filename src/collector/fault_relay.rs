// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The signal-handler-to-reporter notification channel.
//!
//! Built on an eventfd rather than a condvar or mutex because the producer
//! side runs inside a signal handler, where only async-signal-safe
//! operations are allowed. A single `write` syscall is safe there; taking a
//! lock is not. The payload is deliberately minimal: the signal number,
//! moved across the boundary as one 64-bit value. No pointers, no heap
//! data, because constructing anything richer inside a handler is unsafe.

use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// The ephemeral payload of one fault: just the signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FaultEvent {
    signum: i32,
}

impl FaultEvent {
    pub(crate) fn signum(&self) -> i32 {
        self.signum
    }
}

/// A wake-able, one-word-per-event channel between signal context and the
/// reporter thread.
#[derive(Debug)]
pub(crate) struct FaultRelay {
    fd: OwnedFd,
}

impl FaultRelay {
    pub(crate) fn new() -> anyhow::Result<Self> {
        // SAFETY: eventfd has no preconditions.
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC) };
        anyhow::ensure!(fd >= 0, "eventfd failed: {}", errno::errno());
        // SAFETY: the descriptor was just returned by the kernel and is
        // owned by nobody else.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Posts a fault to the reporter thread.
    ///
    /// SIGNAL SAFETY:
    ///     This is the only operation on this type that may run in signal
    ///     context. It performs exactly one `write` syscall on a plain file
    ///     descriptor; no allocation, no locks, no non-reentrant libc.
    ///     The result is discarded: nothing useful can be done about a
    ///     failed write while handling a fatal signal.
    pub(crate) fn notify(&self, signum: i32) {
        let data = signum as u64;
        // SAFETY: the buffer outlives the syscall and is exactly 8 bytes,
        // as eventfd requires.
        unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &data as *const u64 as *const libc::c_void,
                size_of::<u64>(),
            );
        }
    }

    /// Blocks until a fault has been posted, then drains it.
    ///
    /// Callable only from the reporter thread (normal execution context).
    /// The happens-before edge between `notify` and the corresponding wake
    /// is provided by the kernel primitive. An eventfd is a counter: if
    /// two faults on different threads race ahead of the reporter, their
    /// posts merge and one read observes the sum of the two signal
    /// numbers. Fatal signals terminate the faulting thread's normal
    /// continuation, so in practice at most one fault is outstanding at
    /// delivery time.
    pub(crate) fn wait(&self) -> anyhow::Result<FaultEvent> {
        let mut data: u64 = 0;
        loop {
            // SAFETY: the buffer outlives the syscall and is 8 bytes.
            let rc = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    &mut data as *mut u64 as *mut libc::c_void,
                    size_of::<u64>(),
                )
            };
            if rc == size_of::<u64>() as isize {
                return Ok(FaultEvent {
                    signum: data as i32,
                });
            }
            if rc < 0 && errno::errno().0 == libc::EINTR {
                continue;
            }
            anyhow::bail!("eventfd read failed (rc {rc}): {}", errno::errno());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_then_wait_round_trip() {
        let relay = FaultRelay::new().unwrap();
        relay.notify(libc::SIGSEGV);
        let event = relay.wait().unwrap();
        assert_eq!(event.signum(), libc::SIGSEGV);
    }

    #[test]
    fn test_racing_posts_merge_into_one_event() {
        // Counter semantics: posts that pile up ahead of the reporter are
        // drained as a single event carrying the sum.
        let relay = FaultRelay::new().unwrap();
        relay.notify(libc::SIGQUIT);
        relay.notify(libc::SIGSEGV);
        let event = relay.wait().unwrap();
        assert_eq!(event.signum(), libc::SIGQUIT + libc::SIGSEGV);
    }

    #[test]
    fn test_wait_unblocks_across_threads() {
        let relay = std::sync::Arc::new(FaultRelay::new().unwrap());
        let producer = relay.clone();
        let handle = std::thread::spawn(move || {
            producer.notify(libc::SIGQUIT);
        });
        let event = relay.wait().unwrap();
        assert_eq!(event.signum(), libc::SIGQUIT);
        handle.join().unwrap();
    }
}
